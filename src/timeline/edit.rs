use std::sync::Arc;

use crate::assets::color::Color;
use crate::timeline::model::{Item, ItemId, ItemKind, Timeline, Track, TrackId, TransitionSpec};

/// Partial update for [`Timeline::update_item`].
///
/// `None` leaves a field untouched. Fields that do not apply to the item's kind make the whole
/// patch invalid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemPatch {
    pub start: Option<u64>,
    pub duration: Option<u64>,
    /// Move the item to another track (appended after that track's items).
    pub track_index: Option<usize>,
    pub trim_start_s: Option<f64>,
    pub source: Option<String>,
    pub source_duration_s: Option<f64>,
    pub text: Option<String>,
    pub color: Option<Color>,
    /// `Some(None)` clears the outgoing transition.
    pub transition_out: Option<Option<TransitionSpec>>,
}

impl ItemPatch {
    pub fn move_to(start: u64) -> Self {
        Self {
            start: Some(start),
            ..Self::default()
        }
    }

    pub fn resize(duration: u64) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    fn apply(&self, item: &Item) -> Result<Item, String> {
        let mut next = item.clone();
        if let Some(start) = self.start {
            next.start = start;
        }
        if let Some(duration) = self.duration {
            next.duration = duration;
        }
        if let Some(tr) = self.transition_out {
            next.transition_out = tr;
        }

        let kind_name = item.kind.name();
        let not_applicable = |field: &str| format!("\"{field}\" does not apply to {kind_name} items");

        if self.trim_start_s.is_some() || self.source_duration_s.is_some() {
            let Some(clip) = next.media_mut() else {
                return Err(not_applicable("trim"));
            };
            if let Some(trim) = self.trim_start_s {
                clip.trim_start_s = trim;
            }
            if let Some(d) = self.source_duration_s {
                clip.source_duration_s = d;
            }
        }

        if let Some(new_source) = &self.source {
            match &mut next.kind {
                ItemKind::Video(clip) | ItemKind::Audio(clip) => clip.source = new_source.clone(),
                ItemKind::Image { source } => *source = new_source.clone(),
                ItemKind::Text { .. } | ItemKind::Solid { .. } => {
                    return Err(not_applicable("source"));
                }
            }
        }

        if let Some(new_text) = &self.text {
            match &mut next.kind {
                ItemKind::Text { text, .. } => *text = new_text.clone(),
                _ => return Err(not_applicable("text")),
            }
        }

        if let Some(new_color) = self.color {
            match &mut next.kind {
                ItemKind::Text { color, .. } | ItemKind::Solid { color } => *color = new_color,
                _ => return Err(not_applicable("color")),
            }
        }

        Ok(next)
    }
}

impl Timeline {
    /// Add `item` to the track at `track_index`, appending empty tracks if the index is past the
    /// end. Duplicate ids and invalid items leave the state unchanged.
    pub fn add_item(&self, track_index: usize, item: Item) -> Timeline {
        if self.locate(&item.id).is_some() {
            tracing::warn!(item = %item.id, "add_item: duplicate item id, ignoring");
            return self.clone();
        }
        if let Err(reason) = item.check(self.fps) {
            tracing::warn!(item = %item.id, %reason, "add_item: invalid item, ignoring");
            return self.clone();
        }

        let mut next = self.clone();
        next.ensure_track(track_index);
        Arc::make_mut(&mut next.tracks[track_index]).items.push(item);
        next
    }

    pub fn remove_item(&self, id: &ItemId) -> Timeline {
        let Some(loc) = self.locate(id) else {
            tracing::warn!(item = %id, "remove_item: unknown item id");
            return self.clone();
        };
        let mut next = self.clone();
        Arc::make_mut(&mut next.tracks[loc.track_index])
            .items
            .remove(loc.item_index);
        next
    }

    /// Apply `patch` to the item. Patches that break an item invariant are rejected whole.
    pub fn update_item(&self, id: &ItemId, patch: &ItemPatch) -> Timeline {
        let Some(loc) = self.locate(id) else {
            tracing::warn!(item = %id, "update_item: unknown item id");
            return self.clone();
        };
        let current = &self.tracks[loc.track_index].items[loc.item_index];
        let updated = match patch.apply(current).and_then(|item| {
            item.check(self.fps)?;
            Ok(item)
        }) {
            Ok(item) => item,
            Err(reason) => {
                tracing::warn!(item = %id, %reason, "update_item: rejected patch");
                return self.clone();
            }
        };

        let mut next = self.clone();
        match patch.track_index {
            Some(target) if target != loc.track_index => {
                Arc::make_mut(&mut next.tracks[loc.track_index])
                    .items
                    .remove(loc.item_index);
                next.ensure_track(target);
                Arc::make_mut(&mut next.tracks[target]).items.push(updated);
            }
            _ => {
                Arc::make_mut(&mut next.tracks[loc.track_index]).items[loc.item_index] = updated;
            }
        }
        next
    }

    /// Cut the item at `at_frame` into two items with fresh ids.
    ///
    /// No-op unless `start < at_frame < start + duration`.
    pub fn split_item(&self, id: &ItemId, at_frame: u64) -> Timeline {
        self.split_item_with(id, at_frame, ItemId::generate)
    }

    /// [`Timeline::split_item`] with caller-provided ids (first half, then second half).
    pub fn split_item_with(
        &self,
        id: &ItemId,
        at_frame: u64,
        mut next_id: impl FnMut() -> ItemId,
    ) -> Timeline {
        let Some(loc) = self.locate(id) else {
            tracing::warn!(item = %id, "split_item: unknown item id");
            return self.clone();
        };
        let original = &self.tracks[loc.track_index].items[loc.item_index];
        if !original.range().contains_interior(at_frame) {
            tracing::debug!(
                item = %id,
                at_frame,
                start = original.start,
                end = original.end(),
                "split_item: cut point outside item interior"
            );
            return self.clone();
        }

        let head_len = at_frame - original.start;

        let mut first = original.clone();
        first.id = next_id();
        first.duration = head_len;
        first.transition_out = None;

        let mut second = original.clone();
        second.id = next_id();
        second.start = at_frame;
        second.duration = original.duration - head_len;
        if let Some(clip) = second.media_mut() {
            clip.trim_start_s += self.fps.frames_to_secs(head_len);
        }

        if first.id == second.id
            || [&first.id, &second.id]
                .iter()
                .any(|new_id| *new_id != id && self.locate(new_id).is_some())
        {
            tracing::warn!(item = %id, "split_item: generated ids collide, ignoring");
            return self.clone();
        }

        let mut next = self.clone();
        Arc::make_mut(&mut next.tracks[loc.track_index]).items.splice(
            loc.item_index..=loc.item_index,
            [first, second],
        );
        next
    }

    /// Insert `track` at index 0, making it the top layer.
    pub fn add_track(&self, track: Track) -> Timeline {
        if self.track_index(&track.id).is_some() {
            tracing::warn!(track = %track.id, "add_track: duplicate track id, ignoring");
            return self.clone();
        }
        if let Some(dup) = track.items.iter().find(|item| self.locate(&item.id).is_some()) {
            tracing::warn!(item = %dup.id, "add_track: track carries a duplicate item id, ignoring");
            return self.clone();
        }
        if let Some(reason) = track.items.iter().find_map(|item| item.check(self.fps).err()) {
            tracing::warn!(track = %track.id, %reason, "add_track: invalid item, ignoring");
            return self.clone();
        }

        let mut next = self.clone();
        next.tracks.insert(0, Arc::new(track));
        next
    }

    pub fn remove_track(&self, id: &TrackId) -> Timeline {
        let Some(index) = self.track_index(id) else {
            tracing::warn!(track = %id, "remove_track: unknown track id");
            return self.clone();
        };
        let mut next = self.clone();
        next.tracks.remove(index);
        next
    }

    pub fn with_current_frame(&self, frame: u64) -> Timeline {
        let mut next = self.clone();
        next.current_frame = frame;
        next
    }

    fn ensure_track(&mut self, index: usize) {
        while self.tracks.len() <= index {
            let n = self.tracks.len() + 1;
            self.tracks.push(Arc::new(Track::new(
                TrackId::generate(),
                format!("Track {n}"),
            )));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/edit.rs"]
mod tests;
