use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::assets::color::Color;
use crate::foundation::core::{Fps, FrameRange};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Float slack for the trim invariant, in seconds.
pub const TRIM_EPSILON_S: f64 = 1e-6;

/// Stable item identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random (uuid v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stable track identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Trimmed window into a time-based source (video or audio).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaClip {
    pub source: String,
    /// Offset into the source where this item begins, in seconds.
    #[serde(default)]
    pub trim_start_s: f64,
    /// Total length of the source, in seconds.
    pub source_duration_s: f64,
}

impl MediaClip {
    pub fn new(source: impl Into<String>, trim_start_s: f64, source_duration_s: f64) -> Self {
        Self {
            source: source.into(),
            trim_start_s,
            source_duration_s,
        }
    }

    /// `trim_start + duration/fps <= source_duration`, with [`TRIM_EPSILON_S`] slack.
    pub fn fits(&self, duration_frames: u64, fps: Fps) -> bool {
        self.trim_start_s.is_finite()
            && self.source_duration_s.is_finite()
            && self.trim_start_s >= 0.0
            && self.trim_start_s + fps.frames_to_secs(duration_frames)
                <= self.source_duration_s + TRIM_EPSILON_S
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Crossfade,
    Wipe,
}

/// Outgoing transition into the next item of the same track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    pub duration_frames: u64,
}

/// Kind-specific payload of an [`Item`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Video(MediaClip),
    Audio(MediaClip),
    Image { source: String },
    Text { text: String, color: Color },
    Solid { color: Color },
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Video(_) => "video",
            Self::Audio(_) => "audio",
            Self::Image { .. } => "image",
            Self::Text { .. } => "text",
            Self::Solid { .. } => "solid",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub start: u64,
    pub duration: u64,
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_out: Option<TransitionSpec>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, start: u64, duration: u64, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            start,
            duration,
            kind,
            transition_out: None,
        }
    }

    pub fn solid(id: impl Into<ItemId>, start: u64, duration: u64, color: Color) -> Self {
        Self::new(id, start, duration, ItemKind::Solid { color })
    }

    pub fn text(
        id: impl Into<ItemId>,
        start: u64,
        duration: u64,
        text: impl Into<String>,
        color: Color,
    ) -> Self {
        Self::new(
            id,
            start,
            duration,
            ItemKind::Text {
                text: text.into(),
                color,
            },
        )
    }

    pub fn image(id: impl Into<ItemId>, start: u64, duration: u64, source: impl Into<String>) -> Self {
        Self::new(
            id,
            start,
            duration,
            ItemKind::Image {
                source: source.into(),
            },
        )
    }

    pub fn video(id: impl Into<ItemId>, start: u64, duration: u64, clip: MediaClip) -> Self {
        Self::new(id, start, duration, ItemKind::Video(clip))
    }

    pub fn audio(id: impl Into<ItemId>, start: u64, duration: u64, clip: MediaClip) -> Self {
        Self::new(id, start, duration, ItemKind::Audio(clip))
    }

    pub fn with_transition_out(mut self, kind: TransitionKind, duration_frames: u64) -> Self {
        self.transition_out = Some(TransitionSpec {
            kind,
            duration_frames,
        });
        self
    }

    pub fn range(&self) -> FrameRange {
        FrameRange::with_len(self.start, self.duration)
    }

    pub fn end(&self) -> u64 {
        self.range().end
    }

    /// Video, image, text and solid items produce layers.
    pub fn is_visual(&self) -> bool {
        !matches!(self.kind, ItemKind::Audio(_))
    }

    /// Video and audio items produce audio regions.
    pub fn is_audible(&self) -> bool {
        self.media().is_some()
    }

    pub fn media(&self) -> Option<&MediaClip> {
        match &self.kind {
            ItemKind::Video(clip) | ItemKind::Audio(clip) => Some(clip),
            _ => None,
        }
    }

    pub fn media_mut(&mut self) -> Option<&mut MediaClip> {
        match &mut self.kind {
            ItemKind::Video(clip) | ItemKind::Audio(clip) => Some(clip),
            _ => None,
        }
    }

    /// Source reference for kinds that load external media.
    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Video(clip) | ItemKind::Audio(clip) => Some(&clip.source),
            ItemKind::Image { source } => Some(source),
            ItemKind::Text { .. } | ItemKind::Solid { .. } => None,
        }
    }

    /// Check per-item invariants against the timeline rate.
    pub fn check(&self, fps: Fps) -> Result<(), String> {
        if self.duration == 0 {
            return Err(format!("item \"{}\" must last at least one frame", self.id));
        }
        if let Some(clip) = self.media()
            && !clip.fits(self.duration, fps)
        {
            return Err(format!(
                "item \"{}\" trim {:.6}s + {:.6}s exceeds source duration {:.6}s",
                self.id,
                clip.trim_start_s,
                fps.frames_to_secs(self.duration),
                clip.source_duration_s
            ));
        }
        if let Some(tr) = self.transition_out
            && tr.duration_frames == 0
        {
            return Err(format!(
                "item \"{}\" transition must last at least one frame",
                self.id
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            muted: false,
            volume: None,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        self.items.extend(items);
        self
    }

    /// Effective gain: 0 when muted, else the volume (default 1, floored at 0).
    pub fn gain(&self) -> f64 {
        if self.muted {
            return 0.0;
        }
        match self.volume {
            Some(v) if v.is_finite() => v.max(0.0),
            Some(_) => 1.0,
            None => 1.0,
        }
    }
}

/// Location of an item inside a [`Timeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItemLocation {
    pub track_index: usize,
    pub item_index: usize,
}

/// Whole composition state. Replaced wholesale on every edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub fps: Fps,
    #[serde(default)]
    pub tracks: Vec<Arc<Track>>,
    #[serde(default)]
    pub current_frame: u64,
}

impl Timeline {
    pub fn new(fps: Fps) -> Self {
        Self {
            fps,
            tracks: Vec::new(),
            current_frame: 0,
        }
    }

    pub fn with_tracks(mut self, tracks: impl IntoIterator<Item = Track>) -> Self {
        self.tracks.extend(tracks.into_iter().map(Arc::new));
        self
    }

    /// Derived duration: max item end, at least one frame.
    pub fn total_frames(&self) -> u64 {
        self.items().map(|(_, item)| item.end()).max().unwrap_or(0).max(1)
    }

    pub fn duration_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.total_frames())
    }

    /// Every item with its track index, in track then declaration order.
    pub fn items(&self) -> impl Iterator<Item = (usize, &Item)> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .flat_map(|(ti, t)| t.items.iter().map(move |item| (ti, item)))
    }

    pub fn locate(&self, id: &ItemId) -> Option<ItemLocation> {
        self.tracks.iter().enumerate().find_map(|(track_index, t)| {
            t.items
                .iter()
                .position(|item| &item.id == id)
                .map(|item_index| ItemLocation {
                    track_index,
                    item_index,
                })
        })
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        let loc = self.locate(id)?;
        self.tracks[loc.track_index].items.get(loc.item_index)
    }

    pub fn track_index(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    /// Check the invariants a loaded composition must satisfy.
    pub fn validate(&self) -> CutlineResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(CutlineError::validation("fps num/den must be > 0"));
        }

        let mut track_ids = HashSet::new();
        let mut item_ids = HashSet::new();
        for track in &self.tracks {
            if !track_ids.insert(&track.id) {
                return Err(CutlineError::validation(format!(
                    "duplicate track id \"{}\"",
                    track.id
                )));
            }
            for item in &track.items {
                if !item_ids.insert(&item.id) {
                    return Err(CutlineError::validation(format!(
                        "duplicate item id \"{}\"",
                        item.id
                    )));
                }
                item.check(self.fps).map_err(CutlineError::validation)?;
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> CutlineResult<Self> {
        let timeline: Self = serde_json::from_str(json)?;
        timeline.validate()?;
        Ok(timeline)
    }

    pub fn to_json_pretty(&self) -> CutlineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
