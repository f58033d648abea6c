use serde::Serialize;

use crate::foundation::core::{Fps, Transform2D};
use crate::timeline::model::{Item, ItemId, Timeline, Track, TransitionKind};

/// Everything active at one frame. Recomputed every frame, never stored.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RenderPlan {
    pub frame: u64,
    pub fps: Fps,
    /// Paint order: back to front. Track 0 layers come last.
    pub layers: Vec<VisualLayer>,
    /// Track order, then declaration order.
    pub regions: Vec<AudioRegion>,
}

impl RenderPlan {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.regions.is_empty()
    }

    /// Layers referencing video items, which need decoded frames.
    pub fn video_layers(&self) -> impl Iterator<Item = &VisualLayer> + '_ {
        self.layers.iter().filter(|l| l.item.media().is_some())
    }

    pub fn region(&self, id: &ItemId) -> Option<&AudioRegion> {
        self.regions.iter().find(|r| &r.item.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisualLayer {
    pub item: Item,
    pub track_index: usize,
    pub opacity: f32,
    pub transform: Transform2D,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<LayerTransition>,
}

/// Active outgoing transition of a layer into `partner`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerTransition {
    pub kind: TransitionKind,
    pub partner: ItemId,
    /// In `[0, 1]`.
    pub progress: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioRegion {
    pub item: Item,
    pub track_index: usize,
    pub gain: f64,
    /// Seconds since the item started.
    pub region_time_s: f64,
    pub region_duration_s: f64,
    /// `trim_start_s + region_time_s`.
    pub source_offset_s: f64,
}

impl AudioRegion {
    /// Seconds left until the item ends.
    pub fn remaining_s(&self, fps: Fps) -> f64 {
        (fps.frames_to_secs(self.item.duration) - self.region_time_s).max(0.0)
    }
}

/// Project `timeline` at `frame`. Pure: same inputs, same plan.
#[tracing::instrument(level = "trace", skip(timeline), fields(tracks = timeline.tracks.len()))]
pub fn compute_render_plan(timeline: &Timeline, frame: u64) -> RenderPlan {
    let fps = timeline.fps;

    let mut layers = Vec::new();
    for (track_index, track) in timeline.tracks.iter().enumerate().rev() {
        // Transitioning layers paint over their incoming partner.
        let mut blending = Vec::new();
        for item in &track.items {
            if !item.is_visual() || !item.range().contains(frame) {
                continue;
            }
            let layer = VisualLayer {
                item: item.clone(),
                track_index,
                opacity: 1.0,
                transform: Transform2D::default(),
                transition: resolve_transition(track, item, frame),
            };
            if layer.transition.is_some() {
                blending.push(layer);
            } else {
                layers.push(layer);
            }
        }
        layers.extend(blending);
    }

    let mut regions = Vec::new();
    for (track_index, track) in timeline.tracks.iter().enumerate() {
        let gain = track.gain();
        for item in &track.items {
            let Some(clip) = item.media() else {
                continue;
            };
            if !item.range().contains(frame) {
                continue;
            }
            let region_time_s = fps.frames_to_secs(frame - item.start);
            regions.push(AudioRegion {
                item: item.clone(),
                track_index,
                gain,
                region_time_s,
                region_duration_s: fps.frame_duration_secs(),
                source_offset_s: clip.trim_start_s + region_time_s,
            });
        }
    }

    RenderPlan {
        frame,
        fps,
        layers,
        regions,
    }
}

fn resolve_transition(track: &Track, item: &Item, frame: u64) -> Option<LayerTransition> {
    let spec = item.transition_out?;
    if spec.duration_frames == 0 {
        return None;
    }

    let end = item.end();
    let partner = track
        .items
        .iter()
        .filter(|other| {
            other.id != item.id && other.is_visual() && other.start > item.start && other.start < end
        })
        .min_by_key(|other| other.start)?;

    let window_start = partner.start.max(end.saturating_sub(spec.duration_frames));
    if !(window_start <= frame && frame < end) {
        return None;
    }

    let denom = (end - window_start).saturating_sub(1);
    let progress = if denom == 0 {
        1.0
    } else {
        ((frame - window_start) as f64) / (denom as f64)
    };

    Some(LayerTransition {
        kind: spec.kind,
        partner: partner.id.clone(),
        progress: progress.clamp(0.0, 1.0),
    })
}

impl Timeline {
    /// Shorthand for [`compute_render_plan`].
    pub fn render_plan(&self, frame: u64) -> RenderPlan {
        compute_render_plan(self, frame)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/plan.rs"]
mod tests;
