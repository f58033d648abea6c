use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::assets::color::Color;
use crate::assets::decode::RasterImage;
use crate::assets::loader::MediaLoader;
use crate::compile::plan::{RenderPlan, VisualLayer};
use crate::foundation::core::{Canvas, Point, Rect};
use crate::foundation::error::CutlineResult;
use crate::render::surface::{DrawState, DrawSurface, FrameRGBA, validate_surface_size};
use crate::timeline::model::{ItemId, ItemKind, TransitionKind};

/// Decoded video frames available to one composite.
pub trait FrameLookup {
    fn frame(&self, item: &ItemId) -> Option<Arc<RasterImage>>;
}

impl FrameLookup for HashMap<ItemId, Arc<RasterImage>> {
    fn frame(&self, item: &ItemId) -> Option<Arc<RasterImage>> {
        self.get(item).cloned()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompositorOpts {
    pub text_size_px: f32,
    /// Cleared to before each frame.
    pub background: Color,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            text_size_px: 48.0,
            background: Color::rgba(0, 0, 0, 0),
        }
    }
}

/// What one [`Compositor::render_frame`] call drew.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositeStats {
    pub drawn: usize,
    pub skipped: usize,
}

/// Draws render plans onto a [`DrawSurface`]. Holds still images, never audio.
pub struct Compositor<S: DrawSurface> {
    surface: S,
    opts: CompositorOpts,
    stills: HashMap<String, Arc<RasterImage>>,
}

impl<S: DrawSurface> Compositor<S> {
    pub fn new(surface: S, opts: CompositorOpts) -> CutlineResult<Self> {
        let (w, h) = surface.size();
        validate_surface_size(w, h)?;
        Ok(Self {
            surface,
            opts,
            stills: HashMap::new(),
        })
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    pub fn set_background(&mut self, background: Color) {
        self.opts.background = background;
    }

    pub fn update_size(&mut self, width: u32, height: u32) -> CutlineResult<()> {
        validate_surface_size(width, height)?;
        self.surface.resize(width, height)
    }

    pub fn insert_still(&mut self, source: impl Into<String>, image: RasterImage) {
        self.stills.insert(source.into(), Arc::new(image));
    }

    pub fn has_still(&self, source: &str) -> bool {
        self.stills.contains_key(source)
    }

    /// Drop stills whose source `keep` rejects.
    pub fn retain_stills(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.stills.retain(|source, _| keep(source));
    }

    /// Decode missing stills in parallel. Failures are logged and those sources stay absent.
    pub fn load_stills<'a>(
        &mut self,
        sources: impl IntoIterator<Item = &'a str>,
        loader: &dyn MediaLoader,
    ) -> usize {
        let mut wanted = sources
            .into_iter()
            .filter(|s| !self.stills.contains_key(*s))
            .collect::<Vec<_>>();
        wanted.sort_unstable();
        wanted.dedup();

        let loaded = wanted
            .par_iter()
            .map(|source| (*source, loader.load_still(source)))
            .collect::<Vec<_>>();

        let mut count = 0;
        for (source, result) in loaded {
            match result {
                Ok(image) => {
                    self.stills.insert(source.to_string(), Arc::new(image));
                    count += 1;
                }
                Err(err) => tracing::warn!(%source, %err, "failed to load still image"),
            }
        }
        count
    }

    /// Clear, draw every layer of `plan` back to front, then present.
    pub fn render_frame(
        &mut self,
        plan: &RenderPlan,
        frames: &dyn FrameLookup,
    ) -> CutlineResult<CompositeStats> {
        let (w, h) = self.surface.size();
        let canvas = Canvas::validated(w, h)?;
        let full = canvas.rect();
        let center = canvas.center();

        self.surface.clear(self.opts.background.to_rgba8_premul());

        let mut stats = CompositeStats::default();
        for layer in &plan.layers {
            let state = layer_state(layer, full, center);
            if self.draw_layer(layer, frames, full, center, &state)? {
                stats.drawn += 1;
            } else {
                stats.skipped += 1;
            }
        }

        self.surface.present()?;
        Ok(stats)
    }

    pub fn read_rgba8(&self) -> CutlineResult<FrameRGBA> {
        self.surface.read_rgba8()
    }

    fn draw_layer(
        &mut self,
        layer: &VisualLayer,
        frames: &dyn FrameLookup,
        full: Rect,
        center: Point,
        state: &DrawState,
    ) -> CutlineResult<bool> {
        let item = &layer.item;
        match &item.kind {
            ItemKind::Video(_) => {
                let Some(frame) = frames.frame(&item.id) else {
                    tracing::trace!(item = %item.id, "no decoded frame yet, skipping layer");
                    return Ok(false);
                };
                self.surface.draw_image(&frame, full, state)?;
            }
            ItemKind::Image { source } => {
                let Some(still) = self.stills.get(source) else {
                    tracing::debug!(item = %item.id, %source, "still not loaded, skipping layer");
                    return Ok(false);
                };
                self.surface.draw_image(still, full, state)?;
            }
            ItemKind::Text { text, color } => {
                self.surface
                    .draw_text(text, *color, self.opts.text_size_px, center, state)?;
            }
            ItemKind::Solid { color } => {
                self.surface.fill_rect(full, *color, state);
            }
            ItemKind::Audio(_) => return Ok(false),
        }
        Ok(true)
    }
}

fn layer_state(layer: &VisualLayer, full: Rect, center: Point) -> DrawState {
    let mut state = DrawState {
        transform: layer.transform.about(center),
        opacity: layer.opacity.clamp(0.0, 1.0),
        clip: None,
    };
    if let Some(tr) = &layer.transition {
        let remaining = (1.0 - tr.progress).clamp(0.0, 1.0);
        match tr.kind {
            TransitionKind::Crossfade => state.opacity *= remaining as f32,
            TransitionKind::Wipe => {
                state.clip = Some(Rect::new(0.0, 0.0, full.width() * remaining, full.height()));
            }
        }
    }
    state
}

impl<S: DrawSurface + std::fmt::Debug> std::fmt::Debug for Compositor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("surface", &self.surface)
            .field("opts", &self.opts)
            .field("stills", &self.stills.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
