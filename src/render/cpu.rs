use std::sync::Arc;

use crate::assets::color::Color;
use crate::assets::decode::RasterImage;
use crate::assets::text::{TextBrushRgba8, TextLayoutEngine};
use crate::foundation::core::{Affine, Point, Rect, Rgba8Premul};
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::render::surface::{DrawState, DrawSurface, FrameRGBA, validate_surface_size};

/// Raster surface backed by `vello_cpu`.
pub struct CpuSurface {
    width: u16,
    height: u16,
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    clear_rgba: [u8; 4],
    text: Option<CpuText>,
    warned_no_font: bool,
}

struct CpuText {
    engine: TextLayoutEngine,
    font: vello_cpu::peniko::FontData,
}

impl CpuSurface {
    pub fn new(width: u32, height: u32) -> CutlineResult<Self> {
        let (w, h) = validate_surface_size(width, height)?;
        Ok(Self {
            width: w,
            height: h,
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
            clear_rgba: [0, 0, 0, 0],
            text: None,
            warned_no_font: false,
        })
    }

    /// Use `font_bytes` (TTF/OTF) for every text draw.
    pub fn with_font(mut self, font_bytes: &[u8]) -> CutlineResult<Self> {
        let engine = TextLayoutEngine::with_font(font_bytes)?;
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.to_vec()),
            0,
        );
        self.text = Some(CpuText { engine, font });
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.text.is_some()
    }

    fn begin_layer(&mut self, state: &DrawState) -> usize {
        let mut pushed = 0;
        if let Some(clip) = state.clip {
            self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            let path = vello_cpu::kurbo::Shape::to_path(&rect_to_cpu(clip), 0.1);
            self.ctx.push_clip_layer(&path);
            pushed += 1;
        }
        if state.opacity < 1.0 {
            self.ctx.push_opacity_layer(state.opacity.max(0.0));
            pushed += 1;
        }
        pushed
    }

    fn end_layer(&mut self, pushed: usize) {
        for _ in 0..pushed {
            self.ctx.pop_layer();
        }
    }
}

impl DrawSurface for CpuSurface {
    fn size(&self) -> (u32, u32) {
        (u32::from(self.width), u32::from(self.height))
    }

    fn resize(&mut self, width: u32, height: u32) -> CutlineResult<()> {
        let (w, h) = validate_surface_size(width, height)?;
        if (w, h) != (self.width, self.height) {
            self.width = w;
            self.height = h;
            self.ctx = vello_cpu::RenderContext::new(w, h);
            self.pixmap = vello_cpu::Pixmap::new(w, h);
        }
        Ok(())
    }

    fn clear(&mut self, color: Rgba8Premul) {
        self.ctx.reset();
        self.clear_rgba = color.to_array();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, state: &DrawState) {
        if state.opacity <= 0.0 {
            return;
        }
        let pushed = self.begin_layer(state);
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(state.transform));
        self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            color.r, color.g, color.b, color.a,
        ));
        self.ctx.fill_rect(&rect_to_cpu(rect));
        self.end_layer(pushed);
    }

    fn draw_image(
        &mut self,
        image: &RasterImage,
        dst: Rect,
        state: &DrawState,
    ) -> CutlineResult<()> {
        if state.opacity <= 0.0 || dst.is_zero_area() {
            return Ok(());
        }
        let pixmap = pixmap_from_premul_bytes(&image.rgba8_premul, image.width, image.height)?;
        let (w, h) = (f64::from(image.width), f64::from(image.height));
        let placement = Affine::translate(dst.origin().to_vec2())
            * Affine::scale_non_uniform(dst.width() / w, dst.height() / h);

        let pushed = self.begin_layer(state);
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(state.transform * placement));
        self.ctx.set_paint(vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        });
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
        self.end_layer(pushed);
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        color: Color,
        size_px: f32,
        center: Point,
        state: &DrawState,
    ) -> CutlineResult<()> {
        if text.is_empty() || state.opacity <= 0.0 {
            return Ok(());
        }
        let Some(cpu_text) = self.text.as_mut() else {
            if !self.warned_no_font {
                tracing::warn!("cpu surface has no font configured, skipping text");
                self.warned_no_font = true;
            }
            return Ok(());
        };

        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let layout = cpu_text.engine.layout_plain(text, size_px, brush)?;
        let font = cpu_text.font.clone();
        let origin = Affine::translate((
            center.x - f64::from(layout.width()) / 2.0,
            center.y - f64::from(layout.height()) / 2.0,
        ));

        let pushed = self.begin_layer(state);
        self.ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx.set_transform(affine_to_cpu(state.transform * origin));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                self.ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        self.end_layer(pushed);
        Ok(())
    }

    fn present(&mut self) -> CutlineResult<()> {
        clear_pixmap(&mut self.pixmap, self.clear_rgba);
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut self.pixmap);
        Ok(())
    }

    fn read_rgba8(&self) -> CutlineResult<FrameRGBA> {
        Ok(FrameRGBA {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

impl std::fmt::Debug for CpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_font", &self.text.is_some())
            .finish()
    }
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn pixmap_from_premul_bytes(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> CutlineResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| CutlineError::decode("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| CutlineError::decode("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(CutlineError::internal("raster image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
