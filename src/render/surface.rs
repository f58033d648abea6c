use crate::assets::color::Color;
use crate::assets::decode::RasterImage;
use crate::foundation::core::{Affine, Canvas, Point, Rect, Rgba8Premul};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Read-back surface pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// State shared by every draw call of one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    pub transform: Affine,
    /// In `[0, 1]`.
    pub opacity: f32,
    /// Clip in surface coordinates, applied before `transform`.
    pub clip: Option<Rect>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            opacity: 1.0,
            clip: None,
        }
    }
}

/// Fixed-size 2D raster target.
///
/// Draw calls between [`DrawSurface::clear`] and [`DrawSurface::present`] build one frame;
/// [`DrawSurface::read_rgba8`] sees the last presented frame.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32) -> CutlineResult<()>;

    fn clear(&mut self, color: Rgba8Premul);

    fn fill_rect(&mut self, rect: Rect, color: Color, state: &DrawState);

    /// Draw `image` stretched into `dst`.
    fn draw_image(
        &mut self,
        image: &RasterImage,
        dst: Rect,
        state: &DrawState,
    ) -> CutlineResult<()>;

    /// Draw one paragraph of text centered on `center`.
    fn draw_text(
        &mut self,
        text: &str,
        color: Color,
        size_px: f32,
        center: Point,
        state: &DrawState,
    ) -> CutlineResult<()>;

    fn present(&mut self) -> CutlineResult<()>;

    fn read_rgba8(&self) -> CutlineResult<FrameRGBA>;
}

/// Raster dimensions of a surface; zero or oversized targets are configuration errors.
pub(crate) fn validate_surface_size(width: u32, height: u32) -> CutlineResult<(u16, u16)> {
    let canvas = Canvas::validated(width, height)?;
    let w = u16::try_from(canvas.width)
        .map_err(|_| CutlineError::internal("validated canvas width exceeds u16"))?;
    let h = u16::try_from(canvas.height)
        .map_err(|_| CutlineError::internal("validated canvas height exceeds u16"))?;
    Ok((w, h))
}

/// One recorded draw call.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba8Premul),
    FillRect {
        rect: Rect,
        color: Color,
        state: DrawState,
    },
    Image {
        width: u32,
        height: u32,
        dst: Rect,
        state: DrawState,
    },
    Text {
        text: String,
        color: Color,
        size_px: f32,
        center: Point,
        state: DrawState,
    },
    Present,
}

/// Surface that records draw calls instead of rasterizing.
#[derive(Clone, Debug)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    frames_presented: u64,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> CutlineResult<Self> {
        validate_surface_size(width, height)?;
        Ok(Self {
            width,
            height,
            commands: Vec::new(),
            frames_presented: 0,
        })
    }

    /// Commands since the last clear.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) -> CutlineResult<()> {
        validate_surface_size(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn clear(&mut self, color: Rgba8Premul) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, state: &DrawState) {
        self.commands.push(DrawCommand::FillRect {
            rect,
            color,
            state: *state,
        });
    }

    fn draw_image(
        &mut self,
        image: &RasterImage,
        dst: Rect,
        state: &DrawState,
    ) -> CutlineResult<()> {
        self.commands.push(DrawCommand::Image {
            width: image.width,
            height: image.height,
            dst,
            state: *state,
        });
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
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            color,
            size_px,
            center,
            state: *state,
        });
        Ok(())
    }

    fn present(&mut self) -> CutlineResult<()> {
        self.commands.push(DrawCommand::Present);
        self.frames_presented += 1;
        Ok(())
    }

    /// Transparent pixels of the current size; recording never rasterizes.
    fn read_rgba8(&self) -> CutlineResult<FrameRGBA> {
        Ok(FrameRGBA {
            width: self.width,
            height: self.height,
            data: vec![0; self.width as usize * self.height as usize * 4],
            premultiplied: true,
        })
    }
}
