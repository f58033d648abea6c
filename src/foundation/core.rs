use crate::foundation::error::{CutlineError, CutlineResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Half-open frame range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    pub start: u64,
    pub end: u64, // exclusive
}

impl FrameRange {
    pub fn new(start: u64, end: u64) -> CutlineResult<Self> {
        if start > end {
            return Err(CutlineError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Range starting at `start` and spanning `len` frames.
    pub fn with_len(start: u64, len: u64) -> Self {
        Self {
            start,
            end: start.saturating_add(len),
        }
    }

    pub fn len_frames(self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    pub fn contains(self, f: u64) -> bool {
        self.start <= f && f < self.end
    }

    /// Strictly inside: `start < f < end`. Used for cut points.
    pub fn contains_interior(self, f: u64) -> bool {
        self.start < f && f < self.end
    }
}

/// Rational frames-per-second rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> CutlineResult<Self> {
        if den == 0 {
            return Err(CutlineError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(CutlineError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Integer rate (`den == 1`).
    pub fn whole(num: u32) -> CutlineResult<Self> {
        Self::new(num, 1)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Frame interval in whole microseconds (floored), e.g. 33333 at 30 fps.
    pub fn frame_duration_us(self) -> u64 {
        (1_000_000u64 * u64::from(self.den)) / u64::from(self.num)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        let raw = secs * self.as_f64();
        snap_integral(raw).unwrap_or_else(|| raw.floor()).max(0.0) as u64
    }

    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        let raw = secs * self.as_f64();
        snap_integral(raw).unwrap_or_else(|| raw.ceil()).max(0.0) as u64
    }
}

/// Values within float noise of an integer count as that integer.
fn snap_integral(raw: f64) -> Option<f64> {
    let snapped = raw.round();
    ((raw - snapped).abs() < 1e-9).then_some(snapped)
}

/// Pixel dimensions of a drawing surface or export target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Reject zero-sized targets. A zero-sized surface is a configuration error.
    pub fn validated(width: u32, height: u32) -> CutlineResult<Self> {
        if width == 0 || height == 0 {
            return Err(CutlineError::config(format!(
                "surface must be non-zero, got {width}x{height}"
            )));
        }
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(CutlineError::config(format!(
                "surface {width}x{height} exceeds the 65535px raster limit"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn center(self) -> Point {
        Point::new(f64::from(self.width) * 0.5, f64::from(self.height) * 0.5)
    }

    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8Premul {
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Layer transform applied about the surface center.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform2D {
    pub translate: Vec2,
    pub rotation_rad: f64,
    pub scale: Vec2, // default (1,1)
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            translate: Vec2::ZERO,
            rotation_rad: 0.0,
            scale: Vec2::new(1.0, 1.0),
        }
    }
}

impl Transform2D {
    pub fn is_identity(self) -> bool {
        self == Self::default()
    }

    /// Affine that pivots about `center`.
    pub fn about(self, center: Point) -> Affine {
        let c = center.to_vec2();
        let t_center = Affine::translate(c);
        let t_rotate = Affine::rotate(self.rotation_rad);
        let t_scale = Affine::scale_non_uniform(self.scale.x, self.scale.y);
        let t_back = Affine::translate(-c + self.translate);

        // Canonical order:
        // T(center) * S(scale) * R(rot) * T(-center + translate)
        t_center * t_scale * t_rotate * t_back
    }
}
