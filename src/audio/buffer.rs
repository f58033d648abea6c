use crate::foundation::error::{CutlineError, CutlineResult};

/// Decoded interleaved `f32` PCM, loaded once per source and shared by `Arc`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples.
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> CutlineResult<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(CutlineError::decode(
                "audio buffer needs a non-zero sample rate and channel count",
            ));
        }
        if !samples.len().is_multiple_of(usize::from(channels)) {
            return Err(CutlineError::decode(format!(
                "audio buffer of {} samples is not aligned to {channels} channels",
                samples.len()
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// Constant-valued buffer; handy for tones in tests and for silence.
    pub fn constant(sample_rate: u32, channels: u16, secs: f64, value: f32) -> CutlineResult<Self> {
        let frames = (secs.max(0.0) * f64::from(sample_rate)).round() as usize;
        Self::new(
            sample_rate,
            channels,
            vec![value; frames * usize::from(channels)],
        )
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_s(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Linearly interpolated sample of `channel` at source time `t_s`; 0 outside the buffer.
    ///
    /// Channels past the buffer's count reuse its last channel, so mono sources play on both
    /// sides of a stereo output.
    pub fn sample_at(&self, channel: u16, t_s: f64) -> f32 {
        let frames = self.frames();
        let pos = t_s * f64::from(self.sample_rate);
        if frames == 0 || !pos.is_finite() || pos < 0.0 {
            return 0.0;
        }
        let f0 = pos.floor() as usize;
        if f0 >= frames {
            return 0.0;
        }
        let f1 = (f0 + 1).min(frames - 1);
        let frac = (pos - f0 as f64) as f32;

        let ch = usize::from(channel.min(self.channels - 1));
        let stride = usize::from(self.channels);
        let v0 = self.samples[f0 * stride + ch];
        let v1 = self.samples[f1 * stride + ch];
        v0 + (v1 - v0) * frac
    }
}
