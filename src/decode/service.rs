use std::time::Duration;

use crate::assets::decode::RasterImage;
use crate::foundation::error::{CutlineError, CutlineResult};

/// Codec configuration a decoder was initialized with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Codec id, e.g. `h264` or `avc1.42E01E`.
    pub codec: String,
    pub coded_width: u32,
    pub coded_height: u32,
}

impl DecoderConfig {
    pub fn new(codec: impl Into<String>, coded_width: u32, coded_height: u32) -> Self {
        Self {
            codec: codec.into(),
            coded_width,
            coded_height,
        }
    }

    /// Missing codec or zero coded size is a configuration error.
    pub fn validate(&self) -> CutlineResult<()> {
        if self.codec.trim().is_empty() {
            return Err(CutlineError::config("decoder codec must be non-empty"));
        }
        if self.coded_width == 0 || self.coded_height == 0 {
            return Err(CutlineError::config(format!(
                "decoder coded size must be non-zero, got {}x{}",
                self.coded_width, self.coded_height
            )));
        }
        Ok(())
    }
}

/// One frame to decode, addressed by playback timestamp and source time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeRequest {
    /// Cache key timestamp.
    pub timestamp_ms: u64,
    /// Position inside the source, in seconds.
    pub source_time_s: f64,
}

impl DecodeRequest {
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_ms.saturating_mul(1000)
    }
}

/// Completion emitted by a decoder, tagged with the request timestamp.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodeEvent {
    Frame {
        timestamp_us: u64,
        image: RasterImage,
    },
    Failed {
        timestamp_us: u64,
        message: String,
    },
    /// Dropped without decoding because a newer request superseded it.
    Skipped { timestamp_us: u64 },
}

impl DecodeEvent {
    pub fn timestamp_us(&self) -> u64 {
        match self {
            Self::Frame { timestamp_us, .. }
            | Self::Failed { timestamp_us, .. }
            | Self::Skipped { timestamp_us } => *timestamp_us,
        }
    }
}

/// Decode service boundary.
///
/// Timing is unreliable: `decode` only enqueues, and results surface later through `poll` (or
/// `wait` when the caller can block).
pub trait FrameDecoder: Send {
    fn config(&self) -> &DecoderConfig;

    /// Enqueue a request. Errors mean the request was not accepted.
    fn decode(&mut self, request: DecodeRequest) -> CutlineResult<()>;

    /// Drain completions without blocking.
    fn poll(&mut self) -> Vec<DecodeEvent>;

    /// Block up to `timeout` for the next completion.
    fn wait(&mut self, timeout: Duration) -> Option<DecodeEvent>;

    /// Release the decoder. Further requests fail; must be idempotent.
    fn close(&mut self);
}
