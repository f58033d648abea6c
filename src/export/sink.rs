use std::fmt;
use std::str::FromStr;

use crate::foundation::core::Fps;
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::render::surface::FrameRGBA;

/// Video codec family selected by a codec id string (`avc1.42E01E`, `vp09.00.10.08`, `raw`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Vp9,
    Raw,
}

impl FromStr for VideoCodec {
    type Err = CutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        if id.starts_with("avc1") || id == "h264" {
            Ok(Self::H264)
        } else if id.starts_with("vp09") || id == "vp9" || id == "vp8" {
            Ok(Self::Vp9)
        } else if id == "raw" || id == "rgba" {
            Ok(Self::Raw)
        } else {
            Err(CutlineError::config(format!("unsupported video codec \"{s}\"")))
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::H264 => "h264",
            Self::Vp9 => "vp9",
            Self::Raw => "raw",
        })
    }
}

/// Audio codec family selected by a codec id string (`mp4a.40.2`, `opus`, `pcm`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioCodec {
    Aac,
    Opus,
    Pcm,
}

impl FromStr for AudioCodec {
    type Err = CutlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4a.40.2" | "aac" => Ok(Self::Aac),
            "opus" => Ok(Self::Opus),
            "pcm" | "pcm-f32" | "f32le" => Ok(Self::Pcm),
            _ => Err(CutlineError::config(format!("unsupported audio codec \"{s}\""))),
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Pcm => "pcm",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoEncoderConfig {
    pub codec: VideoCodec,
    /// Codec id as requested, e.g. `avc1.42E01E`.
    pub codec_id: String,
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub bitrate: u64,
    pub keyframe_interval: u64,
}

impl VideoEncoderConfig {
    pub fn validate(&self) -> CutlineResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CutlineError::config("video encoder width/height must be non-zero"));
        }
        if self.keyframe_interval == 0 {
            return Err(CutlineError::config("keyframe interval must be non-zero"));
        }
        if self.bitrate == 0 {
            return Err(CutlineError::config("video bitrate must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioEncoderConfig {
    pub codec: AudioCodec,
    pub codec_id: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: u64,
}

impl AudioEncoderConfig {
    pub fn validate(&self) -> CutlineResult<()> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(CutlineError::config(
                "audio encoder sample rate and channel count must be non-zero",
            ));
        }
        Ok(())
    }
}

/// One encoded access unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChunk {
    pub timestamp_us: u64,
    pub duration_us: u64,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

/// Interleaved samples starting at `timestamp_us`.
#[derive(Clone, Copy, Debug)]
pub struct AudioSlice<'a> {
    pub timestamp_us: u64,
    pub samples: &'a [f32],
}

#[derive(Clone, Debug, PartialEq)]
pub struct VideoStream {
    pub config: VideoEncoderConfig,
    pub chunks: Vec<EncodedChunk>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioStream {
    pub config: AudioEncoderConfig,
    pub chunks: Vec<EncodedChunk>,
}

/// Video encoder boundary. Frames arrive in increasing timestamp order.
pub trait VideoEncodeSink {
    /// Refusing a configuration is fatal to the export.
    fn configure(&mut self, config: &VideoEncoderConfig) -> CutlineResult<()>;

    fn encode(
        &mut self,
        frame: &FrameRGBA,
        timestamp_us: u64,
        keyframe: bool,
    ) -> CutlineResult<()>;

    /// Finish pending work and hand over everything encoded since `configure`.
    fn flush(&mut self) -> CutlineResult<VideoStream>;

    /// Release encoder resources. Safe to call more than once.
    fn close(&mut self);
}

/// Audio encoder boundary, mirroring [`VideoEncodeSink`].
pub trait AudioEncodeSink {
    fn configure(&mut self, config: &AudioEncoderConfig) -> CutlineResult<()>;

    fn encode(&mut self, slice: &AudioSlice<'_>) -> CutlineResult<()>;

    fn flush(&mut self) -> CutlineResult<AudioStream>;

    fn close(&mut self);
}

/// Combines encoded streams into one container.
pub trait MuxSink {
    fn mux(&mut self, video: &VideoStream, audio: Option<&AudioStream>) -> CutlineResult<Vec<u8>>;
}

#[cfg(test)]
#[path = "../../tests/unit/export/sink.rs"]
mod tests;
