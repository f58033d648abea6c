use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assets::decode::{RasterImage, decode_image};
use crate::assets::media::{MediaInfo, decode_audio_f32_stereo, probe_media};
use crate::audio::buffer::AudioBuffer;
use crate::decode::ffmpeg::FfmpegFrameDecoder;
use crate::decode::manual::{FrameFn, GeneratedDecoder};
use crate::decode::service::{DecoderConfig, FrameDecoder};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Media loading service, constructed by the host and passed to whoever needs it.
///
/// Implementations must be shareable across threads: audio loads run in the background.
pub trait MediaLoader: Send + Sync {
    fn probe(&self, source: &str) -> CutlineResult<MediaInfo>;

    /// Decode a still image.
    fn load_still(&self, source: &str) -> CutlineResult<RasterImage>;

    /// Open a decoder for a video source. Invalid codec configuration is a config error.
    fn open_video(&self, source: &str) -> CutlineResult<Box<dyn FrameDecoder>>;

    /// Decode a source's audio track, resampled to `sample_rate`.
    fn load_audio(&self, source: &str, sample_rate: u32) -> CutlineResult<Arc<AudioBuffer>>;
}

/// Normalize and validate timeline-relative source paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub(crate) fn normalize_rel_path(source: &str) -> CutlineResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(CutlineError::validation("media paths must be relative"));
    }
    if s.is_empty() {
        return Err(CutlineError::validation("media path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(CutlineError::validation("media paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(CutlineError::validation("media path must contain a file name"));
    }

    Ok(out.join("/"))
}

/// Loads media from files under a root directory (stills via `image`, video/audio via ffmpeg).
#[derive(Clone, Debug)]
pub struct FsMediaLoader {
    root: PathBuf,
}

impl FsMediaLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, source: &str) -> CutlineResult<PathBuf> {
        let norm = normalize_rel_path(source)?;
        Ok(self.root.join(Path::new(&norm)))
    }
}

impl MediaLoader for FsMediaLoader {
    fn probe(&self, source: &str) -> CutlineResult<MediaInfo> {
        probe_media(&self.resolve(source)?)
    }

    fn load_still(&self, source: &str) -> CutlineResult<RasterImage> {
        let path = self.resolve(source)?;
        let bytes = std::fs::read(&path).map_err(|e| {
            CutlineError::decode(format!("failed to read image '{}': {e}", path.display()))
        })?;
        decode_image(&bytes)
    }

    fn open_video(&self, source: &str) -> CutlineResult<Box<dyn FrameDecoder>> {
        let info = self.probe(source)?;
        Ok(Box::new(FfmpegFrameDecoder::spawn(info)?))
    }

    fn load_audio(&self, source: &str, sample_rate: u32) -> CutlineResult<Arc<AudioBuffer>> {
        let path = self.resolve(source)?;
        Ok(Arc::new(decode_audio_f32_stereo(&path, sample_rate)?))
    }
}

#[derive(Clone)]
struct SyntheticVideo {
    width: u32,
    height: u32,
    duration_s: f64,
    frame_fn: FrameFn,
}

/// In-memory registry of media, for tests and hosts that already hold decoded media.
#[derive(Clone, Default)]
pub struct MemoryMediaLoader {
    stills: HashMap<String, RasterImage>,
    audio: HashMap<String, Arc<AudioBuffer>>,
    videos: HashMap<String, SyntheticVideo>,
}

impl MemoryMediaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_still(mut self, source: impl Into<String>, image: RasterImage) -> Self {
        self.stills.insert(source.into(), image);
        self
    }

    pub fn with_audio(mut self, source: impl Into<String>, buffer: AudioBuffer) -> Self {
        self.audio.insert(source.into(), Arc::new(buffer));
        self
    }

    /// Register a video whose frames come from `frame_fn(source_time_s)`.
    pub fn with_video(
        mut self,
        source: impl Into<String>,
        width: u32,
        height: u32,
        duration_s: f64,
        frame_fn: FrameFn,
    ) -> Self {
        self.videos.insert(
            source.into(),
            SyntheticVideo {
                width,
                height,
                duration_s,
                frame_fn,
            },
        );
        self
    }

    fn missing(kind: &str, source: &str) -> CutlineError {
        CutlineError::decode(format!("no {kind} registered for source \"{source}\""))
    }
}

impl std::fmt::Debug for MemoryMediaLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMediaLoader")
            .field("stills", &self.stills.len())
            .field("audio", &self.audio.len())
            .field("videos", &self.videos.len())
            .finish()
    }
}

impl MediaLoader for MemoryMediaLoader {
    fn probe(&self, source: &str) -> CutlineResult<MediaInfo> {
        let video = self.videos.get(source);
        let audio = self.audio.get(source);
        if video.is_none() && audio.is_none() {
            return Err(Self::missing("media", source));
        }
        Ok(MediaInfo {
            source_path: PathBuf::from(source),
            duration_s: video
                .map(|v| v.duration_s)
                .or_else(|| audio.map(|a| a.duration_s()))
                .unwrap_or(0.0),
            width: video.map(|v| v.width).unwrap_or(0),
            height: video.map(|v| v.height).unwrap_or(0),
            video_codec: video.map(|_| "synthetic".to_string()),
            audio_codec: audio.map(|_| "pcm_f32le".to_string()),
        })
    }

    fn load_still(&self, source: &str) -> CutlineResult<RasterImage> {
        self.stills
            .get(source)
            .cloned()
            .ok_or_else(|| Self::missing("still", source))
    }

    fn open_video(&self, source: &str) -> CutlineResult<Box<dyn FrameDecoder>> {
        let video = self
            .videos
            .get(source)
            .ok_or_else(|| Self::missing("video", source))?;
        let config = DecoderConfig::new("synthetic", video.width, video.height);
        config.validate()?;
        Ok(Box::new(GeneratedDecoder::new(
            config,
            Arc::clone(&video.frame_fn),
        )))
    }

    fn load_audio(&self, source: &str, _sample_rate: u32) -> CutlineResult<Arc<AudioBuffer>> {
        self.audio
            .get(source)
            .cloned()
            .ok_or_else(|| Self::missing("audio", source))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
