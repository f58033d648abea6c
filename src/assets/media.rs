use std::path::{Path, PathBuf};

use crate::audio::buffer::AudioBuffer;
use crate::foundation::error::{CutlineError, CutlineResult};

/// Internal audio mixing sample rate used across load/mix/encode.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

/// Basic metadata about a time-based source file.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    /// Absolute source path used for probing/decoding.
    pub source_path: PathBuf,
    pub duration_s: f64,
    /// 0 when the source has no video stream.
    pub width: u32,
    pub height: u32,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// Probe source metadata through `ffprobe`.
#[cfg(feature = "media-ffmpeg")]
pub fn probe_media(source_path: &Path) -> CutlineResult<MediaInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| CutlineError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(CutlineError::decode(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| CutlineError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));
    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));
    if video.is_none() && audio.is_none() {
        return Err(CutlineError::decode(format!(
            "no audio or video stream in '{}'",
            source_path.display()
        )));
    }

    let duration_s = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(MediaInfo {
        source_path: source_path.to_path_buf(),
        duration_s,
        width: video.and_then(|v| v.width).unwrap_or(0),
        height: video.and_then(|v| v.height).unwrap_or(0),
        video_codec: video.map(|v| v.codec_name.clone().unwrap_or_else(|| "unknown".into())),
        audio_codec: audio.map(|a| a.codec_name.clone().unwrap_or_else(|| "unknown".into())),
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Probe source metadata through `ffprobe`.
///
/// Returns an error when the `media-ffmpeg` feature is disabled.
pub fn probe_media(_source_path: &Path) -> CutlineResult<MediaInfo> {
    Err(CutlineError::decode(
        "video/audio sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
/// Decode a single straight-alpha RGBA frame at `source_time_sec`.
pub fn decode_video_frame_rgba8(info: &MediaInfo, source_time_sec: f64) -> CutlineResult<Vec<u8>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{:.9}", source_time_sec.max(0.0))])
        .arg("-i")
        .arg(&info.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| CutlineError::decode(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(CutlineError::decode(format!(
            "ffmpeg video decode failed for '{}': {}",
            info.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = info.width as usize * info.height as usize * 4;
    if expected_len == 0 {
        return Err(CutlineError::decode(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if out.stdout.len() < expected_len {
        return Err(CutlineError::decode(format!(
            "ffmpeg returned {} bytes for '{}' at {source_time_sec:.3}s, expected {expected_len}",
            out.stdout.len(),
            info.source_path.display()
        )));
    }
    let mut bytes = out.stdout;
    bytes.truncate(expected_len);
    Ok(bytes)
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Decode a single straight-alpha RGBA frame at `source_time_sec`.
///
/// Returns an error when the `media-ffmpeg` feature is disabled.
pub fn decode_video_frame_rgba8(
    _info: &MediaInfo,
    _source_time_sec: f64,
) -> CutlineResult<Vec<u8>> {
    Err(CutlineError::decode(
        "video/audio sources require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
/// Decode audio from a media source to stereo interleaved `f32` PCM.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> CutlineResult<AudioBuffer> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            "2",
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| CutlineError::decode(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        let msg = String::from_utf8_lossy(&out.stderr);
        // ffmpeg reports a missing audio stream as an error; treat it as silence.
        if msg.contains("Stream specifier")
            || msg.contains("matches no streams")
            || msg.contains("Output file #0 does not contain any stream")
            || msg.contains("does not contain any stream")
        {
            return AudioBuffer::new(sample_rate, 2, Vec::new());
        }
        return Err(CutlineError::decode(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            msg.trim()
        )));
    }

    if !out.stdout.len().is_multiple_of(4) {
        return Err(CutlineError::decode(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    let pcm = out
        .stdout
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    AudioBuffer::new(sample_rate, 2, pcm)
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Decode audio from a media source to stereo interleaved `f32` PCM.
///
/// Returns an error when the `media-ffmpeg` feature is disabled.
pub fn decode_audio_f32_stereo(_path: &Path, _sample_rate: u32) -> CutlineResult<AudioBuffer> {
    Err(CutlineError::decode(
        "video/audio sources require the 'media-ffmpeg' feature",
    ))
}

// No unit tests here: these functions shell out to `ffprobe`/`ffmpeg` and are covered by
// integration tests that return early when the tools are unavailable.
