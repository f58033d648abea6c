use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::export::sink::{AudioCodec, AudioStream, MuxSink, VideoCodec, VideoStream};
use crate::foundation::error::{CutlineError, CutlineResult};

/// Final encode + mux into MP4 through the system `ffmpeg` binary.
///
/// Expects staged streams from [`crate::export::raw::RawVideoEncoder`] (opaque RGBA8) and
/// [`crate::export::raw::PcmAudioEncoder`] (`f32le`). The codec ids carried by the stream configs
/// select the output codecs.
#[derive(Clone, Debug, Default)]
pub struct FfmpegMuxer {
    /// Directory for the staged audio and output files. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    fn scratch_path(&self, stem: &str, ext: &str) -> PathBuf {
        let dir = self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir);
        dir.join(format!(
            "cutline_{stem}_{}_{}.{ext}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ))
    }
}

impl MuxSink for FfmpegMuxer {
    fn mux(&mut self, video: &VideoStream, audio: Option<&AudioStream>) -> CutlineResult<Vec<u8>> {
        let cfg = &video.config;
        let vcodec = match cfg.codec {
            VideoCodec::H264 => "libx264",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Raw => {
                return Err(CutlineError::config(
                    "ffmpeg muxer needs a compressed video codec, got \"raw\"",
                ));
            }
        };
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(CutlineError::config(
                "ffmpeg output width/height must be even (required for yuv420p)",
            ));
        }
        let frame_len = cfg.width as usize * cfg.height as usize * 4;
        if let Some(bad) = video.chunks.iter().find(|c| c.data.len() != frame_len) {
            return Err(CutlineError::encode(format!(
                "staged frame at {}us has {} bytes, expected {frame_len}",
                bad.timestamp_us,
                bad.data.len()
            )));
        }
        let acodec = match audio.map(|a| a.config.codec) {
            None => None,
            Some(AudioCodec::Aac) => Some("aac"),
            Some(AudioCodec::Opus) => Some("libopus"),
            Some(AudioCodec::Pcm) => {
                return Err(CutlineError::config(
                    "ffmpeg muxer needs a compressed audio codec, got \"pcm\"",
                ));
            }
        };

        if !is_ffmpeg_on_path() {
            return Err(CutlineError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut audio_tmp = TempFileGuard(None);
        let audio_input = match audio.filter(|a| !a.chunks.is_empty()) {
            Some(a) => {
                let path = self.scratch_path("audio", "f32le");
                ensure_parent_dir(&path)?;
                let pcm: Vec<u8> = a.chunks.iter().flat_map(|c| c.data.iter().copied()).collect();
                std::fs::write(&path, pcm).map_err(|e| {
                    CutlineError::encode(format!("failed to stage audio '{}': {e}", path.display()))
                })?;
                audio_tmp.0 = Some(path.clone());
                Some((path, a))
            }
            None => None,
        };

        let out_tmp = TempFileGuard(Some(self.scratch_path("out", "mp4")));
        let out_path = out_tmp.path()?;
        ensure_parent_dir(out_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            // Input framerate goes before `-i` for rawvideo.
            "-r",
            &format!("{}/{}", cfg.fps.num, cfg.fps.den),
            "-i",
            "pipe:0",
        ]);
        if let Some((path, a)) = &audio_input {
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &a.config.sample_rate.to_string(),
                "-ac",
                &a.config.channels.to_string(),
                "-i",
            ])
            .arg(path);
        }

        cmd.args([
            "-fflags",
            "+bitexact",
            "-flags:v",
            "+bitexact",
            "-c:v",
            vcodec,
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            &cfg.bitrate.to_string(),
            "-force_key_frames",
            &format!("expr:eq(mod(n,{}),0)", keyframe_cadence(video)),
        ]);
        if vcodec == "libx264" {
            cmd.args(["-threads", "1"]);
        }
        match (&audio_input, acodec) {
            (Some((_, a)), Some(acodec)) => {
                cmd.args([
                    "-flags:a",
                    "+bitexact",
                    "-c:a",
                    acodec,
                    "-b:a",
                    &a.config.bitrate.to_string(),
                    "-shortest",
                ]);
            }
            _ => {
                cmd.arg("-an");
            }
        }
        cmd.args(["-movflags", "+faststart", "-f", "mp4"]).arg(out_path);

        tracing::debug!(
            frames = video.chunks.len(),
            codec = vcodec,
            audio = audio_input.is_some(),
            "spawning ffmpeg mux"
        );
        let mut child = cmd.spawn().map_err(|e| {
            CutlineError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CutlineError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CutlineError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok::<_, std::io::Error>(stderr_bytes)
        });

        let mut write_err = None;
        for chunk in &video.chunks {
            if let Err(e) = stdin.write_all(&chunk.data) {
                write_err = Some(e);
                break;
            }
        }
        drop(stdin);

        let status = child
            .wait()
            .map_err(|e| CutlineError::encode(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| CutlineError::encode("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| CutlineError::encode(format!("ffmpeg stderr read failed: {e}")))?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(CutlineError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        if let Some(e) = write_err {
            return Err(CutlineError::encode(format!(
                "failed to write frame to ffmpeg stdin: {e}"
            )));
        }

        std::fs::read(out_path).map_err(|e| {
            CutlineError::encode(format!(
                "failed to read ffmpeg output '{}': {e}",
                out_path.display()
            ))
        })
    }
}

/// Keyframe spacing in frames, taken from the first two keyframes of the stream.
///
/// Falls back to the configured interval when fewer than two keyframes were staged.
pub(crate) fn keyframe_cadence(video: &VideoStream) -> u64 {
    let mut keys = video
        .chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.keyframe)
        .map(|(i, _)| i as u64);
    match (keys.next(), keys.next()) {
        (Some(a), Some(b)) if b > a => b - a,
        _ => video.config.keyframe_interval.max(1),
    }
}

struct TempFileGuard(Option<PathBuf>);

impl TempFileGuard {
    fn path(&self) -> CutlineResult<&Path> {
        self.0
            .as_deref()
            .ok_or_else(|| CutlineError::internal("temp file guard is empty"))
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> CutlineResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
