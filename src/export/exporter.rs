use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::color::Color;
use crate::assets::loader::MediaLoader;
use crate::assets::media::MIX_SAMPLE_RATE;
use crate::audio::buffer::AudioBuffer;
use crate::audio::mix::{SampleSlice, mix_frame_slice};
use crate::decode::cache::{FrameCache, FrameCacheOpts};
use crate::export::sink::{
    AudioCodec, AudioEncodeSink, AudioEncoderConfig, AudioSlice, AudioStream, EncodedChunk,
    MuxSink, VideoCodec, VideoEncodeSink, VideoEncoderConfig,
};
use crate::foundation::core::Fps;
use crate::foundation::error::{CutlineError, CutlineResult};
use crate::render::compositor::{Compositor, CompositorOpts};
use crate::render::surface::DrawSurface;
use crate::timeline::model::{ItemId, ItemKind, Timeline};

/// Output parameters of one export.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOpts {
    pub width: u32,
    pub height: u32,
    /// Output frame rate; `None` keeps the timeline's.
    pub fps: Option<Fps>,
    pub video_codec: String,
    pub video_bitrate: u64,
    /// Every n-th output frame is a keyframe.
    pub keyframe_interval: u64,
    pub audio_codec: String,
    pub audio_bitrate: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub include_audio: bool,
    /// Composited under every frame.
    pub background: Color,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: None,
            video_codec: "avc1.42E01E".to_string(),
            video_bitrate: 5_000_000,
            keyframe_interval: 30,
            audio_codec: "mp4a.40.2".to_string(),
            audio_bitrate: 128_000,
            sample_rate: MIX_SAMPLE_RATE,
            channels: 2,
            include_audio: true,
            background: Color::rgb(0, 0, 0),
        }
    }
}

impl ExportOpts {
    /// Resolve codec ids and check every parameter, yielding encoder configs.
    pub fn validate(
        &self,
        timeline_fps: Fps,
    ) -> CutlineResult<(VideoEncoderConfig, Option<AudioEncoderConfig>)> {
        if self.width == 0 || self.height == 0 {
            return Err(CutlineError::config("export width/height must be non-zero"));
        }
        if self.keyframe_interval == 0 {
            return Err(CutlineError::config("keyframe interval must be non-zero"));
        }
        let fps = self.fps.unwrap_or(timeline_fps);
        let video = VideoEncoderConfig {
            codec: self.video_codec.parse::<VideoCodec>()?,
            codec_id: self.video_codec.clone(),
            width: self.width,
            height: self.height,
            fps,
            bitrate: self.video_bitrate,
            keyframe_interval: self.keyframe_interval,
        };
        video.validate()?;

        let audio = if self.include_audio {
            let cfg = AudioEncoderConfig {
                codec: self.audio_codec.parse::<AudioCodec>()?,
                codec_id: self.audio_codec.clone(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                bitrate: self.audio_bitrate,
            };
            cfg.validate()?;
            Some(cfg)
        } else {
            None
        };
        Ok((video, audio))
    }
}

/// Size and timing of one encoded chunk, kept after the payload moved into the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkMeta {
    pub timestamp_us: u64,
    pub duration_us: u64,
    pub keyframe: bool,
    pub size: usize,
}

impl From<&EncodedChunk> for ChunkMeta {
    fn from(c: &EncodedChunk) -> Self {
        Self {
            timestamp_us: c.timestamp_us,
            duration_us: c.duration_us,
            keyframe: c.keyframe,
            size: c.data.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOutput {
    /// Muxed container bytes.
    pub container: Vec<u8>,
    pub frames: u64,
    pub video_chunks: Vec<ChunkMeta>,
    pub audio_chunks: Vec<ChunkMeta>,
}

/// Offline renderer. Owns its compositor, frame cache and audio buffers; never shares them with
/// playback.
pub struct Exporter<S: DrawSurface> {
    compositor: Compositor<S>,
    loader: Arc<dyn MediaLoader>,
    cache_opts: FrameCacheOpts,
}

impl<S: DrawSurface> Exporter<S> {
    pub fn new(surface: S, loader: Arc<dyn MediaLoader>) -> CutlineResult<Self> {
        Ok(Self {
            compositor: Compositor::new(surface, CompositorOpts::default())?,
            loader,
            cache_opts: FrameCacheOpts::default(),
        })
    }

    pub fn with_cache_opts(mut self, opts: FrameCacheOpts) -> Self {
        self.cache_opts = opts;
        self
    }

    pub fn compositor(&self) -> &Compositor<S> {
        &self.compositor
    }

    /// Render, encode and mux the whole timeline.
    ///
    /// Deterministic for identical inputs. Any failure closes both sinks and yields no output.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(width = opts.width, height = opts.height, tracks = timeline.tracks.len())
    )]
    pub fn export(
        &mut self,
        timeline: &Timeline,
        opts: &ExportOpts,
        video_sink: &mut dyn VideoEncodeSink,
        audio_sink: &mut dyn AudioEncodeSink,
        mux_sink: &mut dyn MuxSink,
    ) -> CutlineResult<ExportOutput> {
        let (video_cfg, audio_cfg) = opts.validate(timeline.fps)?;
        timeline.validate()?;

        let mut cache = FrameCache::new(self.cache_opts.clone());
        let result = self.run(
            timeline,
            opts,
            &video_cfg,
            audio_cfg.as_ref(),
            &mut cache,
            video_sink,
            audio_sink,
            mux_sink,
        );
        cache.cleanup();
        if let Err(err) = &result {
            tracing::warn!(%err, "export failed");
            video_sink.close();
            audio_sink.close();
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run(
        &mut self,
        timeline: &Timeline,
        opts: &ExportOpts,
        video_cfg: &VideoEncoderConfig,
        audio_cfg: Option<&AudioEncoderConfig>,
        cache: &mut FrameCache,
        video_sink: &mut dyn VideoEncodeSink,
        audio_sink: &mut dyn AudioEncodeSink,
        mux_sink: &mut dyn MuxSink,
    ) -> CutlineResult<ExportOutput> {
        video_sink.configure(video_cfg)?;
        if let Some(cfg) = audio_cfg {
            audio_sink.configure(cfg)?;
        }

        self.compositor.update_size(opts.width, opts.height)?;
        self.compositor.set_background(opts.background);
        let buffers = self.prepare_media(timeline, audio_cfg, cache)?;

        let out_fps = video_cfg.fps;
        let total = out_fps.secs_to_frames_ceil(timeline.duration_secs());
        let frame_us = out_fps.frame_duration_us();
        tracing::info!(frames = total, fps = out_fps.as_f64(), "export started");

        for k in 0..total {
            let frame = output_to_timeline_frame(k, out_fps, timeline.fps);
            let plan = timeline.render_plan(frame);

            let t = out_fps.frames_to_secs(k);
            let key_ms = (t * 1000.0).round() as u64;
            let mut frames = HashMap::new();
            for layer in plan.video_layers() {
                let Some(clip) = layer.item.media() else {
                    continue;
                };
                let source_time_s =
                    (clip.trim_start_s + (t - timeline.fps.frames_to_secs(layer.item.start))).max(0.0);
                let image = cache.await_frame(&layer.item.id, key_ms, source_time_s)?;
                frames.insert(layer.item.id.clone(), image);
            }

            self.compositor.render_frame(&plan, &frames)?;
            let rgba = self.compositor.read_rgba8()?;
            video_sink.encode(&rgba, k * frame_us, k % video_cfg.keyframe_interval == 0)?;

            if let Some(cfg) = audio_cfg {
                let slice = SampleSlice::for_frame(k, out_fps, cfg.sample_rate, cfg.channels);
                let samples = mix_frame_slice(timeline, &buffers, slice);
                audio_sink.encode(&AudioSlice {
                    timestamp_us: slice.start_sample * 1_000_000 / u64::from(cfg.sample_rate),
                    samples: &samples,
                })?;
            }

            cache.flush();
            tracing::trace!(k, frame, "exported frame");
        }

        let video = video_sink.flush()?;
        video_sink.close();
        let audio: Option<AudioStream> = match audio_cfg {
            Some(_) => Some(audio_sink.flush()?),
            None => None,
        };
        audio_sink.close();

        let container = mux_sink.mux(&video, audio.as_ref())?;
        tracing::info!(frames = total, bytes = container.len(), "export finished");
        Ok(ExportOutput {
            container,
            frames: total,
            video_chunks: video.chunks.iter().map(ChunkMeta::from).collect(),
            audio_chunks: audio
                .map(|a| a.chunks.iter().map(ChunkMeta::from).collect())
                .unwrap_or_default(),
        })
    }

    /// Load everything the timeline references. Any missing media fails the export.
    fn prepare_media(
        &mut self,
        timeline: &Timeline,
        audio_cfg: Option<&AudioEncoderConfig>,
        cache: &mut FrameCache,
    ) -> CutlineResult<HashMap<ItemId, Arc<AudioBuffer>>> {
        let mut stills = Vec::new();
        let mut audio_sources: Vec<(ItemId, &str)> = Vec::new();
        for (_, item) in timeline.items() {
            match &item.kind {
                ItemKind::Video(clip) => {
                    let decoder = self.loader.open_video(&clip.source)?;
                    cache.attach_decoder(item.id.clone(), decoder)?;
                    if audio_cfg.is_some() && self.loader.probe(&clip.source)?.has_audio() {
                        audio_sources.push((item.id.clone(), clip.source.as_str()));
                    }
                }
                ItemKind::Audio(clip) => audio_sources.push((item.id.clone(), clip.source.as_str())),
                ItemKind::Image { source } => stills.push(source.as_str()),
                ItemKind::Text { .. } | ItemKind::Solid { .. } => {}
            }
        }

        let wanted = stills.len();
        self.compositor.load_stills(stills.iter().copied(), self.loader.as_ref());
        if let Some(missing) = stills.iter().find(|s| !self.compositor.has_still(s)) {
            return Err(CutlineError::decode(format!(
                "still image \"{missing}\" could not be loaded"
            )));
        }
        tracing::debug!(stills = wanted, "stills ready");

        let mut buffers = HashMap::new();
        if let Some(cfg) = audio_cfg {
            let mut by_source: HashMap<&str, Arc<AudioBuffer>> = HashMap::new();
            for (id, source) in audio_sources {
                let buffer = match by_source.get(source) {
                    Some(b) => Arc::clone(b),
                    None => {
                        let b = self.loader.load_audio(source, cfg.sample_rate)?;
                        by_source.insert(source, Arc::clone(&b));
                        b
                    }
                };
                buffers.insert(id, buffer);
            }
        }
        Ok(buffers)
    }
}

impl<S: DrawSurface + std::fmt::Debug> std::fmt::Debug for Exporter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("compositor", &self.compositor)
            .field("cache_opts", &self.cache_opts)
            .finish_non_exhaustive()
    }
}

/// `floor(k / out_fps * fps)` in exact integer arithmetic.
pub(crate) fn output_to_timeline_frame(k: u64, out_fps: Fps, fps: Fps) -> u64 {
    let num = u128::from(k) * u128::from(out_fps.den) * u128::from(fps.num);
    let den = u128::from(out_fps.num) * u128::from(fps.den);
    (num / den) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/export/exporter.rs"]
mod tests;
