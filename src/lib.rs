//! cutline is a frame-accurate multi-track timeline engine.
//!
//! A [`Timeline`] holds tracks of video, audio, image, text and solid items addressed by frame.
//! From it the engine derives:
//!
//! - per-frame [`RenderPlan`]s (pure projections of the timeline),
//! - real-time playback through a tick-driven [`PlaybackScheduler`],
//! - deterministic offline export through an [`Exporter`] and pluggable encode/mux sinks.
//!
//! Hosts edit through an [`EditorSession`] and inject media access as an
//! `Arc<dyn MediaLoader>`.
#![forbid(unsafe_code)]

mod foundation;

/// Media assets and the loader service.
pub mod assets;
/// Decoded audio, offline mixing and region scheduling.
pub mod audio;
/// Render-plan compiler.
pub mod compile;
/// Decoder boundary and frame cache.
pub mod decode;
/// Export pipeline and sinks.
pub mod export;
/// Playback scheduling.
pub mod playback;
/// Drawing surfaces and compositing.
pub mod render;
/// Editor session facade.
pub mod session;
/// Timeline model and edits.
pub mod timeline;

pub use crate::foundation::core::{
    Affine, Canvas, Fps, FrameRange, Point, Rect, Rgba8Premul, Transform2D, Vec2,
};
pub use crate::foundation::error::{CutlineError, CutlineResult};

pub use crate::assets::color::Color;
pub use crate::assets::loader::{FsMediaLoader, MediaLoader, MemoryMediaLoader};
pub use crate::compile::plan::{AudioRegion, RenderPlan, VisualLayer, compute_render_plan};
pub use crate::export::exporter::{ExportOpts, ExportOutput, Exporter};
pub use crate::export::ffmpeg::FfmpegMuxer;
pub use crate::export::raw::{InterleavedMuxer, PcmAudioEncoder, RawVideoEncoder};
pub use crate::playback::scheduler::{PlaybackOpts, PlaybackScheduler, PlaybackState};
pub use crate::render::cpu::CpuSurface;
pub use crate::render::surface::{DrawSurface, FrameRGBA};
pub use crate::session::EditorSession;
pub use crate::timeline::edit::ItemPatch;
pub use crate::timeline::model::{Item, ItemId, ItemKind, MediaClip, Timeline, Track, TrackId};
