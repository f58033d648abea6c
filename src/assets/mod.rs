//! Media assets: colors, raster images, ffmpeg probing/decoding and the injected loader service.

/// Item colors.
pub mod color;
/// Raster images in premultiplied RGBA8.
pub mod decode;
/// Media loading service passed to playback and export.
pub mod loader;
/// `ffprobe`/`ffmpeg` helpers.
pub mod media;
/// Parley text layout.
pub(crate) mod text;
