/// Deterministic offline export pipeline.
pub mod exporter;
/// `ffmpeg`-backed final encode and mux.
pub mod ffmpeg;
/// Uncompressed encoders and the interleaved container.
pub mod raw;
/// Encode and mux sink boundary.
pub mod sink;
