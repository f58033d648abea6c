//! Decode/frame-cache layer.
//!
//! Decoders are external services reached through [`service::FrameDecoder`]; the
//! [`cache::FrameCache`] owns every decoded frame and in-flight request.

/// Bounded cache of decoded frames with in-flight de-duplication.
pub mod cache;
/// `ffmpeg`-backed decoder running on a worker thread.
pub mod ffmpeg;
/// Host-fed and generated decoders.
pub mod manual;
/// Decode service boundary.
pub mod service;
