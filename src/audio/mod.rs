/// Decoded PCM buffers.
pub mod buffer;
/// Offline mixing for export and sample-exact frame math.
pub mod mix;
/// Output clock boundary and the software mixer.
pub mod output;
/// Per-item region scheduling against an output clock.
pub mod scheduler;
