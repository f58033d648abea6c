/// Time sources for playback.
pub mod clock;
/// Blocking real-time host loop.
pub mod driver;
/// Tick-driven playback state machine.
pub mod scheduler;
