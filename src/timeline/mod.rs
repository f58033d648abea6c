//! Timeline model: tracks of items addressed by frame, edited through pure operations.
//!
//! Every edit takes `&Timeline` and returns a new [`Timeline`]; tracks are shared through `Arc`
//! so untouched tracks are never copied.

/// Pure edit operations.
pub mod edit;
/// Items, tracks and the timeline state.
pub mod model;
/// Current-version holder with change listeners.
pub mod store;
