//! Application module: the observer-side model used by the TUI and runtime.
//!
//! `App` mirrors the session through snapshots and adds the selection,
//! notice line and y/n prompts, none of which the session knows about.

mod model;

pub use model::*;
