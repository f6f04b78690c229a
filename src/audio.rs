//! Playback engine adapter.
//!
//! The session drives audio through the narrow [`PlaybackEngine`] trait and
//! hears back through an [`EventSink`]. [`RodioEngine`] is the real backend.

mod engine;
mod rodio_engine;
mod source;

#[cfg(test)]
pub(crate) mod fake;

pub use engine::{EngineError, EngineEvent, EngineFault, EventSink, Generation, PlaybackEngine};
pub use rodio_engine::RodioEngine;
