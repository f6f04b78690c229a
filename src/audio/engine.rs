use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Tag attached to every prepare request. Events carrying an older tag belong
/// to an abandoned track and must be dropped.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Coarse classification of an engine-side failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineFault {
    /// The media could not be read.
    Io,
    /// The media was read but could not be decoded.
    Decode,
    /// `prepare_async` was called with nothing loaded.
    NotLoaded,
    /// The audio output device failed.
    Output,
}

impl fmt::Display for EngineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineFault::Io => "media could not be read",
            EngineFault::Decode => "media could not be decoded",
            EngineFault::NotLoaded => "nothing loaded",
            EngineFault::Output => "audio output failed",
        })
    }
}

/// Asynchronous notifications from the engine, delivered on the session's
/// home thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Prepared {
        generation: Generation,
    },
    Completed {
        generation: Generation,
        /// Playback position when the stream ran out.
        position_ms: u64,
    },
    Error {
        generation: Generation,
        fault: EngineFault,
    },
}

impl EngineEvent {
    pub fn generation(&self) -> Generation {
        match self {
            EngineEvent::Prepared { generation }
            | EngineEvent::Completed { generation, .. }
            | EngineEvent::Error { generation, .. } => *generation,
        }
    }
}

/// Where an engine posts its events. Must be callable from worker threads.
pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("audio output unavailable: {0}")]
    Output(String),
}

impl EngineError {
    pub fn fault(&self) -> EngineFault {
        match self {
            EngineError::Open { .. } => EngineFault::Io,
            EngineError::Decode { .. } => EngineFault::Decode,
            EngineError::Output(_) => EngineFault::Output,
        }
    }
}

/// Capability interface over an opaque audio backend.
///
/// Only `prepare_async` is asynchronous; its outcome arrives later as
/// [`EngineEvent::Prepared`] or [`EngineEvent::Error`] tagged with the
/// generation it was called with. Calls that make no sense in the current
/// state (seeking with nothing prepared, pausing while idle) are ignored.
pub trait PlaybackEngine {
    /// Drop whatever is loaded or playing.
    fn reset(&mut self);
    /// Point the engine at a new source. Fails if it cannot be opened.
    fn load(&mut self, locator: &Path) -> Result<(), EngineError>;
    fn prepare_async(&mut self, generation: Generation);
    fn start(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, position_ms: u64);
    fn position_ms(&self) -> u64;
    fn duration_ms(&self) -> u64;
    fn is_playing(&self) -> bool;
    fn stop(&mut self);
    /// Give up output resources. The engine is unusable afterwards.
    fn release(&mut self);

    /// Engines that detect end-of-stream by polling report it here; the
    /// session calls this on every tick.
    fn poll(&mut self) -> Option<EngineEvent> {
        None
    }
}
