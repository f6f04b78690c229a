//! Error types shared by the library, engine adapter and playback session.

use std::path::PathBuf;

use thiserror::Error;

use crate::audio::EngineFault;

/// Failures reported by the media store (enumeration and deletion).
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The file backing a track no longer exists.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("library I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the playback session and its host.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Selection index outside the current playlist.
    #[error("track index {index} is out of range for a playlist of {len}")]
    OutOfRange { index: usize, len: usize },

    /// The playback engine reported a decode/output failure.
    #[error("playback engine error: {0}")]
    Engine(EngineFault),

    /// The track's locator could not be opened.
    #[error("\"{title}\" could not be played: {reason}")]
    SourceUnavailable { title: String, reason: String },

    /// Deleting the track that is currently playing.
    #[error("\"{title}\" is currently playing and cannot be deleted")]
    DeleteConflict { title: String },

    /// The handle was disconnected from the host.
    #[error("session handle is disconnected")]
    Disconnected,

    /// The session thread has exited.
    #[error("session host is no longer running")]
    HostGone,

    /// The session could not be constructed (e.g. no audio output device).
    #[error("failed to start playback session: {0}")]
    Construction(String),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
