use std::sync::Arc;

use crate::audio::EngineFault;
use crate::library::Track;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Preparing,
    Playing,
    Paused,
    Error,
}

impl PlaybackStatus {
    pub fn label(self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "Idle",
            PlaybackStatus::Preparing => "Loading",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Error => "Error",
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub shuffle: bool,
    pub auto_repeat: bool,
}

/// "Something changed, re-read the snapshot."
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Notification {
    PlaylistChanged,
    TrackChanged,
    StatusChanged,
    /// The current track is prepared; transport controls are meaningful now.
    TransportReady,
}

/// Why the session is sitting in [`PlaybackStatus::Error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    SourceUnavailable { title: String },
    Engine { title: String, fault: EngineFault },
}

impl Fault {
    /// User-facing notice.
    pub fn message(&self) -> String {
        match self {
            Fault::SourceUnavailable { title } => format!("\"{title}\" could not be played"),
            Fault::Engine { title, fault } => format!("\"{title}\" stopped: {fault}"),
        }
    }
}

/// Read-only view of the session published to observers.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub status: PlaybackStatus,
    pub cursor: Option<usize>,
    pub flags: SessionFlags,
    pub playlist: Arc<Vec<Track>>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub fault: Option<Fault>,
}

impl SessionSnapshot {
    pub fn current_track(&self) -> Option<&Track> {
        self.cursor.and_then(|i| self.playlist.get(i))
    }
}
