//! The playback session: playlist, cursor, status and flags, and the
//! transitions between tracks.

mod machine;
mod model;
mod playlist;

pub use machine::PlaybackSession;
pub use model::{Fault, Notification, PlaybackStatus, SessionFlags, SessionSnapshot};
pub use playlist::Playlist;

#[cfg(test)]
mod tests;
