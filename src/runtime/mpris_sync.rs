use crate::library::TrackId;
use crate::mpris::MprisHandle;
use crate::session::{PlaybackStatus, SessionSnapshot};

/// What MPRIS last heard about, to skip redundant updates.
#[derive(Debug, Default)]
pub struct MprisMirror {
    last: Option<(Option<TrackId>, PlaybackStatus)>,
}

impl MprisMirror {
    /// Push the now-playing state to MPRIS if it changed.
    pub fn sync(&mut self, mpris: &MprisHandle, snap: &SessionSnapshot) {
        mpris.set_position(snap.position_ms);
        let current = (snap.current_track().map(|t| t.id), snap.status);
        if self.last == Some(current) {
            return;
        }
        mpris.set_track_metadata(snap.cursor, snap.current_track());
        mpris.set_playback(snap.status);
        self.last = Some(current);
    }
}
