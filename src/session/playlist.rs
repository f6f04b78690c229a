use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::library::{Track, TrackId};

/// Title-ordered, id-unique list of tracks.
///
/// Stored behind an `Arc` so snapshots share it instead of copying.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Arc<Vec<Track>>,
}

impl Playlist {
    /// Sort by title (byte-wise, case-sensitive, stable for equal titles) and
    /// drop repeated ids, keeping the first occurrence in input order.
    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        let mut seen = HashSet::with_capacity(tracks.len());
        let mut tracks: Vec<Track> = tracks
            .into_iter()
            .filter(|t| {
                let fresh = seen.insert(t.id);
                if !fresh {
                    warn!(path = %t.locator.display(), "duplicate track id dropped");
                }
                fresh
            })
            .collect();
        tracks.sort_by(|a, b| a.title.cmp(&b.title));
        Self {
            tracks: Arc::new(tracks),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.iter().position(|t| t.id == id)
    }

    pub fn shared(&self) -> Arc<Vec<Track>> {
        self.tracks.clone()
    }
}
