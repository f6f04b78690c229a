use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Stable identity of a track, derived from its locator.
///
/// Rescanning the same file yields the same id, which is what lets the
/// session find the playing track again after the playlist is replaced.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn for_path(path: &Path) -> Self {
        let mut h = DefaultHasher::new();
        path.hash(&mut h);
        Self(h.finish())
    }
}

/// Immutable descriptor of a playable file.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_hint_ms: Option<u64>,
    pub locator: PathBuf,
    /// List label composed from the configured display fields.
    pub display: String,
}

impl Track {
    /// Build a track whose label is just its title. Tags and a richer label
    /// can be filled in afterwards.
    pub fn new(locator: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        let locator = locator.into();
        let title = title.into();
        Self {
            id: TrackId::for_path(&locator),
            display: title.clone(),
            title,
            artist: None,
            album: None,
            duration_hint_ms: None,
            locator,
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}
