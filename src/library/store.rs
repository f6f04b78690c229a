use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::info;

use crate::config::LibrarySettings;
use crate::error::LibraryError;

use super::model::Track;
use super::scan::scan;

/// The backing store the session's playlist is enumerated from.
pub trait MediaStore: Send {
    /// Produce the current set of tracks. Failures yield an empty list.
    fn enumerate(&self) -> Vec<Track>;

    /// Remove the file behind `track` from the store.
    fn remove(&self, track: &Track) -> Result<(), LibraryError>;
}

/// A directory of audio files on the local filesystem.
pub struct DirectoryStore {
    root: PathBuf,
    settings: LibrarySettings,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, settings: LibrarySettings) -> Self {
        Self {
            root: root.into(),
            settings,
        }
    }
}

impl MediaStore for DirectoryStore {
    fn enumerate(&self) -> Vec<Track> {
        scan(&self.root, &self.settings)
    }

    fn remove(&self, track: &Track) -> Result<(), LibraryError> {
        match fs::remove_file(&track.locator) {
            Ok(()) => {
                info!(path = %track.locator.display(), "track deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(LibraryError::NotFound(track.locator.clone()))
            }
            Err(source) => Err(LibraryError::Io {
                path: track.locator.clone(),
                source,
            }),
        }
    }
}
