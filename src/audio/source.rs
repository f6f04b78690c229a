//! Opening and decoding files for the rodio engine.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use rodio::{Decoder, Source};

use super::engine::EngineError;

pub(super) type FileSource = Decoder<BufReader<File>>;

/// Check that `path` can be opened, without decoding anything.
pub(super) fn probe(path: &Path) -> Result<(), EngineError> {
    File::open(path)
        .map(drop)
        .map_err(|source| EngineError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Open and decode `path`, returning the source and its total duration when
/// the container reports one.
pub(super) fn open_source(path: &Path) -> Result<(FileSource, Option<Duration>), EngineError> {
    let file = File::open(path).map_err(|source| EngineError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|e| EngineError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let duration = decoder.total_duration();
    Ok((decoder, duration))
}
