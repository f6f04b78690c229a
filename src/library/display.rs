use std::path::Path;

use crate::config::TrackDisplayField;

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Compose the list label for a file from its tags, in the configured field
/// order, joined by `sep`. Falls back to `title` when every field is empty.
pub fn display_from_fields(
    path: &Path,
    title: &str,
    artist: Option<&str>,
    album: Option<&str>,
    fields: &[TrackDisplayField],
    sep: &str,
) -> String {
    let parts: Vec<String> = fields
        .iter()
        .filter_map(|f| match f {
            TrackDisplayField::Title => non_blank(Some(title)).map(str::to_string),
            TrackDisplayField::Artist => non_blank(artist).map(str::to_string),
            TrackDisplayField::Album => non_blank(album).map(str::to_string),
            TrackDisplayField::Filename => {
                non_blank(path.file_stem().and_then(|s| s.to_str())).map(str::to_string)
            }
            TrackDisplayField::Path => Some(path.display().to_string()),
        })
        .collect();

    if parts.is_empty() {
        title.to_string()
    } else {
        parts.join(sep)
    }
}
