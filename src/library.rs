//! Media enumeration: directory scanning, tag reading and the backing store
//! the session refreshes its playlist from.

mod display;
mod model;
mod scan;
mod store;

pub use display::display_from_fields;
pub use model::{Track, TrackId};
pub use scan::scan;
pub use store::{DirectoryStore, MediaStore};
