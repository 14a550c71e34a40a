//! NFO records: the span-preserving document editor plus typed views of the
//! series and episode files built on top of it.

pub mod document;
pub mod episode;
pub mod series;

pub use document::{DocumentError, NfoDocument};
pub use episode::EpisodeRecord;
pub use series::{SeriesField, SeriesRecord};

/// File name of the series record inside a unit directory.
pub const SERIES_FILE_NAME: &str = "tvshow.nfo";
/// Root element of a series record.
pub const SERIES_ROOT: &str = "tvshow";
/// Root element of an episode record.
pub const EPISODE_ROOT: &str = "episodedetails";
