//! User-facing playback types: volume mapping and track metadata

mod volume;

pub use volume::Volume;

/// Track metadata pushed to receivers that asked for it
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    /// Track title
    pub title: String,
    /// Artist
    pub artist: Option<String>,
    /// Album
    pub album: Option<String>,
}

impl TrackMetadata {
    /// Metadata with just a title
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}
