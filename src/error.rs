use thiserror::Error;

/// The primary error type for the photo-renamer crate.
#[derive(Error, Debug)]
pub enum PhotoRenamerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Module Errors ---
    #[error("Media index operation failed: {0}")]
    Index(#[from] crate::index::error::IndexError),

    #[error("Metadata extraction failed: {0}")]
    Metadata(#[from] crate::metadata::MetadataError),

    #[error("Place lookup failed: {0}")]
    Place(#[from] crate::place::error::PlaceError),

    #[error("Permission relay failed: {0}")]
    Relay(#[from] crate::relay::error::RelayError),

    #[error("Change source failed: {0}")]
    Watch(#[from] crate::watcher::WatchError),

    #[error("Foreground controller failed: {0}")]
    Controller(#[from] crate::controller::ControllerError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}
