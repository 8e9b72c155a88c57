use crate::structs::{ConsentHandle, MediaId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk the media library: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("No media record for {0}")]
    NotFound(MediaId),

    #[error("Unknown or already used consent handle {0}")]
    UnknownConsent(ConsentHandle),

    #[error("Path escapes the media library or is not a plain name: {0}")]
    InvalidPath(String),
}
