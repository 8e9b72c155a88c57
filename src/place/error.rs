use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaceError {
    #[error("Geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Geocoding service rejected the lookup: {0}")]
    Rejected(String),
}
