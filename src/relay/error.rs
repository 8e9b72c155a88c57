use crate::index::error::IndexError;
use crate::structs::MediaId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No pending permission request for {0}")]
    NoPendingRequest(MediaId),

    #[error("Consent system rejected the decision: {0}")]
    Consent(#[from] IndexError),

    #[error("Notification could not be published: {0}")]
    Notification(String),

    #[error("Not a permission deep link: {0}")]
    InvalidDeepLink(String),
}
