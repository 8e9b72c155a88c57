//! Query/update access to the shared media catalog.
pub mod error;
pub mod fs;

use crate::index::error::IndexError;
use crate::structs::{
    ConsentDecision, ConsentHandle, MediaId, MediaRecord, MediaUpdate, NewMedia, UpdateOutcome,
};
use async_trait::async_trait;

pub use fs::FsMediaIndex;

#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// Reads the attributes of one record. `Ok(None)` when the id is not (or no longer) indexed.
    async fn query(&self, id: MediaId) -> Result<Option<MediaRecord>, IndexError>;

    /// Newest records first, ordered by `date_added`.
    async fn recent(&self, limit: usize) -> Result<Vec<MediaRecord>, IndexError>;

    /// Reads the image bytes of a record.
    async fn open(&self, id: MediaId) -> Result<Vec<u8>, IndexError>;

    /// Applies attribute changes. Never fails with an error value; every outcome is tagged.
    async fn update(&self, id: MediaId, update: &MediaUpdate) -> UpdateOutcome;

    async fn insert(&self, media: &NewMedia, bytes: &[u8]) -> Result<MediaId, IndexError>;

    /// Delivers the user's answer for a consent handle previously returned by [`Self::update`].
    async fn resolve_consent(
        &self,
        handle: ConsentHandle,
        decision: ConsentDecision,
    ) -> Result<(), IndexError>;
}
