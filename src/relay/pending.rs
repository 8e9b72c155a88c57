use crate::structs::{ConsentHandle, MediaId, RenameTarget};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A rename blocked on the user's consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPermissionRequest {
    pub media_id: MediaId,
    pub consent: ConsentHandle,
    pub target: RenameTarget,
    pub created_at: DateTime<Utc>,
}

impl PendingPermissionRequest {
    /// Advisory only. Nothing expires requests automatically.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// Consent requests in flight, at most one per media id.
#[derive(Debug, Default)]
pub struct PendingRequests {
    inner: Mutex<HashMap<MediaId, PendingPermissionRequest>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<MediaId, PendingPermissionRequest>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `request`, returning the request it superseded for the same id.
    pub fn insert(&self, request: PendingPermissionRequest) -> Option<PendingPermissionRequest> {
        self.table().insert(request.media_id, request)
    }

    /// Removes the request for `media_id` only if it still carries `consent`.
    pub fn take_matching(
        &self,
        media_id: MediaId,
        consent: ConsentHandle,
    ) -> Option<PendingPermissionRequest> {
        let mut table = self.table();
        match table.get(&media_id) {
            Some(request) if request.consent == consent => table.remove(&media_id),
            _ => None,
        }
    }

    pub fn get(&self, media_id: MediaId) -> Option<PendingPermissionRequest> {
        self.table().get(&media_id).cloned()
    }

    /// The most recently created request.
    pub fn latest(&self) -> Option<PendingPermissionRequest> {
        self.table()
            .values()
            .max_by_key(|request| request.created_at)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Returns the newest request and forgets all of them.
    pub fn inspect_and_clear(&self) -> Option<PendingPermissionRequest> {
        let mut table = self.table();
        let latest = table
            .values()
            .max_by_key(|request| request.created_at)
            .cloned();
        table.clear();
        latest
    }
}
