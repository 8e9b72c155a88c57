//! Tracks renames waiting on user consent and carries the user's answer back.
mod deep_link;
pub mod error;
mod notify;
mod pending;

pub use deep_link::{PERMISSION_LINK_PREFIX, parse_permission_link, permission_link};
pub use notify::{Channel, LogNotifier, Notification, Notifier};
pub use pending::{PendingPermissionRequest, PendingRequests};

use crate::index::MediaIndex;
use crate::relay::error::RelayError;
use crate::structs::{ConsentDecision, ConsentHandle, MediaId, MediaRecord, RenameTarget};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SERVICE_NOTIFICATION_ID: u32 = 1;
pub const PERMISSION_NOTIFICATION_ID: u32 = 2;
pub const RESULT_NOTIFICATION_ID: u32 = 3;

pub const PERMISSION_TITLE: &str = "Photo Rename Permission";
pub const PERMISSION_BODY: &str = "Tap to allow renaming of camera photos";
pub const PERMISSION_TIMEOUT: Duration = Duration::from_secs(30);

/// The user's answer, with the request it settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    Granted(PendingPermissionRequest),
    Denied(PendingPermissionRequest),
}

impl ConsentOutcome {
    pub fn request(&self) -> &PendingPermissionRequest {
        match self {
            Self::Granted(request) | Self::Denied(request) => request,
        }
    }
}

/// A pending request together with how long it has been waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInspection {
    pub request: PendingPermissionRequest,
    pub age: chrono::Duration,
}

pub struct PermissionRelay {
    pending: Arc<PendingRequests>,
    notifier: Arc<dyn Notifier>,
    index: Arc<dyn MediaIndex>,
}

impl PermissionRelay {
    pub fn new(
        pending: Arc<PendingRequests>,
        notifier: Arc<dyn Notifier>,
        index: Arc<dyn MediaIndex>,
    ) -> Self {
        Self {
            pending,
            notifier,
            index,
        }
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Records the blocked rename and prompts the user.
    ///
    /// Publishing failures are logged. A plain notice on the service channel is tried instead.
    pub async fn request_consent(
        &self,
        record: &MediaRecord,
        target: &RenameTarget,
        consent: ConsentHandle,
        now: DateTime<Utc>,
    ) -> PendingPermissionRequest {
        let request = PendingPermissionRequest {
            media_id: record.id,
            consent,
            target: target.clone(),
            created_at: now,
        };
        if let Some(previous) = self.pending.insert(request.clone()) {
            info!(media_id = %record.id, superseded = %previous.consent, "Superseded pending request");
        }

        let prompt = Notification {
            id: PERMISSION_NOTIFICATION_ID,
            channel: Channel::Permission,
            title: PERMISSION_TITLE.to_string(),
            body: PERMISSION_BODY.to_string(),
            deep_link: Some(permission_link(record.id)),
            timeout: Some(PERMISSION_TIMEOUT),
        };
        if let Err(e) = self.notifier.publish(&prompt).await {
            warn!(media_id = %record.id, error = %e, "Permission prompt failed, trying fallback");
            let fallback = Notification {
                id: PERMISSION_NOTIFICATION_ID,
                channel: Channel::Service,
                title: PERMISSION_TITLE.to_string(),
                body: format!("Open Photo Renamer to allow renaming {}", record.display_name),
                deep_link: None,
                timeout: None,
            };
            if let Err(e) = self.notifier.publish(&fallback).await {
                error!(media_id = %record.id, error = %e, "Fallback notification failed");
            }
        }
        request
    }

    /// Forwards the decision to the index, then consumes the pending request for `media_id`.
    ///
    /// If the index rejects the decision the request stays pending, so the user can answer again.
    pub async fn relay_decision(
        &self,
        media_id: MediaId,
        decision: ConsentDecision,
    ) -> Result<ConsentOutcome, RelayError> {
        let request = self
            .pending
            .get(media_id)
            .ok_or(RelayError::NoPendingRequest(media_id))?;
        if let Err(e) = self.index.resolve_consent(request.consent, decision).await {
            warn!(%media_id, error = %e, "Consent decision rejected, request kept");
            return Err(e.into());
        }
        if self.pending.take_matching(media_id, request.consent).is_none() {
            debug!(%media_id, "Request was answered or superseded concurrently");
        }

        let body = match decision {
            ConsentDecision::Granted => "Permission granted",
            ConsentDecision::Denied => "Permission denied",
        };
        let result = Notification {
            id: RESULT_NOTIFICATION_ID,
            channel: Channel::Service,
            title: PERMISSION_TITLE.to_string(),
            body: body.to_string(),
            deep_link: None,
            timeout: None,
        };
        if let Err(e) = self.notifier.publish(&result).await {
            warn!(%media_id, error = %e, "Could not surface consent result");
        }

        info!(%media_id, ?decision, "Relayed consent decision");
        Ok(match decision {
            ConsentDecision::Granted => ConsentOutcome::Granted(request),
            ConsentDecision::Denied => ConsentOutcome::Denied(request),
        })
    }

    /// Returns the newest pending request with its age and clears the table.
    pub fn inspect_pending(&self, now: DateTime<Utc>) -> Option<PendingInspection> {
        self.pending
            .inspect_and_clear()
            .map(|request| PendingInspection {
                age: request.age(now),
                request,
            })
    }
}
