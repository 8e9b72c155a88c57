//! One change event, end to end: classify, name, update, and route consent.

use crate::index::MediaIndex;
use crate::metadata::MetadataReader;
use crate::place::PlaceResolver;
use crate::policy::{PolicySettings, apply_rename, compute_rename, is_camera_photo};
use crate::queue::KeyedLocks;
use crate::relay::{PendingPermissionRequest, PermissionRelay};
use crate::structs::{
    ChangeEvent, ConsentHandle, GeoCoordinate, MediaId, MediaRecord, RenameTarget, UpdateOutcome,
};
use bon::bon;
use chrono::{DateTime, Utc};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Records scanned when a change event names no record.
pub const RECENT_SCAN_LIMIT: usize = 10;
/// How recently a record must have been added to be picked up by an unnamed event.
pub const RECENT_ADDITION_WINDOW: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotCamera,
    /// The record already carries its computed name and location.
    AlreadyNamed,
    /// An unnamed event arrived but nothing was added recently.
    NoRecentMedia,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Skipped {
        media_id: Option<MediaId>,
        reason: SkipReason,
    },
    Renamed {
        media_id: MediaId,
        target: RenameTarget,
        rows: u64,
    },
    AwaitingConsent {
        media_id: MediaId,
        consent: ConsentHandle,
    },
    Failed {
        media_id: Option<MediaId>,
        reason: String,
    },
    /// The record disappeared from the index before it could be processed.
    Abandoned { media_id: MediaId },
}

impl PipelineOutcome {
    pub fn media_id(&self) -> Option<MediaId> {
        match self {
            Self::Skipped { media_id, .. } | Self::Failed { media_id, .. } => *media_id,
            Self::Renamed { media_id, .. }
            | Self::AwaitingConsent { media_id, .. }
            | Self::Abandoned { media_id } => Some(*media_id),
        }
    }
}

pub struct RenamePipeline {
    index: Arc<dyn MediaIndex>,
    reader: Arc<dyn MetadataReader>,
    resolver: Arc<dyn PlaceResolver>,
    relay: Arc<PermissionRelay>,
    settings: PolicySettings,
    locks: KeyedLocks,
}

#[bon]
impl RenamePipeline {
    #[builder]
    pub fn new(
        index: Arc<dyn MediaIndex>,
        reader: Arc<dyn MetadataReader>,
        resolver: Arc<dyn PlaceResolver>,
        relay: Arc<PermissionRelay>,
        settings: PolicySettings,
        #[builder(default)] locks: KeyedLocks,
    ) -> Self {
        Self {
            index,
            reader,
            resolver,
            relay,
            settings,
            locks,
        }
    }

    pub fn relay(&self) -> &Arc<PermissionRelay> {
        &self.relay
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Handles one change event. Never fails; every result is reported as an outcome.
    pub async fn handle_event(&self, event: ChangeEvent) -> PipelineOutcome {
        match event.id {
            Some(id) => self.process(id).await,
            None => match self.newest_addition().await {
                Ok(Some(id)) => self.process(id).await,
                Ok(None) => PipelineOutcome::Skipped {
                    media_id: None,
                    reason: SkipReason::NoRecentMedia,
                },
                Err(reason) => PipelineOutcome::Failed {
                    media_id: None,
                    reason,
                },
            },
        }
    }

    async fn newest_addition(&self) -> Result<Option<MediaId>, String> {
        let recent = self.index.recent(RECENT_SCAN_LIMIT).await.map_err(|e| {
            error!(error = %e, "Could not query recent media");
            e.to_string()
        })?;
        let cutoff = Utc::now().timestamp() - RECENT_ADDITION_WINDOW.as_secs() as i64;
        let newest = recent
            .into_iter()
            .find(|record| record.date_added >= cutoff)
            .map(|record| record.id);
        debug!(media_id = ?newest, "Resolved unnamed change event");
        Ok(newest)
    }

    /// Runs the full rename sequence for `id`. Runs for the same id never overlap.
    pub async fn process(&self, id: MediaId) -> PipelineOutcome {
        let _guard = self.locks.lock(id).await;
        let now = Utc::now();

        let record = match self.fetch(id).await {
            Ok(record) => record,
            Err(outcome) => return outcome,
        };

        if !is_camera_photo(&record, &self.settings, now) {
            debug!(media_id = %id, name = %record.display_name, "Not a camera photo");
            return PipelineOutcome::Skipped {
                media_id: Some(id),
                reason: SkipReason::NotCamera,
            };
        }

        let coordinates = self.read_coordinates(&record).await;
        let target = compute_rename(
            &record,
            coordinates,
            self.resolver.as_ref(),
            &self.settings,
            now,
        )
        .await;

        if already_named(&record, &target) {
            debug!(media_id = %id, name = %record.display_name, "Already named");
            return PipelineOutcome::Skipped {
                media_id: Some(id),
                reason: SkipReason::AlreadyNamed,
            };
        }

        let outcome = apply_rename(self.index.as_ref(), &record, &target).await;
        self.dispatch(&record, target, outcome, now).await
    }

    /// Applies the target stored in a pending request again, after the user consented.
    pub async fn retry(&self, request: &PendingPermissionRequest) -> PipelineOutcome {
        let _guard = self.locks.lock(request.media_id).await;
        let record = match self.fetch(request.media_id).await {
            Ok(record) => record,
            Err(outcome) => return outcome,
        };
        info!(media_id = %record.id, to = %request.target.display_name, "Retrying rename after consent");
        let outcome = apply_rename(self.index.as_ref(), &record, &request.target).await;
        self.dispatch(&record, request.target.clone(), outcome, Utc::now())
            .await
    }

    /// Routes a tagged update outcome.
    pub async fn dispatch(
        &self,
        record: &MediaRecord,
        target: RenameTarget,
        outcome: UpdateOutcome,
        now: DateTime<Utc>,
    ) -> PipelineOutcome {
        match outcome {
            UpdateOutcome::Updated(rows) => PipelineOutcome::Renamed {
                media_id: record.id,
                target,
                rows,
            },
            UpdateOutcome::NeedsConsent(consent) => {
                self.relay
                    .request_consent(record, &target, consent, now)
                    .await;
                PipelineOutcome::AwaitingConsent {
                    media_id: record.id,
                    consent,
                }
            }
            UpdateOutcome::Failed(reason) => PipelineOutcome::Failed {
                media_id: Some(record.id),
                reason,
            },
        }
    }

    async fn fetch(&self, id: MediaId) -> Result<MediaRecord, PipelineOutcome> {
        match self.index.query(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                warn!(media_id = %id, "Media record not found, dropping event");
                Err(PipelineOutcome::Abandoned { media_id: id })
            }
            Err(e) => {
                error!(media_id = %id, error = %e, "Media query failed");
                Err(PipelineOutcome::Failed {
                    media_id: Some(id),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Reads coordinates from the image bytes. Unreadable images count as having no location.
    async fn read_coordinates(&self, record: &MediaRecord) -> Option<GeoCoordinate> {
        let bytes = match self.index.open(record.id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(media_id = %record.id, error = %e, "Could not open image");
                return None;
            }
        };
        let reader = self.reader.clone();
        let result =
            tokio::task::spawn_blocking(move || reader.read_coordinates(&mut Cursor::new(bytes)))
                .await;
        match result {
            Ok(Ok(coordinates)) => coordinates,
            Ok(Err(e)) => {
                warn!(media_id = %record.id, error = %e, "Could not read image metadata");
                None
            }
            Err(e) => {
                error!(media_id = %record.id, error = ?e, "Metadata task failed");
                None
            }
        }
    }
}

fn already_named(record: &MediaRecord, target: &RenameTarget) -> bool {
    if record.display_name != target.display_name {
        return false;
    }
    match (&target.relative_path, &record.relative_path) {
        (None, _) => true,
        (Some(wanted), Some(current)) => wanted.trim_matches('/') == current.trim_matches('/'),
        (Some(_), None) => false,
    }
}
