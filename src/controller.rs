//! Foreground lifecycle of the rename service.
//!
//! The controller owns the change subscription and the work queue. It moves through
//! `Stopped -> Starting -> Observing -> Stopped`. It is also the entry point for user
//! decisions relayed from consent prompts.

use crate::capabilities::{Capabilities, EntitlementCheck, Permission};
use crate::pipeline::{PipelineOutcome, RenamePipeline};
use crate::queue::{EVENT_BUS_CAPACITY, QueueConfig, WorkQueue, WorkQueueHandle};
use crate::relay::error::RelayError;
use crate::relay::{
    Channel, ConsentOutcome, Notification, PendingInspection, SERVICE_NOTIFICATION_ID,
    parse_permission_link,
};
use crate::structs::{ChangeEvent, ConsentDecision, MediaId};
use crate::watcher::{ChangeSource, Subscription, WatchError};
use bon::bon;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{info, warn};

pub const SERVICE_TITLE: &str = "Photo Rename Service Running";
pub const SERVICE_BODY: &str = "Watching for new camera photos";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ControllerState {
    Stopped,
    Starting,
    Observing,
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Missing permissions: {0:?}")]
    MissingPermissions(Vec<Permission>),

    #[error("Service is already {0:?}")]
    AlreadyRunning(ControllerState),

    #[error("Could not subscribe to media changes: {0}")]
    Subscribe(#[from] WatchError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// The user's decision together with the retried rename, if one ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedDecision {
    pub outcome: ConsentOutcome,
    pub retried: Option<PipelineOutcome>,
}

struct Running {
    subscription: Subscription,
    queue: WorkQueueHandle,
}

pub struct ForegroundController {
    capabilities: Capabilities,
    entitlements: Arc<dyn EntitlementCheck>,
    source: Arc<dyn ChangeSource>,
    pipeline: Arc<RenamePipeline>,
    queue_config: QueueConfig,
    retry_after_consent: bool,
    state: watch::Sender<ControllerState>,
    events: broadcast::Sender<PipelineOutcome>,
    running: Mutex<Option<Running>>,
}

#[bon]
impl ForegroundController {
    /// # Builder Arguments
    ///
    /// * `retry_after_consent: bool` - (Default: `true`) Re-apply the stored rename once the user grants consent.
    #[builder]
    pub fn new(
        capabilities: Capabilities,
        entitlements: Arc<dyn EntitlementCheck>,
        source: Arc<dyn ChangeSource>,
        pipeline: Arc<RenamePipeline>,
        #[builder(default)] queue_config: QueueConfig,
        #[builder(default = true)] retry_after_consent: bool,
    ) -> Self {
        let (state, _) = watch::channel(ControllerState::Stopped);
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            capabilities,
            entitlements,
            source,
            pipeline,
            queue_config,
            retry_after_consent,
            state,
            events,
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Outcomes of every pipeline run, across restarts.
    pub fn events(&self) -> broadcast::Receiver<PipelineOutcome> {
        self.events.subscribe()
    }

    pub fn pipeline(&self) -> &Arc<RenamePipeline> {
        &self.pipeline
    }

    pub async fn start(&self) -> Result<(), ControllerError> {
        let mut running = self.running.lock().await;
        let state = self.state();
        if state != ControllerState::Stopped {
            return Err(ControllerError::AlreadyRunning(state));
        }

        let missing = self
            .capabilities
            .missing_permissions(self.entitlements.as_ref());
        if !missing.is_empty() {
            warn!(?missing, "Refusing to start without permissions");
            return Err(ControllerError::MissingPermissions(missing));
        }

        self.state.send_replace(ControllerState::Starting);
        let notifier = self.pipeline.relay().notifier();
        for channel in [Channel::Service, Channel::Permission] {
            if let Err(e) = notifier.create_channel(channel).await {
                warn!(channel = channel.id(), error = %e, "Could not create notification channel");
            }
        }
        let notice = Notification {
            id: SERVICE_NOTIFICATION_ID,
            channel: Channel::Service,
            title: SERVICE_TITLE.to_string(),
            body: SERVICE_BODY.to_string(),
            deep_link: None,
            timeout: None,
        };
        if let Err(e) = notifier.publish(&notice).await {
            warn!(error = %e, "Could not publish service notification");
        }

        let queue = WorkQueue::start(
            self.pipeline.clone(),
            self.queue_config,
            self.events.clone(),
        );
        let subscription = match self.source.subscribe(queue.sender()) {
            Ok(subscription) => subscription,
            Err(e) => {
                queue.shutdown().await;
                self.state.send_replace(ControllerState::Stopped);
                return Err(e.into());
            }
        };

        *running = Some(Running {
            subscription,
            queue,
        });
        self.state.send_replace(ControllerState::Observing);
        info!(
            platform_level = self.capabilities.platform_level,
            "Photo rename service observing"
        );
        Ok(())
    }

    /// Unsubscribes and waits for in-flight renames. A no-op when already stopped.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(Running {
            subscription,
            queue,
        }) = running.take()
        else {
            return;
        };
        subscription.unsubscribe();
        queue.shutdown().await;
        self.state.send_replace(ControllerState::Stopped);
        info!("Photo rename service stopped");
    }

    /// Forwards the user's answer for `media_id` and retries the rename when granted.
    pub async fn relay_decision(
        &self,
        media_id: MediaId,
        decision: ConsentDecision,
    ) -> Result<RelayedDecision, ControllerError> {
        let outcome = self
            .pipeline
            .relay()
            .relay_decision(media_id, decision)
            .await?;
        let retried = match &outcome {
            ConsentOutcome::Granted(request) if self.retry_after_consent => {
                let retried = self.pipeline.retry(request).await;
                let _ = self.events.send(retried.clone());
                Some(retried)
            }
            _ => None,
        };
        Ok(RelayedDecision { outcome, retried })
    }

    /// Handles a `photo-renamer://request-permission?media=<id>` link opened by the user.
    pub async fn handle_deep_link(
        &self,
        link: &str,
        decision: ConsentDecision,
    ) -> Result<RelayedDecision, ControllerError> {
        let media_id = parse_permission_link(link)?;
        self.relay_decision(media_id, decision).await
    }

    /// Queues an event without a record id, picking up the newest recent addition.
    ///
    /// Returns `false` when the service is not observing or the queue is full.
    pub async fn trigger_rescan(&self) -> bool {
        let running = self.running.lock().await;
        let Some(running) = running.as_ref() else {
            return false;
        };
        running
            .queue
            .sender()
            .try_send(ChangeEvent::unspecified())
            .is_ok()
    }

    /// The newest pending consent request with its age. Clears all pending requests.
    pub fn inspect_pending(&self) -> Option<PendingInspection> {
        self.pipeline.relay().inspect_pending(Utc::now())
    }
}
