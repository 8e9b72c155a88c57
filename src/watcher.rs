//! Sources of change events for the media index.

use crate::index::FsMediaIndex;
use crate::index::error::IndexError;
use crate::structs::ChangeEvent;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Could not take the initial library snapshot: {0}")]
    Snapshot(#[from] IndexError),

    #[error("Change source is unavailable: {0}")]
    Unavailable(String),
}

pub trait ChangeSource: Send + Sync {
    /// Starts delivering events into `sink` until the returned subscription is dropped.
    fn subscribe(&self, sink: mpsc::Sender<ChangeEvent>) -> Result<Subscription, WatchError>;
}

/// A live registration with a change source. Dropping it unsubscribes.
#[derive(Debug, Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A subscription with no background work, for sources that push events themselves.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Rescans a [`FsMediaIndex`] on an interval and reports records that appeared.
///
/// Files present when subscribing form the baseline and are not reported.
pub struct PollingWatcher {
    index: Arc<FsMediaIndex>,
    interval: Duration,
}

impl PollingWatcher {
    pub fn new(index: Arc<FsMediaIndex>, interval: Duration) -> Self {
        Self { index, interval }
    }
}

impl ChangeSource for PollingWatcher {
    fn subscribe(&self, sink: mpsc::Sender<ChangeEvent>) -> Result<Subscription, WatchError> {
        let baseline = self.index.scan()?;
        info!(
            root = %self.index.root().display(),
            baseline = baseline.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Watching media library"
        );

        let index = self.index.clone();
        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let index = index.clone();
                let scan = tokio::task::spawn_blocking(move || index.scan()).await;
                let ids = match scan {
                    Ok(Ok(ids)) => ids,
                    Ok(Err(e)) => {
                        warn!(error = %e, "Library scan failed");
                        continue;
                    }
                    Err(e) => {
                        error!(error = ?e, "Library scan task failed");
                        continue;
                    }
                };
                for id in ids {
                    debug!(media_id = %id, "Change detected");
                    if sink.send(ChangeEvent::for_media(id)).await.is_err() {
                        debug!("Change sink closed, stopping watcher");
                        return;
                    }
                }
            }
        });
        Ok(Subscription::new(task))
    }
}
