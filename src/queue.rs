//! Bounded change-event queue with single flight per media id.

use crate::pipeline::{PipelineOutcome, RenamePipeline};
use crate::structs::{ChangeEvent, MediaId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedMutexGuard, Semaphore, broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MAX_CONCURRENT: usize = 4;
pub const EVENT_BUS_CAPACITY: usize = 256;

type Slots = HashMap<MediaId, Arc<tokio::sync::Mutex<()>>>;

/// One async mutex per media id, created on demand and dropped once unused.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    slots: Arc<StdMutex<Slots>>,
}

/// Held while a media id is being processed.
pub struct KeyedGuard {
    key: MediaId,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<StdMutex<Slots>>,
}

fn lock_slots(slots: &StdMutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has `key`.
    pub async fn lock(&self, key: MediaId) -> KeyedGuard {
        let slot = lock_slots(&self.slots).entry(key).or_default().clone();
        let guard = slot.lock_owned().await;
        KeyedGuard {
            key,
            guard: Some(guard),
            slots: self.slots.clone(),
        }
    }

    pub fn is_locked(&self, key: MediaId) -> bool {
        lock_slots(&self.slots)
            .get(&key)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of ids currently held or waited on.
    pub fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        drop(self.guard.take());
        // Only the table still refers to the slot: nobody holds or waits on it.
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Events buffered before senders wait.
    pub capacity: usize,
    /// Pipeline runs in flight at once.
    pub max_concurrent: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Handle for controlling a running queue worker.
pub struct WorkQueueHandle {
    sender: mpsc::Sender<ChangeEvent>,
    shutdown_tx: mpsc::Sender<()>,
    event_tx: broadcast::Sender<PipelineOutcome>,
    task: Option<JoinHandle<()>>,
}

impl WorkQueueHandle {
    /// Producer side of the queue. Change sources hold clones of this.
    pub fn sender(&self) -> mpsc::Sender<ChangeEvent> {
        self.sender.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<PipelineOutcome> {
        self.event_tx.subscribe()
    }

    /// Stops taking events and waits for in-flight runs to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            error!(error = ?e, "Work queue task panicked");
        }
    }
}

impl Drop for WorkQueueHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct WorkQueue;

impl WorkQueue {
    /// Spawns the worker. Outcomes of every run are broadcast on `event_tx`.
    pub fn start(
        pipeline: Arc<RenamePipeline>,
        config: QueueConfig,
        event_tx: broadcast::Sender<PipelineOutcome>,
    ) -> WorkQueueHandle {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(run(
            pipeline,
            config.max_concurrent.max(1),
            receiver,
            shutdown_rx,
            event_tx.clone(),
        ));
        WorkQueueHandle {
            sender,
            shutdown_tx,
            event_tx,
            task: Some(task),
        }
    }
}

#[instrument(skip_all)]
async fn run(
    pipeline: Arc<RenamePipeline>,
    max_concurrent: usize,
    mut receiver: mpsc::Receiver<ChangeEvent>,
    mut shutdown_rx: mpsc::Receiver<()>,
    event_tx: broadcast::Sender<PipelineOutcome>,
) {
    info!(max_concurrent, "Work queue started");
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks = JoinSet::new();

    loop {
        let event = tokio::select! {
            _ = shutdown_rx.recv() => break,
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = result {
                    error!(error = ?e, "Pipeline task panicked");
                }
                continue;
            }
            event = receiver.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown_rx.recv() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        debug!(media_id = ?event.id, "Dispatching change event");
        let pipeline = pipeline.clone();
        let event_tx = event_tx.clone();
        tasks.spawn(async move {
            let outcome = pipeline.handle_event(event).await;
            let _ = event_tx.send(outcome);
            drop(permit);
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = ?e, "Pipeline task panicked");
        }
    }
    info!("Work queue stopped");
}
