#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use photo_renamer::capabilities::Capabilities;
use photo_renamer::index::MediaIndex;
use photo_renamer::index::error::IndexError;
use photo_renamer::metadata::{ImageSource, MetadataError, MetadataReader};
use photo_renamer::pipeline::RenamePipeline;
use photo_renamer::place::error::PlaceError;
use photo_renamer::place::{Address, PlaceResolver};
use photo_renamer::policy::PolicySettings;
use photo_renamer::relay::error::RelayError;
use photo_renamer::relay::{Channel, Notification, Notifier, PendingRequests, PermissionRelay};
use photo_renamer::structs::{
    ChangeEvent, ConsentDecision, ConsentHandle, GeoCoordinate, MediaId, MediaRecord, MediaUpdate,
    NewMedia, UpdateOutcome,
};
use photo_renamer::time::NamingZone;
use photo_renamer::watcher::{ChangeSource, Subscription, WatchError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// 2024-03-05 14:30:00 UTC in epoch milliseconds.
pub const MARCH_5_1430_UTC_MS: i64 = 1_709_649_000_000;

pub fn camera_record(id: u64) -> MediaRecord {
    MediaRecord {
        id: MediaId(id),
        display_name: format!("IMG_{id:04}.jpg"),
        bucket: Some("Camera".into()),
        date_taken: Some(MARCH_5_1430_UTC_MS),
        date_added: MARCH_5_1430_UTC_MS / 1000,
        relative_path: Some("DCIM/Camera/".into()),
        absolute_path: Some(format!("/storage/emulated/0/DCIM/Camera/IMG_{id:04}.jpg")),
        mime_type: Some("image/jpeg".into()),
    }
}

pub fn download_record(id: u64) -> MediaRecord {
    MediaRecord {
        id: MediaId(id),
        display_name: format!("meme_{id}.png"),
        bucket: Some("Download".into()),
        date_taken: Some(MARCH_5_1430_UTC_MS),
        date_added: MARCH_5_1430_UTC_MS / 1000,
        relative_path: Some("Download/".into()),
        absolute_path: Some(format!("/storage/emulated/0/Download/meme_{id}.png")),
        mime_type: Some("image/png".into()),
    }
}

pub fn paris() -> GeoCoordinate {
    GeoCoordinate {
        latitude: 48.8566,
        longitude: 2.3522,
    }
}

/// In-memory media index. Updates rename records in place.
#[derive(Default)]
pub struct MemoryIndex {
    records: Mutex<HashMap<MediaId, MediaRecord>>,
    protected: Mutex<HashSet<MediaId>>,
    consents: Mutex<HashMap<ConsentHandle, MediaId>>,
    pub updates: Mutex<Vec<(MediaId, MediaUpdate)>>,
    pub decisions: Mutex<Vec<(ConsentHandle, ConsentDecision)>>,
    update_delay: Mutex<Option<Duration>>,
    fail_updates: Mutex<Option<String>>,
    fail_consent: Mutex<bool>,
    in_flight: Mutex<HashMap<MediaId, usize>>,
    /// Highest number of simultaneous updates seen for any single id.
    pub max_in_flight_per_id: AtomicUsize,
    /// Highest number of simultaneous updates seen overall.
    pub max_in_flight: AtomicUsize,
    total_in_flight: AtomicUsize,
}

impl MemoryIndex {
    pub fn with_records(records: impl IntoIterator<Item = MediaRecord>) -> Self {
        let index = Self::default();
        index
            .records
            .lock()
            .unwrap()
            .extend(records.into_iter().map(|r| (r.id, r)));
        index
    }

    /// Updates to `id` need consent until a granted decision arrives.
    pub fn protect(&self, id: MediaId) {
        self.protected.lock().unwrap().insert(id);
    }

    pub fn set_update_delay(&self, delay: Duration) {
        *self.update_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_updates(&self, reason: &str) {
        *self.fail_updates.lock().unwrap() = Some(reason.to_string());
    }

    /// Makes `resolve_consent` fail without consuming the handle.
    pub fn fail_consent(&self, fail: bool) {
        *self.fail_consent.lock().unwrap() = fail;
    }

    pub fn record(&self, id: MediaId) -> Option<MediaRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    fn enter(&self, id: MediaId) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let count = in_flight.entry(id).or_default();
        *count += 1;
        self.max_in_flight_per_id.fetch_max(*count, Ordering::SeqCst);
        let total = self.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(total, Ordering::SeqCst);
    }

    fn leave(&self, id: MediaId) {
        if let Some(count) = self.in_flight.lock().unwrap().get_mut(&id) {
            *count -= 1;
        }
        self.total_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaIndex for MemoryIndex {
    async fn query(&self, id: MediaId) -> Result<Option<MediaRecord>, IndexError> {
        Ok(self.record(id))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MediaRecord>, IndexError> {
        let mut records: Vec<MediaRecord> =
            self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.date_added.cmp(&a.date_added));
        records.truncate(limit);
        Ok(records)
    }

    async fn open(&self, id: MediaId) -> Result<Vec<u8>, IndexError> {
        self.record(id)
            .map(|_| vec![0xFF, 0xD8, 0xFF, 0xD9])
            .ok_or(IndexError::NotFound(id))
    }

    async fn update(&self, id: MediaId, update: &MediaUpdate) -> UpdateOutcome {
        self.enter(id);
        let delay = *self.update_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.updates.lock().unwrap().push((id, update.clone()));

        let outcome = if let Some(reason) = self.fail_updates.lock().unwrap().clone() {
            UpdateOutcome::Failed(reason)
        } else if self.protected.lock().unwrap().contains(&id) {
            let handle = ConsentHandle::new();
            self.consents.lock().unwrap().insert(handle, id);
            UpdateOutcome::NeedsConsent(handle)
        } else {
            match self.records.lock().unwrap().get_mut(&id) {
                Some(record) => {
                    if let Some(name) = &update.display_name {
                        record.display_name = name.clone();
                    }
                    if let Some(relative) = &update.relative_path {
                        record.relative_path = Some(format!("{relative}/"));
                    }
                    UpdateOutcome::Updated(1)
                }
                None => UpdateOutcome::Updated(0),
            }
        };
        self.leave(id);
        outcome
    }

    async fn insert(&self, media: &NewMedia, _bytes: &[u8]) -> Result<MediaId, IndexError> {
        let mut records = self.records.lock().unwrap();
        let id = MediaId(records.keys().map(|id| id.0).max().unwrap_or(0) + 1);
        let relative = media.relative_path.clone().unwrap_or_else(|| "Pictures".into());
        records.insert(
            id,
            MediaRecord {
                id,
                display_name: media.display_name.clone(),
                bucket: relative.rsplit('/').next().map(str::to_string),
                date_taken: media.date_taken,
                date_added: Utc::now().timestamp(),
                relative_path: Some(format!("{relative}/")),
                absolute_path: None,
                mime_type: Some(media.mime_type.clone()),
            },
        );
        Ok(id)
    }

    async fn resolve_consent(
        &self,
        handle: ConsentHandle,
        decision: ConsentDecision,
    ) -> Result<(), IndexError> {
        if *self.fail_consent.lock().unwrap() {
            return Err(IndexError::Io(std::io::Error::other("consent store unavailable")));
        }
        let id = self
            .consents
            .lock()
            .unwrap()
            .remove(&handle)
            .ok_or(IndexError::UnknownConsent(handle))?;
        if decision == ConsentDecision::Granted {
            self.protected.lock().unwrap().remove(&id);
        }
        self.decisions.lock().unwrap().push((handle, decision));
        Ok(())
    }
}

/// Metadata reader returning a fixed coordinate for every image.
pub struct StaticReader(pub Option<GeoCoordinate>);

impl MetadataReader for StaticReader {
    fn read_coordinates(
        &self,
        _image: &mut dyn ImageSource,
    ) -> Result<Option<GeoCoordinate>, MetadataError> {
        Ok(self.0)
    }
}

/// Place resolver with a canned answer that counts its calls.
pub struct CountingResolver {
    answer: Result<Vec<Address>, String>,
    pub calls: AtomicUsize,
}

impl CountingResolver {
    pub fn returning(addresses: Vec<Address>) -> Self {
        Self {
            answer: Ok(addresses),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn paris() -> Self {
        Self::returning(vec![Address {
            locality: Some("Paris".into()),
            country_name: Some("France".into()),
        }])
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answer: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceResolver for CountingResolver {
    async fn lookup(
        &self,
        _coordinate: GeoCoordinate,
        limit: usize,
    ) -> Result<Vec<Address>, PlaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Ok(addresses) => Ok(addresses.iter().take(limit).cloned().collect()),
            Err(reason) => Err(PlaceError::Rejected(reason.clone())),
        }
    }
}

/// Keeps every published notification. Can be told to reject a channel.
#[derive(Default)]
pub struct RecordingNotifier {
    pub published: Mutex<Vec<Notification>>,
    pub channels: Mutex<Vec<Channel>>,
    failing: Mutex<HashSet<Channel>>,
}

impl RecordingNotifier {
    pub fn fail_channel(&self, channel: Channel) {
        self.failing.lock().unwrap().insert(channel);
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().unwrap().clone()
    }

    pub fn on_channel(&self, channel: Channel) -> Vec<Notification> {
        self.published()
            .into_iter()
            .filter(|n| n.channel == channel)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn create_channel(&self, channel: Channel) -> Result<(), RelayError> {
        self.channels.lock().unwrap().push(channel);
        Ok(())
    }

    async fn publish(&self, notification: &Notification) -> Result<(), RelayError> {
        if self.failing.lock().unwrap().contains(&notification.channel) {
            return Err(RelayError::Notification(format!(
                "channel {} blocked",
                notification.channel.id()
            )));
        }
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Change source the test pushes events into by hand.
#[derive(Default)]
pub struct ManualSource {
    sink: Mutex<Option<mpsc::Sender<ChangeEvent>>>,
    pub fail: Mutex<bool>,
}

impl ManualSource {
    pub async fn emit(&self, event: ChangeEvent) {
        let sink = self.sink.lock().unwrap().clone();
        sink.expect("not subscribed").send(event).await.unwrap();
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|sink| !sink.is_closed())
    }
}

impl ChangeSource for ManualSource {
    fn subscribe(&self, sink: mpsc::Sender<ChangeEvent>) -> Result<Subscription, WatchError> {
        if *self.fail.lock().unwrap() {
            return Err(WatchError::Unavailable("manual source disabled".into()));
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Subscription::detached())
    }
}

/// Everything a pipeline test needs to look at afterwards.
pub struct Harness {
    pub index: Arc<MemoryIndex>,
    pub resolver: Arc<CountingResolver>,
    pub notifier: Arc<RecordingNotifier>,
    pub pending: Arc<PendingRequests>,
    pub relay: Arc<PermissionRelay>,
    pub pipeline: Arc<RenamePipeline>,
}

pub fn harness(
    index: MemoryIndex,
    coordinates: Option<GeoCoordinate>,
    resolver: CountingResolver,
    platform_level: u32,
) -> Harness {
    let index = Arc::new(index);
    let resolver = Arc::new(resolver);
    let notifier = Arc::new(RecordingNotifier::default());
    let pending = Arc::new(PendingRequests::new());
    let relay = Arc::new(PermissionRelay::new(
        pending.clone(),
        notifier.clone(),
        index.clone(),
    ));
    let pipeline = Arc::new(
        RenamePipeline::builder()
            .index(index.clone())
            .reader(Arc::new(StaticReader(coordinates)))
            .resolver(resolver.clone())
            .relay(relay.clone())
            .settings(
                PolicySettings::builder()
                    .capabilities(Capabilities::for_platform_level(platform_level))
                    .zone(NamingZone::Named(chrono_tz::UTC))
                    .build(),
            )
            .build(),
    );
    Harness {
        index,
        resolver,
        notifier,
        pending,
        relay,
        pipeline,
    }
}
