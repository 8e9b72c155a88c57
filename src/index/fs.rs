//! A media index over a plain photo directory (a DCIM-style tree).
//!
//! Records are discovered by [`FsMediaIndex::scan`]. Updates rename and move files.
//! With `protected` set and a scoped-storage platform, records this index did not
//! create itself need the user's consent before they may be changed, mirroring how
//! a shared media store guards other apps' photos.

use super::MediaIndex;
use crate::capabilities::Capabilities;
use crate::index::error::IndexError;
use crate::metadata::ExifReader;
use crate::structs::{
    ConsentDecision, ConsentHandle, MediaId, MediaRecord, MediaUpdate, NewMedia, UpdateOutcome,
};
use crate::time::NamingZone;
use async_trait::async_trait;
use bon::bon;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Folder used by [`MediaIndex::insert`] when no relative path is given.
pub const DEFAULT_INSERT_DIR: &str = "Pictures";

struct Entry {
    path: PathBuf,
    date_added: i64,
    date_taken: Option<i64>,
    mime_type: String,
}

#[derive(Default)]
struct FsState {
    next_id: u64,
    entries: BTreeMap<MediaId, Entry>,
    by_path: HashMap<PathBuf, MediaId>,
    /// Records inserted by this index since the last scan.
    unannounced: Vec<MediaId>,
    owned: HashSet<MediaId>,
    granted: HashSet<MediaId>,
    consents: HashMap<ConsentHandle, MediaId>,
}

impl FsState {
    fn register(&mut self, path: PathBuf, entry: Entry) -> MediaId {
        self.next_id += 1;
        let id = MediaId(self.next_id);
        self.by_path.insert(path, id);
        self.entries.insert(id, entry);
        id
    }
}

pub struct FsMediaIndex {
    root: PathBuf,
    capabilities: Capabilities,
    protected: bool,
    zone: NamingZone,
    reader: ExifReader,
    state: Mutex<FsState>,
}

#[bon]
impl FsMediaIndex {
    /// # Builder Arguments
    ///
    /// * `root` - The library directory. Relative paths of records are computed against it.
    /// * `capabilities` - Decides whether relative paths are exposed and whether consent is enforced.
    /// * `protected: bool` - (Default: `true`) Require consent for records this index did not create.
    /// * `zone` - (Default: local) Zone used to interpret EXIF capture times.
    #[builder]
    pub fn new(
        #[builder(into)] root: PathBuf,
        capabilities: Capabilities,
        #[builder(default = true)] protected: bool,
        #[builder(default)] zone: NamingZone,
    ) -> Self {
        Self {
            root,
            capabilities,
            protected,
            zone,
            reader: ExifReader::new(),
            state: Mutex::new(FsState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state(&self) -> MutexGuard<'_, FsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Synchronizes the index with the directory tree.
    ///
    /// Returns the ids of records that appeared since the previous scan, including
    /// records created through [`MediaIndex::insert`]. Records whose file vanished are dropped.
    pub fn scan(&self) -> Result<Vec<MediaId>, IndexError> {
        let mut state = self.state();
        let files = list_media_files(&self.root)?;

        let present: HashSet<&PathBuf> = files.iter().collect();
        let vanished: Vec<MediaId> = state
            .entries
            .iter()
            .filter(|(_, entry)| !present.contains(&entry.path))
            .map(|(id, _)| *id)
            .collect();
        for id in vanished {
            if let Some(entry) = state.entries.remove(&id) {
                debug!(media_id = %id, path = %entry.path.display(), "Media vanished from library");
                state.by_path.remove(&entry.path);
            }
        }

        let mut discovered = std::mem::take(&mut state.unannounced);
        for path in files {
            if state.by_path.contains_key(&path) {
                continue;
            }
            match self.describe(&path) {
                Ok(entry) => {
                    let id = state.register(path.clone(), entry);
                    debug!(media_id = %id, path = %path.display(), "Media discovered");
                    discovered.push(id);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable media"),
            }
        }
        discovered.sort();
        discovered.dedup();
        Ok(discovered)
    }

    /// Looks up the record id currently pointing at `path`.
    pub fn id_for_path(&self, path: &Path) -> Option<MediaId> {
        self.state().by_path.get(path).copied()
    }

    fn describe(&self, path: &Path) -> Result<Entry, IndexError> {
        let meta = std::fs::metadata(path)?;
        let modified: DateTime<Utc> = meta.modified()?.into();

        // No EXIF time means no capture time. The mtime of a copied file is fresh
        // and would look like a shot taken just now.
        let date_taken = File::open(path)
            .ok()
            .and_then(|file| {
                self.reader
                    .read_capture_time(&mut BufReader::new(file))
                    .ok()
                    .flatten()
            })
            .and_then(|naive| self.zone.instant(naive))
            .map(|taken| taken.timestamp_millis());

        Ok(Entry {
            path: path.to_path_buf(),
            date_added: modified.timestamp(),
            date_taken,
            mime_type: mime_for(path).unwrap_or("application/octet-stream").to_string(),
        })
    }

    fn record(&self, id: MediaId, entry: &Entry) -> MediaRecord {
        let parent = entry.path.parent();
        let relative_path = if self.capabilities.relative_paths {
            parent
                .and_then(|dir| dir.strip_prefix(&self.root).ok())
                .map(|rel| {
                    let rel = rel.to_string_lossy().replace('\\', "/");
                    if rel.is_empty() { rel } else { format!("{rel}/") }
                })
        } else {
            None
        };
        MediaRecord {
            id,
            display_name: entry
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bucket: parent
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned()),
            date_taken: entry.date_taken,
            date_added: entry.date_added,
            relative_path,
            absolute_path: Some(entry.path.to_string_lossy().into_owned()),
            mime_type: Some(entry.mime_type.clone()),
        }
    }

    fn needs_consent(&self, state: &FsState, id: MediaId) -> bool {
        self.protected
            && self.capabilities.scoped_storage
            && !state.owned.contains(&id)
            && !state.granted.contains(&id)
    }

    fn library_dir(&self, relative: &str) -> Result<PathBuf, IndexError> {
        let relative = relative.trim_matches('/');
        let is_plain = Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(IndexError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn move_entry(
        &self,
        state: &mut FsState,
        id: MediaId,
        update: &MediaUpdate,
    ) -> Result<u64, IndexError> {
        let Some(current) = state.entries.get(&id).map(|e| e.path.clone()) else {
            return Ok(0);
        };

        let dir = match (&update.relative_path, self.capabilities.relative_paths) {
            (Some(relative), true) => self.library_dir(relative)?,
            _ => current
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone()),
        };
        let name = match &update.display_name {
            Some(name) => {
                if name.is_empty() || name.contains(['/', '\\']) {
                    return Err(IndexError::InvalidPath(name.clone()));
                }
                name.clone()
            }
            None => current
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let wanted = dir.join(name);
        if wanted == current {
            return Ok(1);
        }
        std::fs::create_dir_all(&dir)?;
        let destination = unique_destination(wanted, Some(&current));
        if destination == current {
            return Ok(1);
        }
        std::fs::rename(&current, &destination)?;

        state.by_path.remove(&current);
        state.by_path.insert(destination.clone(), id);
        if let Some(entry) = state.entries.get_mut(&id) {
            entry.path = destination;
        }
        Ok(1)
    }
}

#[async_trait]
impl MediaIndex for FsMediaIndex {
    async fn query(&self, id: MediaId) -> Result<Option<MediaRecord>, IndexError> {
        let state = self.state();
        Ok(state.entries.get(&id).map(|entry| self.record(id, entry)))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<MediaRecord>, IndexError> {
        let state = self.state();
        let mut entries: Vec<(&MediaId, &Entry)> = state.entries.iter().collect();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            b.date_added.cmp(&a.date_added).then(b_id.cmp(a_id))
        });
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|(id, entry)| self.record(*id, entry))
            .collect())
    }

    async fn open(&self, id: MediaId) -> Result<Vec<u8>, IndexError> {
        let path = self
            .state()
            .entries
            .get(&id)
            .map(|entry| entry.path.clone())
            .ok_or(IndexError::NotFound(id))?;
        Ok(std::fs::read(path)?)
    }

    async fn update(&self, id: MediaId, update: &MediaUpdate) -> UpdateOutcome {
        let mut state = self.state();
        if state.entries.contains_key(&id) && self.needs_consent(&state, id) {
            let handle = ConsentHandle::new();
            // Only the newest handle per record can be redeemed.
            state.consents.retain(|_, owner| *owner != id);
            state.consents.insert(handle, id);
            info!(media_id = %id, consent = %handle, "Update blocked until the user consents");
            return UpdateOutcome::NeedsConsent(handle);
        }
        match self.move_entry(&mut state, id, update) {
            Ok(rows) => UpdateOutcome::Updated(rows),
            Err(e) => UpdateOutcome::Failed(e.to_string()),
        }
    }

    async fn insert(&self, media: &NewMedia, bytes: &[u8]) -> Result<MediaId, IndexError> {
        if media.display_name.is_empty() || media.display_name.contains(['/', '\\']) {
            return Err(IndexError::InvalidPath(media.display_name.clone()));
        }
        let dir = self.library_dir(media.relative_path.as_deref().unwrap_or(DEFAULT_INSERT_DIR))?;

        let mut state = self.state();
        std::fs::create_dir_all(&dir)?;
        let destination = unique_destination(dir.join(&media.display_name), None);
        std::fs::write(&destination, bytes)?;

        let entry = Entry {
            path: destination.clone(),
            date_added: Utc::now().timestamp(),
            date_taken: media.date_taken,
            mime_type: media.mime_type.clone(),
        };
        let id = state.register(destination, entry);
        state.owned.insert(id);
        state.unannounced.push(id);
        debug!(media_id = %id, "Media inserted");
        Ok(id)
    }

    async fn resolve_consent(
        &self,
        handle: ConsentHandle,
        decision: ConsentDecision,
    ) -> Result<(), IndexError> {
        let mut state = self.state();
        let id = state
            .consents
            .remove(&handle)
            .ok_or(IndexError::UnknownConsent(handle))?;
        if decision == ConsentDecision::Granted {
            state.granted.insert(id);
        }
        info!(media_id = %id, ?decision, "Consent resolved");
        Ok(())
    }
}

/// Checks if a directory entry is hidden (starts with '.').
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|s| s.starts_with('.'))
}

/// Recursively lists image files under `root`, skipping hidden entries.
fn list_media_files(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry_result| match entry_result {
            Ok(entry) if entry.file_type().is_file() && mime_for(entry.path()).is_some() => {
                Some(Ok(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" | "heif" => "image/heic",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "dng" => "image/x-adobe-dng",
        _ => return None,
    };
    Some(mime)
}

/// Appends `_1`, `_2`, ... to the file stem until the path is free.
/// The file's own `current` path counts as free, so a suffixed file keeps its suffix.
fn unique_destination(wanted: PathBuf, current: Option<&Path>) -> PathBuf {
    let is_free = |candidate: &Path| Some(candidate) == current || !candidate.exists();
    if is_free(wanted.as_path()) {
        return wanted;
    }
    let stem = wanted
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = wanted
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let dir = wanted.parent().map(Path::to_path_buf).unwrap_or_default();
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|candidate| is_free(candidate.as_path()))
        .unwrap_or(wanted)
}
