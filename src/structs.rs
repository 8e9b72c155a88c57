use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle into the shared media index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media:{}", self.0)
    }
}

/// One row of the media index, as seen by the rename pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    pub display_name: String,
    /// Folder label, e.g. "Camera".
    pub bucket: Option<String>,
    /// Capture time in epoch milliseconds.
    pub date_taken: Option<i64>,
    /// Time the record entered the index, in epoch seconds.
    pub date_added: i64,
    /// Folder relative to the storage root with a trailing slash, e.g. "DCIM/Camera/".
    /// Only populated when the platform exposes relative paths.
    pub relative_path: Option<String>,
    /// Legacy absolute path of the file.
    pub absolute_path: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Place component of a new file name. Exactly one form is produced per rename attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum PlaceLabel {
    /// Locality and/or country joined with `_`, whitespace removed.
    Resolved(String),
    /// The lookup failed or returned nothing usable.
    Unknown,
    /// The image carries no coordinates.
    NoGeo,
}

impl PlaceLabel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Resolved(label) => label,
            Self::Unknown => "Unknown",
            Self::NoGeo => "NoGeo",
        }
    }
}

impl fmt::Display for PlaceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTarget {
    pub display_name: String,
    /// `DCIM/Camera/YYYY/MM/DD`, only set when the platform supports relative paths.
    pub relative_path: Option<String>,
}

/// Attribute changes sent to [`crate::index::MediaIndex::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaUpdate {
    pub display_name: Option<String>,
    pub relative_path: Option<String>,
}

impl From<&RenameTarget> for MediaUpdate {
    fn from(target: &RenameTarget) -> Self {
        Self {
            display_name: Some(target.display_name.clone()),
            relative_path: target.relative_path.clone(),
        }
    }
}

/// Attributes for a record created through [`crate::index::MediaIndex::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedia {
    pub display_name: String,
    pub mime_type: String,
    pub date_taken: Option<i64>,
    pub relative_path: Option<String>,
}

/// Token the index hands out when an update needs the user's approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ConsentHandle(pub Uuid);

impl ConsentHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConsentHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consent:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConsentDecision {
    Granted,
    Denied,
}

/// Result of a single index update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Number of rows changed. Zero is possible and is not an error.
    Updated(u64),
    /// The platform needs the user to approve the change first.
    NeedsConsent(ConsentHandle),
    Failed(String),
}

/// A change notification from the media index, optionally naming the changed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub id: Option<MediaId>,
}

impl ChangeEvent {
    pub fn for_media(id: MediaId) -> Self {
        Self { id: Some(id) }
    }

    pub fn unspecified() -> Self {
        Self { id: None }
    }
}
