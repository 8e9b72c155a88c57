use super::PolicySettings;
use crate::structs::MediaRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Folder labels cameras write into.
pub const CAMERA_FOLDERS: [&str; 5] = ["Camera", "DCIM", "100ANDRO", "100MEDIA", "OpenCamera"];

/// The first rule that classified a record as a camera photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CameraEvidence {
    Bucket,
    RelativePath,
    AbsolutePath,
    /// Captured within the configured window of now.
    RecentCapture,
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Runs the classification cascade. First match wins.
pub fn classify(
    record: &MediaRecord,
    settings: &PolicySettings,
    now: DateTime<Utc>,
) -> Option<CameraEvidence> {
    if let Some(bucket) = &record.bucket
        && CAMERA_FOLDERS
            .iter()
            .any(|folder| contains_ignore_case(bucket, folder))
    {
        return Some(CameraEvidence::Bucket);
    }

    if settings.capabilities.relative_paths
        && let Some(relative) = &record.relative_path
        && contains_ignore_case(relative, "DCIM")
    {
        return Some(CameraEvidence::RelativePath);
    }

    if let Some(absolute) = &record.absolute_path
        && (contains_ignore_case(absolute, "DCIM") || contains_ignore_case(absolute, "Camera"))
    {
        return Some(CameraEvidence::AbsolutePath);
    }

    let window = i64::try_from(settings.camera_window.as_millis()).unwrap_or(i64::MAX);
    if let Some(taken) = record.date_taken
        && (now.timestamp_millis() - taken).abs() <= window
    {
        return Some(CameraEvidence::RecentCapture);
    }

    None
}

pub fn is_camera_photo(
    record: &MediaRecord,
    settings: &PolicySettings,
    now: DateTime<Utc>,
) -> bool {
    classify(record, settings, now).is_some()
}
