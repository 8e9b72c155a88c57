use super::NamingZone;
use super::filename_parsing::parse_datetime_from_filename;
use crate::structs::MediaRecord;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the capture time used for naming came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CaptureTimeSource {
    DateTaken,
    FileName,
    DateAdded,
    Now,
}

/// Picks the wall clock capture time of a record.
///
/// Order: the index's `date_taken`, a timestamp embedded in the display name,
/// the index's `date_added`, and finally `now`.
pub fn resolve_capture_time(
    record: &MediaRecord,
    zone: &NamingZone,
    now: DateTime<Utc>,
) -> (NaiveDateTime, CaptureTimeSource) {
    if let Some(utc) = record
        .date_taken
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    {
        return (zone.wall_clock(utc), CaptureTimeSource::DateTaken);
    }
    if let Some(naive) = parse_datetime_from_filename(&record.display_name, zone) {
        return (naive, CaptureTimeSource::FileName);
    }
    if record.date_added > 0
        && let Some(utc) = DateTime::<Utc>::from_timestamp(record.date_added, 0)
    {
        return (zone.wall_clock(utc), CaptureTimeSource::DateAdded);
    }
    (zone.wall_clock(now), CaptureTimeSource::Now)
}
