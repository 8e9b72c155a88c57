//! Module for deciding which wall clock time a photo was captured at.
mod capture;
pub mod filename_parsing;
pub mod parsing;

pub use capture::{CaptureTimeSource, resolve_capture_time};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Time zone new file names are formatted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingZone {
    /// The host's local time zone.
    #[default]
    Local,
    Named(Tz),
}

impl NamingZone {
    /// Converts an instant into the wall clock time shown in this zone.
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => instant.with_timezone(&Local).naive_local(),
            Self::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Interprets a wall clock time in this zone. Ambiguous times resolve to the earlier instant.
    pub fn instant(&self, wall_clock: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Local => Local
                .from_local_datetime(&wall_clock)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Named(tz) => tz
                .from_local_datetime(&wall_clock)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
