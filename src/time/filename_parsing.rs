use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use super::NamingZone;

static RE_YYYYMMDD_HHMMSS: OnceLock<Regex> = OnceLock::new();
static RE_YYYY_MM_DD_HH_MM_SS: OnceLock<Regex> = OnceLock::new();
static RE_UNIX_MS: OnceLock<Regex> = OnceLock::new();

/// Recovers a capture time from common camera file naming schemes
/// (`IMG_20240305_143000.jpg`, `2024-03-05_14-30-00.jpg`, `1709649000000.jpg`).
pub fn parse_datetime_from_filename(filename: &str, zone: &NamingZone) -> Option<NaiveDateTime> {
    // --- Attempt 1: Standard YYYYMMDD_HHMMSS format ---
    let re1 = RE_YYYYMMDD_HHMMSS.get_or_init(|| Regex::new(r"(\d{8})_(\d{6})").unwrap());
    if let Some(caps) = re1.captures(filename) {
        let datetime_str = format!("{}{}", &caps[1], &caps[2]);
        if let Ok(dt) = NaiveDateTime::parse_from_str(&datetime_str, "%Y%m%d%H%M%S") {
            return Some(dt);
        }
    }

    // --- Attempt 2: Hyphenated YYYY-MM-DD_HH-MM-SS format ---
    let re2 = RE_YYYY_MM_DD_HH_MM_SS
        .get_or_init(|| Regex::new(r"(\d{4}-\d{2}-\d{2})_(\d{2}-\d{2}-\d{2})").unwrap());
    if let Some(caps) = re2.captures(filename) {
        let datetime_str = format!("{} {}", &caps[1], &caps[2]);
        if let Ok(dt) = NaiveDateTime::parse_from_str(&datetime_str, "%Y-%m-%d %H-%M-%S") {
            return Some(dt);
        }
    }

    // --- Attempt 3: Unix Millisecond Timestamp format ---
    let re3 = RE_UNIX_MS.get_or_init(|| Regex::new(r"^(\d{13})\.").unwrap());
    if let Some(caps) = re3.captures(filename)
        && let Ok(ms) = caps[1].parse::<i64>()
        && let Some(utc) = DateTime::from_timestamp_millis(ms)
    {
        return Some(zone.wall_clock(utc));
    }

    None
}
