//! Service configuration, read from the environment (and a `.env` file in the binary).
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PHOTO_RENAMER_ROOT` | required |
//! | `PHOTO_RENAMER_PLATFORM_LEVEL` | `34` |
//! | `PHOTO_RENAMER_CAMERA_WINDOW_SECS` | `5` |
//! | `PHOTO_RENAMER_POLL_INTERVAL_MS` | `5000` |
//! | `PHOTO_RENAMER_QUEUE_CAPACITY` | `64` |
//! | `PHOTO_RENAMER_MAX_CONCURRENT` | `4` |
//! | `PHOTO_RENAMER_RETRY_AFTER_CONSENT` | `true` |
//! | `PHOTO_RENAMER_TIMEZONE` | host local time |
//! | `PHOTO_RENAMER_GEOCODER` | `offline` |
//! | `PHOTO_RENAMER_NOMINATIM_URL` | `https://nominatim.openstreetmap.org` |
//! | `PHOTO_RENAMER_PROTECTED` | `true` |

use crate::capabilities::Capabilities;
use crate::place::error::PlaceError;
use crate::place::nominatim::DEFAULT_NOMINATIM_URL;
use crate::place::{NominatimResolver, OfflineResolver, PlaceResolver};
use crate::policy::{DEFAULT_CAMERA_WINDOW, PolicySettings};
use crate::queue::{DEFAULT_MAX_CONCURRENT, DEFAULT_QUEUE_CAPACITY, QueueConfig};
use crate::time::NamingZone;
use crate::watcher::DEFAULT_POLL_INTERVAL;
use bon::Builder;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PLATFORM_LEVEL: u32 = 34;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required variable {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderKind {
    /// Bundled GeoNames table.
    #[default]
    Offline,
    Nominatim,
}

impl FromStr for GeocoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "nominatim" => Ok(Self::Nominatim),
            other => Err(format!("unknown geocoder '{other}', expected offline or nominatim")),
        }
    }
}

#[derive(Debug, Clone, Builder)]
pub struct Config {
    #[builder(into)]
    pub root: PathBuf,
    #[builder(default = DEFAULT_PLATFORM_LEVEL)]
    pub platform_level: u32,
    #[builder(default = DEFAULT_CAMERA_WINDOW)]
    pub camera_window: Duration,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    #[builder(default = DEFAULT_MAX_CONCURRENT)]
    pub max_concurrent: usize,
    #[builder(default = true)]
    pub retry_after_consent: bool,
    #[builder(default)]
    pub zone: NamingZone,
    #[builder(default)]
    pub geocoder: GeocoderKind,
    #[builder(into, default = DEFAULT_NOMINATIM_URL.to_string())]
    pub nominatim_url: String,
    /// Require consent before renaming files this service did not create.
    #[builder(default = true)]
    pub protected: bool,
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads variables through `lookup`. Unset and blank values take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let root = get("PHOTO_RENAMER_ROOT").ok_or(ConfigError::Missing("PHOTO_RENAMER_ROOT"))?;
        let platform_level: u32 = parse_or(
            &get,
            "PHOTO_RENAMER_PLATFORM_LEVEL",
            DEFAULT_PLATFORM_LEVEL,
        )?;
        let camera_window_secs: u64 = parse_or(
            &get,
            "PHOTO_RENAMER_CAMERA_WINDOW_SECS",
            DEFAULT_CAMERA_WINDOW.as_secs(),
        )?;
        let poll_interval_ms: u64 = parse_or(
            &get,
            "PHOTO_RENAMER_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?;
        let queue_capacity: usize =
            parse_or(&get, "PHOTO_RENAMER_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        let max_concurrent: usize =
            parse_or(&get, "PHOTO_RENAMER_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT)?;
        let retry_after_consent = parse_flag(&get, "PHOTO_RENAMER_RETRY_AFTER_CONSENT", true)?;
        let protected = parse_flag(&get, "PHOTO_RENAMER_PROTECTED", true)?;
        let geocoder: GeocoderKind =
            parse_or(&get, "PHOTO_RENAMER_GEOCODER", GeocoderKind::Offline)?;

        let zone = match get("PHOTO_RENAMER_TIMEZONE") {
            Some(name) => NamingZone::Named(name.trim().parse::<Tz>().map_err(|e| {
                ConfigError::Invalid {
                    key: "PHOTO_RENAMER_TIMEZONE",
                    value: name.clone(),
                    reason: e.to_string(),
                }
            })?),
            None => NamingZone::Local,
        };

        if queue_capacity == 0 || max_concurrent == 0 {
            let (key, value) = if queue_capacity == 0 {
                ("PHOTO_RENAMER_QUEUE_CAPACITY", queue_capacity)
            } else {
                ("PHOTO_RENAMER_MAX_CONCURRENT", max_concurrent)
            };
            return Err(ConfigError::Invalid {
                key,
                value: value.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self::builder()
            .root(root)
            .platform_level(platform_level)
            .camera_window(Duration::from_secs(camera_window_secs))
            .poll_interval(Duration::from_millis(poll_interval_ms))
            .queue_capacity(queue_capacity)
            .max_concurrent(max_concurrent)
            .retry_after_consent(retry_after_consent)
            .zone(zone)
            .geocoder(geocoder)
            .maybe_nominatim_url(get("PHOTO_RENAMER_NOMINATIM_URL"))
            .protected(protected)
            .build())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_platform_level(self.platform_level)
    }

    pub fn policy_settings(&self) -> PolicySettings {
        PolicySettings::builder()
            .capabilities(self.capabilities())
            .camera_window(self.camera_window)
            .zone(self.zone)
            .build()
    }

    /// Builds the configured reverse geocoder.
    pub fn place_resolver(&self) -> Result<Arc<dyn PlaceResolver>, PlaceError> {
        let resolver: Arc<dyn PlaceResolver> = match self.geocoder {
            GeocoderKind::Offline => Arc::new(OfflineResolver::new()),
            GeocoderKind::Nominatim => Arc::new(NominatimResolver::new(&self.nominatim_url)?),
        };
        Ok(resolver)
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
            max_concurrent: self.max_concurrent,
        }
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_flag(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match get(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected true or false".to_string(),
            }),
        },
        None => Ok(default),
    }
}
