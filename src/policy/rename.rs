use super::PolicySettings;
use crate::capabilities::Capabilities;
use crate::place::{PlaceResolver, resolve_place_label};
use crate::structs::{GeoCoordinate, MediaRecord, PlaceLabel, RenameTarget};
use crate::time::resolve_capture_time;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

const DEFAULT_EXTENSION: &str = "jpg";

/// Text after the last `.` of a display name, or `jpg` when there is none.
pub fn extension_of(display_name: &str) -> &str {
    match display_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => DEFAULT_EXTENSION,
    }
}

/// Formats the new name and location from already resolved parts.
pub fn build_target(
    captured: NaiveDateTime,
    place: &PlaceLabel,
    display_name: &str,
    capabilities: &Capabilities,
) -> RenameTarget {
    let display_name = format!(
        "{}_{}.{}",
        captured.format("%Y%m%d_%H%M%S"),
        place,
        extension_of(display_name)
    );
    let relative_path = capabilities
        .relative_paths
        .then(|| captured.format("DCIM/Camera/%Y/%m/%d").to_string());
    RenameTarget {
        display_name,
        relative_path,
    }
}

/// Computes where a camera photo should live and what it should be called.
///
/// The resolver is only consulted when `coordinates` is present.
pub async fn compute_rename(
    record: &MediaRecord,
    coordinates: Option<GeoCoordinate>,
    resolver: &dyn PlaceResolver,
    settings: &PolicySettings,
    now: DateTime<Utc>,
) -> RenameTarget {
    let place = resolve_place_label(resolver, coordinates).await;
    let (captured, source) = resolve_capture_time(record, &settings.zone, now);
    debug!(media_id = %record.id, %place, ?source, "Resolved rename inputs");
    build_target(captured, &place, &record.display_name, &settings.capabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::Address;
    use crate::place::error::PlaceError;
    use crate::structs::MediaId;
    use crate::time::NamingZone;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use regex::Regex;

    struct Paris;

    #[async_trait]
    impl PlaceResolver for Paris {
        async fn lookup(&self, _: GeoCoordinate, _: usize) -> Result<Vec<Address>, PlaceError> {
            Ok(vec![Address {
                locality: Some("Paris".into()),
                country_name: Some("France".into()),
            }])
        }
    }

    fn captured() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        assert_eq!(extension_of("IMG_1.HEIC"), "HEIC");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("no_extension"), "jpg");
        assert_eq!(extension_of("trailing."), "jpg");
    }

    #[test]
    fn test_build_target_with_relative_paths() {
        let target = build_target(
            captured(),
            &PlaceLabel::Resolved("Paris_France".into()),
            "IMG_1.jpg",
            &Capabilities::for_platform_level(34),
        );
        assert_eq!(target.display_name, "20240305_143000_Paris_France.jpg");
        assert_eq!(target.relative_path.as_deref(), Some("DCIM/Camera/2024/03/05"));
    }

    #[test]
    fn test_build_target_legacy_keeps_location() {
        let target = build_target(
            captured(),
            &PlaceLabel::NoGeo,
            "IMG_1",
            &Capabilities::for_platform_level(28),
        );
        assert_eq!(target.display_name, "20240305_143000_NoGeo.jpg");
        assert_eq!(target.relative_path, None);
    }

    #[test]
    fn test_names_always_match_pattern() {
        let pattern = Regex::new(r"^\d{8}_\d{6}_.+\.[^.]+$").unwrap();
        let labels = [
            PlaceLabel::Resolved("Paris_France".into()),
            PlaceLabel::Unknown,
            PlaceLabel::NoGeo,
        ];
        for label in &labels {
            for name in ["a.jpg", "b", "c.", ".hidden", "d.e.png"] {
                let target =
                    build_target(captured(), label, name, &Capabilities::for_platform_level(34));
                assert!(pattern.is_match(&target.display_name), "{}", target.display_name);
            }
        }
    }

    #[tokio::test]
    async fn test_compute_rename_uses_zone_for_capture_time() {
        let settings = PolicySettings::builder()
            .capabilities(Capabilities::for_platform_level(34))
            .zone(NamingZone::Named(chrono_tz::Europe::Paris))
            .build();
        let taken = Utc.with_ymd_and_hms(2024, 3, 5, 13, 30, 0).unwrap();
        let record = MediaRecord {
            id: MediaId(7),
            display_name: "IMG_7.jpg".into(),
            bucket: Some("Camera".into()),
            date_taken: Some(taken.timestamp_millis()),
            date_added: taken.timestamp(),
            relative_path: Some("DCIM/Camera/".into()),
            absolute_path: None,
            mime_type: Some("image/jpeg".into()),
        };
        let coordinates = Some(GeoCoordinate {
            latitude: 48.8566,
            longitude: 2.3522,
        });

        let target = compute_rename(&record, coordinates, &Paris, &settings, taken).await;
        assert_eq!(target.display_name, "20240305_143000_Paris_France.jpg");
        assert_eq!(target.relative_path.as_deref(), Some("DCIM/Camera/2024/03/05"));
    }

    #[tokio::test]
    async fn test_recomputing_is_stable() {
        let settings = PolicySettings::builder()
            .capabilities(Capabilities::for_platform_level(34))
            .zone(NamingZone::Named(chrono_tz::UTC))
            .build();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let record = MediaRecord {
            id: MediaId(1),
            display_name: "20240305_143000_Paris_France.jpg".into(),
            bucket: Some("2024".into()),
            date_taken: Some(now.timestamp_millis()),
            date_added: now.timestamp(),
            relative_path: Some("DCIM/Camera/2024/03/05/".into()),
            absolute_path: None,
            mime_type: None,
        };
        let later = now + chrono::Duration::hours(1);
        let target = compute_rename(&record, None, &Paris, &settings, later).await;
        assert_eq!(target.display_name, "20240305_143000_NoGeo.jpg");

        let coordinates = Some(GeoCoordinate {
            latitude: 48.8566,
            longitude: 2.3522,
        });
        let target = compute_rename(&record, coordinates, &Paris, &settings, later).await;
        assert_eq!(target.display_name, record.display_name);
    }
}
