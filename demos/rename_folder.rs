use chrono::NaiveDate;
use photo_renamer::capabilities::Capabilities;
use photo_renamer::index::{FsMediaIndex, MediaIndex};
use photo_renamer::metadata::{ExifReader, jpeg_with_metadata};
use photo_renamer::pipeline::{PipelineOutcome, RenamePipeline};
use photo_renamer::place::OfflineResolver;
use photo_renamer::policy::PolicySettings;
use photo_renamer::relay::{LogNotifier, PendingRequests, PermissionRelay};
use photo_renamer::structs::{ConsentDecision, GeoCoordinate, NewMedia};
use photo_renamer::time::NamingZone;
use std::path::PathBuf;
use std::sync::Arc;

/// Fills a folder with a few camera shots and renames them, including one that needs consent.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let root = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "demo_library".into()));
    let capabilities = Capabilities::for_platform_level(34);
    let zone = NamingZone::Named(chrono_tz::Europe::Paris);
    let index = Arc::new(
        FsMediaIndex::builder()
            .root(root.clone())
            .capabilities(capabilities)
            .zone(zone)
            .build(),
    );

    let taken = NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(14, 30, 0))
        .ok_or_else(|| color_eyre::eyre::eyre!("invalid demo date"))?;
    let paris = GeoCoordinate {
        latitude: 48.8566,
        longitude: 2.3522,
    };

    // Created by this process, so no consent is needed.
    let owned = index
        .insert(
            &NewMedia {
                display_name: "IMG_0001.jpg".into(),
                mime_type: "image/jpeg".into(),
                date_taken: zone.instant(taken).map(|t| t.timestamp_millis()),
                relative_path: Some("DCIM/Camera".into()),
            },
            &jpeg_with_metadata(Some(paris), Some(taken))?,
        )
        .await?;

    // Written by "another app": renaming it needs the user's consent.
    let foreign_dir = root.join("DCIM/Camera");
    std::fs::create_dir_all(&foreign_dir)?;
    std::fs::write(
        foreign_dir.join("IMG_0002.jpg"),
        jpeg_with_metadata(None, Some(taken))?,
    )?;

    let ids = index.scan()?;
    println!("Found {} new photos ({} inserted)", ids.len(), owned);

    let relay = Arc::new(PermissionRelay::new(
        Arc::new(PendingRequests::new()),
        Arc::new(LogNotifier),
        index.clone(),
    ));
    let pipeline = RenamePipeline::builder()
        .index(index.clone())
        .reader(Arc::new(ExifReader::new()))
        .resolver(Arc::new(OfflineResolver::new()))
        .relay(relay.clone())
        .settings(
            PolicySettings::builder()
                .capabilities(capabilities)
                .zone(zone)
                .build(),
        )
        .build();

    for id in ids {
        let outcome = pipeline.process(id).await;
        println!("{id}: {outcome:?}");

        if let PipelineOutcome::AwaitingConsent { media_id, .. } = outcome {
            println!("\tUser taps the notification and allows the rename");
            let consent = relay
                .relay_decision(media_id, ConsentDecision::Granted)
                .await?;
            let retried = pipeline.retry(consent.request()).await;
            println!("\t{media_id}: {retried:?}");
        }
    }

    for record in index.recent(10).await? {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    Ok(())
}
