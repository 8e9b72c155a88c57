use color_eyre::eyre::{WrapErr, eyre};
use photo_renamer::capabilities::DirectoryEntitlements;
use photo_renamer::index::FsMediaIndex;
use photo_renamer::metadata::ExifReader;
use photo_renamer::pipeline::PipelineOutcome;
use photo_renamer::relay::{LogNotifier, PendingRequests, PermissionRelay};
use photo_renamer::structs::ConsentDecision;
use photo_renamer::watcher::PollingWatcher;
use photo_renamer::{Config, ForegroundController, RenamePipeline};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_renamer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if !config.root.is_dir() {
        return Err(eyre!("{} is not a directory", config.root.display()));
    }
    let capabilities = config.capabilities();
    info!(root = %config.root.display(), ?capabilities, geocoder = ?config.geocoder, "Starting photo renamer");

    let index = Arc::new(
        FsMediaIndex::builder()
            .root(config.root.clone())
            .capabilities(capabilities)
            .protected(config.protected)
            .zone(config.zone)
            .build(),
    );
    let relay = Arc::new(PermissionRelay::new(
        Arc::new(PendingRequests::new()),
        Arc::new(LogNotifier),
        index.clone(),
    ));
    let pipeline = RenamePipeline::builder()
        .index(index.clone())
        .reader(Arc::new(ExifReader::new()))
        .resolver(config.place_resolver().wrap_err("Could not set up the geocoder")?)
        .relay(relay)
        .settings(config.policy_settings())
        .build();

    let controller = ForegroundController::builder()
        .capabilities(capabilities)
        .entitlements(Arc::new(DirectoryEntitlements::new(&config.root)))
        .source(Arc::new(PollingWatcher::new(index, config.poll_interval)))
        .pipeline(Arc::new(pipeline))
        .queue_config(config.queue_config())
        .retry_after_consent(config.retry_after_consent)
        .build();

    let mut events = controller.events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PipelineOutcome::AwaitingConsent { media_id, .. }) => info!(
                    %media_id,
                    "Waiting for consent. Type `allow <link>` or `deny <link>` to answer"
                ),
                Ok(outcome) => info!(?outcome, "Pipeline finished"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped pipeline events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    controller.start().await?;

    // Consent prompts are answered on stdin with the deep link from the notification.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed, keep observing until interrupted.
                    tokio::signal::ctrl_c().await?;
                    break;
                };
                answer(&controller, line.trim()).await;
            }
        }
    }

    info!("Shutting down");
    controller.stop().await;
    Ok(())
}

async fn answer(controller: &ForegroundController, line: &str) {
    let (decision, link) = match line.split_once(' ') {
        Some(("allow", link)) => (ConsentDecision::Granted, link.trim()),
        Some(("deny", link)) => (ConsentDecision::Denied, link.trim()),
        _ if line == "pending" => {
            match controller.inspect_pending() {
                Some(pending) => info!(
                    media_id = %pending.request.media_id,
                    age_secs = pending.age.num_seconds(),
                    target = %pending.request.target.display_name,
                    "Pending request cleared"
                ),
                None => info!("No pending requests"),
            }
            return;
        }
        _ if line == "rescan" => {
            let queued = controller.trigger_rescan().await;
            info!(queued, "Rescan requested");
            return;
        }
        _ => {
            warn!(%line, "Expected `allow <link>`, `deny <link>`, `pending` or `rescan`");
            return;
        }
    };
    match controller.handle_deep_link(link, decision).await {
        Ok(relayed) => info!(retried = ?relayed.retried, "Consent relayed"),
        Err(e) => warn!(error = %e, "Could not relay consent"),
    }
}
