//! Integration tests for the foreground controller lifecycle and consent relay.

mod common;

use common::*;
use photo_renamer::capabilities::{Capabilities, Permission, StaticEntitlements};
use photo_renamer::controller::{ControllerError, ControllerState, ForegroundController};
use photo_renamer::pipeline::PipelineOutcome;
use photo_renamer::relay::error::RelayError;
use photo_renamer::relay::{Channel, ConsentOutcome};
use photo_renamer::structs::{ChangeEvent, ConsentDecision, MediaId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn controller(
    h: &Harness,
    source: Arc<ManualSource>,
    entitlements: StaticEntitlements,
    retry_after_consent: bool,
) -> ForegroundController {
    ForegroundController::builder()
        .capabilities(Capabilities::for_platform_level(34))
        .entitlements(Arc::new(entitlements))
        .source(source)
        .pipeline(h.pipeline.clone())
        .retry_after_consent(retry_after_consent)
        .build()
}

async fn next_outcome(events: &mut broadcast::Receiver<PipelineOutcome>) -> PipelineOutcome {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no pipeline outcome in time")
        .expect("event bus closed")
}

#[tokio::test]
async fn refuses_to_start_without_permissions() {
    let h = harness(MemoryIndex::default(), None, CountingResolver::paris(), 34);
    let source = Arc::new(ManualSource::default());
    let controller = controller(
        &h,
        source.clone(),
        StaticEntitlements::from_iter([Permission::ReadMediaImages]),
        true,
    );

    let result = controller.start().await;

    assert!(matches!(
        result,
        Err(ControllerError::MissingPermissions(missing)) if missing == vec![Permission::PostNotifications]
    ));
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert!(!source.is_subscribed());
    assert!(h.notifier.published().is_empty());
}

#[tokio::test]
async fn start_and_stop_walk_the_state_machine() {
    let h = harness(MemoryIndex::default(), None, CountingResolver::paris(), 34);
    let source = Arc::new(ManualSource::default());
    let controller = controller(&h, source.clone(), StaticEntitlements::all(), true);
    let mut states = controller.watch_state();
    assert_eq!(*states.borrow_and_update(), ControllerState::Stopped);

    controller.start().await.unwrap();

    assert_eq!(controller.state(), ControllerState::Observing);
    assert!(states.has_changed().unwrap());
    assert!(source.is_subscribed());
    assert_eq!(
        *h.notifier.channels.lock().unwrap(),
        vec![Channel::Service, Channel::Permission]
    );
    let service = h.notifier.on_channel(Channel::Service);
    assert_eq!(service.len(), 1);
    assert_eq!(service[0].title, "Photo Rename Service Running");

    assert!(matches!(
        controller.start().await,
        Err(ControllerError::AlreadyRunning(ControllerState::Observing))
    ));

    controller.stop().await;
    assert_eq!(controller.state(), ControllerState::Stopped);
    assert!(!source.is_subscribed());

    // Stopping twice is harmless, and the service can start again.
    controller.stop().await;
    controller.start().await.unwrap();
    assert_eq!(controller.state(), ControllerState::Observing);
    controller.stop().await;
}

#[tokio::test]
async fn failed_subscription_leaves_the_service_stopped() {
    let h = harness(MemoryIndex::default(), None, CountingResolver::paris(), 34);
    let source = Arc::new(ManualSource::default());
    *source.fail.lock().unwrap() = true;
    let controller = controller(&h, source, StaticEntitlements::all(), true);

    assert!(matches!(
        controller.start().await,
        Err(ControllerError::Subscribe(_))
    ));
    assert_eq!(controller.state(), ControllerState::Stopped);
}

#[tokio::test]
async fn change_events_flow_through_the_queue() {
    let h = harness(
        MemoryIndex::with_records([camera_record(1)]),
        Some(paris()),
        CountingResolver::paris(),
        34,
    );
    let source = Arc::new(ManualSource::default());
    let controller = controller(&h, source.clone(), StaticEntitlements::all(), true);
    let mut events = controller.events();
    controller.start().await.unwrap();

    source.emit(ChangeEvent::for_media(MediaId(1))).await;

    let outcome = next_outcome(&mut events).await;
    assert!(matches!(outcome, PipelineOutcome::Renamed { media_id: MediaId(1), .. }));
    assert_eq!(
        h.index.record(MediaId(1)).unwrap().display_name,
        "20240305_143000_Paris_France.jpg"
    );
    controller.stop().await;
}

#[tokio::test]
async fn deep_link_consent_retries_the_rename() {
    let h = harness(
        MemoryIndex::with_records([camera_record(1)]),
        Some(paris()),
        CountingResolver::paris(),
        34,
    );
    h.index.protect(MediaId(1));
    let source = Arc::new(ManualSource::default());
    let controller = controller(&h, source.clone(), StaticEntitlements::all(), true);
    let mut events = controller.events();
    controller.start().await.unwrap();

    source.emit(ChangeEvent::for_media(MediaId(1))).await;
    assert!(matches!(
        next_outcome(&mut events).await,
        PipelineOutcome::AwaitingConsent { .. }
    ));

    let prompt = h.notifier.on_channel(Channel::Permission).remove(0);
    let link = prompt.deep_link.unwrap();
    let relayed = controller
        .handle_deep_link(&link, ConsentDecision::Granted)
        .await
        .unwrap();

    assert!(matches!(relayed.outcome, ConsentOutcome::Granted(_)));
    assert!(matches!(
        relayed.retried,
        Some(PipelineOutcome::Renamed { media_id: MediaId(1), .. })
    ));
    assert!(matches!(
        next_outcome(&mut events).await,
        PipelineOutcome::Renamed { .. }
    ));
    assert!(h.pending.is_empty());
    controller.stop().await;
}

#[tokio::test]
async fn retry_can_be_switched_off() {
    let h = harness(
        MemoryIndex::with_records([camera_record(1)]),
        None,
        CountingResolver::paris(),
        34,
    );
    h.index.protect(MediaId(1));
    h.pipeline.process(MediaId(1)).await;
    let controller = controller(
        &h,
        Arc::new(ManualSource::default()),
        StaticEntitlements::all(),
        false,
    );

    let relayed = controller
        .relay_decision(MediaId(1), ConsentDecision::Granted)
        .await
        .unwrap();

    assert!(matches!(relayed.outcome, ConsentOutcome::Granted(_)));
    assert_eq!(relayed.retried, None);
    assert_eq!(h.index.record(MediaId(1)).unwrap().display_name, "IMG_0001.jpg");
}

#[tokio::test]
async fn unknown_deep_links_and_ids_are_errors() {
    let h = harness(MemoryIndex::default(), None, CountingResolver::paris(), 34);
    let controller = controller(
        &h,
        Arc::new(ManualSource::default()),
        StaticEntitlements::all(),
        true,
    );

    assert!(matches!(
        controller
            .handle_deep_link("https://example.com", ConsentDecision::Granted)
            .await,
        Err(ControllerError::Relay(RelayError::InvalidDeepLink(_)))
    ));
    assert!(matches!(
        controller
            .handle_deep_link(
                "photo-renamer://request-permission?media=7",
                ConsentDecision::Granted
            )
            .await,
        Err(ControllerError::Relay(RelayError::NoPendingRequest(MediaId(7))))
    ));
}

#[tokio::test]
async fn inspecting_pending_requests_clears_them() {
    let h = harness(
        MemoryIndex::with_records([camera_record(1), camera_record(2)]),
        None,
        CountingResolver::paris(),
        34,
    );
    h.index.protect(MediaId(1));
    h.index.protect(MediaId(2));
    h.pipeline.process(MediaId(1)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.pipeline.process(MediaId(2)).await;
    let controller = controller(
        &h,
        Arc::new(ManualSource::default()),
        StaticEntitlements::all(),
        true,
    );

    let inspection = controller.inspect_pending().unwrap();

    assert_eq!(inspection.request.media_id, MediaId(2));
    assert!(inspection.age >= chrono::Duration::zero());
    assert!(controller.inspect_pending().is_none());
    assert!(h.pending.is_empty());
}

#[tokio::test]
async fn rescan_needs_a_running_service() {
    let h = harness(MemoryIndex::default(), None, CountingResolver::paris(), 34);
    let controller = controller(
        &h,
        Arc::new(ManualSource::default()),
        StaticEntitlements::all(),
        true,
    );
    let mut events = controller.events();

    assert!(!controller.trigger_rescan().await);

    controller.start().await.unwrap();
    assert!(controller.trigger_rescan().await);
    assert!(matches!(
        next_outcome(&mut events).await,
        PipelineOutcome::Skipped { media_id: None, .. }
    ));
    controller.stop().await;
}
