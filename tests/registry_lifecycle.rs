use std::sync::Arc;

use screenperf::{
    metrics, AddOutcome, CollectingTransport, EngineConfig, FrameTiming, ManualClock,
    NetworkDescriptor, ScreenId, SessionRegistry, TransportError, TtfdMode, TtfdSource,
};
use screenperf_observe::metrics::counter_value;

fn registry_with(config: EngineConfig) -> (SessionRegistry, ManualClock, Arc<CollectingTransport>) {
    let clock = ManualClock::new(0.0);
    let transport = Arc::new(CollectingTransport::new());
    let registry =
        SessionRegistry::with_clock(config, transport.clone(), Arc::new(clock.clone()))
            .without_alarms();
    (registry, clock, transport)
}

fn registry() -> (SessionRegistry, ManualClock, Arc<CollectingTransport>) {
    registry_with(EngineConfig::default())
}

#[test]
fn restart_emits_previous_beacon_first() {
    let (registry, clock, transport) = registry();
    registry.start_tracking("home");
    clock.set(10.0);
    registry.on_frame_rendered(10.0);

    clock.set(50.0);
    let replaced = registry.start_tracking("home").expect("previous session flushed");
    assert_eq!(replaced.screen.as_str(), "home");
    assert_eq!(replaced.ttid, 10.0);
    assert_eq!(replaced.ttfd, 50.0);
    assert_eq!(replaced.ttfd_source, TtfdSource::Finalize);
    assert_eq!(transport.len(), 1);

    // The new session starts from scratch.
    let session = registry.session(&ScreenId::from("home")).unwrap();
    assert!(session.lock().display_timing().ttid_ms.is_none());
    assert_ne!(session.lock().visit_id(), replaced.visit_id);
    assert_eq!(registry.history(), vec![ScreenId::from("home")]);
}

#[test]
fn resume_with_empty_history_is_noop() {
    let (registry, _clock, transport) = registry();
    assert!(registry.resume_previous_screen().is_none());
    assert_eq!(registry.active_count(), 0);
    assert!(transport.is_empty());
}

#[test]
fn resume_restarts_top_of_history() {
    let (registry, clock, transport) = registry();
    registry.start_tracking("list");
    registry.start_tracking("detail");
    clock.set(100.0);
    registry.finalize_screen(&ScreenId::from("detail"));
    assert_eq!(registry.history(), vec![ScreenId::from("list")]);

    clock.set(120.0);
    let resumed = registry.resume_previous_screen();
    assert_eq!(resumed, Some(ScreenId::from("list")));
    // detail, then the first list session
    let screens: Vec<String> = transport
        .beacons()
        .iter()
        .map(|b| b.screen.to_string())
        .collect();
    assert_eq!(screens, ["detail", "list"]);
    assert!(registry.is_tracking(&ScreenId::from("list")));
    assert_eq!(registry.current_screen(), Some(ScreenId::from("list")));
}

#[test]
fn history_never_repeats_adjacent_entries() {
    let (registry, _clock, _transport) = registry();
    registry.start_tracking("a");
    registry.start_tracking("b");
    registry.start_tracking("b");
    registry.start_tracking("c");
    assert_eq!(
        registry.history(),
        vec![ScreenId::from("a"), ScreenId::from("b"), ScreenId::from("c")]
    );
    assert_eq!(registry.last_tracked_screen(), Some(ScreenId::from("b")));
    // Reading does not mutate.
    assert_eq!(registry.history().len(), 3);
}

#[test]
fn last_tracked_needs_two_entries() {
    let (registry, _clock, _transport) = registry();
    assert!(registry.last_tracked_screen().is_none());
    registry.start_tracking("only");
    assert!(registry.last_tracked_screen().is_none());
}

#[test]
fn finalize_of_unknown_screen_is_noop() {
    let (registry, _clock, transport) = registry();
    registry.start_tracking("home");
    assert!(registry.finalize_screen(&ScreenId::from("ghost")).is_none());
    assert!(transport.is_empty());
    assert_eq!(registry.history(), vec![ScreenId::from("home")]);
}

#[test]
fn finalize_only_pops_history_when_on_top() {
    let (registry, _clock, _transport) = registry();
    registry.start_tracking("a");
    registry.start_tracking("b");
    registry.finalize_screen(&ScreenId::from("a"));
    assert_eq!(
        registry.history(),
        vec![ScreenId::from("a"), ScreenId::from("b")]
    );
}

#[test]
fn network_follows_current_screen() {
    let (registry, clock, _transport) = registry();
    registry.start_tracking("feed");
    let outcome = registry.on_network_event(
        None,
        NetworkDescriptor::new("GET", "https://api.example.com/feed", 1.0).completed(200, 9.0),
    );
    assert_eq!(outcome, AddOutcome::Stored);

    registry.start_tracking("profile");
    registry.on_network_event(
        None,
        NetworkDescriptor::new("GET", "https://api.example.com/me", 10.0).completed(200, 20.0),
    );
    registry.on_network_event(
        Some(&ScreenId::from("feed")),
        NetworkDescriptor::new("POST", "https://api.example.com/like", 11.0).completed(204, 15.0),
    );

    clock.set(30.0);
    let feed = registry.finalize_screen(&ScreenId::from("feed")).unwrap();
    let urls: Vec<&str> = feed.network_requests.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        ["https://api.example.com/feed", "https://api.example.com/like"]
    );
    let profile = registry.finalize_screen(&ScreenId::from("profile")).unwrap();
    assert_eq!(profile.network_requests.len(), 1);
}

#[test]
fn late_network_events_after_finalize_are_dropped() {
    let (registry, _clock, _transport) = registry();
    let screen = ScreenId::from("cart");
    registry.start_tracking(screen.clone());
    registry.finalize_screen(&screen);

    let outcome = registry.on_network_event(
        Some(&screen),
        NetworkDescriptor::new("GET", "https://api.example.com/cart", 0.0),
    );
    assert_eq!(outcome, AddOutcome::DroppedUntracked);
    let outcome =
        registry.on_network_event(None, NetworkDescriptor::new("GET", "https://x.io", 0.0));
    assert_eq!(outcome, AddOutcome::DroppedNoCurrentScreen);
}

#[test]
fn network_buffer_is_capped_per_screen() {
    let mut config = EngineConfig::default();
    config.network.max_requests_per_screen = 150;
    let (registry, _clock, _transport) = registry_with(config);
    registry.start_tracking("gallery");
    let mut outcomes = Vec::new();
    for i in 0..151 {
        outcomes.push(registry.on_network_event(
            None,
            NetworkDescriptor::new("GET", format!("https://cdn.example.com/img/{i}"), i as f64),
        ));
    }
    assert_eq!(outcomes[149], AddOutcome::Stored);
    assert_eq!(outcomes[150], AddOutcome::DroppedCapacity);

    let beacon = registry
        .finalize_screen(&ScreenId::from("gallery"))
        .unwrap();
    assert_eq!(beacon.network_requests.len(), 150);
    assert_eq!(beacon.network_requests[0].url, "https://cdn.example.com/img/0");
    assert_eq!(
        beacon.network_requests[149].url,
        "https://cdn.example.com/img/149"
    );
}

#[test]
fn disposed_session_handles_stay_inert() {
    let (registry, clock, _transport) = registry();
    let screen = ScreenId::from("settings");
    registry.start_tracking(screen.clone());
    let handle = registry.session(&screen).unwrap();
    clock.set(40.0);
    registry.finalize_screen(&screen);

    let mut session = handle.lock();
    assert!(session.is_disposed());
    assert!(session.on_frame(FrameTiming::at(50.0)).is_none());
    assert!(session.on_user_interaction(60.0).is_none());
    assert!(session.finalize(70.0, Vec::new()).is_none());
}

#[test]
fn interactions_only_reach_the_current_screen() {
    let (registry, _clock, _transport) = registry();
    registry.start_tracking("background");
    registry.start_tracking("foreground");
    registry.on_frame_rendered(5.0);
    registry.on_user_interaction(20.0);

    let fg = registry.session(&ScreenId::from("foreground")).unwrap();
    let bg = registry.session(&ScreenId::from("background")).unwrap();
    assert_eq!(
        fg.lock().display_timing().ttfd_source,
        Some(TtfdSource::Interaction)
    );
    assert!(!bg.lock().display_timing().interacted);
    // Frames are broadcast to both.
    assert_eq!(bg.lock().display_timing().ttid_ms, Some(5.0));
}

#[test]
fn transport_failure_does_not_break_finalize() {
    let clock = ManualClock::new(0.0);
    let failing = Arc::new(|_: &screenperf::Beacon| -> Result<(), TransportError> {
        Err(TransportError::Unavailable("backend down".into()))
    });
    let registry = SessionRegistry::with_clock(
        EngineConfig::default(),
        failing,
        Arc::new(clock.clone()),
    );
    registry.start_tracking("home");
    clock.set(25.0);
    let beacon = registry.finalize_screen(&ScreenId::from("home"));
    assert!(beacon.is_some());
    assert!(!registry.is_tracking(&ScreenId::from("home")));
}

#[test]
fn manual_flag_survives_restart_until_disabled() {
    let (registry, clock, _transport) = registry();
    let upload = ScreenId::from("upload");
    registry.enable_manual_ttfd("upload");
    registry.start_tracking("upload");
    clock.set(300.0);
    registry.mark_fully_drawn(&upload);
    assert_eq!(registry.poll_manual_ttfd(), 1);

    clock.set(400.0);
    let first = registry.start_tracking("upload").unwrap();
    assert_eq!(first.ttfd_source, TtfdSource::Manual);
    assert_eq!(first.ttfd, 300.0);

    // The restarted visit is still manual.
    assert!(registry.is_manual_ttfd(&upload));
    assert_eq!(
        registry.session(&upload).unwrap().lock().mode(),
        TtfdMode::Manual
    );
    clock.set(480.0);
    registry.mark_fully_drawn(&upload);
    assert_eq!(registry.poll_manual_ttfd(), 1);
    let second = registry.finalize_screen(&upload).unwrap();
    assert_eq!(second.ttfd_source, TtfdSource::Manual);
    assert_eq!(second.ttfd, 80.0);

    // Withdrawn: the next visit is automatic and ignores the signal.
    assert!(registry.disable_manual_ttfd(&upload));
    assert!(!registry.disable_manual_ttfd(&upload));
    clock.set(500.0);
    registry.start_tracking("upload");
    registry.mark_fully_drawn(&upload);
    assert_eq!(registry.poll_manual_ttfd(), 0);
    clock.set(550.0);
    let third = registry.finalize_screen(&upload).unwrap();
    assert_eq!(third.ttfd_source, TtfdSource::Finalize);
    assert_eq!(third.ttfd, 50.0);
}

#[test]
fn resumed_manual_screen_waits_for_fully_drawn() {
    let (registry, clock, _transport) = registry();
    let upload = ScreenId::from("upload");
    registry.enable_manual_ttfd("upload");
    registry.start_tracking("upload");
    clock.set(50.0);
    registry.start_tracking("detail");
    clock.set(5_000.0);
    registry.finalize_screen(&ScreenId::from("detail")).unwrap();

    assert_eq!(registry.resume_previous_screen(), Some(upload.clone()));
    assert_eq!(
        registry.session(&upload).unwrap().lock().mode(),
        TtfdMode::Manual
    );
    clock.set(5_100.0);
    registry.mark_fully_drawn(&upload);
    assert_eq!(registry.poll_manual_ttfd(), 1);
    clock.set(9_900.0);
    let beacon = registry.finalize_screen(&upload).unwrap();
    assert_eq!(beacon.ttfd_source, TtfdSource::Manual);
    assert_eq!(beacon.ttfd, 100.0);
}

#[test]
fn captures_are_counted_per_source() {
    let labels = metrics::ttfd_labels(TtfdSource::Manual);
    let before = counter_value(metrics::TTFD_CAPTURES_TOTAL, labels.clone());

    let (registry, clock, _transport) = registry();
    registry.enable_manual_ttfd("receipt");
    registry.start_tracking("receipt");
    clock.set(120.0);
    registry.mark_fully_drawn(&ScreenId::from("receipt"));
    assert_eq!(registry.poll_manual_ttfd(), 1);

    let after = counter_value(metrics::TTFD_CAPTURES_TOTAL, labels);
    assert!(after > before);
}

#[test]
fn shutdown_flushes_every_session() {
    let (registry, _clock, transport) = registry();
    registry.start_tracking("a");
    registry.start_tracking("b");
    let beacons = registry.shutdown();
    assert_eq!(beacons.len(), 2);
    assert_eq!(transport.len(), 2);
    assert_eq!(registry.active_count(), 0);
    assert!(registry.is_shut_down());
}
