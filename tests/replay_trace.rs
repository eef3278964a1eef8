use screenperf::{parse_trace, replay, EngineConfig, TtfdSource};

const TRACE: &str = include_str!("fixtures/checkout_trace.jsonl");

#[test]
fn fixture_replays_into_three_beacons() {
    let events = parse_trace(TRACE).unwrap();
    assert_eq!(events.len(), 12);

    let beacons = replay(&events, EngineConfig::default());
    let screens: Vec<&str> = beacons.iter().map(|b| b.screen.as_str()).collect();
    assert_eq!(screens, ["checkout", "home", "home"]);

    let checkout = &beacons[0];
    assert_eq!(checkout.ttid, 16.0);
    assert_eq!(checkout.ttfd, 200.0);
    assert_eq!(checkout.ttfd_source, TtfdSource::Manual);
    assert!(checkout.network_requests.is_empty());

    let first_home = &beacons[1];
    assert_eq!(first_home.ttid, 12.0);
    assert_eq!(first_home.ttfd, 36.0);
    assert_eq!(first_home.ttfd_source, TtfdSource::StableFrames);
    assert_eq!(first_home.frame_summary.total_frames, 4);
    assert_eq!(first_home.frame_summary.janky_frames, 1);
    assert_eq!(first_home.network_requests.len(), 1);
    assert_eq!(first_home.network_requests[0].status_code, Some(200));

    let resumed_home = &beacons[2];
    assert_eq!(resumed_home.ttid, -1.0);
    assert_eq!(resumed_home.ttfd, 90.0);
    assert_eq!(resumed_home.ttfd_source, TtfdSource::Finalize);
    assert_eq!(resumed_home.frame_summary.total_frames, 0);
}

#[test]
fn unfinished_screens_are_flushed_at_the_end() {
    let events = parse_trace(
        r#"{"event":"start","at_ms":0,"screen":"search"}
{"event":"frame","at_ms":5}
{"event":"interaction","at_ms":30}"#,
    )
    .unwrap();
    let beacons = replay(&events, EngineConfig::default());
    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0].ttfd_source, TtfdSource::Interaction);
    assert_eq!(beacons[0].ttfd, 30.0);
    assert!(beacons[0].interacted);
    assert_eq!(beacons[0].interaction_time_ms, Some(30.0));
}

#[test]
fn manual_screen_times_out_on_poll() {
    let mut config = EngineConfig::default();
    config.display.ttfd_timeout_ms = 1_000;
    let events = parse_trace(
        r#"{"event":"start","at_ms":0,"screen":"report","manual":true}
{"event":"poll","at_ms":999}
{"event":"poll","at_ms":1001}
{"event":"fully_drawn","at_ms":1500,"screen":"report"}
{"event":"finalize","at_ms":2000,"screen":"report"}"#,
    )
    .unwrap();
    let beacons = replay(&events, config);
    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0].ttfd_source, TtfdSource::Timeout);
    assert_eq!(beacons[0].ttfd, 1_001.0);
}
