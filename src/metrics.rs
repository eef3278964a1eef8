use display_timing::TtfdSource;
use network_correlator::AddOutcome;
use screenperf_observe::metrics::{self as observe, LabelMap};

use crate::beacon::Beacon;

pub const BEACONS_TOTAL: &str = "screenperf_beacons_total";
pub const NETWORK_DROPPED_TOTAL: &str = "screenperf_network_dropped_total";
pub const ACTIVE_SCREENS: &str = "screenperf_active_screens";
pub const TTID_MS: &str = "screenperf_ttid_ms";
pub const TTFD_MS: &str = "screenperf_ttfd_ms";
pub const TRANSPORT_FAILURES_TOTAL: &str = "screenperf_transport_failures_total";
pub const TTFD_CAPTURES_TOTAL: &str = "screenperf_ttfd_captures_total";

pub fn set_active_screens(count: usize) {
    observe::set(ACTIVE_SCREENS, count as f64, LabelMap::new());
}

pub fn record_beacon(beacon: &Beacon) {
    observe::inc(BEACONS_TOTAL, LabelMap::new());
    if beacon.ttid >= 0.0 {
        observe::observe_ms(TTID_MS, beacon.ttid, LabelMap::new());
    }
    if beacon.ttfd >= 0.0 {
        observe::observe_ms(TTFD_MS, beacon.ttfd, ttfd_labels(beacon.ttfd_source));
    }
}

pub fn record_network_outcome(outcome: AddOutcome) {
    if !outcome.is_stored() {
        observe::inc(
            NETWORK_DROPPED_TOTAL,
            observe::labels([("reason", outcome.as_str())]),
        );
    }
}

/// Counts live captures (stable frames, interaction, manual, timeout).
/// Finalize fallbacks show up only in the beacon histograms.
pub fn record_ttfd_capture(source: TtfdSource) {
    observe::inc(TTFD_CAPTURES_TOTAL, ttfd_labels(source));
}

pub fn record_transport_failure() {
    observe::inc(TRANSPORT_FAILURES_TOTAL, LabelMap::new());
}

pub fn ttfd_labels(source: TtfdSource) -> LabelMap {
    observe::labels([("source", source.as_str())])
}
