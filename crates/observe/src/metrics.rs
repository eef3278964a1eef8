//! Process-local metric store.
//!
//! Series are keyed by name plus a sorted, policy-limited label set. Nothing
//! is exported over the network; hosts read [`render_prometheus`] or
//! [`snapshot`] and ship the result themselves.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use hdrhistogram::Histogram;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;

use crate::policy::current_policy;

pub type LabelMap = BTreeMap<String, String>;

const QUANTILES: [f64; 4] = [0.5, 0.9, 0.95, 0.99];

/// Builds a label map from `(key, value)` pairs.
pub fn labels<const N: usize>(pairs: [(&str, &str); N]) -> LabelMap {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct SeriesKey {
    name: &'static str,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &'static str, labels: LabelMap, limit: usize) -> Self {
        Self {
            name,
            labels: labels.into_iter().take(limit).collect(),
        }
    }

    fn render_labels(&self, extra: Option<(&str, String)>) -> String {
        let mut pairs: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        if let Some((k, v)) = extra {
            pairs.push(format!("{k}=\"{v}\""));
        }
        if pairs.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", pairs.join(","))
        }
    }
}

struct TimingSeries {
    histogram: Option<Histogram<u64>>,
    sum_ms: u128,
}

impl TimingSeries {
    fn new(max_ms: u64) -> Self {
        Self {
            histogram: Histogram::<u64>::new_with_bounds(1, max_ms.max(2), 3).ok(),
            sum_ms: 0,
        }
    }

    fn count(&self) -> u64 {
        self.histogram.as_ref().map_or(0, |h| h.len())
    }
}

#[derive(Default)]
struct MetricStore {
    counters: HashMap<SeriesKey, u64>,
    gauges: HashMap<SeriesKey, f64>,
    timings: HashMap<SeriesKey, TimingSeries>,
}

static STORE: Lazy<Mutex<MetricStore>> = Lazy::new(|| Mutex::new(MetricStore::default()));

/// Runs `f` against the store when metrics are enabled by policy.
fn record(f: impl FnOnce(&mut MetricStore, usize, u64)) {
    let policy = current_policy();
    if !policy.enable_metrics {
        return;
    }
    f(&mut STORE.lock(), policy.series_label_limit, policy.histogram_max_ms);
}

fn key(name: &'static str, labels: LabelMap) -> SeriesKey {
    SeriesKey::new(name, labels, current_policy().series_label_limit)
}

/// Forces the store into existence so the first record does not pay for it.
pub fn ensure_metrics() {
    Lazy::force(&STORE);
}

pub fn inc(name: &'static str, labels: LabelMap) {
    record(|store, limit, _| {
        *store
            .counters
            .entry(SeriesKey::new(name, labels, limit))
            .or_insert(0) += 1;
    });
}

pub fn set(name: &'static str, value: f64, labels: LabelMap) {
    record(|store, limit, _| {
        store
            .gauges
            .insert(SeriesKey::new(name, labels, limit), value);
    });
}

/// Records a millisecond observation. Negative and non-finite values are
/// ignored; the rest are clamped to the histogram range.
pub fn observe_ms(name: &'static str, value_ms: f64, labels: LabelMap) {
    if !value_ms.is_finite() || value_ms < 0.0 {
        return;
    }
    record(|store, limit, max_ms| {
        let value = (value_ms.round() as u64).clamp(1, max_ms.max(2));
        let series = store
            .timings
            .entry(SeriesKey::new(name, labels, limit))
            .or_insert_with(|| TimingSeries::new(max_ms));
        if let Some(histogram) = series.histogram.as_mut() {
            if histogram.record(value).is_ok() {
                series.sum_ms += u128::from(value);
            }
        }
    });
}

pub fn counter_value(name: &'static str, labels: LabelMap) -> u64 {
    let key = key(name, labels);
    STORE.lock().counters.get(&key).copied().unwrap_or(0)
}

pub fn gauge_value(name: &'static str, labels: LabelMap) -> Option<f64> {
    let key = key(name, labels);
    STORE.lock().gauges.get(&key).copied()
}

pub fn histogram_count(name: &'static str, labels: LabelMap) -> u64 {
    let key = key(name, labels);
    STORE.lock().timings.get(&key).map_or(0, TimingSeries::count)
}

#[derive(Clone, Debug, Serialize)]
pub struct SeriesSnapshot {
    pub name: String,
    pub labels: LabelMap,
    pub value: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TimingSnapshot {
    pub name: String,
    pub labels: LabelMap,
    pub count: u64,
    pub sum_ms: u128,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: Vec<SeriesSnapshot>,
    pub gauges: Vec<SeriesSnapshot>,
    pub timings: Vec<TimingSnapshot>,
}

/// Structured copy of every series, sorted by name.
pub fn snapshot() -> MetricsSnapshot {
    let store = STORE.lock();
    let series = |key: &SeriesKey, value: f64| SeriesSnapshot {
        name: key.name.to_string(),
        labels: key.labels.iter().cloned().collect(),
        value,
    };
    let mut snapshot = MetricsSnapshot {
        counters: store
            .counters
            .iter()
            .map(|(k, v)| series(k, *v as f64))
            .collect(),
        gauges: store.gauges.iter().map(|(k, v)| series(k, *v)).collect(),
        timings: store
            .timings
            .iter()
            .filter_map(|(k, t)| {
                let histogram = t.histogram.as_ref().filter(|h| h.len() > 0)?;
                Some(TimingSnapshot {
                    name: k.name.to_string(),
                    labels: k.labels.iter().cloned().collect(),
                    count: histogram.len(),
                    sum_ms: t.sum_ms,
                    p50_ms: histogram.value_at_quantile(0.5),
                    p95_ms: histogram.value_at_quantile(0.95),
                    max_ms: histogram.max(),
                })
            })
            .collect(),
    };
    snapshot.counters.sort_by(|a, b| a.name.cmp(&b.name));
    snapshot.gauges.sort_by(|a, b| a.name.cmp(&b.name));
    snapshot.timings.sort_by(|a, b| a.name.cmp(&b.name));
    snapshot
}

/// Prometheus text exposition of the store. Timings are rendered as
/// summaries (quantiles plus `_count` and `_sum`).
pub fn render_prometheus() -> String {
    let store = STORE.lock();
    let mut out = String::new();

    let mut counters: Vec<_> = store.counters.iter().collect();
    counters.sort_by(|a, b| a.0.name.cmp(b.0.name));
    for (key, value) in counters {
        let _ = writeln!(out, "{}{} {}", key.name, key.render_labels(None), value);
    }

    let mut gauges: Vec<_> = store.gauges.iter().collect();
    gauges.sort_by(|a, b| a.0.name.cmp(b.0.name));
    for (key, value) in gauges {
        let _ = writeln!(out, "{}{} {:.6}", key.name, key.render_labels(None), value);
    }

    let mut timings: Vec<_> = store.timings.iter().collect();
    timings.sort_by(|a, b| a.0.name.cmp(b.0.name));
    for (key, series) in timings {
        let Some(histogram) = series.histogram.as_ref().filter(|h| h.len() > 0) else {
            continue;
        };
        for q in QUANTILES {
            let labels = key.render_labels(Some(("quantile", format!("{q:.2}"))));
            let _ = writeln!(
                out,
                "{}{} {}",
                key.name,
                labels,
                histogram.value_at_quantile(q)
            );
        }
        let labels = key.render_labels(None);
        let _ = writeln!(out, "{}_count{} {}", key.name, labels, histogram.len());
        let _ = writeln!(out, "{}_sum{} {}", key.name, labels, series.sum_ms);
    }
    out
}
