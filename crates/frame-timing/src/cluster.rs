//! Jank cluster detection and ranking.
//!
//! Clusters are recomputed from the full sample stream on every summary and
//! never patched in place.

use std::cmp::Ordering;

use crate::model::{FrameSample, JankCluster, RenderPhase};

/// Shortest run of consecutive janky samples reported as a cluster.
pub const MIN_CLUSTER_FRAMES: usize = 3;

const AVG_WEIGHT: f64 = 0.3;
const WORST_WEIGHT: f64 = 0.4;
const PER_FRAME_WEIGHT: f64 = 5.0;
const EARLY_BONUS: f64 = 20.0;

/// Ranking score; higher is worse. Not part of the reported payload.
pub fn severity(
    avg_duration_ms: f64,
    worst_duration_ms: f64,
    frame_count: usize,
    start_frame: u64,
    early_cluster_frames: u64,
) -> f64 {
    let early_bonus = if start_frame <= early_cluster_frames {
        EARLY_BONUS
    } else {
        0.0
    };
    AVG_WEIGHT * avg_duration_ms
        + WORST_WEIGHT * worst_duration_ms
        + PER_FRAME_WEIGHT * frame_count as f64
        + early_bonus
}

/// Scans samples in order and materializes every maximal janky run of at
/// least [`MIN_CLUSTER_FRAMES`]. Ids follow detection order starting at 1.
pub(crate) fn detect_clusters(samples: &[FrameSample], early_cluster_frames: u64) -> Vec<JankCluster> {
    let mut clusters = Vec::new();
    let mut run_start: Option<usize> = None;

    for (idx, sample) in samples.iter().enumerate() {
        if sample.class.is_janky() {
            run_start.get_or_insert(idx);
            continue;
        }
        if let Some(start) = run_start.take() {
            close_run(&samples[start..idx], early_cluster_frames, &mut clusters);
        }
    }
    if let Some(start) = run_start {
        close_run(&samples[start..], early_cluster_frames, &mut clusters);
    }

    clusters
}

fn close_run(run: &[FrameSample], early_cluster_frames: u64, clusters: &mut Vec<JankCluster>) {
    if run.len() < MIN_CLUSTER_FRAMES {
        return;
    }
    let id = clusters.len() as u32 + 1;
    clusters.push(materialize(id, run, early_cluster_frames));
}

fn materialize(id: u32, run: &[FrameSample], early_cluster_frames: u64) -> JankCluster {
    let first = &run[0];
    let last = &run[run.len() - 1];
    let total: f64 = run.iter().map(|s| s.duration_ms).sum();
    let avg_duration_ms = total / run.len() as f64;
    let worst_duration_ms = run.iter().map(|s| s.duration_ms).fold(0.0_f64, f64::max);
    let severity = severity(
        avg_duration_ms,
        worst_duration_ms,
        run.len(),
        first.seq,
        early_cluster_frames,
    );

    JankCluster {
        id,
        start_frame: first.seq,
        end_frame: last.seq,
        start_time_ms: first.timestamp_ms,
        end_time_ms: last.timestamp_ms,
        avg_duration_ms,
        worst_duration_ms,
        phase: dominant_phase(run),
        frame_count: run.len(),
        severity,
    }
}

/// Most frequent phase; ties go to the phase seen first.
fn dominant_phase(run: &[FrameSample]) -> RenderPhase {
    let mut tally: Vec<(RenderPhase, usize)> = Vec::with_capacity(3);
    for sample in run {
        match tally.iter_mut().find(|(phase, _)| *phase == sample.phase) {
            Some((_, count)) => *count += 1,
            None => tally.push((sample.phase, 1)),
        }
    }

    let mut best: Option<(RenderPhase, usize)> = None;
    for (phase, count) in tally {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((phase, count)),
        }
    }
    best.map(|(phase, _)| phase).unwrap_or(RenderPhase::Unknown)
}

/// Orders clusters by descending severity and keeps at most `keep`.
/// Equal severities keep detection order; ids are left untouched.
pub(crate) fn rank_clusters(mut clusters: Vec<JankCluster>, keep: usize) -> Vec<JankCluster> {
    clusters.sort_by(|a, b| {
        b.severity
            .partial_cmp(&a.severity)
            .unwrap_or(Ordering::Equal)
    });
    clusters.truncate(keep);
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FrameClass;

    fn sample(seq: u64, duration_ms: f64, phase: RenderPhase) -> FrameSample {
        let class = if duration_ms > 700.0 {
            FrameClass::Frozen
        } else if duration_ms > 16.67 {
            FrameClass::Janky
        } else {
            FrameClass::Normal
        };
        FrameSample {
            seq,
            timestamp_ms: seq as f64 * 16.0,
            duration_ms,
            class,
            phase,
        }
    }

    fn stream(durations: &[f64]) -> Vec<FrameSample> {
        durations
            .iter()
            .enumerate()
            .map(|(idx, d)| sample(idx as u64 + 1, *d, RenderPhase::Unknown))
            .collect()
    }

    #[test]
    fn runs_shorter_than_three_are_ignored() {
        let samples = stream(&[20.0, 20.0, 10.0, 30.0, 10.0, 25.0, 25.0]);
        assert!(detect_clusters(&samples, 10).is_empty());
    }

    #[test]
    fn trailing_run_is_closed_at_end_of_stream() {
        let samples = stream(&[10.0, 10.0, 40.0, 50.0, 60.0]);
        let clusters = detect_clusters(&samples, 10);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].start_frame, 3);
        assert_eq!(clusters[0].end_frame, 5);
        assert_eq!(clusters[0].worst_duration_ms, 60.0);
        assert_eq!(clusters[0].avg_duration_ms, 50.0);
    }

    #[test]
    fn frozen_samples_join_janky_runs() {
        let samples = stream(&[20.0, 900.0, 20.0, 10.0]);
        let clusters = detect_clusters(&samples, 10);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].frame_count, 3);
        assert_eq!(clusters[0].worst_duration_ms, 900.0);
    }

    #[test]
    fn dominant_phase_breaks_ties_by_first_seen() {
        let run = vec![
            sample(1, 20.0, RenderPhase::Raster),
            sample(2, 20.0, RenderPhase::Build),
            sample(3, 20.0, RenderPhase::Build),
            sample(4, 20.0, RenderPhase::Raster),
        ];
        assert_eq!(dominant_phase(&run), RenderPhase::Raster);

        let run = vec![
            sample(1, 20.0, RenderPhase::Raster),
            sample(2, 20.0, RenderPhase::Build),
            sample(3, 20.0, RenderPhase::Build),
        ];
        assert_eq!(dominant_phase(&run), RenderPhase::Build);
    }

    #[test]
    fn severity_applies_early_bonus_up_to_threshold() {
        let early = severity(20.0, 30.0, 3, 10, 10);
        let late = severity(20.0, 30.0, 3, 11, 10);
        assert!((early - late - 20.0).abs() < 1e-9);
        assert!((late - (6.0 + 12.0 + 15.0)).abs() < 1e-9);
    }

    #[test]
    fn ranking_keeps_top_clusters_with_detection_ids() {
        let mut durations = Vec::new();
        for idx in 0..12 {
            durations.extend_from_slice(&[10.0; 11]);
            let d = 20.0 + idx as f64 * 10.0;
            durations.extend_from_slice(&[d, d, d]);
        }
        let samples = stream(&durations);
        let clusters = detect_clusters(&samples, 10);
        assert_eq!(clusters.len(), 12);

        let ranked = rank_clusters(clusters, 10);
        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].id, 12);
        assert!(ranked.windows(2).all(|w| w[0].severity >= w[1].severity));
        assert!(ranked.iter().all(|c| c.id >= 3));
    }
}
