//! Path order inference.
//!
//! After aggregation each canonical track has an unordered set of coordinates
//! and an observation count per coordinate, but no notion of which coordinate
//! comes before which along the physical line. This module reconstructs a
//! plausible linear visiting order:
//!
//! 1. **Denoising** - coordinates observed fewer than half the median count
//!    on the track are sporadic misattributions and are dropped.
//! 2. **Seeding** - the path starts from the most-observed surviving
//!    coordinate (ties broken by coordinate bit order), so repeated runs
//!    produce identical paths.
//! 3. **Greedy growth** - the unplaced coordinate nearest to any placed
//!    coordinate is inserted next, at whichever position inside a small
//!    window around its nearest placed neighbor keeps the path smoothest.
//!
//! The smoothness score penalizes sharp turns over long edges, so long
//! straight runs form first and minor local mis-orderings from pure
//! nearest-neighbor growth get corrected within the window. This keeps the
//! search near linear-times-window instead of combinatorial; it does not
//! guarantee a globally optimal order, and a path revisiting the same area is
//! discouraged by the score but not forbidden.

use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use rstar::RTree;

use crate::corpus::TrackObservations;
use crate::{euclidean_distance, EngineConfig, TrackPoint};

/// Path smoothness score: for every consecutive triple, accumulate
/// `-(1 - cos(turn angle)) * (edge_before + edge_after)`.
///
/// A perfectly straight path scores 0; sharper turns and longer edges push
/// the score further negative.
pub fn path_smoothness(path: &[TrackPoint]) -> f64 {
    let mut score = 0.0;
    for w in path.windows(3) {
        let v1 = (w[1].x - w[0].x, w[1].y - w[0].y);
        let v2 = (w[2].x - w[1].x, w[2].y - w[1].y);
        let d1 = euclidean_distance(&w[0], &w[1]);
        let d2 = euclidean_distance(&w[1], &w[2]);
        if d1 == 0.0 || d2 == 0.0 {
            continue;
        }
        let cosine = (v1.0 * v2.0 + v1.1 * v2.1) / (d1 * d2);
        score -= (1.0 - cosine) * (d1 + d2);
    }
    score
}

/// Infer the visiting order of one track's coordinates using the default
/// smoothness scorer.
///
/// Returns an empty path when fewer than 2 coordinates survive denoising.
pub fn infer_path_order(
    counts: &HashMap<TrackPoint, u64>,
    config: &EngineConfig,
) -> Vec<TrackPoint> {
    infer_path_order_with(counts, config, path_smoothness)
}

/// Infer the visiting order with a custom path scorer.
///
/// The scorer takes a candidate path and returns a score to maximize; the
/// insertion loop is otherwise unchanged, so alternative smoothness
/// heuristics can be swapped in without touching the growth control.
pub fn infer_path_order_with<F>(
    counts: &HashMap<TrackPoint, u64>,
    config: &EngineConfig,
    score: F,
) -> Vec<TrackPoint>
where
    F: Fn(&[TrackPoint]) -> f64,
{
    if counts.is_empty() {
        return Vec::new();
    }

    // Median observation count on this track; coordinates seen much less
    // often than the median are data oddities.
    let mut values: Vec<u64> = counts.values().copied().collect();
    values.sort_unstable();
    let median = values[values.len() / 2];
    let threshold = median as f64 * config.denoise_fraction;

    let mut kept: Vec<TrackPoint> = counts
        .iter()
        .filter(|(_, &count)| count as f64 >= threshold)
        .map(|(point, _)| *point)
        .collect();
    // Deterministic working order regardless of map iteration.
    kept.sort_unstable_by(cmp_points);

    if kept.len() < 2 {
        debug!("Track degenerate after denoising ({} coordinates)", kept.len());
        return Vec::new();
    }

    let seed = kept
        .iter()
        .max_by(|a, b| counts[*a].cmp(&counts[*b]).then_with(|| cmp_points(a, b)))
        .copied()
        .expect("kept is non-empty");

    let mut remaining: RTree<[f64; 2]> =
        RTree::bulk_load(kept.iter().map(|p| [p.x, p.y]).collect());
    remaining.remove(&[seed.x, seed.y]);

    let mut path: Vec<TrackPoint> = Vec::with_capacity(kept.len());
    path.push(seed);

    let mut candidate: Vec<TrackPoint> = Vec::with_capacity(kept.len());
    while remaining.size() > 0 {
        // Nearest unplaced coordinate to any placed coordinate, and the
        // placed index ("peg") it is nearest to.
        let mut best: Option<(f64, usize, [f64; 2])> = None;
        for (i, placed) in path.iter().enumerate() {
            if let Some(nearest) = remaining.nearest_neighbor(&[placed.x, placed.y]) {
                let dx = nearest[0] - placed.x;
                let dy = nearest[1] - placed.y;
                let d2 = dx * dx + dy * dy;
                if best.map_or(true, |(best_d2, _, _)| d2 < best_d2) {
                    best = Some((d2, i, *nearest));
                }
            }
        }
        let (_, peg, next) = best.expect("remaining is non-empty");
        let next = TrackPoint::new(next[0], next[1]);

        // Try inserting at each position in a window around the peg and keep
        // the position that leaves the path smoothest.
        let lo = peg.saturating_sub(config.insertion_window);
        let hi = (peg + config.insertion_window).min(path.len() + 1);
        let mut best_index = lo;
        let mut best_score = f64::NEG_INFINITY;
        for index in lo..hi {
            candidate.clear();
            candidate.extend_from_slice(&path[..index]);
            candidate.push(next);
            candidate.extend_from_slice(&path[index..]);
            let s = score(&candidate);
            if s > best_score {
                best_score = s;
                best_index = index;
            }
        }

        path.insert(best_index, next);
        remaining.remove(&[next.x, next.y]);
    }

    path
}

/// Infer ordered paths for every track, sequentially.
pub fn infer_all_paths(
    tracks: &HashMap<String, TrackObservations>,
    config: &EngineConfig,
) -> HashMap<String, Vec<TrackPoint>> {
    tracks
        .iter()
        .map(|(id, obs)| (id.clone(), infer_path_order(&obs.counts, config)))
        .collect()
}

/// Infer ordered paths for every track in parallel.
///
/// Each track's inference reads only its own coordinates, so tracks fan out
/// across threads freely. Recommended for networks with many tracks.
#[cfg(feature = "parallel")]
pub fn infer_all_paths_parallel(
    tracks: &HashMap<String, TrackObservations>,
    config: &EngineConfig,
) -> HashMap<String, Vec<TrackPoint>> {
    use rayon::prelude::*;

    tracks
        .par_iter()
        .map(|(id, obs)| (id.clone(), infer_path_order(&obs.counts, config)))
        .collect()
}

fn cmp_points(a: &TrackPoint, b: &TrackPoint) -> Ordering {
    a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn counts_for(points: &[(TrackPoint, u64)]) -> HashMap<TrackPoint, u64> {
        points.iter().copied().collect()
    }

    fn line_counts(n: usize, count: u64) -> HashMap<TrackPoint, u64> {
        (0..n)
            .map(|i| (TrackPoint::new(i as f64 * 100.0, 0.0), count))
            .collect()
    }

    #[test]
    fn test_smoothness_straight_line_is_zero() {
        let path = vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(100.0, 0.0),
            TrackPoint::new(200.0, 0.0),
        ];
        assert!(approx_eq(path_smoothness(&path), 0.0, 1e-9));
    }

    #[test]
    fn test_smoothness_right_angle_penalized() {
        let path = vec![
            TrackPoint::new(0.0, 0.0),
            TrackPoint::new(100.0, 0.0),
            TrackPoint::new(100.0, 100.0),
        ];
        // cos = 0, both edges 100m: -(1 - 0) * 200 = -200.
        assert!(approx_eq(path_smoothness(&path), -200.0, 1e-9));
    }

    #[test]
    fn test_short_paths_score_zero() {
        assert_eq!(path_smoothness(&[]), 0.0);
        let two = vec![TrackPoint::new(0.0, 0.0), TrackPoint::new(100.0, 0.0)];
        assert_eq!(path_smoothness(&two), 0.0);
    }

    #[test]
    fn test_straight_line_recovered() {
        let counts = line_counts(10, 20);
        let path = infer_path_order(&counts, &EngineConfig::default());

        assert_eq!(path.len(), 10);
        // The path must walk the line monotonically, in either direction.
        let steps: Vec<f64> = path.windows(2).map(|w| w[1].x - w[0].x).collect();
        assert!(
            steps.iter().all(|&s| s == 100.0) || steps.iter().all(|&s| s == -100.0),
            "path is not a monotonic walk: {:?}",
            path
        );
    }

    #[test]
    fn test_outlier_dropped_by_median_filter() {
        let mut counts = line_counts(10, 20);
        let outlier = TrackPoint::new(500.0, 5000.0);
        counts.insert(outlier, 2);

        let path = infer_path_order(&counts, &EngineConfig::default());
        assert_eq!(path.len(), 10);
        assert!(!path.contains(&outlier));
    }

    #[test]
    fn test_degenerate_track_yields_empty_path() {
        let empty = HashMap::new();
        assert!(infer_path_order(&empty, &EngineConfig::default()).is_empty());

        let single = counts_for(&[(TrackPoint::new(100.0, 100.0), 5)]);
        assert!(infer_path_order(&single, &EngineConfig::default()).is_empty());

        // Two coordinates, but one falls to the median filter.
        let noisy = counts_for(&[
            (TrackPoint::new(100.0, 100.0), 20),
            (TrackPoint::new(200.0, 100.0), 1),
        ]);
        assert!(infer_path_order(&noisy, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        // An L-shaped track with uneven counts.
        let mut points = Vec::new();
        for i in 0..8 {
            points.push((TrackPoint::new(i as f64 * 100.0, 0.0), 15 + (i % 3) as u64));
        }
        for i in 1..8 {
            points.push((TrackPoint::new(700.0, i as f64 * 100.0), 14 + (i % 4) as u64));
        }
        let counts = counts_for(&points);

        let config = EngineConfig::default();
        let first = infer_path_order(&counts, &config);
        let second = infer_path_order(&counts, &config);
        assert_eq!(first, second);
        assert_eq!(first.len(), points.len());
    }

    #[test]
    fn test_custom_scorer_is_used() {
        let counts = line_counts(5, 10);
        // A constant scorer makes every insertion position equally good, so
        // the first window position always wins; the path still contains
        // every coordinate exactly once.
        let path = infer_path_order_with(&counts, &EngineConfig::default(), |_| 0.0);
        assert_eq!(path.len(), 5);
        let mut sorted = path.clone();
        sorted.sort_unstable_by(cmp_points);
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }

    #[test]
    fn test_infer_all_paths() {
        let mut tracks = HashMap::new();
        tracks.insert(
            "RED1".to_string(),
            TrackObservations {
                lines: Default::default(),
                counts: line_counts(6, 10),
            },
        );
        tracks.insert(
            "EMPTY".to_string(),
            TrackObservations::default(),
        );

        let paths = infer_all_paths(&tracks, &EngineConfig::default());
        assert_eq!(paths["RED1"].len(), 6);
        assert!(paths["EMPTY"].is_empty());
    }
}
