//! Segment deduplication and fork resolution.
//!
//! Label normalization deliberately duplicates coverage: splitting a fork
//! into per-line labels, or bridging a gap by relabelling, leaves several
//! canonical tracks claiming the same stretch of physical rail. This module
//! resolves that globally. Tracks are processed in a fixed preference order
//! (trunk tracks first, so forks are trimmed around them); each path is
//! walked edge by edge against a global set of already-claimed edges, and a
//! claimed edge cuts the current sub-segment instead of joining through it.
//!
//! Edges are undirected: a stretch of rail walked in either direction is the
//! same physical track and is claimed exactly once across all output
//! segments.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info};

use crate::{EngineConfig, TrackPoint};

/// A canonical track with its inferred ordered path, ready for resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedTrack {
    /// Canonical track identifier.
    pub id: String,
    /// Line labels observed on the track.
    pub lines: BTreeSet<String>,
    /// Inferred visiting order of the track's coordinates.
    pub path: Vec<TrackPoint>,
}

/// A final output segment: a contiguous stretch of physical track claimed by
/// exactly one logical track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSegment {
    /// Canonical track identifier, suffixed (`a`, `b`, ...) when the track
    /// was split into multiple sub-segments.
    pub id: String,
    /// Sorted, comma-joined set of line labels observed on the track.
    pub line: String,
    /// Ordered path, at least `min_segment_points` long.
    pub path: Vec<TrackPoint>,
}

/// An undirected edge between two adjacent path coordinates, keyed on exact
/// coordinate bits with the endpoints in a canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeKey {
    a: (u64, u64),
    b: (u64, u64),
}

impl EdgeKey {
    fn between(p: &TrackPoint, q: &TrackPoint) -> Self {
        let pk = (p.x.to_bits(), p.y.to_bits());
        let qk = (q.x.to_bits(), q.y.to_bits());
        if pk <= qk {
            EdgeKey { a: pk, b: qk }
        } else {
            EdgeKey { a: qk, b: pk }
        }
    }
}

/// Stable-sort tracks into dedup preference order: trunk identifiers first,
/// then by identifier.
///
/// Trunk tracks keep their full extent; fork-derived aliases processed later
/// get trimmed around whatever the trunks already claimed.
pub fn preference_order(mut tracks: Vec<OrderedTrack>, trunk: &[String]) -> Vec<OrderedTrack> {
    tracks.sort_by(|a, b| {
        let a_fork = !trunk.contains(&a.id);
        let b_fork = !trunk.contains(&b.id);
        a_fork.cmp(&b_fork).then_with(|| a.id.cmp(&b.id))
    });
    tracks
}

/// Resolve overlapping tracks into segments with globally unique edges.
///
/// Tracks are processed in the order given (see [`preference_order`]). For
/// each track the path is walked edge by edge: fresh edges extend the current
/// sub-segment and are claimed; already-claimed edges cut it, leaving a gap.
/// Sub-segments shorter than [`EngineConfig::min_segment_points`] are
/// discarded as boundary noise. A track surviving as a single sub-segment
/// keeps its identifier; multiple sub-segments get suffix letters in path
/// order.
pub fn resolve_overlaps(tracks: &[OrderedTrack], config: &EngineConfig) -> Vec<TrackSegment> {
    let mut claimed: HashSet<EdgeKey> = HashSet::new();
    let mut segments: Vec<TrackSegment> = Vec::new();

    for track in tracks {
        let mut pieces: Vec<Vec<TrackPoint>> = vec![Vec::new()];

        for w in track.path.windows(2) {
            let edge = EdgeKey::between(&w[0], &w[1]);
            if claimed.contains(&edge) {
                // Cut here; do not join across track already claimed by a
                // preferred segment.
                if !pieces.last().map_or(true, Vec::is_empty) {
                    pieces.push(Vec::new());
                }
                continue;
            }
            claimed.insert(edge);
            let piece = pieces.last_mut().expect("pieces is non-empty");
            if piece.is_empty() {
                piece.push(w[0]);
            }
            piece.push(w[1]);
        }

        pieces.retain(|p| p.len() >= config.min_segment_points);

        let line = track
            .lines
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        match pieces.len() {
            0 => debug!("Track {} fully deduplicated away", track.id),
            1 => segments.push(TrackSegment {
                id: track.id.clone(),
                line,
                path: pieces.pop().expect("one piece"),
            }),
            n => {
                debug!("Track {} split into {} sub-segments", track.id, n);
                for (i, path) in pieces.into_iter().enumerate() {
                    segments.push(TrackSegment {
                        id: format!("{}{}", track.id, suffix(i)),
                        line: line.clone(),
                        path,
                    });
                }
            }
        }
    }

    info!(
        "Resolved {} tracks into {} segments ({} claimed edges)",
        tracks.len(),
        segments.len(),
        claimed.len()
    );

    segments
}

/// Sub-segment suffix letters in path order: `a`, `b`, `c`, ...
fn suffix(i: usize) -> char {
    debug_assert!(i < 26, "more sub-segments than suffix letters");
    (b'a' + i as u8) as char
}
