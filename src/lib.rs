//! # Track Mapper
//!
//! Rail network geometry reconstruction from noisy train position telemetry.
//!
//! This library rebuilds the physical geometry of a rail network - track
//! paths, circuit locations, station annotations - from a historical corpus
//! of train position snapshots. Trains are reported twice over: as abstract
//! track circuit identifiers and as raw planar coordinates, and neither feed
//! alone yields a usable map. The engine correlates them:
//!
//! - **Circuit assignment** - greedy weighted matching gives each circuit a
//!   single representative coordinate ([`CooccurrenceTable::assign`])
//! - **Path order inference** - frequency denoising plus greedy geometric
//!   insertion reconstructs each track's visiting order
//!   ([`ordering::infer_path_order`])
//! - **Fork resolution** - overlapping track variants are cut into segments
//!   with globally unique edges ([`dedup::resolve_overlaps`])
//!
//! ## Features
//!
//! - **`parallel`** - Parallel per-track path inference with rayon
//! - **`serde`** - Serde derives on observation and output types
//!
//! ## Quick Start
//!
//! ```rust
//! use track_mapper::{
//!     reconstruct_network, EngineConfig, Observation, ObservationCorpus,
//!     StationDirectory, TrackPoint,
//! };
//! use track_mapper::normalize::RuleTable;
//!
//! let rules = RuleTable::new().canonical("A1", "RED1");
//!
//! // One train sweeping along a straight track, reported with both a
//! // circuit id and a coordinate at each step.
//! let mut corpus = ObservationCorpus::new();
//! let records: Vec<Observation> = (0..8)
//!     .map(|step| {
//!         Observation::new("train-7", step)
//!             .with_circuit(step as u32, 5)
//!             .with_position(
//!                 "A1",
//!                 "Red",
//!                 TrackPoint::new(1000.0 + step as f64 * 100.0, 2000.0),
//!             )
//!     })
//!     .collect();
//! corpus.ingest(records, &rules);
//!
//! let geometry = reconstruct_network(&corpus, &StationDirectory::new(), &EngineConfig::default());
//! assert_eq!(geometry.segments.len(), 1);
//! assert_eq!(geometry.segments[0].id, "RED1");
//! assert_eq!(geometry.circuits.len(), 8);
//! ```

use geo::{Distance, Euclidean, Point};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use log::info;

// Observation aggregation
pub mod corpus;
pub use corpus::{CorpusStats, ObservationCorpus, TrackObservations};

// Circuit-to-coordinate assignment
pub mod assignment;
pub use assignment::{CircuitAssignment, CooccurrenceTable};

// Track label normalization
pub mod normalize;
pub use normalize::{LabelNormalizer, LabelRejection, RuleTable};

// Path order inference
pub mod ordering;
pub use ordering::{infer_path_order, path_smoothness};

// Segment deduplication and fork resolution
pub mod dedup;
pub use dedup::{preference_order, resolve_overlaps, OrderedTrack, TrackSegment};

// Planar-to-WGS84 output projection
pub mod projection;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of a track circuit: the smallest stably-identified point on the
/// network reported by the positioning system.
pub type CircuitId = u32;

/// A planar coordinate in the upstream map projection, in meters.
///
/// Equality and hashing are exact on the floating-point bit patterns:
/// upstream quantizes positions, so identical locations arrive as identical
/// floats, and any tolerance would break the edge-claiming sets downstream.
///
/// # Example
/// ```
/// use track_mapper::TrackPoint;
/// let point = TrackPoint::new(-8_575_605.0, 4_707_174.0);
/// assert!(point.is_valid());
/// assert!(!TrackPoint::new(0.3, 0.4).is_valid()); // near-origin sentinel
/// ```
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackPoint {
    pub x: f64,
    pub y: f64,
}

impl TrackPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check that the coordinate is usable: finite, and not the near-origin
    /// value the upstream feed reports when a position is unset.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.x * self.x + self.y * self.y >= 1.0
    }
}

impl PartialEq for TrackPoint {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Eq for TrackPoint {}

impl Hash for TrackPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

/// One decoded telemetry record: a train at one moment, as reported by the
/// circuit feed, the coordinate feed, or both.
///
/// Records are ephemeral - consumed once during aggregation. A record may
/// carry only a circuit (no coordinate) or only a coordinate (no circuit);
/// [`ObservationCorpus::ingest`] correlates the two by entity within a
/// snapshot.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    /// Train identifier, stable across feeds within a snapshot.
    pub entity_id: String,
    /// Track circuit the train occupies, if reported.
    pub circuit: Option<CircuitId>,
    /// Seconds the train had been at the circuit when reported.
    pub dwell_seconds: Option<u32>,
    /// Raw track label from the coordinate feed.
    pub track_label: Option<String>,
    /// Raw line label from the coordinate feed.
    pub line_label: Option<String>,
    /// Destination identifier, if reported.
    pub destination: Option<String>,
    /// Reported planar coordinate.
    pub coordinate: Option<TrackPoint>,
    /// Snapshot ordering index; records sharing an index were reported at
    /// the same moment.
    pub sequence_index: u64,
}

impl Observation {
    /// Create an empty record for `entity_id` at snapshot `sequence_index`.
    pub fn new(entity_id: &str, sequence_index: u64) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            circuit: None,
            dwell_seconds: None,
            track_label: None,
            line_label: None,
            destination: None,
            coordinate: None,
            sequence_index,
        }
    }

    /// Attach a circuit report with its dwell duration.
    pub fn with_circuit(mut self, circuit: CircuitId, dwell_seconds: u32) -> Self {
        self.circuit = Some(circuit);
        self.dwell_seconds = Some(dwell_seconds);
        self
    }

    /// Attach a coordinate report with its track and line labels.
    pub fn with_position(
        mut self,
        track_label: &str,
        line_label: &str,
        coordinate: TrackPoint,
    ) -> Self {
        self.track_label = Some(track_label.to_string());
        self.line_label = Some(line_label.to_string());
        self.coordinate = Some(coordinate);
        self
    }

    /// Attach a bare coordinate report without track attribution.
    pub fn with_coordinate(mut self, coordinate: TrackPoint) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    /// Attach a destination identifier.
    pub fn with_destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }
}

/// Display attributes of a station, passed through to the output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationInfo {
    pub code: String,
    pub name: String,
}

impl StationInfo {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// Station metadata and which circuits sit at which station.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    stations: HashMap<String, StationInfo>,
    circuit_codes: HashMap<CircuitId, String>,
}

impl StationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a station's display attributes.
    pub fn insert_station(&mut self, info: StationInfo) {
        self.stations.insert(info.code.clone(), info);
    }

    /// Mark `circuit` as sitting at the station with `code`.
    pub fn link_circuit(&mut self, circuit: CircuitId, code: &str) {
        self.circuit_codes.insert(circuit, code.to_string());
    }

    /// The station at `circuit`, if any.
    pub fn station_for(&self, circuit: CircuitId) -> Option<&StationInfo> {
        self.stations.get(self.circuit_codes.get(&circuit)?)
    }
}

/// A circuit's reconstructed location: its representative coordinate (absent
/// when never co-observed with one - a valid state, not an error) and its
/// station, if it sits at one.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitLocation {
    pub id: CircuitId,
    pub coordinate: Option<TrackPoint>,
    pub station: Option<StationInfo>,
}

/// Configuration for the reconstruction engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fraction of a track's median observation count below which a
    /// coordinate is dropped as a sporadic misattribution.
    /// Default: 0.5
    pub denoise_fraction: f64,

    /// Half-width of the insertion window around the peg during path growth.
    /// Wider windows correct more local mis-orderings at higher cost.
    /// Default: 5
    pub insertion_window: usize,

    /// Minimum points for an output segment; shorter sub-segments are cut
    /// noise, not real track. Default: 6
    pub min_segment_points: usize,

    /// Canonical track ids processed first during deduplication, so trunk
    /// tracks keep their full extent and forks are trimmed around them.
    /// Default: empty
    pub trunk_tracks: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            denoise_fraction: 0.5,
            insertion_window: 5,
            min_segment_points: 6,
            trunk_tracks: Vec::new(),
        }
    }
}

/// The reconstructed network: per-circuit locations and deduplicated track
/// segments, still in the internal planar projection (see [`projection`] for
/// the WGS84 conversion).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NetworkGeometry {
    pub circuits: Vec<CircuitLocation>,
    pub segments: Vec<TrackSegment>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full reconstruction pipeline over an aggregated corpus.
///
/// Stages: circuit assignment, per-track path inference (parallel across
/// tracks when the `parallel` feature is enabled), preference ordering, and
/// segment deduplication. Tracks left degenerate by denoising simply produce
/// no segments.
pub fn reconstruct_network(
    corpus: &ObservationCorpus,
    stations: &StationDirectory,
    config: &EngineConfig,
) -> NetworkGeometry {
    corpus.log_summary();

    let assignment = corpus.cooccurrence().assign();
    let circuits: Vec<CircuitLocation> = corpus
        .circuits()
        .iter()
        .map(|&id| CircuitLocation {
            id,
            coordinate: assignment.coordinate(id),
            station: stations.station_for(id).cloned(),
        })
        .collect();
    let unresolved = circuits.iter().filter(|c| c.coordinate.is_none()).count();

    #[cfg(feature = "parallel")]
    let mut paths = ordering::infer_all_paths_parallel(corpus.tracks(), config);
    #[cfg(not(feature = "parallel"))]
    let mut paths = ordering::infer_all_paths(corpus.tracks(), config);

    let mut ordered: Vec<OrderedTrack> = corpus
        .tracks()
        .iter()
        .filter_map(|(id, obs)| {
            let path = paths.remove(id)?;
            if path.is_empty() {
                return None;
            }
            Some(OrderedTrack {
                id: id.clone(),
                lines: obs.lines.clone(),
                path,
            })
        })
        .collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    let ordered = preference_order(ordered, &config.trunk_tracks);

    let segments = resolve_overlaps(&ordered, config);

    info!(
        "Reconstructed {} circuits ({} unresolved) and {} segments from {} tracks",
        circuits.len(),
        unresolved,
        segments.len(),
        ordered.len()
    );

    NetworkGeometry { circuits, segments }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Straight-line distance between two planar coordinates, in meters.
#[inline]
pub fn euclidean_distance(a: &TrackPoint, b: &TrackPoint) -> f64 {
    let p1 = Point::new(a.x, a.y);
    let p2 = Point::new(b.x, b.y);
    Euclidean::distance(p1, p2)
}

// ============================================================================
// Tests
// ============================================================================
