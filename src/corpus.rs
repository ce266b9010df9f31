//! Observation aggregation.
//!
//! The engine operates over a complete historical corpus of telemetry
//! snapshots. This module turns that unordered stream of per-train records
//! into the working state the reconstruction stages consume: circuit and
//! coordinate reports for the same train in the same snapshot are correlated
//! into weighted co-occurrences, and coordinate sightings are attributed to
//! canonical tracks through the label normalization rules.
//!
//! Data-quality filtering happens here: near-origin coordinates are invalid
//! sensor output and are dropped, and label combinations the rule table
//! rejects discard that single observation. Neither is an error.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info};

use crate::assignment::CooccurrenceTable;
use crate::normalize::LabelNormalizer;
use crate::{CircuitId, Observation, TrackPoint};

/// Everything observed on one canonical track.
#[derive(Debug, Clone, Default)]
pub struct TrackObservations {
    /// Line labels seen on this track.
    pub lines: BTreeSet<String>,
    /// How often each coordinate was reported on this track.
    pub counts: HashMap<TrackPoint, u64>,
}

/// Counters for records consumed and discarded during aggregation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorpusStats {
    /// Observation records consumed.
    pub records: u64,
    /// Coordinates dropped as invalid (near-zero magnitude).
    pub invalid_coordinates: u64,
    /// Observations discarded by label normalization.
    pub rejected_labels: u64,
    /// Circuit/coordinate co-occurrences recorded.
    pub cooccurrences: u64,
}

/// Accumulated working state for the reconstruction pipeline.
///
/// Built once by ingesting the full observation stream, then read by the
/// assignment, ordering, and deduplication stages.
///
/// # Example
/// ```
/// use track_mapper::{Observation, ObservationCorpus, TrackPoint};
/// use track_mapper::normalize::RuleTable;
///
/// let rules = RuleTable::new().canonical("A1", "RED1");
///
/// let mut corpus = ObservationCorpus::new();
/// corpus.ingest(
///     vec![Observation::new("train-7", 0)
///         .with_circuit(42, 10)
///         .with_position("A1", "Red", TrackPoint::new(1000.0, 2000.0))],
///     &rules,
/// );
///
/// assert_eq!(corpus.stats().cooccurrences, 1);
/// assert!(corpus.tracks().contains_key("RED1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ObservationCorpus {
    tracks: HashMap<String, TrackObservations>,
    cooccurrence: CooccurrenceTable,
    circuits: BTreeSet<CircuitId>,
    stats: CorpusStats,
}

/// Per-entity correlation state within one snapshot.
#[derive(Default)]
struct EntitySnapshot {
    circuit: Option<(CircuitId, u32)>,
    coordinate: Option<TrackPoint>,
}

impl ObservationCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a stream of observation records in any order.
    ///
    /// Records are grouped by sequence index so that circuit-only and
    /// coordinate-only reports of the same train in the same snapshot are
    /// correlated.
    pub fn ingest(
        &mut self,
        records: impl IntoIterator<Item = Observation>,
        rules: &impl LabelNormalizer,
    ) {
        let mut snapshots: BTreeMap<u64, Vec<Observation>> = BTreeMap::new();
        for record in records {
            snapshots
                .entry(record.sequence_index)
                .or_default()
                .push(record);
        }
        for records in snapshots.values() {
            self.ingest_snapshot(records, rules);
        }
    }

    /// Ingest the records of a single snapshot (one sequence index).
    pub fn ingest_snapshot(
        &mut self,
        records: &[Observation],
        rules: &impl LabelNormalizer,
    ) {
        let mut entities: HashMap<&str, EntitySnapshot> = HashMap::new();

        for record in records {
            self.stats.records += 1;

            let coordinate = match record.coordinate {
                Some(c) if !c.is_valid() => {
                    self.stats.invalid_coordinates += 1;
                    None
                }
                other => other,
            };

            if let Some(circuit) = record.circuit {
                self.circuits.insert(circuit);
            }

            // Attribute the coordinate to a canonical track when the record
            // carries the labels to do so.
            if let (Some(coord), Some(track), Some(line)) = (
                coordinate,
                record.track_label.as_deref(),
                record.line_label.as_deref(),
            ) {
                match rules.normalize(track, line) {
                    Ok(canonical) => {
                        let obs = self.tracks.entry(canonical).or_default();
                        *obs.counts.entry(coord).or_insert(0) += 1;
                        obs.lines.insert(line.to_string());
                    }
                    Err(rejection) => {
                        self.stats.rejected_labels += 1;
                        debug!(
                            "Discarding observation on {}/{}: {}",
                            track, line, rejection
                        );
                    }
                }
            }

            let entity = entities.entry(record.entity_id.as_str()).or_default();
            if let Some(circuit) = record.circuit {
                entity.circuit = Some((circuit, record.dwell_seconds.unwrap_or(0)));
            }
            if let Some(coord) = coordinate {
                entity.coordinate = Some(coord);
            }
        }

        // Every train seen with both a circuit and a coordinate in this
        // snapshot contributes one weighted co-occurrence.
        for entity in entities.values() {
            if let (Some((circuit, dwell)), Some(coord)) = (entity.circuit, entity.coordinate) {
                self.cooccurrence.add(circuit, coord, dwell);
                self.stats.cooccurrences += 1;
            }
        }
    }

    /// Observations accumulated per canonical track.
    pub fn tracks(&self) -> &HashMap<String, TrackObservations> {
        &self.tracks
    }

    /// All circuits seen anywhere in the corpus, including those never
    /// co-observed with a coordinate.
    pub fn circuits(&self) -> &BTreeSet<CircuitId> {
        &self.circuits
    }

    pub fn cooccurrence(&self) -> &CooccurrenceTable {
        &self.cooccurrence
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    /// Log a summary of what was ingested and dropped.
    pub fn log_summary(&self) {
        info!(
            "Corpus: {} records, {} tracks, {} circuits, {} co-occurrences \
             ({} invalid coordinates, {} rejected labels)",
            self.stats.records,
            self.tracks.len(),
            self.circuits.len(),
            self.stats.cooccurrences,
            self.stats.invalid_coordinates,
            self.stats.rejected_labels
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RuleTable;

    fn rules() -> RuleTable {
        RuleTable::new()
            .canonical("A1", "RED1")
            .canonical("A2", "RED2")
    }

    #[test]
    fn test_split_records_correlate_within_snapshot() {
        // Circuit feed and coordinate feed report the same train separately.
        let mut corpus = ObservationCorpus::new();
        corpus.ingest(
            vec![
                Observation::new("train-1", 5).with_circuit(7, 12),
                Observation::new("train-1", 5)
                    .with_position("A1", "Red", TrackPoint::new(500.0, 500.0)),
            ],
            &rules(),
        );

        assert_eq!(corpus.stats().cooccurrences, 1);
        let assignment = corpus.cooccurrence().assign();
        assert_eq!(
            assignment.coordinate(7),
            Some(TrackPoint::new(500.0, 500.0))
        );
    }

    #[test]
    fn test_no_correlation_across_snapshots() {
        let mut corpus = ObservationCorpus::new();
        corpus.ingest(
            vec![
                Observation::new("train-1", 1).with_circuit(7, 0),
                Observation::new("train-1", 2)
                    .with_coordinate(TrackPoint::new(500.0, 500.0)),
            ],
            &rules(),
        );

        assert_eq!(corpus.stats().cooccurrences, 0);
        assert!(corpus.cooccurrence().is_empty());
        // The circuit is still known, just unresolved.
        assert!(corpus.circuits().contains(&7));
    }

    #[test]
    fn test_invalid_coordinate_dropped() {
        let mut corpus = ObservationCorpus::new();
        corpus.ingest(
            vec![Observation::new("train-1", 0)
                .with_circuit(7, 0)
                .with_position("A1", "Red", TrackPoint::new(0.1, 0.2))],
            &rules(),
        );

        assert_eq!(corpus.stats().invalid_coordinates, 1);
        assert_eq!(corpus.stats().cooccurrences, 0);
        assert!(corpus.tracks().is_empty());
    }

    #[test]
    fn test_rejected_label_discards_single_observation() {
        let mut corpus = ObservationCorpus::new();
        corpus.ingest(
            vec![
                Observation::new("train-1", 0)
                    .with_position("Z9", "Red", TrackPoint::new(500.0, 500.0)),
                Observation::new("train-2", 0)
                    .with_position("A1", "Red", TrackPoint::new(600.0, 600.0)),
            ],
            &rules(),
        );

        assert_eq!(corpus.stats().rejected_labels, 1);
        let red = &corpus.tracks()["RED1"];
        assert_eq!(red.counts.len(), 1);
    }

    #[test]
    fn test_counts_and_lines_accumulate() {
        let p = TrackPoint::new(500.0, 500.0);
        let mut corpus = ObservationCorpus::new();
        let mut records = Vec::new();
        for step in 0..4u64 {
            records.push(Observation::new("train-1", step).with_position("A1", "Red", p));
        }
        corpus.ingest(records, &rules());

        let red = &corpus.tracks()["RED1"];
        assert_eq!(red.counts[&p], 4);
        assert!(red.lines.contains("Red"));
    }

    #[test]
    fn test_dwell_weights_cooccurrence() {
        let p = TrackPoint::new(500.0, 500.0);
        let q = TrackPoint::new(900.0, 900.0);
        let mut corpus = ObservationCorpus::new();
        // One long dwell at p outweighs two fleeting reports at q.
        corpus.ingest(
            vec![
                Observation::new("t", 0).with_circuit(1, 10).with_coordinate(p),
                Observation::new("t", 1).with_circuit(1, 0).with_coordinate(q),
                Observation::new("t", 2).with_circuit(1, 0).with_coordinate(q),
            ],
            &rules(),
        );

        let assignment = corpus.cooccurrence().assign();
        assert_eq!(assignment.coordinate(1), Some(p));
    }
}
