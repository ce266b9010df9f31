//! Circuit-to-coordinate assignment.
//!
//! Telemetry reports train positions twice over: as abstract track circuit
//! identifiers and as raw planar coordinates. Whenever one train is seen with
//! both in the same snapshot, that circuit/coordinate pairing gains weight.
//! This module accumulates those weighted co-occurrences and resolves them
//! into an injective mapping: each circuit gets at most one representative
//! coordinate, and no coordinate is shared between circuits.
//!
//! The matcher is a greedy approximation, not a maximum-weight matching: all
//! pairs are visited in descending weight order and a pair is taken whenever
//! both sides are still unclaimed. This is deterministic (ties resolve by
//! first-encounter order) and guarantees injectivity, which is what the
//! downstream geometry needs; global optimality is not required.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::info;

use crate::{CircuitId, TrackPoint};

#[derive(Debug, Clone, Copy)]
struct PairWeight {
    weight: u64,
    /// Encounter order of the pair, used as a deterministic tie-break.
    rank: u64,
}

/// Accumulated co-occurrence weights between circuits and coordinates.
///
/// Each recorded co-occurrence adds `1 + dwell_seconds`: a coordinate reported
/// while a train lingered on a circuit is a more reliable sample than a
/// fleeting report, so dwell time scales the pair's weight.
///
/// # Example
/// ```
/// use track_mapper::{CooccurrenceTable, TrackPoint};
///
/// let mut table = CooccurrenceTable::new();
/// table.add(42, TrackPoint::new(1000.0, 2000.0), 30);
///
/// let assignment = table.assign();
/// assert_eq!(assignment.coordinate(42), Some(TrackPoint::new(1000.0, 2000.0)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CooccurrenceTable {
    weights: HashMap<(CircuitId, TrackPoint), PairWeight>,
}

impl CooccurrenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one co-occurrence of `circuit` and `coordinate`, weighted by
    /// the seconds the train had dwelled at the circuit.
    pub fn add(&mut self, circuit: CircuitId, coordinate: TrackPoint, dwell_seconds: u32) {
        let rank = self.weights.len() as u64;
        let entry = self
            .weights
            .entry((circuit, coordinate))
            .or_insert(PairWeight { weight: 0, rank });
        entry.weight += 1 + u64::from(dwell_seconds);
    }

    /// Number of distinct (circuit, coordinate) pairs seen.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// All circuits that co-occurred with at least one coordinate.
    pub fn circuits(&self) -> BTreeSet<CircuitId> {
        self.weights.keys().map(|(circuit, _)| *circuit).collect()
    }

    /// Resolve the table into an injective circuit-to-coordinate mapping.
    ///
    /// Pairs are visited in descending weight order (ties by encounter
    /// order); a pair is assigned iff neither its circuit nor its coordinate
    /// has been claimed by a heavier pair. An empty table yields an empty
    /// assignment.
    pub fn assign(&self) -> CircuitAssignment {
        let mut pairs: Vec<(&(CircuitId, TrackPoint), &PairWeight)> = self.weights.iter().collect();
        pairs.sort_unstable_by(|a, b| {
            b.1.weight
                .cmp(&a.1.weight)
                .then_with(|| a.1.rank.cmp(&b.1.rank))
        });

        let mut coordinates: HashMap<CircuitId, TrackPoint> = HashMap::new();
        let mut claimed: HashSet<TrackPoint> = HashSet::new();

        for ((circuit, coordinate), _) in pairs {
            if !coordinates.contains_key(circuit) && !claimed.contains(coordinate) {
                coordinates.insert(*circuit, *coordinate);
                claimed.insert(*coordinate);
            }
        }

        info!(
            "Assigned coordinates to {} of {} circuits ({} candidate pairs)",
            coordinates.len(),
            self.circuits().len(),
            self.weights.len()
        );

        CircuitAssignment { coordinates }
    }
}

/// An injective partial mapping from circuits to representative coordinates.
///
/// Circuits never co-observed with a coordinate are absent; downstream
/// consumers treat "no coordinate" as a valid state, not an error.
#[derive(Debug, Clone, Default)]
pub struct CircuitAssignment {
    coordinates: HashMap<CircuitId, TrackPoint>,
}

impl CircuitAssignment {
    /// The representative coordinate for `circuit`, if one was assigned.
    pub fn coordinate(&self, circuit: CircuitId) -> Option<TrackPoint> {
        self.coordinates.get(&circuit).copied()
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CircuitId, TrackPoint)> + '_ {
        self.coordinates.iter().map(|(id, point)| (*id, *point))
    }

    /// Of the given circuits, those that received no coordinate.
    pub fn unresolved(&self, circuits: impl IntoIterator<Item = CircuitId>) -> Vec<CircuitId> {
        circuits
            .into_iter()
            .filter(|id| !self.coordinates.contains_key(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64) -> TrackPoint {
        TrackPoint::new(x, y)
    }

    #[test]
    fn test_empty_table_yields_empty_assignment() {
        let table = CooccurrenceTable::new();
        let assignment = table.assign();
        assert!(assignment.is_empty());
    }

    #[test]
    fn test_heavier_pair_claims_contested_coordinate() {
        // Circuits A=1 and B=2 both co-occur with P; B also co-occurs with Q.
        // A's heavier pairing claims P first and B falls back to Q.
        let p = point(100.0, 100.0);
        let q = point(200.0, 200.0);

        let mut table = CooccurrenceTable::new();
        table.add(1, p, 9); // weight 10
        table.add(2, p, 3); // weight 4
        table.add(2, q, 2); // weight 3

        let assignment = table.assign();
        assert_eq!(assignment.coordinate(1), Some(p));
        assert_eq!(assignment.coordinate(2), Some(q));
    }

    #[test]
    fn test_injectivity() {
        let mut table = CooccurrenceTable::new();
        for circuit in 0..20u32 {
            for step in 0..3u32 {
                // Overlapping candidate coordinates across circuits.
                let coord = point(f64::from(circuit + step) * 10.0, 50.0);
                table.add(circuit, coord, step);
            }
        }

        let assignment = table.assign();
        let mut seen = HashSet::new();
        for (_, coord) in assignment.iter() {
            assert!(seen.insert(coord), "coordinate assigned twice: {:?}", coord);
        }
    }

    #[test]
    fn test_ties_resolve_by_encounter_order() {
        let p = point(100.0, 100.0);
        let mut table = CooccurrenceTable::new();
        table.add(1, p, 0);
        table.add(2, p, 0);

        let assignment = table.assign();
        assert_eq!(assignment.coordinate(1), Some(p));
        assert_eq!(assignment.coordinate(2), None);
    }

    #[test]
    fn test_weight_accumulates_across_calls() {
        let p = point(100.0, 100.0);
        let q = point(200.0, 200.0);
        let mut table = CooccurrenceTable::new();
        // Circuit 1 paired with q once, heavily; with p three separate times,
        // lightly, summing heavier.
        table.add(1, q, 3); // weight 4
        table.add(1, p, 1); // weight 2
        table.add(1, p, 1); // weight 4
        table.add(1, p, 0); // weight 5

        let assignment = table.assign();
        assert_eq!(assignment.coordinate(1), Some(p));
    }

    #[test]
    fn test_unresolved_reporting() {
        let mut table = CooccurrenceTable::new();
        table.add(1, point(100.0, 100.0), 0);

        let assignment = table.assign();
        assert_eq!(assignment.unresolved([1, 2, 3]), vec![2, 3]);
    }
}
