//! End-to-end reconstruction of a small synthetic network.
//!
//! Run with: cargo run --example reconstruct_network

use track_mapper::normalize::RuleTable;
use track_mapper::projection::to_lat_lng;
use track_mapper::{
    reconstruct_network, EngineConfig, Observation, ObservationCorpus, StationDirectory,
    StationInfo, TrackPoint,
};

fn main() {
    // Raw A tracks relabel to RED, B tracks to BLUE.
    let rules = RuleTable::new()
        .service_digits(&['1', '2'])
        .exclude_line("Non-revenue")
        .canonical("A1", "RED1")
        .canonical("B1", "BLUE1");

    // Two trains sweeping their lines over 10 snapshots. Each snapshot
    // reports the circuit feed and the coordinate feed as separate records,
    // correlated by train id.
    let mut records: Vec<Observation> = Vec::new();
    for step in 0..10u64 {
        records.push(Observation::new("train-101", step).with_circuit(100 + step as u32, 8));
        records.push(Observation::new("train-101", step).with_position(
            "A1",
            "Red",
            TrackPoint::new(-8_575_000.0 + step as f64 * 150.0, 4_707_000.0),
        ));

        records.push(Observation::new("train-202", step).with_circuit(200 + step as u32, 3));
        records.push(Observation::new("train-202", step).with_position(
            "B1",
            "Blue",
            TrackPoint::new(-8_575_000.0 + step as f64 * 150.0, 4_703_500.0),
        ));
    }
    // A pocket-track report the rules reject, and an invalid coordinate.
    records.push(Observation::new("train-303", 4).with_position(
        "A3",
        "Red",
        TrackPoint::new(-8_574_000.0, 4_706_000.0),
    ));
    records.push(Observation::new("train-101", 5).with_coordinate(TrackPoint::new(0.0, 0.0)));

    let mut corpus = ObservationCorpus::new();
    corpus.ingest(records, &rules);

    let mut stations = StationDirectory::new();
    stations.insert_station(StationInfo::new("MC", "Metro Center"));
    stations.link_circuit(104, "MC");

    let geometry = reconstruct_network(&corpus, &stations, &EngineConfig::default());

    let stats = corpus.stats();
    println!("Ingested {} records", stats.records);
    println!(
        "  dropped: {} invalid coordinates, {} rejected labels",
        stats.invalid_coordinates, stats.rejected_labels
    );

    println!("\nSegments:");
    for segment in &geometry.segments {
        let start = to_lat_lng(&segment.path[0]);
        let end = to_lat_lng(segment.path.last().unwrap());
        println!(
            "  {} ({}): {} points, ({:.4}, {:.4}) -> ({:.4}, {:.4})",
            segment.id,
            segment.line,
            segment.path.len(),
            start.y(),
            start.x(),
            end.y(),
            end.x()
        );
    }

    println!("\nCircuits:");
    for circuit in &geometry.circuits {
        let coord = circuit
            .coordinate
            .map(|c| format!("({:.0}, {:.0})", c.x, c.y))
            .unwrap_or_else(|| "unresolved".to_string());
        let station = circuit
            .station
            .as_ref()
            .map(|s| format!(" [{} {}]", s.code, s.name))
            .unwrap_or_default();
        println!("  {}: {}{}", circuit.id, coord, station);
    }
}
