//! Fork splitting via label rewrites, then segment deduplication.
//!
//! A trunk track and a fork-derived alias share a stretch of physical rail;
//! the alias gets split around the trunk's claim.
//!
//! Run with: cargo run --example fork_resolution

use std::collections::BTreeSet;

use track_mapper::normalize::{LabelNormalizer, RuleTable};
use track_mapper::{preference_order, resolve_overlaps, EngineConfig, OrderedTrack, TrackPoint};

fn lines(labels: &[&str]) -> BTreeSet<String> {
    labels.iter().map(|l| l.to_string()).collect()
}

fn main() {
    // Yellow trains on C tracks run the fork; rewrite them onto a synthetic
    // L label so each fork half gets its own canonical track.
    let rules = RuleTable::new()
        .rewrite("C", "Yellow", "L")
        .canonical("C1", "ORANGE1")
        .canonical("L1", "YELLOW1");

    println!("Label normalization:");
    for (track, line) in [("C1", "Orange"), ("C1", "Yellow"), ("C1", "Silver")] {
        match rules.normalize(track, line) {
            Ok(canonical) => println!("  {}/{} -> {}", track, line, canonical),
            Err(rejection) => println!("  {}/{} rejected: {}", track, line, rejection),
        }
    }

    // The trunk runs straight; the alias approaches from the south, rides
    // the trunk for three edges, then leaves north.
    let trunk_path: Vec<TrackPoint> =
        (0..14).map(|i| TrackPoint::new(f64::from(i) * 200.0, 0.0)).collect();

    let mut alias_path: Vec<TrackPoint> = (0..5)
        .map(|i| TrackPoint::new(f64::from(i) * 200.0, f64::from(1000 - i * 200)))
        .collect();
    alias_path.push(TrackPoint::new(1000.0, 0.0));
    alias_path.push(TrackPoint::new(1200.0, 0.0));
    alias_path.push(TrackPoint::new(1400.0, 0.0));
    alias_path.push(TrackPoint::new(1600.0, 0.0));
    for i in 1..=5 {
        alias_path.push(TrackPoint::new(1600.0 + f64::from(i) * 200.0, f64::from(i) * 200.0));
    }

    let tracks = vec![
        OrderedTrack {
            id: "YELLOW1".to_string(),
            lines: lines(&["Yellow"]),
            path: alias_path,
        },
        OrderedTrack {
            id: "ORANGE1".to_string(),
            lines: lines(&["Orange", "Silver"]),
            path: trunk_path,
        },
    ];

    let config = EngineConfig {
        trunk_tracks: vec!["ORANGE1".to_string()],
        ..EngineConfig::default()
    };

    let ordered = preference_order(tracks, &config.trunk_tracks);
    println!("\nProcessing order:");
    for track in &ordered {
        println!("  {} ({} points)", track.id, track.path.len());
    }

    let segments = resolve_overlaps(&ordered, &config);
    println!("\nResolved segments:");
    for segment in &segments {
        println!(
            "  {} ({}): {} points from ({:.0}, {:.0}) to ({:.0}, {:.0})",
            segment.id,
            segment.line,
            segment.path.len(),
            segment.path[0].x,
            segment.path[0].y,
            segment.path.last().unwrap().x,
            segment.path.last().unwrap().y
        );
    }
}
