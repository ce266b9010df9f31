//! Track label normalization.
//!
//! Raw telemetry reports a track label and a line label per train. Neither is
//! directly usable as a canonical track identifier: distinctly labelled tracks
//! can be physically continuous, forks share one label between two physical
//! paths, and some label combinations are simply implausible (a train reported
//! on a track its line never serves). This module canonicalizes raw
//! `(track_label, line_label)` pairs into a smaller set of canonical track
//! identifiers through an ordered, data-driven rule table.
//!
//! Rejections are a filtering outcome, not an error: a rejected pair means
//! "discard this one observation" and never aborts a run.

use std::collections::HashMap;
use std::fmt;

/// Why a raw label pair was rejected by normalization.
///
/// The observation carrying the pair is discarded; processing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRejection {
    /// The track's service digit marks it as a pocket track or connector,
    /// not a continuous mainline.
    NotMainline,
    /// The line label is excluded from reconstruction (e.g. non-revenue
    /// service running along unusual paths).
    ExcludedLine,
    /// The line never serves this track; the report is a data oddity.
    ImplausibleRoute,
    /// No canonical identifier is known for the (possibly rewritten) label.
    UnknownLabel,
}

impl fmt::Display for LabelRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelRejection::NotMainline => write!(f, "track is not a mainline"),
            LabelRejection::ExcludedLine => write!(f, "line label is excluded"),
            LabelRejection::ImplausibleRoute => write!(f, "line does not serve this track"),
            LabelRejection::UnknownLabel => write!(f, "no canonical identifier for label"),
        }
    }
}

/// Canonicalizes raw track/line label pairs.
///
/// Implemented by [`RuleTable`]; a custom implementation can replace the rule
/// table wholesale when a network's labelling needs bespoke logic.
pub trait LabelNormalizer {
    /// Map a raw `(track_label, line_label)` pair to a canonical track
    /// identifier, or reject the pair.
    fn normalize(&self, track_label: &str, line_label: &str) -> Result<String, LabelRejection>;
}

#[derive(Debug, Clone)]
struct Rewrite {
    track_prefix: String,
    /// `None` applies regardless of line.
    line_label: Option<String>,
    new_prefix: String,
}

/// A data-driven normalization rule table.
///
/// Rules are applied in a fixed order:
///
/// 1. **Service digit filter** - the second character of the track label must
///    be one of the configured service digits (mainline track numbers).
/// 2. **Excluded lines** - observations on excluded line labels are rejected.
/// 3. **Allowed lines per prefix** - if the raw track label starts with a
///    prefix that has an allow-list, the line must be on it.
/// 4. **Prefix rewrites** - ordered rewrite rules, each optionally conditioned
///    on the line label, replace the matched prefix. Rewrites are used to
///    split forks into separate labels (the resulting duplicate coverage is
///    resolved later during segment deduplication).
/// 5. **Canonical relabel** - the final label must map to a canonical
///    identifier.
///
/// # Example
/// ```
/// use track_mapper::normalize::{LabelNormalizer, RuleTable};
///
/// let rules = RuleTable::new()
///     .service_digits(&['1', '2'])
///     .canonical("A1", "RED1")
///     .canonical("A2", "RED2");
///
/// assert_eq!(rules.normalize("A1", "Red"), Ok("RED1".to_string()));
/// assert!(rules.normalize("A3", "Red").is_err()); // pocket track
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    service_digits: Vec<char>,
    excluded_lines: Vec<String>,
    allowed_lines: Vec<(String, Vec<String>)>,
    rewrites: Vec<Rewrite>,
    canonical: HashMap<String, String>,
}

impl RuleTable {
    /// Create an empty rule table. With no rules configured, every label is
    /// rejected as [`LabelRejection::UnknownLabel`] until canonical entries
    /// are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict accepted track labels to those whose second character is one
    /// of `digits`. An empty restriction (the default) accepts any label.
    pub fn service_digits(mut self, digits: &[char]) -> Self {
        self.service_digits = digits.to_vec();
        self
    }

    /// Reject all observations carrying this line label.
    pub fn exclude_line(mut self, line_label: &str) -> Self {
        self.excluded_lines.push(line_label.to_string());
        self
    }

    /// Restrict which lines may be observed on tracks starting with
    /// `track_prefix`. Reports of other lines on such tracks are rejected.
    pub fn allow_lines(mut self, track_prefix: &str, lines: &[&str]) -> Self {
        self.allowed_lines.push((
            track_prefix.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        ));
        self
    }

    /// Rewrite `track_prefix` to `new_prefix` when the observation's line is
    /// `line_label`. Rewrites apply in insertion order, each to the current
    /// (possibly already rewritten) label.
    pub fn rewrite(mut self, track_prefix: &str, line_label: &str, new_prefix: &str) -> Self {
        self.rewrites.push(Rewrite {
            track_prefix: track_prefix.to_string(),
            line_label: Some(line_label.to_string()),
            new_prefix: new_prefix.to_string(),
        });
        self
    }

    /// Rewrite `track_prefix` to `new_prefix` regardless of line.
    pub fn rewrite_always(mut self, track_prefix: &str, new_prefix: &str) -> Self {
        self.rewrites.push(Rewrite {
            track_prefix: track_prefix.to_string(),
            line_label: None,
            new_prefix: new_prefix.to_string(),
        });
        self
    }

    /// Map a final (post-rewrite) track label to its canonical identifier.
    pub fn canonical(mut self, track_label: &str, canonical_id: &str) -> Self {
        self.canonical
            .insert(track_label.to_string(), canonical_id.to_string());
        self
    }
}

impl LabelNormalizer for RuleTable {
    fn normalize(&self, track_label: &str, line_label: &str) -> Result<String, LabelRejection> {
        if !self.service_digits.is_empty() {
            match track_label.chars().nth(1) {
                Some(digit) if self.service_digits.contains(&digit) => {}
                _ => return Err(LabelRejection::NotMainline),
            }
        }

        if self.excluded_lines.iter().any(|l| l == line_label) {
            return Err(LabelRejection::ExcludedLine);
        }

        for (prefix, lines) in &self.allowed_lines {
            if track_label.starts_with(prefix.as_str())
                && !lines.iter().any(|l| l == line_label)
            {
                return Err(LabelRejection::ImplausibleRoute);
            }
        }

        let mut label = track_label.to_string();
        for rewrite in &self.rewrites {
            let line_matches = rewrite
                .line_label
                .as_deref()
                .map_or(true, |l| l == line_label);
            if line_matches && label.starts_with(rewrite.track_prefix.as_str()) {
                label = format!(
                    "{}{}",
                    rewrite.new_prefix,
                    &label[rewrite.track_prefix.len()..]
                );
            }
        }

        self.canonical
            .get(&label)
            .cloned()
            .ok_or(LabelRejection::UnknownLabel)
    }
}
