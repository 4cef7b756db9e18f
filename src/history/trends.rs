//! Trend analysis over recorded runs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::HistoryEntry;

/// Violation types reported in a trend report.
pub const TOP_VIOLATIONS: usize = 10;

/// Score change between the window halves that counts as movement.
pub const DIRECTION_THRESHOLD: f64 = 5.0;

/// Movement of a gate's score across the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Degrading,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Stable => write!(f, "stable"),
            Self::Degrading => write!(f, "degrading"),
        }
    }
}

/// Score statistics for one gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateTrend {
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub executions: usize,
    pub direction: TrendDirection,
}

/// How often a violation type occurred in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationFrequency {
    #[serde(rename = "type")]
    pub kind: String,
    pub count: usize,
}

/// Aggregated history over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub days: u32,
    /// Runs inside the window.
    pub runs: usize,
    pub gates: BTreeMap<String, GateTrend>,
    /// Most frequent violation types, most frequent first.
    pub top_violations: Vec<ViolationFrequency>,
    pub suggestions: Vec<String>,
}

impl TrendReport {
    /// Plain-text rendering.
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = format!("## Quality Trends ({} day(s), {} run(s))\n\n", self.days, self.runs);

        if self.gates.is_empty() {
            output.push_str("No gate executions recorded in this window.\n");
            return output;
        }

        for (name, trend) in &self.gates {
            output.push_str(&format!(
                "{name}: avg {:.1} (min {:.1}, max {:.1}) over {} run(s), {}\n",
                trend.average_score,
                trend.min_score,
                trend.max_score,
                trend.executions,
                trend.direction
            ));
        }

        if !self.top_violations.is_empty() {
            output.push_str("\nTop violations:\n");
            for v in &self.top_violations {
                output.push_str(&format!("  {} x{}\n", v.kind, v.count));
            }
        }

        if !self.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for s in &self.suggestions {
                output.push_str(&format!("  - {s}\n"));
            }
        }
        output
    }
}

/// Start of a `days`-long window ending at `now`. Windows reaching past the
/// earliest representable time start there instead.
#[must_use]
pub fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Builds [`TrendReport`]s from history entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Analyse the entries recorded within the last `days` days.
    #[must_use]
    pub fn analyze(&self, entries: &[HistoryEntry], days: u32) -> TrendReport {
        let cutoff = window_start(Utc::now(), days);
        let mut window: Vec<&HistoryEntry> =
            entries.iter().filter(|e| e.timestamp >= cutoff).collect();
        window.sort_by_key(|e| e.timestamp);

        // Skipped results carry no score.
        let mut scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for entry in &window {
            for (name, result) in &entry.gates {
                if result.status.participates() {
                    scores.entry(name.clone()).or_default().push(result.score);
                }
                for v in &result.violations {
                    *counts.entry(v.kind.as_str()).or_default() += 1;
                }
            }
        }

        let gates: BTreeMap<String, GateTrend> = scores
            .into_iter()
            .map(|(name, scores)| (name, gate_trend(&scores)))
            .collect();

        let mut top_violations: Vec<ViolationFrequency> = counts
            .into_iter()
            .map(|(kind, count)| ViolationFrequency {
                kind: kind.to_string(),
                count,
            })
            .collect();
        top_violations.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));
        top_violations.truncate(TOP_VIOLATIONS);

        let mut suggestions = Vec::new();
        let weakest = gates
            .iter()
            .min_by(|a, b| a.1.average_score.total_cmp(&b.1.average_score));
        if let Some((name, trend)) = weakest {
            suggestions.push(format!(
                "Focus on the {name} gate (lowest average score {:.1})",
                trend.average_score
            ));
        }
        if let Some(top) = top_violations.first() {
            suggestions.push(format!(
                "Address recurring '{}' violations ({} occurrence(s))",
                top.kind, top.count
            ));
        }

        TrendReport {
            days,
            runs: window.len(),
            gates,
            top_violations,
            suggestions,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn gate_trend(scores: &[f64]) -> GateTrend {
    let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let direction = if scores.len() < 2 {
        TrendDirection::Stable
    } else {
        let (earlier, later) = scores.split_at(scores.len() / 2);
        let delta = mean(later) - mean(earlier);
        if delta > DIRECTION_THRESHOLD {
            TrendDirection::Improving
        } else if delta < -DIRECTION_THRESHOLD {
            TrendDirection::Degrading
        } else {
            TrendDirection::Stable
        }
    };

    GateTrend {
        average_score: mean(scores),
        min_score,
        max_score,
        executions: scores.len(),
        direction,
    }
}
