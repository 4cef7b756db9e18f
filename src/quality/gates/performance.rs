//! Performance gate.
//!
//! Compares benchmark numbers against the p95 latency and throughput
//! budgets. Each metric costs at most 50 points.

use anyhow::Result;
use std::sync::Arc;

use super::{Gate, GateResult, Severity, Violation, NO_SNAPSHOT};
use crate::config::Thresholds;
use crate::quality::cancel::CancellationSignal;
use crate::quality::feeds::{BenchmarkFeed, BenchmarkSnapshot};
use crate::quality::registry::{ExecutionContext, GateKind};

const MAX_PENALTY: f64 = 50.0;

/// Gate over benchmark snapshots.
pub struct PerformanceGate {
    feed: Arc<dyn BenchmarkFeed>,
    max_p95_ms: f64,
    min_throughput_rps: f64,
}

impl PerformanceGate {
    pub fn new(feed: Arc<dyn BenchmarkFeed>, thresholds: &Thresholds) -> Self {
        Self {
            feed,
            max_p95_ms: thresholds.max_response_time_p95_ms,
            min_throughput_rps: thresholds.min_throughput_rps,
        }
    }

    /// Evaluate a snapshot.
    pub fn evaluate(&self, snapshot: &BenchmarkSnapshot) -> GateResult {
        let mut violations = Vec::new();
        let mut suggestions = Vec::new();
        let mut penalty = 0.0;

        if snapshot.p95_ms > self.max_p95_ms {
            let over = (snapshot.p95_ms - self.max_p95_ms) / self.max_p95_ms * 100.0;
            penalty += over.min(MAX_PENALTY);
            violations.push(
                Violation::new(
                    "slow_response_time",
                    Severity::High,
                    format!(
                        "p95 response time {:.1}ms exceeds {:.1}ms",
                        snapshot.p95_ms, self.max_p95_ms
                    ),
                )
                .with_detail("p95_ms", snapshot.p95_ms)
                .with_detail("max_p95_ms", self.max_p95_ms),
            );
            suggestions.push("Profile the slowest endpoints and cache hot paths".to_string());
        }

        if self.min_throughput_rps > 0.0 && snapshot.throughput_rps < self.min_throughput_rps {
            let under = (self.min_throughput_rps - snapshot.throughput_rps)
                / self.min_throughput_rps
                * 100.0;
            penalty += under.min(MAX_PENALTY);
            violations.push(
                Violation::new(
                    "low_throughput",
                    Severity::High,
                    format!(
                        "Throughput {:.1} rps is below {:.1} rps",
                        snapshot.throughput_rps, self.min_throughput_rps
                    ),
                )
                .with_detail("throughput_rps", snapshot.throughput_rps)
                .with_detail("min_throughput_rps", self.min_throughput_rps),
            );
            suggestions.push("Look for contention and blocking calls on request paths".to_string());
        }

        let message = format!(
            "p95 {:.1}ms (max {:.1}), throughput {:.1} rps (min {:.1})",
            snapshot.p95_ms, self.max_p95_ms, snapshot.throughput_rps, self.min_throughput_rps
        );

        GateResult::evaluated(GateKind::Performance.name(), 100.0 - penalty, violations, message)
            .with_suggestions(suggestions)
            .with_metadata("p95_ms", snapshot.p95_ms)
            .with_metadata("throughput_rps", snapshot.throughput_rps)
    }
}

impl Gate for PerformanceGate {
    fn name(&self) -> &str {
        GateKind::Performance.name()
    }

    fn check(&self, _context: ExecutionContext, cancel: &CancellationSignal) -> Result<GateResult> {
        cancel.check(self.name())?;
        let snapshot = self.feed.snapshot()?;
        Ok(match snapshot {
            Some(snapshot) => self.evaluate(&snapshot),
            None => GateResult::skipped(self.name(), NO_SNAPSHOT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::feeds::StaticFeed;
    use crate::quality::gates::GateStatus;

    fn gate(snapshot: Option<BenchmarkSnapshot>) -> PerformanceGate {
        PerformanceGate::new(Arc::new(StaticFeed(snapshot)), &Thresholds::default())
    }

    #[test]
    fn test_within_budget_passes() {
        let snap = BenchmarkSnapshot {
            p95_ms: 250.0,
            throughput_rps: 400.0,
        };
        let result = gate(Some(snap)).evaluate(&snap);
        assert_eq!(result.status, GateStatus::Passed);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_slow_response_penalised_by_percentage_over() {
        let snap = BenchmarkSnapshot {
            p95_ms: 600.0,
            throughput_rps: 400.0,
        };
        let result = gate(None).evaluate(&snap);
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.count_kind("slow_response_time"), 1);
        assert!((result.score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_penalties_capped_per_metric() {
        let snap = BenchmarkSnapshot {
            p95_ms: 5000.0,
            throughput_rps: 0.0,
        };
        let result = gate(None).evaluate(&snap);
        assert_eq!(result.count_kind("low_throughput"), 1);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_missing_snapshot_skips() {
        let result = gate(None)
            .check(ExecutionContext::Release, &CancellationSignal::new())
            .unwrap();
        assert_eq!(result.status, GateStatus::Skipped);
    }
}
