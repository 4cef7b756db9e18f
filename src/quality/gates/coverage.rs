//! Coverage gate.

use anyhow::Result;
use std::sync::Arc;

use super::{capped, Gate, GateResult, Severity, Violation, NO_SNAPSHOT};
use crate::config::Thresholds;
use crate::quality::cancel::CancellationSignal;
use crate::quality::feeds::{CoverageFeed, CoverageSnapshot};
use crate::quality::registry::{ExecutionContext, GateKind};

/// Gate over line/branch/function coverage percentages.
pub struct CoverageGate {
    feed: Arc<dyn CoverageFeed>,
    min_line: f64,
    min_branch: f64,
    min_function: f64,
}

impl CoverageGate {
    pub fn new(feed: Arc<dyn CoverageFeed>, thresholds: &Thresholds) -> Self {
        Self {
            feed,
            min_line: thresholds.min_line_coverage,
            min_branch: thresholds.min_branch_coverage,
            min_function: thresholds.min_function_coverage,
        }
    }

    /// Evaluate a snapshot. Each metric below its minimum costs two points
    /// per percentage point, at most 35.
    pub fn evaluate(&self, snapshot: &CoverageSnapshot) -> GateResult {
        let metrics = [
            ("line", snapshot.line, self.min_line),
            ("branch", snapshot.branch, self.min_branch),
            ("function", snapshot.function, self.min_function),
        ];

        let mut violations = Vec::new();
        let mut penalty = 0.0;
        for (metric, actual, minimum) in metrics {
            let gap = minimum - actual;
            if gap > 0.0 {
                penalty += capped(gap, 2.0, 35.0);
                violations.push(
                    Violation::new(
                        format!("insufficient_{metric}_coverage"),
                        Severity::High,
                        format!("{metric} coverage {actual:.1}% is below {minimum:.1}%"),
                    )
                    .with_detail("actual", actual)
                    .with_detail("minimum", minimum),
                );
            }
        }

        let suggestions = if violations.is_empty() {
            Vec::new()
        } else {
            vec!["Add tests for uncovered branches and functions".to_string()]
        };

        let message = format!(
            "line {:.1}%, branch {:.1}%, function {:.1}%",
            snapshot.line, snapshot.branch, snapshot.function
        );

        GateResult::evaluated(GateKind::Coverage.name(), 100.0 - penalty, violations, message)
            .with_suggestions(suggestions)
            .with_metadata("line", snapshot.line)
            .with_metadata("branch", snapshot.branch)
            .with_metadata("function", snapshot.function)
    }
}

impl Gate for CoverageGate {
    fn name(&self) -> &str {
        GateKind::Coverage.name()
    }

    fn check(&self, _context: ExecutionContext, cancel: &CancellationSignal) -> Result<GateResult> {
        cancel.check(self.name())?;
        Ok(match self.feed.snapshot()? {
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

    fn gate() -> CoverageGate {
        CoverageGate::new(Arc::new(StaticFeed::<CoverageSnapshot>::none()), &Thresholds::default())
    }

    #[test]
    fn test_meets_minimums() {
        let result = gate().evaluate(&CoverageSnapshot {
            line: 85.0,
            branch: 75.0,
            function: 90.0,
        });
        assert_eq!(result.status, GateStatus::Passed);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_each_metric_below_minimum_reported() {
        let result = gate().evaluate(&CoverageSnapshot {
            line: 75.0,
            branch: 20.0,
            function: 80.0,
        });
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.count_kind("insufficient_line_coverage"), 1);
        assert_eq!(result.count_kind("insufficient_branch_coverage"), 1);
        assert_eq!(result.count_kind("insufficient_function_coverage"), 0);
        // line: 5 points below -> 10, branch: capped at 35
        assert_eq!(result.score, 55.0);
    }

    #[test]
    fn test_missing_snapshot_skips() {
        let result = gate()
            .check(ExecutionContext::Commit, &CancellationSignal::new())
            .unwrap();
        assert_eq!(result.status, GateStatus::Skipped);
        assert_eq!(result.message, NO_SNAPSHOT);
    }
}
