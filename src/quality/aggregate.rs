//! Combines per-gate results into the overall verdict.

use super::gates::{GateResult, GateStatus, Severity};

/// Gate name of the combined result.
pub const OVERALL: &str = "overall";

/// Folds gate results into one `overall` [`GateResult`].
///
/// Skipped results do not participate: they contribute neither score,
/// status nor severity, but their violations and suggestions are kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultAggregator;

impl ResultAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `results` into the overall result.
    #[must_use]
    pub fn aggregate(&self, results: &[GateResult]) -> GateResult {
        let participating: Vec<&GateResult> =
            results.iter().filter(|r| r.status.participates()).collect();

        let mut overall = GateResult::new(OVERALL)
            .with_violations(results.iter().flat_map(|r| r.violations.iter().cloned()))
            .with_suggestions(results.iter().flat_map(|r| r.suggestions.iter().cloned()))
            .with_duration(results.iter().map(|r| r.execution_time_ms).sum());

        if participating.is_empty() {
            overall.severity = Severity::Info;
            return overall
                .with_status(GateStatus::Passed)
                .with_score(100.0)
                .with_message("no gates executed");
        }

        let status = if participating.iter().any(|r| r.status.is_failing()) {
            GateStatus::Failed
        } else if participating.iter().any(|r| r.status == GateStatus::Warning) {
            GateStatus::Warning
        } else {
            GateStatus::Passed
        };

        let score =
            participating.iter().map(|r| r.score).sum::<f64>() / participating.len() as f64;
        let failing = participating.iter().filter(|r| r.status.is_failing()).count();
        let skipped = results.len() - participating.len();

        // Skipped gates may carry violations; severity only follows participants.
        overall.severity = participating
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or_default();

        overall
            .with_status(status)
            .with_score(score)
            .with_message(format!(
                "{} of {} gate(s) failing, {} skipped, average score {:.1}",
                failing,
                participating.len(),
                skipped,
                score
            ))
            .with_metadata("gates_executed", participating.len())
            .with_metadata("gates_skipped", skipped)
    }
}
