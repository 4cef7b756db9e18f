//! Security gate.
//!
//! Scores the findings supplied by a [`VulnerabilityFeed`]. Any Critical
//! finding blocks; more findings than `max_security_issues` fails.

use anyhow::Result;
use std::sync::Arc;

use super::{Gate, GateResult, GateStatus, Severity, Violation, NO_SNAPSHOT};
use crate::quality::cancel::CancellationSignal;
use crate::quality::feeds::{SecuritySnapshot, VulnerabilityFeed};
use crate::quality::registry::{ExecutionContext, GateKind};

/// Gate over vulnerability and secret findings.
pub struct SecurityGate {
    feed: Arc<dyn VulnerabilityFeed>,
    max_issues: u32,
}

impl SecurityGate {
    pub fn new(feed: Arc<dyn VulnerabilityFeed>, max_issues: u32) -> Self {
        Self { feed, max_issues }
    }

    /// Evaluate a snapshot.
    pub fn evaluate(&self, snapshot: &SecuritySnapshot) -> GateResult {
        let findings = &snapshot.findings;
        let count_at = |sev: Severity| findings.iter().filter(|f| f.severity == sev).count();
        let critical = count_at(Severity::Critical);
        let high = count_at(Severity::High);
        let medium = count_at(Severity::Medium);
        let low = count_at(Severity::Low);

        let score = 100.0 - 10.0 * (critical + high) as f64 - 5.0 * medium as f64 - low as f64;

        let status = if critical > 0 {
            GateStatus::Blocked
        } else if findings.len() > self.max_issues as usize {
            GateStatus::Failed
        } else if !findings.is_empty() {
            GateStatus::Warning
        } else {
            GateStatus::Passed
        };

        let violations = findings.iter().map(|f| {
            let mut v = Violation::new("security_issue", f.severity, f.message.clone())
                .with_detail("id", f.id.clone());
            v.file = f.file.clone();
            v.line = f.line;
            v
        });

        let mut result = GateResult::new(GateKind::Security.name())
            .with_score(score)
            .with_violations(violations)
            .with_status(status)
            .with_message(format!(
                "{} finding(s): {critical} critical, {high} high, {medium} medium, {low} low (max {})",
                findings.len(),
                self.max_issues
            ))
            .with_metadata("findings", findings.len());

        if critical > 0 {
            result = result.with_suggestion("Resolve critical findings immediately; they block release");
        }
        if findings.iter().any(|f| f.id == "hardcoded_secret") {
            result = result.with_suggestion("Move credentials into environment variables or a secret store");
        }
        if findings.iter().any(|f| f.id.starts_with("RUSTSEC")) {
            result = result.with_suggestion("Run `cargo audit` and update affected dependencies");
        }
        result
    }
}

impl Gate for SecurityGate {
    fn name(&self) -> &str {
        GateKind::Security.name()
    }

    fn check(&self, _context: ExecutionContext, cancel: &CancellationSignal) -> Result<GateResult> {
        cancel.check(self.name())?;
        let snapshot = self.feed.snapshot()?;
        cancel.check(self.name())?;
        Ok(match snapshot {
            Some(snapshot) => self.evaluate(&snapshot),
            None => GateResult::skipped(self.name(), NO_SNAPSHOT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::feeds::{SecurityFinding, StaticFeed};

    fn gate(max: u32) -> SecurityGate {
        SecurityGate::new(Arc::new(StaticFeed::<SecuritySnapshot>::none()), max)
    }

    fn snapshot(severities: &[Severity]) -> SecuritySnapshot {
        SecuritySnapshot {
            findings: severities
                .iter()
                .enumerate()
                .map(|(i, s)| SecurityFinding::new(format!("F{i}"), *s, "finding"))
                .collect(),
        }
    }

    #[test]
    fn test_no_findings_passes() {
        let result = gate(0).evaluate(&SecuritySnapshot::default());
        assert_eq!(result.status, GateStatus::Passed);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_exceeding_max_fails_and_scores() {
        let result = gate(0).evaluate(&snapshot(&[Severity::High, Severity::Medium, Severity::Low]));
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.score, 84.0);
        assert_eq!(result.violations.len(), 3);
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn test_within_allowance_warns() {
        let result = gate(5).evaluate(&snapshot(&[Severity::Medium]));
        assert_eq!(result.status, GateStatus::Warning);
    }

    #[test]
    fn test_critical_blocks_even_within_allowance() {
        let result = gate(10).evaluate(&snapshot(&[Severity::Critical]));
        assert_eq!(result.status, GateStatus::Blocked);
        assert!(result.status.is_failing());
    }

    #[test]
    fn test_missing_snapshot_skips() {
        let result = gate(0)
            .check(ExecutionContext::Commit, &CancellationSignal::new())
            .unwrap();
        assert_eq!(result.status, GateStatus::Skipped);
        assert_eq!(result.message, NO_SNAPSHOT);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let result = gate(0).evaluate(&snapshot(&[Severity::High; 15]));
        assert_eq!(result.score, 0.0);
    }
}
