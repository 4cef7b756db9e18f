//! Gate result types and the individual gate implementations.
//!
//! Each gate checks one aspect of a source tree and returns a scored,
//! structured [`GateResult`]. The engine only ever talks to gates through
//! the [`Gate`] trait.
//!
//! # Available Gates
//!
//! - [`CodeQualityGate`] - complexity, duplication, style, docs, parse validity
//! - [`ArchitectureGate`] - layering, coupling, cohesion, cycles, interfaces
//! - [`SecurityGate`] - vulnerability feed vs `max_security_issues`
//! - [`PerformanceGate`] - benchmark feed vs latency/throughput budgets
//! - [`CoverageGate`] - coverage feed vs minimum percentages

pub mod architecture;
pub mod code_quality;
pub mod coverage;
pub mod performance;
pub mod security;

pub use architecture::ArchitectureGate;
pub use code_quality::CodeQualityGate;
pub use coverage::CoverageGate;
pub use performance::PerformanceGate;
pub use security::SecurityGate;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::cancel::CancellationSignal;
use super::registry::ExecutionContext;
use crate::error::GateError;

// ============================================================================
// Severity
// ============================================================================

/// Severity of a violation or of a whole gate result.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only.
    #[default]
    Info,
    /// Cosmetic.
    Low,
    /// Should be fixed soon.
    Medium,
    /// Blocks the gate.
    High,
    /// Must be fixed immediately.
    Critical,
}

impl Severity {
    /// Check if this severity fails a gate.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Verdict of a single gate (or of the aggregate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    /// No findings that matter.
    #[default]
    Passed,
    /// Findings that should be looked at but do not block.
    Warning,
    /// Blocking findings.
    Failed,
    /// Findings severe enough to stop a release outright.
    Blocked,
    /// Not executed (cancelled, or nothing to measure).
    Skipped,
}

impl GateStatus {
    /// Failed and Blocked both count as failing.
    #[must_use]
    pub fn is_failing(&self) -> bool {
        matches!(self, Self::Failed | Self::Blocked)
    }

    /// Skipped results are excluded from aggregation.
    #[must_use]
    pub fn participates(&self) -> bool {
        !matches!(self, Self::Skipped)
    }

    /// Derive a status from violations: High/Critical fail, Medium/Low warn.
    #[must_use]
    pub fn from_violations(violations: &[Violation]) -> Self {
        match violations.iter().map(|v| v.severity).max() {
            Some(s) if s.is_blocking() => Self::Failed,
            Some(Severity::Medium | Severity::Low) => Self::Warning,
            _ => Self::Passed,
        }
    }
}

impl std::fmt::Display for GateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Warning => write!(f, "WARNING"),
            Self::Failed => write!(f, "FAILED"),
            Self::Blocked => write!(f, "BLOCKED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

// ============================================================================
// Violation
// ============================================================================

/// A single rule breach found by a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Machine-readable tag, e.g. `high_complexity`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// How bad it is.
    pub severity: Severity,
    /// File where the breach was found (if applicable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// Line number (if applicable).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Structured extra fields, e.g. `from_layer` / `to_layer`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl Violation {
    /// Create a new violation.
    pub fn new(kind: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            severity,
            file: None,
            line: None,
            details: BTreeMap::new(),
        }
    }

    /// Add a file and line location.
    #[must_use]
    pub fn at(mut self, file: impl AsRef<Path>, line: u32) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self.line = Some(line);
        self
    }

    /// Add a file location without a line.
    #[must_use]
    pub fn in_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Attach a structured detail.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Format as a string for display.
    #[must_use]
    pub fn format(&self) -> String {
        let mut out = format!("[{}] [{}] {}", self.severity, self.kind, self.message);
        if let Some(ref file) = self.file {
            match self.line {
                Some(line) => out.push_str(&format!(" at {}:{}", file.display(), line)),
                None => out.push_str(&format!(" at {}", file.display())),
            }
        }
        out
    }
}

// ============================================================================
// GateResult
// ============================================================================

/// Scored verdict of one gate.
///
/// The score is clamped to `[0, 100]` on every write.
///
/// # Example
///
/// ```
/// use gatewarden::quality::{GateResult, GateStatus};
///
/// let result = GateResult::new("code_quality").with_score(140.0);
/// assert_eq!(result.score, 100.0);
/// assert_eq!(result.status, GateStatus::Passed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    /// Name of the gate that produced this result.
    pub gate_name: String,
    /// Verdict.
    pub status: GateStatus,
    /// Highest severity among the findings.
    pub severity: Severity,
    /// Score in `[0, 100]`.
    pub score: f64,
    /// One-line summary.
    pub message: String,
    /// Findings, in discovery order.
    pub violations: Vec<Violation>,
    /// Remediation hints, without duplicates.
    pub suggestions: Vec<String>,
    /// Wall-clock duration of the check in milliseconds.
    pub execution_time_ms: u64,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
    /// Gate-specific diagnostics.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Clamp a score into `[0, 100]`; non-finite values become 0.
#[must_use]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

impl GateResult {
    /// Create a passing result with a perfect score.
    pub fn new(gate_name: impl Into<String>) -> Self {
        Self {
            gate_name: gate_name.into(),
            status: GateStatus::Passed,
            severity: Severity::Info,
            score: 100.0,
            message: String::new(),
            violations: Vec::new(),
            suggestions: Vec::new(),
            execution_time_ms: 0,
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Build a result whose status and severity follow from its violations.
    pub fn evaluated(
        gate_name: impl Into<String>,
        score: f64,
        violations: Vec<Violation>,
        message: impl Into<String>,
    ) -> Self {
        let status = GateStatus::from_violations(&violations);
        Self::new(gate_name)
            .with_score(score)
            .with_violations(violations)
            .with_status(status)
            .with_message(message)
    }

    /// A result for a gate that did not run.
    pub fn skipped(gate_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(gate_name)
            .with_status(GateStatus::Skipped)
            .with_score(0.0)
            .with_message(message)
    }

    /// A Failed result synthesised at the gate boundary from a contained
    /// fault (timeout, error, crash).
    pub fn failure(gate_name: impl Into<String>, kind: &str, error: &GateError) -> Self {
        let message = error.to_string();
        Self::new(gate_name)
            .with_status(GateStatus::Failed)
            .with_score(0.0)
            .with_violation(Violation::new(kind, Severity::High, message.clone()))
            .with_message(message)
    }

    /// Set the score (clamped).
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = clamp_score(score);
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: GateStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Append one violation; severity tracks the maximum.
    #[must_use]
    pub fn with_violation(mut self, violation: Violation) -> Self {
        self.severity = self.severity.max(violation.severity);
        self.violations.push(violation);
        self
    }

    /// Append several violations.
    #[must_use]
    pub fn with_violations(self, violations: impl IntoIterator<Item = Violation>) -> Self {
        violations.into_iter().fold(self, Self::with_violation)
    }

    /// Append a suggestion unless an identical one is already present.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        let suggestion = suggestion.into();
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
        self
    }

    /// Append several suggestions.
    #[must_use]
    pub fn with_suggestions(self, suggestions: impl IntoIterator<Item = String>) -> Self {
        suggestions.into_iter().fold(self, Self::with_suggestion)
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add duration.
    #[must_use]
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.execution_time_ms = duration_ms;
        self
    }

    /// Count violations of a given kind.
    #[must_use]
    pub fn count_kind(&self, kind: &str) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }

    /// Format a summary line for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let icon = match self.status {
            GateStatus::Passed => "✅",
            GateStatus::Warning => "⚠️",
            GateStatus::Failed | GateStatus::Blocked => "❌",
            GateStatus::Skipped => "⏭️",
        };
        format!(
            "{} {}: {} (score {:.1}, {} violation(s)) - {}",
            icon,
            self.gate_name,
            self.status,
            self.score,
            self.violations.len(),
            self.message
        )
    }
}

// ============================================================================
// Gate Trait
// ============================================================================

/// One independent quality check.
///
/// Implementations are synchronous; the engine runs them on the blocking
/// pool. Long-running gates should poll `cancel` between units of work and
/// bail out with [`GateError::Cancelled`](crate::error::GateError::Cancelled).
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so the engine can share them
/// across tasks.
pub trait Gate: Send + Sync {
    /// Returns the registry name of this gate.
    fn name(&self) -> &str;

    /// Runs the gate against the project for the given context.
    ///
    /// # Errors
    ///
    /// Returns an error if the gate fails to execute (not if checks fail).
    fn check(
        &self,
        context: ExecutionContext,
        cancel: &CancellationSignal,
    ) -> Result<GateResult>;
}

/// Message of a feed-backed gate whose feed had nothing to report.
pub const NO_SNAPSHOT: &str = "no metric snapshot available";

/// Score penalty helper: `amount × weight`, capped.
#[must_use]
pub(crate) fn capped(amount: f64, weight: f64, cap: f64) -> f64 {
    (amount.max(0.0) * weight).min(cap)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_blocking() {
        assert!(!Severity::Medium.is_blocking());
        assert!(Severity::High.is_blocking());
        assert!(Severity::Critical.is_blocking());
    }

    #[test]
    fn test_score_clamped_on_every_write() {
        assert_eq!(GateResult::new("g").with_score(-12.0).score, 0.0);
        assert_eq!(GateResult::new("g").with_score(250.0).score, 100.0);
        assert_eq!(GateResult::new("g").with_score(f64::NAN).score, 0.0);
        assert_eq!(GateResult::new("g").with_score(42.5).score, 42.5);
    }

    #[test]
    fn test_status_from_violations() {
        assert_eq!(GateStatus::from_violations(&[]), GateStatus::Passed);
        let low = Violation::new("style_violations", Severity::Low, "x");
        let high = Violation::new("high_complexity", Severity::High, "y");
        assert_eq!(
            GateStatus::from_violations(std::slice::from_ref(&low)),
            GateStatus::Warning
        );
        assert_eq!(GateStatus::from_violations(&[low, high]), GateStatus::Failed);
        let info = Violation::new("note", Severity::Info, "z");
        assert_eq!(GateStatus::from_violations(&[info]), GateStatus::Passed);
    }

    #[test]
    fn test_severity_tracks_max_violation() {
        let result = GateResult::new("g")
            .with_violation(Violation::new("a", Severity::Low, "a"))
            .with_violation(Violation::new("b", Severity::Critical, "b"))
            .with_violation(Violation::new("c", Severity::Medium, "c"));
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.violations.len(), 3);
    }

    #[test]
    fn test_suggestions_deduplicated() {
        let result = GateResult::new("g")
            .with_suggestion("Split long functions")
            .with_suggestion("Split long functions")
            .with_suggestion("Add docs");
        assert_eq!(result.suggestions.len(), 2);
    }

    #[test]
    fn test_failure_constructor() {
        let error = GateError::Timeout {
            gate: "security".to_string(),
            seconds: 30,
        };
        let result = GateResult::failure("security", "execution_timeout", &error);
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.count_kind("execution_timeout"), 1);
        assert_eq!(result.message, "Gate 'security' timed out after 30s");
        assert_eq!(result.violations[0].message, result.message);
    }

    #[test]
    fn test_skipped_does_not_participate() {
        let result = GateResult::skipped("coverage", "cancelled");
        assert!(!result.status.participates());
        assert!(!result.status.is_failing());
    }

    #[test]
    fn test_violation_format() {
        let v = Violation::new("high_complexity", Severity::High, "too complex")
            .at("src/lib.rs", 12);
        assert_eq!(
            v.format(),
            "[HIGH] [high_complexity] too complex at src/lib.rs:12"
        );
    }

    #[test]
    fn test_gate_result_json_shape() {
        let result = GateResult::new("architecture").with_violation(
            Violation::new("layer_violation", Severity::High, "core imports cli")
                .with_detail("from_layer", "core")
                .with_detail("to_layer", "orchestration"),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "passed");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["violations"][0]["type"], "layer_violation");
        assert_eq!(json["violations"][0]["details"]["to_layer"], "orchestration");
        assert!(json["violations"][0].get("file").is_none());
    }

    #[test]
    fn test_capped_penalty() {
        assert_eq!(capped(6.0, 5.0, 30.0), 30.0);
        assert_eq!(capped(2.0, 5.0, 30.0), 10.0);
        assert_eq!(capped(-3.0, 5.0, 30.0), 0.0);
    }
}
