//! Static gate registry.
//!
//! The set of gate kinds is closed. Each kind lists the execution contexts
//! it is eligible for; the order of [`REGISTRY`] is the order gates run in
//! sequential mode and the order results are reported in.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GateError;

/// Why the engine is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Pre-commit check.
    Commit,
    /// Merge/pull-request check.
    Merge,
    /// Release check.
    Release,
    /// Low-latency feedback.
    Quick,
    /// Refactoring session.
    Refactor,
    /// Performance test run.
    PerformanceTest,
    /// Periodic monitoring.
    Monitoring,
    /// Every gate.
    All,
}

impl ExecutionContext {
    /// Every context, in declaration order.
    pub const ALL_CONTEXTS: [ExecutionContext; 8] = [
        Self::Commit,
        Self::Merge,
        Self::Release,
        Self::Quick,
        Self::Refactor,
        Self::PerformanceTest,
        Self::Monitoring,
        Self::All,
    ];

    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Merge => "merge",
            Self::Release => "release",
            Self::Quick => "quick",
            Self::Refactor => "refactor",
            Self::PerformanceTest => "performance_test",
            Self::Monitoring => "monitoring",
            Self::All => "all",
        }
    }
}

impl FromStr for ExecutionContext {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL_CONTEXTS
            .into_iter()
            .find(|ctx| ctx.as_str() == normalized)
            .ok_or_else(|| GateError::UnknownContext(s.to_string()))
    }
}

impl std::fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    CodeQuality,
    Security,
    Performance,
    Architecture,
    Coverage,
}

use self::ExecutionContext::{All, Commit, Merge, PerformanceTest, Refactor, Release};

/// Registry order.
pub const REGISTRY: [GateKind; 5] = [
    GateKind::CodeQuality,
    GateKind::Security,
    GateKind::Performance,
    GateKind::Architecture,
    GateKind::Coverage,
];

/// Gates used by the quick check.
pub const QUICK_GATES: [GateKind; 2] = [GateKind::CodeQuality, GateKind::Security];

impl GateKind {
    /// Registry name, also used as the result key.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CodeQuality => "code_quality",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Architecture => "architecture",
            Self::Coverage => "coverage",
        }
    }

    /// Contexts this gate is eligible for.
    #[must_use]
    pub const fn contexts(&self) -> &'static [ExecutionContext] {
        match self {
            Self::CodeQuality => &[Commit, Merge, Release, All],
            Self::Security => &[Commit, Merge, Release, All],
            Self::Performance => &[Merge, Release, PerformanceTest, All],
            Self::Architecture => &[Merge, Release, Refactor, All],
            Self::Coverage => &[Commit, Merge, Release, All],
        }
    }

    /// Whether this gate runs for `context`.
    #[must_use]
    pub fn is_eligible(&self, context: ExecutionContext) -> bool {
        self.contexts().contains(&context)
    }

    /// Look a kind up by its registry name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        REGISTRY.into_iter().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for GateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Gates eligible for `context`, in registry order.
#[must_use]
pub fn eligible_gates(context: ExecutionContext) -> Vec<GateKind> {
    REGISTRY
        .into_iter()
        .filter(|kind| kind.is_eligible(context))
        .collect()
}
