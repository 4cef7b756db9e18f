//! gatewarden - quality gate orchestration and static analysis
//!
//! Runs a set of independent quality gates over a Rust source tree, each
//! producing a scored, structured verdict, and folds them into one overall
//! decision used to block or allow a commit, merge or release.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Thresholds, execution flags, presets and validation
//! - [`error`] - Custom error types and handling
//! - [`scanner`] - Source discovery, `syn` parsing and import extraction
//! - [`analysis`] - Complexity, duplication, docs, style, dependency graph,
//!   cohesion, interface and pattern heuristics
//! - [`quality`] - Gates, registry, engine, aggregation and metric feeds
//! - [`history`] - Persistent run history and trend analysis
//!
//! # Example
//!
//! ```rust,ignore
//! use gatewarden::{ExecutionContext, GateEngine, QualityGateConfig};
//!
//! let engine = GateEngine::new(".", QualityGateConfig::strict())?;
//! let report = engine.run_all(ExecutionContext::Commit).await;
//! if !report.passed() {
//!     println!("{}", report.format());
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod history;
pub mod quality;
pub mod scanner;

// Re-export commonly used types
pub use error::{GateError, Result};

// Re-export config types
pub use config::{LayerRule, Preset, QualityGateConfig, Thresholds};

// Re-export engine and result types
pub use quality::{
    CancellationSignal, EngineReport, ExecutionContext, Gate, GateEngine, GateKind, GateResult,
    GateStatus, MetricFeeds, QuickSummary, ResultAggregator, Severity, Violation,
};

// Re-export history types
pub use history::{ExecutionHistoryStore, HistoryEntry, TrendAnalyzer, TrendReport};
