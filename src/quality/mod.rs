//! Quality gate orchestration.
//!
//! - [`gates`] - the individual gates and the result types they produce
//! - [`registry`] - which gates run for which execution context
//! - [`engine`] - concurrent/sequential execution, fail-fast and timeouts
//! - [`aggregate`] - folding gate results into the overall verdict
//! - [`feeds`] - metric sources for the feed-backed gates
//! - [`cancel`] - the shared cancellation signal
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │      GateEngine      │
//! │                      │
//! │  - run_all(context)  │
//! │  - run_quick()       │
//! │  - get_trends(days)  │
//! └──────────┬───────────┘
//!            │ registry selects eligible gates
//!     ┌──────┼──────┬──────┬──────┐
//!     ▼      ▼      ▼      ▼      ▼
//!  code_q  secur  perf   arch   cover
//!            │      │             │
//!            └──────┴── feeds ────┘
//!            │
//!            ▼
//! ┌──────────────────────┐      ┌──────────────────────┐
//! │   ResultAggregator   │ ───▶ │ ExecutionHistoryStore│
//! └──────────────────────┘      └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gatewarden::quality::{GateEngine, ExecutionContext};
//!
//! let engine = GateEngine::open(".")?;
//! let report = engine.run_all(ExecutionContext::Merge).await;
//! if !report.passed() {
//!     eprintln!("{}", report.format());
//! }
//! ```

pub mod aggregate;
pub mod cancel;
pub mod engine;
pub mod feeds;
pub mod gates;
pub mod registry;

pub use aggregate::ResultAggregator;
pub use cancel::CancellationSignal;
pub use engine::{EngineReport, GateEngine, QuickSummary};
pub use feeds::{
    BenchmarkFeed, BenchmarkSnapshot, CoverageFeed, CoverageSnapshot, MetricFeeds,
    SecurityFinding, SecuritySnapshot, StaticFeed, StyleFeed, VulnerabilityFeed,
};
pub use gates::{Gate, GateResult, GateStatus, Severity, Violation};
pub use registry::{eligible_gates, ExecutionContext, GateKind};
