//! Gate orchestration.
//!
//! The [`GateEngine`] selects the gates eligible for an execution context,
//! runs them concurrently or in registry order, contains every fault at the
//! gate boundary, aggregates the results and records the run in history.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatewarden::quality::engine::GateEngine;
//!
//! let engine = GateEngine::open("/path/to/project")?;
//! let report = engine.run("commit").await?;
//! println!("{}", report.format());
//! ```

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::aggregate::{ResultAggregator, OVERALL};
use super::cancel::CancellationSignal;
use super::feeds::MetricFeeds;
use super::gates::{
    ArchitectureGate, CodeQualityGate, CoverageGate, Gate, GateResult, GateStatus,
    PerformanceGate, SecurityGate,
};
use super::registry::{eligible_gates, ExecutionContext, GateKind, QUICK_GATES};
use crate::config::QualityGateConfig;
use crate::error::{GateError, Result};
use crate::history::{ExecutionHistoryStore, HistoryEntry, TrendAnalyzer, TrendReport};

/// Message of a gate that was skipped because another gate failed first.
pub const CANCELLED_MESSAGE: &str = "cancelled by fail-fast";

/// Message of a gate that exceeded its time budget.
pub const TIMEOUT_MESSAGE: &str = "execution timeout";

// ============================================================================
// Reports
// ============================================================================

/// Outcome of [`GateEngine::run_all`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    pub context: ExecutionContext,
    /// Per-gate results in registry order.
    pub gates: Vec<GateResult>,
    pub overall: GateResult,
    pub execution_time_ms: u64,
}

impl EngineReport {
    /// Results keyed by gate name, plus `overall`.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, GateResult> {
        let mut map: BTreeMap<String, GateResult> = self
            .gates
            .iter()
            .map(|r| (r.gate_name.clone(), r.clone()))
            .collect();
        map.insert(OVERALL.to_string(), self.overall.clone());
        map
    }

    /// Look up one gate's result.
    #[must_use]
    pub fn gate(&self, name: &str) -> Option<&GateResult> {
        self.gates.iter().find(|r| r.gate_name == name)
    }

    /// Whether the run allows the change through.
    #[must_use]
    pub fn passed(&self) -> bool {
        !self.overall.status.is_failing()
    }

    /// Format a summary for display.
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("## Quality Gate Summary ({})\n\n", self.context));

        for result in &self.gates {
            output.push_str(&format!("{}\n", result.summary()));
            for violation in result.violations.iter().take(10) {
                output.push_str(&format!("    {}\n", violation.format()));
            }
            if result.violations.len() > 10 {
                output.push_str(&format!(
                    "    ... and {} more\n",
                    result.violations.len() - 10
                ));
            }
        }

        output.push_str(&format!("\n{}\n", self.overall.summary()));
        output.push_str(&format!("**Total time**: {}ms\n", self.execution_time_ms));

        if !self.overall.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in &self.overall.suggestions {
                output.push_str(&format!("  - {suggestion}\n"));
            }
        }

        if self.passed() {
            output.push_str("\n✅ **Quality gates passed**\n");
        } else {
            let failures = self.gates.iter().filter(|r| r.status.is_failing()).count();
            output.push_str(&format!(
                "\n❌ **{failures} gate(s) failed** - fix issues before continuing\n"
            ));
        }

        output
    }
}

/// Condensed outcome of [`GateEngine::run_quick`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickSummary {
    pub status: GateStatus,
    pub score: f64,
    pub message: String,
}

impl std::fmt::Display for QuickSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (score {:.1}) - {}", self.status, self.score, self.message)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs the eligible gates for a context and records the outcome.
pub struct GateEngine {
    project_dir: PathBuf,
    config: Arc<QualityGateConfig>,
    feeds: MetricFeeds,
    history: Arc<ExecutionHistoryStore>,
    overrides: BTreeMap<GateKind, Arc<dyn Gate>>,
    aggregator: ResultAggregator,
}

impl GateEngine {
    /// Create an engine with default feeds and an in-memory history.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Validation`] if `config` is invalid; no gate
    /// runs in that case.
    pub fn new(project_dir: impl AsRef<Path>, config: QualityGateConfig) -> Result<Self> {
        config.validate()?;
        let project_dir = project_dir.as_ref().to_path_buf();
        Ok(Self {
            feeds: MetricFeeds::for_project(&project_dir, &config),
            project_dir,
            config: Arc::new(config),
            history: Arc::new(ExecutionHistoryStore::in_memory()),
            overrides: BTreeMap::new(),
            aggregator: ResultAggregator::new(),
        })
    }

    /// Load the project's configuration and open its history file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unreadable or invalid. An
    /// unreadable history file only disables recording for this run.
    pub fn open(project_dir: impl AsRef<Path>) -> Result<Self> {
        let project_dir = project_dir.as_ref();
        let config = QualityGateConfig::load(project_dir)?;
        let history =
            ExecutionHistoryStore::open_or_in_memory(QualityGateConfig::history_path(project_dir));
        Ok(Self::new(project_dir, config)?.with_history(Arc::new(history)))
    }

    /// Replace the metric feeds.
    #[must_use]
    pub fn with_feeds(mut self, feeds: MetricFeeds) -> Self {
        self.feeds = feeds;
        self
    }

    /// Replace the history store.
    #[must_use]
    pub fn with_history(mut self, history: Arc<ExecutionHistoryStore>) -> Self {
        self.history = history;
        self
    }

    /// Substitute the gate instance used for `kind`.
    #[must_use]
    pub fn with_gate(mut self, kind: GateKind, gate: Arc<dyn Gate>) -> Self {
        self.overrides.insert(kind, gate);
        self
    }

    #[must_use]
    pub fn config(&self) -> &QualityGateConfig {
        &self.config
    }

    #[must_use]
    pub fn history(&self) -> &ExecutionHistoryStore {
        &self.history
    }

    /// Run every gate eligible for `context`, aggregate and record the run.
    ///
    /// Never fails: gate faults become Failed results and history write
    /// failures are logged.
    pub async fn run_all(&self, context: ExecutionContext) -> EngineReport {
        let start = Instant::now();
        let kinds = eligible_gates(context);
        info!(context = %context, gates = kinds.len(), "Running quality gates");

        let gates = self.execute(&kinds, context).await;
        let overall = self.aggregator.aggregate(&gates);
        let execution_time_ms = elapsed_ms(start);

        info!(
            context = %context,
            status = %overall.status,
            score = overall.score,
            duration_ms = execution_time_ms,
            "Quality gates finished"
        );

        let entry = HistoryEntry::new(context, &gates, execution_time_ms);
        if let Err(e) = self.history.append(entry) {
            warn!(error = %e, "Failed to record execution history");
        }

        EngineReport {
            context,
            gates,
            overall,
            execution_time_ms,
        }
    }

    /// Parse `context` and run [`run_all`](Self::run_all).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::UnknownContext`] for an unrecognised context.
    pub async fn run(&self, context: &str) -> Result<EngineReport> {
        let context: ExecutionContext = context.parse()?;
        Ok(self.run_all(context).await)
    }

    /// Run the quick subset (code quality and security) without recording
    /// history.
    pub async fn run_quick(&self) -> QuickSummary {
        let results = self.execute(&QUICK_GATES, ExecutionContext::Quick).await;
        let overall = self.aggregator.aggregate(&results);
        QuickSummary {
            status: overall.status,
            score: overall.score,
            message: overall.message,
        }
    }

    /// Trends over the last `days` days of recorded runs.
    #[must_use]
    pub fn get_trends(&self, days: u32) -> TrendReport {
        TrendAnalyzer::new().analyze(&self.history.entries(), days)
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    fn gate_for(&self, kind: GateKind) -> Arc<dyn Gate> {
        if let Some(gate) = self.overrides.get(&kind) {
            return Arc::clone(gate);
        }
        let thresholds = &self.config.thresholds;
        match kind {
            GateKind::CodeQuality => Arc::new(
                CodeQualityGate::new(&self.project_dir, Arc::clone(&self.config))
                    .with_style_feed(self.feeds.style.clone()),
            ),
            GateKind::Security => Arc::new(SecurityGate::new(
                Arc::clone(&self.feeds.vulnerabilities),
                thresholds.max_security_issues,
            )),
            GateKind::Performance => Arc::new(PerformanceGate::new(
                Arc::clone(&self.feeds.benchmarks),
                thresholds,
            )),
            GateKind::Architecture => Arc::new(ArchitectureGate::new(
                &self.project_dir,
                Arc::clone(&self.config),
            )),
            GateKind::Coverage => Arc::new(CoverageGate::new(
                Arc::clone(&self.feeds.coverage),
                thresholds,
            )),
        }
    }

    async fn execute(&self, kinds: &[GateKind], context: ExecutionContext) -> Vec<GateResult> {
        if kinds.is_empty() {
            return Vec::new();
        }

        let gates: Vec<Arc<dyn Gate>> = kinds.iter().map(|k| self.gate_for(*k)).collect();
        let policy = RunPolicy {
            context,
            timeout: Duration::from_secs(self.config.execution.timeout_seconds),
            fail_fast: self.config.execution.fail_fast,
        };

        if self.config.execution.parallel {
            run_gates_concurrent(gates, policy).await
        } else {
            run_gates_sequential(gates, policy).await
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RunPolicy {
    context: ExecutionContext,
    timeout: Duration,
    fail_fast: bool,
}

/// One task per gate; results come back in input order.
async fn run_gates_concurrent(gates: Vec<Arc<dyn Gate>>, policy: RunPolicy) -> Vec<GateResult> {
    let cancel = CancellationSignal::new();

    let handles: Vec<_> = gates
        .into_iter()
        .map(|gate| {
            let cancel = cancel.clone();
            let name = gate.name().to_string();
            let handle = tokio::spawn(async move {
                let result = run_single_gate(gate, policy, &cancel).await;
                if policy.fail_fast && result.status.is_failing() {
                    debug!(gate = %result.gate_name, "Gate failed, cancelling remaining gates");
                    cancel.cancel();
                }
                result
            });
            (name, handle)
        })
        .collect();

    let (names, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
    join_all(handles)
        .await
        .into_iter()
        .zip(names)
        .map(|(joined, name)| {
            joined.unwrap_or_else(|e| {
                let error = GateError::execution(&name, format!("gate task panicked: {e}"));
                GateResult::failure(name, "execution_error", &error)
            })
        })
        .collect()
}

/// Registry order; after a failure under fail-fast the rest never start.
async fn run_gates_sequential(gates: Vec<Arc<dyn Gate>>, policy: RunPolicy) -> Vec<GateResult> {
    let cancel = CancellationSignal::new();
    let mut results = Vec::with_capacity(gates.len());

    for gate in gates {
        if cancel.is_cancelled() {
            results.push(GateResult::skipped(gate.name(), CANCELLED_MESSAGE));
            continue;
        }

        let result = run_single_gate(gate, policy, &cancel).await;
        if policy.fail_fast && result.status.is_failing() {
            debug!(gate = %result.gate_name, "Gate failed, skipping remaining gates");
            cancel.cancel();
        }
        results.push(result);
    }

    results
}

/// Run one gate on the blocking pool under the timeout and the shared
/// cancellation signal. Always yields a result.
async fn run_single_gate(
    gate: Arc<dyn Gate>,
    policy: RunPolicy,
    cancel: &CancellationSignal,
) -> GateResult {
    let name = gate.name().to_string();
    let start = Instant::now();
    debug!(gate = %name, "Gate started");

    let worker_cancel = cancel.clone();
    let context = policy.context;
    let task = tokio::task::spawn_blocking(move || gate.check(context, &worker_cancel));

    let outcome = tokio::select! {
        biased;
        finished = tokio::time::timeout(policy.timeout, task) => Some(finished),
        () = cancel.cancelled() => None,
    };

    let result = match outcome {
        None => GateResult::skipped(&name, CANCELLED_MESSAGE),
        Some(Ok(Ok(Ok(result)))) => result,
        Some(Ok(Ok(Err(e)))) if GateError::is_cancelled_anyhow(&e) => {
            GateResult::skipped(&name, CANCELLED_MESSAGE)
        }
        Some(Ok(Ok(Err(e)))) => {
            warn!(gate = %name, error = %e, "Gate failed to execute");
            let error = GateError::execution(&name, format!("{e:#}"));
            GateResult::failure(&name, "execution_error", &error)
        }
        Some(Ok(Err(join_error))) => {
            warn!(gate = %name, error = %join_error, "Gate panicked");
            let error = GateError::execution(&name, format!("gate panicked: {join_error}"));
            GateResult::failure(&name, "execution_error", &error)
        }
        Some(Err(_elapsed)) => {
            let seconds = policy.timeout.as_secs();
            warn!(gate = %name, seconds, "Gate timed out");
            let error = GateError::Timeout {
                gate: name.clone(),
                seconds,
            };
            GateResult::failure(&name, "execution_timeout", &error)
                .with_message(TIMEOUT_MESSAGE)
                .with_metadata("timeout_seconds", seconds)
        }
    };

    let duration_ms = elapsed_ms(start);
    debug!(gate = %name, status = %result.status, duration_ms, "Gate finished");
    result.with_duration(duration_ms)
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
