//! Execution history persistence.
//!
//! Every full engine run appends one [`HistoryEntry`]. The store keeps the
//! [`MAX_ENTRIES`] most recent entries, oldest dropped first. File-backed
//! stores write `.gatewarden/history.json` atomically (temp file + rename)
//! while holding an exclusive advisory lock, so concurrent processes do not
//! interleave writes.

pub mod trends;

pub use trends::{GateTrend, TrendAnalyzer, TrendDirection, TrendReport};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{GateError, Result};
use crate::quality::gates::GateResult;
use crate::quality::registry::ExecutionContext;

/// Hard cap on stored entries.
pub const MAX_ENTRIES: usize = 100;

const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

// ============================================================================
// Entries
// ============================================================================

/// Per-run counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    /// Gates that produced a verdict (Skipped excluded).
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Mean score of the counted gates; 0 when none ran.
    pub average_score: f64,
}

impl HistorySummary {
    /// Summarise per-gate results.
    #[must_use]
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a GateResult>) -> Self {
        let mut summary = Self::default();
        let mut score_sum = 0.0;
        for result in results.into_iter().filter(|r| r.status.participates()) {
            summary.total += 1;
            score_sum += result.score;
            if result.status.is_failing() {
                summary.failed += 1;
            } else {
                summary.passed += 1;
            }
        }
        if summary.total > 0 {
            summary.average_score = score_sum / summary.total as f64;
        }
        summary
    }
}

/// One recorded engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub context: ExecutionContext,
    pub execution_time_ms: u64,
    /// Gate name to result snapshot. The overall result is not stored.
    pub gates: BTreeMap<String, GateResult>,
    pub summary: HistorySummary,
}

impl HistoryEntry {
    /// Record a run that produced `results`.
    #[must_use]
    pub fn new(context: ExecutionContext, results: &[GateResult], execution_time_ms: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            context,
            execution_time_ms,
            gates: results
                .iter()
                .map(|r| (r.gate_name.clone(), r.clone()))
                .collect(),
            summary: HistorySummary::from_results(results),
        }
    }

    /// Override the timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ============================================================================
// Store
// ============================================================================

/// Append-only, capped run log.
///
/// One mutex covers append, trim and persist. File-backed stores re-read
/// the file under the lock before appending so entries written by other
/// processes survive.
#[derive(Debug)]
pub struct ExecutionHistoryStore {
    path: Option<PathBuf>,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl ExecutionHistoryStore {
    /// A store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Open (or lazily create) a file-backed store.
    ///
    /// A corrupted file is logged and treated as empty; it is replaced on
    /// the next append.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;
        debug!(path = %path.display(), entries = entries.len(), "Opened history store");
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Like [`open`](Self::open), but an unreadable file is logged and the
    /// run continues with an in-memory store.
    #[must_use]
    pub fn open_or_in_memory(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::open(path).unwrap_or_else(|e| {
            warn!(
                path = %path.display(),
                error = %e,
                "History unavailable, this run will not be recorded"
            );
            Self::in_memory()
        })
    }

    /// Path of the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an entry, trim to [`MAX_ENTRIES`] and persist.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::History`] if the file cannot be locked or
    /// written. The in-memory view is only updated on success.
    pub fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(path) = &self.path else {
            guard.push(entry);
            trim(&mut guard);
            return Ok(());
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let lock_file = File::create(lock_path(path))?;
        FileExt::lock_exclusive(&lock_file)
            .map_err(|e| GateError::history(format!("failed to acquire history lock: {e}")))?;

        let mut entries = read_entries(path)?;
        entries.push(entry);
        trim(&mut entries);

        let written = write_atomic(path, &entries);
        let _ = FileExt::unlock(&lock_file);
        written?;

        debug!(entries = entries.len(), "History persisted");
        *guard = entries;
        Ok(())
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries no older than `cutoff`, oldest first.
    #[must_use]
    pub fn entries_since(&self, cutoff: DateTime<Utc>) -> Vec<HistoryEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn trim(entries: &mut Vec<HistoryEntry>) {
    if entries.len() > MAX_ENTRIES {
        let excess = entries.len() - MAX_ENTRIES;
        entries.drain(..excess);
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str(&content) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!(
                "Corrupted history file at {}: {}. Starting fresh.",
                path.display(),
                e
            );
            Ok(Vec::new())
        }
    }
}

fn write_atomic(path: &Path, entries: &[HistoryEntry]) -> Result<()> {
    let tmp = tmp_path(path);
    let json = serde_json::to_string_pretty(entries)?;

    let mut file = File::create(&tmp)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;

    fs::rename(&tmp, path)?;
    Ok(())
}
