//! Configuration management for gatewarden.
//!
//! A [`QualityGateConfig`] is loaded once per invocation and never mutated
//! while gates run. Values come from `gatewarden.toml` or
//! `.gatewarden/config.json` in the project root, falling back to the
//! balanced preset.
//!
//! # Example gatewarden.toml
//!
//! ```toml
//! [thresholds]
//! max_complexity = 12
//! max_duplications = 4.0
//!
//! [execution]
//! parallel = true
//! fail_fast = true
//! timeout_seconds = 120
//! ```

pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GateError, Result};

/// Directory (relative to the project root) holding gatewarden state.
pub const STATE_DIR: &str = ".gatewarden";

/// TOML configuration file name at the project root.
pub const TOML_CONFIG_FILE: &str = "gatewarden.toml";

/// JSON configuration file name inside [`STATE_DIR`].
pub const JSON_CONFIG_FILE: &str = "config.json";

/// Default directories to ignore during file traversal
pub fn default_ignore_dirs() -> HashSet<&'static str> {
    [
        "target",
        "node_modules",
        ".git",
        ".hg",
        ".svn",
        ".gatewarden",
        ".idea",
        ".vscode",
        "vendor",
        "dist",
        "build",
        "out",
        "coverage",
        ".cargo",
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Thresholds
// ============================================================================

/// Numeric limits every gate compares its metrics against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Highest cyclomatic complexity allowed for a single function.
    pub max_complexity: u32,
    /// Highest duplicated-line percentage allowed.
    pub max_duplications: f64,
    /// Highest number of security findings allowed.
    pub max_security_issues: u32,
    /// Highest acceptable p95 response time in milliseconds.
    pub max_response_time_p95_ms: f64,
    /// Lowest acceptable throughput in requests per second.
    pub min_throughput_rps: f64,
    /// Minimum line coverage percentage.
    pub min_line_coverage: f64,
    /// Minimum branch coverage percentage.
    pub min_branch_coverage: f64,
    /// Minimum function coverage percentage.
    pub min_function_coverage: f64,
    /// Highest module coupling score (0.0 - 1.0).
    pub max_coupling_score: f64,
    /// Lowest module cohesion score (0.0 - 1.0).
    pub min_cohesion_score: f64,
    /// Minimum documentation coverage percentage.
    pub min_doc_coverage: f64,
    /// Longest source line the internal style scan accepts.
    pub max_line_length: usize,
    /// Longest source file (in lines) before it counts as an organization issue.
    pub max_file_lines: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_complexity: 10,
            max_duplications: 5.0,
            max_security_issues: 0,
            max_response_time_p95_ms: 500.0,
            min_throughput_rps: 100.0,
            min_line_coverage: 80.0,
            min_branch_coverage: 70.0,
            min_function_coverage: 80.0,
            max_coupling_score: 0.3,
            min_cohesion_score: 0.5,
            min_doc_coverage: 70.0,
            max_line_length: 100,
            max_file_lines: 1000,
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// How the engine schedules gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Run eligible gates as concurrent tasks.
    pub parallel: bool,
    /// Cancel remaining gates after the first Failed/Blocked result.
    pub fail_fast: bool,
    /// Per-gate time budget in seconds.
    pub timeout_seconds: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            fail_fast: false,
            timeout_seconds: 300,
        }
    }
}

// ============================================================================
// Scanning
// ============================================================================

/// Which files the scanner looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns (relative to the project root) excluded from analysis.
    pub exclude: Vec<String>,
}

// ============================================================================
// Architecture layers
// ============================================================================

/// One row of the ordered layer table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerRule {
    /// Layer name, e.g. `core`.
    pub name: String,
    /// Module-path prefixes (first segment or `a::b` form) belonging to the layer.
    pub prefixes: Vec<String>,
    /// Layers this layer may import from. Same-layer imports are always allowed.
    #[serde(default)]
    pub may_depend_on: Vec<String>,
}

impl LayerRule {
    fn new(name: &str, prefixes: &[&str], may_depend_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            may_depend_on: may_depend_on.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Whether a crate-local module path (`a::b`) belongs to this layer.
    #[must_use]
    pub fn matches(&self, module: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            module == prefix
                || module
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }

    /// Whether this layer may import from `other`.
    #[must_use]
    pub fn allows(&self, other: &str) -> bool {
        self.name == other || self.may_depend_on.iter().any(|l| l == other)
    }
}

/// The first layer in `layers` that `module` belongs to.
pub fn classify<'a>(layers: &'a [LayerRule], module: &str) -> Option<&'a LayerRule> {
    layers.iter().find(|layer| layer.matches(module))
}

/// The default layer table, highest layer first.
pub fn default_layers() -> Vec<LayerRule> {
    vec![
        LayerRule::new(
            "orchestration",
            &["main", "cli", "app", "commands", "engine"],
            &["feature", "util", "core"],
        ),
        LayerRule::new(
            "feature",
            &["features", "services", "handlers", "api", "quality", "analysis"],
            &["util", "core"],
        ),
        LayerRule::new(
            "util",
            &["util", "utils", "helpers", "common", "support"],
            &["core"],
        ),
        LayerRule::new(
            "core",
            &["core", "model", "models", "domain", "types", "error", "errors"],
            &[],
        ),
    ]
}

// ============================================================================
// Presets
// ============================================================================

/// Convenience threshold profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Tight limits for release branches.
    Strict,
    /// Default limits.
    #[default]
    Balanced,
    /// Loose limits for exploratory work.
    Lenient,
}

impl FromStr for Preset {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "balanced" => Ok(Self::Balanced),
            "lenient" => Ok(Self::Lenient),
            other => Err(GateError::validation(
                "preset",
                format!("unknown preset '{other}' (expected strict, balanced or lenient)"),
            )),
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Balanced => write!(f, "balanced"),
            Self::Lenient => write!(f, "lenient"),
        }
    }
}

// ============================================================================
// QualityGateConfig
// ============================================================================

/// Complete, immutable configuration for one engine run.
///
/// # Example
///
/// ```
/// use gatewarden::config::QualityGateConfig;
///
/// let config = QualityGateConfig::strict().with_fail_fast(false);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.thresholds.max_complexity, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    /// Metric thresholds.
    pub thresholds: Thresholds,
    /// Scheduling flags.
    pub execution: ExecutionConfig,
    /// File selection.
    pub scan: ScanConfig,
    /// Ordered layer table used by the architecture gate.
    pub layers: Vec<LayerRule>,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            execution: ExecutionConfig::default(),
            scan: ScanConfig::default(),
            layers: default_layers(),
        }
    }
}

impl QualityGateConfig {
    /// Create the balanced configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from a preset.
    #[must_use]
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Strict => Self::strict(),
            Preset::Balanced => Self::default(),
            Preset::Lenient => Self::lenient(),
        }
    }

    /// Tight limits; fail-fast enabled.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            thresholds: Thresholds {
                max_complexity: 8,
                max_duplications: 3.0,
                max_security_issues: 0,
                max_response_time_p95_ms: 200.0,
                min_throughput_rps: 500.0,
                min_line_coverage: 90.0,
                min_branch_coverage: 80.0,
                min_function_coverage: 90.0,
                max_coupling_score: 0.2,
                min_cohesion_score: 0.6,
                min_doc_coverage: 80.0,
                max_line_length: 100,
                max_file_lines: 600,
            },
            execution: ExecutionConfig {
                fail_fast: true,
                ..ExecutionConfig::default()
            },
            ..Self::default()
        }
    }

    /// Loose limits for development.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            thresholds: Thresholds {
                max_complexity: 15,
                max_duplications: 10.0,
                max_security_issues: 2, // Still tight on security
                max_response_time_p95_ms: 1000.0,
                min_throughput_rps: 50.0,
                min_line_coverage: 60.0,
                min_branch_coverage: 50.0,
                min_function_coverage: 60.0,
                max_coupling_score: 0.5,
                min_cohesion_score: 0.3,
                min_doc_coverage: 50.0,
                max_line_length: 120,
                max_file_lines: 2000,
            },
            ..Self::default()
        }
    }

    /// Set the maximum function complexity.
    #[must_use]
    pub fn with_max_complexity(mut self, max: u32) -> Self {
        self.thresholds.max_complexity = max;
        self
    }

    /// Enable/disable parallel gate execution.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.execution.parallel = enabled;
        self
    }

    /// Enable/disable fail-fast mode.
    #[must_use]
    pub fn with_fail_fast(mut self, enabled: bool) -> Self {
        self.execution.fail_fast = enabled;
        self
    }

    /// Set the per-gate timeout in seconds.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.execution.timeout_seconds = seconds;
        self
    }

    /// Add glob patterns excluded from scanning.
    #[must_use]
    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.scan.exclude = patterns;
        self
    }

    /// Replace the layer table.
    #[must_use]
    pub fn with_layers(mut self, layers: Vec<LayerRule>) -> Self {
        self.layers = layers;
        self
    }

    /// Check every threshold and flag for sane values.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Load configuration from a project directory.
    ///
    /// `gatewarden.toml` wins over `.gatewarden/config.json`; with neither
    /// present the balanced defaults are used. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is unreadable, malformed or invalid.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let toml_path = project_dir.join(TOML_CONFIG_FILE);
        let json_path = Self::json_path(project_dir);

        let config = if toml_path.exists() {
            Self::from_file(&toml_path)?
        } else if json_path.exists() {
            Self::from_file(&json_path)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, choosing the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::config_with_path(format!("cannot read config: {e}"), path.to_path_buf())
        })?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => {
                return Err(GateError::config_with_path(
                    "unsupported config format (expected .toml or .json)",
                    path.to_path_buf(),
                ))
            }
        };
        Ok(config)
    }

    /// Get the state directory for a project
    pub fn state_dir(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR)
    }

    /// Get the JSON config path for a project
    pub fn json_path(project_dir: &Path) -> PathBuf {
        Self::state_dir(project_dir).join(JSON_CONFIG_FILE)
    }

    /// Get the history file path for a project
    pub fn history_path(project_dir: &Path) -> PathBuf {
        Self::state_dir(project_dir).join("history.json")
    }

    /// Get the metric feed directory for a project
    pub fn feeds_dir(project_dir: &Path) -> PathBuf {
        Self::state_dir(project_dir).join("feeds")
    }
}
