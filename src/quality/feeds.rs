//! Metric feeds.
//!
//! Feeds are read-only providers of the measurements that gates do not
//! compute themselves: formatter output, vulnerability findings, benchmark
//! numbers and coverage percentages. Gates receive feeds at construction, so
//! tests can substitute [`StaticFeed`] for any of them.
//!
//! Default implementations:
//! - [`RustfmtStyleFeed`] - runs `rustfmt --check` when it is installed
//! - [`ProjectSecurityFeed`] - JSON snapshot + `cargo audit` + secret scan
//! - [`JsonSnapshotFeed`] - reads `.gatewarden/feeds/<name>.json`

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

use super::gates::Severity;
use crate::analysis::style::StyleIssue;
use crate::config::{QualityGateConfig, ScanConfig};
use crate::error::{GateError, Result};
use crate::scanner::SourceScanner;

/// Regexes for hard-coded credentials.
pub const SECRET_PATTERNS: &[&str] = &[
    r#"(?i)(api[_-]?key|apikey)\s*[:=]\s*['"][^'"]+['"]"#,
    r#"(?i)(password|passwd|pwd)\s*[:=]\s*['"][^'"]+['"]"#,
    r#"(?i)(secret|token)\s*[:=]\s*['"][^'"]+['"]"#,
    r"(?i)(aws[_-]?access[_-]?key|aws[_-]?secret)",
    r"(?i)(private[_-]?key)\s*[:=]",
    r"-----BEGIN (RSA |DSA |EC |OPENSSH )?PRIVATE KEY-----",
];

/// Files passed to one `rustfmt` invocation.
const RUSTFMT_BATCH: usize = 100;

// ============================================================================
// Snapshots
// ============================================================================

/// One security finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl SecurityFinding {
    pub fn new(id: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }
}

/// Vulnerability scan output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecuritySnapshot {
    #[serde(default)]
    pub findings: Vec<SecurityFinding>,
}

/// Benchmark harness output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSnapshot {
    /// 95th percentile response time in milliseconds.
    pub p95_ms: f64,
    /// Sustained throughput in requests per second.
    pub throughput_rps: f64,
}

/// Coverage report output, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    pub line: f64,
    pub branch: f64,
    pub function: f64,
}

// ============================================================================
// Feed traits
// ============================================================================

/// External style checker.
pub trait StyleFeed: Send + Sync {
    /// Tool name for logs.
    fn name(&self) -> &str;

    /// Style issues for `files` under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::ToolUnavailable`] when the tool cannot run; the
    /// caller then falls back to the internal scan.
    fn issues(&self, root: &Path, files: &[PathBuf]) -> Result<Vec<StyleIssue>>;
}

/// Source of vulnerability findings.
pub trait VulnerabilityFeed: Send + Sync {
    /// The current snapshot, or `None` if nothing is available.
    fn snapshot(&self) -> Result<Option<SecuritySnapshot>>;
}

/// Source of benchmark numbers.
pub trait BenchmarkFeed: Send + Sync {
    /// The current snapshot, or `None` if nothing is available.
    fn snapshot(&self) -> Result<Option<BenchmarkSnapshot>>;
}

/// Source of coverage percentages.
pub trait CoverageFeed: Send + Sync {
    /// The current snapshot, or `None` if nothing is available.
    fn snapshot(&self) -> Result<Option<CoverageSnapshot>>;
}

// ============================================================================
// Static feed
// ============================================================================

/// A feed that always returns the same value. `None` means "no snapshot"
/// (or "tool unavailable" when used as a style feed).
#[derive(Debug, Clone, Default)]
pub struct StaticFeed<T>(pub Option<T>);

impl<T> StaticFeed<T> {
    pub fn some(value: T) -> Self {
        Self(Some(value))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl VulnerabilityFeed for StaticFeed<SecuritySnapshot> {
    fn snapshot(&self) -> Result<Option<SecuritySnapshot>> {
        Ok(self.0.clone())
    }
}

impl BenchmarkFeed for StaticFeed<BenchmarkSnapshot> {
    fn snapshot(&self) -> Result<Option<BenchmarkSnapshot>> {
        Ok(self.0)
    }
}

impl CoverageFeed for StaticFeed<CoverageSnapshot> {
    fn snapshot(&self) -> Result<Option<CoverageSnapshot>> {
        Ok(self.0)
    }
}

impl StyleFeed for StaticFeed<Vec<StyleIssue>> {
    fn name(&self) -> &str {
        "static"
    }

    fn issues(&self, _root: &Path, _files: &[PathBuf]) -> Result<Vec<StyleIssue>> {
        self.0
            .clone()
            .ok_or_else(|| GateError::tool_unavailable("static"))
    }
}

// ============================================================================
// JSON snapshot files
// ============================================================================

/// Reads a snapshot from a JSON file; a missing file means no snapshot.
#[derive(Debug, Clone)]
pub struct JsonSnapshotFeed {
    path: PathBuf,
}

impl JsonSnapshotFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `.gatewarden/feeds/performance.json`
    pub fn performance(project_dir: &Path) -> Self {
        Self::new(QualityGateConfig::feeds_dir(project_dir).join("performance.json"))
    }

    /// `.gatewarden/feeds/coverage.json`
    pub fn coverage(project_dir: &Path) -> Self {
        Self::new(QualityGateConfig::feeds_dir(project_dir).join("coverage.json"))
    }

    /// `.gatewarden/feeds/security.json`
    pub fn security(project_dir: &Path) -> Self {
        Self::new(QualityGateConfig::feeds_dir(project_dir).join("security.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let value = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded metric snapshot");
        Ok(Some(value))
    }
}

impl VulnerabilityFeed for JsonSnapshotFeed {
    fn snapshot(&self) -> Result<Option<SecuritySnapshot>> {
        self.load()
    }
}

impl BenchmarkFeed for JsonSnapshotFeed {
    fn snapshot(&self) -> Result<Option<BenchmarkSnapshot>> {
        self.load()
    }
}

impl CoverageFeed for JsonSnapshotFeed {
    fn snapshot(&self) -> Result<Option<CoverageSnapshot>> {
        self.load()
    }
}

// ============================================================================
// rustfmt
// ============================================================================

/// Runs `rustfmt --check` over the scanned files.
#[derive(Debug, Clone)]
pub struct RustfmtStyleFeed {
    edition: String,
}

impl Default for RustfmtStyleFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl RustfmtStyleFeed {
    pub fn new() -> Self {
        Self {
            edition: "2021".to_string(),
        }
    }

    /// Use a specific `--edition`.
    #[must_use]
    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = edition.into();
        self
    }

    /// Parse `Diff in <file> at line N:` / `Diff in <file>:N:` headers.
    fn parse_output(root: &Path, stdout: &str) -> Vec<StyleIssue> {
        let Ok(header) = Regex::new(r"^Diff in (.+?)(?: at line |:)(\d+):") else {
            return Vec::new();
        };
        stdout
            .lines()
            .filter_map(|line| header.captures(line))
            .map(|caps| {
                let path = PathBuf::from(&caps[1]);
                let file = path.strip_prefix(root).map(Path::to_path_buf).unwrap_or(path);
                StyleIssue::new(file, caps[2].parse().ok(), "formatting differs from rustfmt")
            })
            .collect()
    }
}

impl StyleFeed for RustfmtStyleFeed {
    fn name(&self) -> &str {
        "rustfmt"
    }

    fn issues(&self, root: &Path, files: &[PathBuf]) -> Result<Vec<StyleIssue>> {
        let rustfmt = which::which("rustfmt").map_err(|_| GateError::tool_unavailable("rustfmt"))?;

        let mut issues = Vec::new();
        for batch in files.chunks(RUSTFMT_BATCH) {
            let output = Command::new(&rustfmt)
                .args(["--check", "--edition", &self.edition])
                .args(batch)
                .current_dir(root)
                .output()
                .map_err(|_| GateError::tool_unavailable("rustfmt"))?;

            if output.status.success() {
                continue;
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            let parsed = Self::parse_output(root, &stdout);
            if parsed.is_empty() {
                // rustfmt failed without producing diffs (e.g. a parse error).
                debug!(
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "rustfmt produced no diff output"
                );
                return Err(GateError::tool_unavailable("rustfmt"));
            }
            issues.extend(parsed);
        }
        Ok(issues)
    }
}

// ============================================================================
// Project security feed
// ============================================================================

/// Merges a JSON findings snapshot, `cargo audit --json` output and a scan
/// for hard-coded secrets.
#[derive(Debug, Clone)]
pub struct ProjectSecurityFeed {
    root: PathBuf,
    json: JsonSnapshotFeed,
    scan: ScanConfig,
    cargo_audit: bool,
}

#[derive(Debug, Deserialize)]
struct AuditReport {
    #[serde(default)]
    vulnerabilities: AuditVulnerabilities,
}

#[derive(Debug, Default, Deserialize)]
struct AuditVulnerabilities {
    #[serde(default)]
    list: Vec<AuditEntry>,
}

#[derive(Debug, Deserialize)]
struct AuditEntry {
    advisory: AuditAdvisory,
    package: AuditPackage,
}

#[derive(Debug, Deserialize)]
struct AuditAdvisory {
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct AuditPackage {
    name: String,
    version: String,
}

impl ProjectSecurityFeed {
    pub fn new(root: impl AsRef<Path>, scan: &ScanConfig) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            json: JsonSnapshotFeed::security(&root),
            root,
            scan: scan.clone(),
            cargo_audit: true,
        }
    }

    /// Enable or disable the `cargo audit` step.
    #[must_use]
    pub fn with_cargo_audit(mut self, enabled: bool) -> Self {
        self.cargo_audit = enabled;
        self
    }

    fn run_cargo_audit(&self) -> Vec<SecurityFinding> {
        if !self.root.join("Cargo.lock").exists() || which::which("cargo-audit").is_err() {
            return Vec::new();
        }

        let output = match Command::new("cargo")
            .args(["audit", "--json"])
            .current_dir(&self.root)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Failed to run cargo audit");
                return Vec::new();
            }
        };

        Self::parse_audit(&String::from_utf8_lossy(&output.stdout))
    }

    fn parse_audit(stdout: &str) -> Vec<SecurityFinding> {
        match serde_json::from_str::<AuditReport>(stdout) {
            Ok(report) => report
                .vulnerabilities
                .list
                .into_iter()
                .map(|entry| {
                    SecurityFinding::new(
                        entry.advisory.id,
                        Severity::Critical,
                        format!(
                            "{} {}: {}",
                            entry.package.name, entry.package.version, entry.advisory.title
                        ),
                    )
                    .with_file("Cargo.lock")
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Unreadable cargo audit output");
                Vec::new()
            }
        }
    }

    fn scan_secrets(&self) -> Result<Vec<SecurityFinding>> {
        let regexes: Vec<Regex> = SECRET_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        let scanner = SourceScanner::new(&self.root, &self.scan)?;
        let mut findings = Vec::new();
        for path in scanner.discover() {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let relative = path.strip_prefix(&self.root).unwrap_or(&path);
            for (idx, line) in content.lines().enumerate() {
                if regexes.iter().any(|re| re.is_match(line)) {
                    let mut finding = SecurityFinding::new(
                        "hardcoded_secret",
                        Severity::High,
                        "Potential hard-coded secret",
                    )
                    .with_file(relative);
                    finding.line = Some(idx as u32 + 1);
                    findings.push(finding);
                }
            }
        }
        Ok(findings)
    }
}

impl VulnerabilityFeed for ProjectSecurityFeed {
    fn snapshot(&self) -> Result<Option<SecuritySnapshot>> {
        let mut snapshot = VulnerabilityFeed::snapshot(&self.json)?.unwrap_or_default();
        if self.cargo_audit {
            snapshot.findings.extend(self.run_cargo_audit());
        }
        snapshot.findings.extend(self.scan_secrets()?);
        Ok(Some(snapshot))
    }
}

// ============================================================================
// Feed bundle
// ============================================================================

/// The feeds handed to a [`GateEngine`](super::engine::GateEngine).
#[derive(Clone)]
pub struct MetricFeeds {
    /// External style checker; `None` always uses the internal scan.
    pub style: Option<Arc<dyn StyleFeed>>,
    pub vulnerabilities: Arc<dyn VulnerabilityFeed>,
    pub benchmarks: Arc<dyn BenchmarkFeed>,
    pub coverage: Arc<dyn CoverageFeed>,
}

impl MetricFeeds {
    /// Default feeds for a project, including external tools.
    pub fn for_project(project_dir: &Path, config: &QualityGateConfig) -> Self {
        Self {
            style: Some(Arc::new(RustfmtStyleFeed::new())),
            vulnerabilities: Arc::new(ProjectSecurityFeed::new(project_dir, &config.scan)),
            benchmarks: Arc::new(JsonSnapshotFeed::performance(project_dir)),
            coverage: Arc::new(JsonSnapshotFeed::coverage(project_dir)),
        }
    }

    /// Feeds that never spawn external tools.
    pub fn offline(project_dir: &Path, config: &QualityGateConfig) -> Self {
        Self {
            style: None,
            vulnerabilities: Arc::new(
                ProjectSecurityFeed::new(project_dir, &config.scan).with_cargo_audit(false),
            ),
            ..Self::for_project(project_dir, config)
        }
    }

    #[must_use]
    pub fn with_style(mut self, feed: Option<Arc<dyn StyleFeed>>) -> Self {
        self.style = feed;
        self
    }

    #[must_use]
    pub fn with_vulnerabilities(mut self, feed: Arc<dyn VulnerabilityFeed>) -> Self {
        self.vulnerabilities = feed;
        self
    }

    #[must_use]
    pub fn with_benchmarks(mut self, feed: Arc<dyn BenchmarkFeed>) -> Self {
        self.benchmarks = feed;
        self
    }

    #[must_use]
    pub fn with_coverage(mut self, feed: Arc<dyn CoverageFeed>) -> Self {
        self.coverage = feed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_secret_patterns_compile() {
        for pattern in SECRET_PATTERNS {
            assert!(Regex::new(pattern).is_ok(), "Invalid pattern: {pattern}");
        }
    }

    #[test]
    fn test_missing_snapshot_file_is_none() {
        let temp = TempDir::new().unwrap();
        let feed = JsonSnapshotFeed::coverage(temp.path());
        assert!(CoverageFeed::snapshot(&feed).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_files_load() {
        let temp = TempDir::new().unwrap();
        let dir = QualityGateConfig::feeds_dir(temp.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("performance.json"),
            r#"{"p95_ms": 420.5, "throughput_rps": 150}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("coverage.json"),
            r#"{"line": 81.0, "branch": 70.5, "function": 90}"#,
        )
        .unwrap();

        let perf = BenchmarkFeed::snapshot(&JsonSnapshotFeed::performance(temp.path()))
            .unwrap()
            .unwrap();
        assert_eq!(perf.p95_ms, 420.5);
        assert_eq!(perf.throughput_rps, 150.0);

        let cov = CoverageFeed::snapshot(&JsonSnapshotFeed::coverage(temp.path()))
            .unwrap()
            .unwrap();
        assert_eq!(cov.branch, 70.5);
    }

    #[test]
    fn test_malformed_snapshot_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let feed = JsonSnapshotFeed::new(&path);
        assert!(matches!(
            BenchmarkFeed::snapshot(&feed),
            Err(GateError::Json(_))
        ));
    }

    #[test]
    fn test_project_security_feed_merges_snapshot_and_secret_scan() {
        let temp = TempDir::new().unwrap();
        let dir = QualityGateConfig::feeds_dir(temp.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("security.json"),
            r#"{"findings": [{"id": "RUSTSEC-0000-0001", "severity": "medium", "message": "old dep"}]}"#,
        )
        .unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/lib.rs"),
            "pub fn connect() {\n    let password = \"hunter22\";\n}\n",
        )
        .unwrap();

        let feed = ProjectSecurityFeed::new(temp.path(), &ScanConfig::default())
            .with_cargo_audit(false);
        let snapshot = feed.snapshot().unwrap().unwrap();

        assert_eq!(snapshot.findings.len(), 2);
        assert_eq!(snapshot.findings[0].severity, Severity::Medium);
        let secret = &snapshot.findings[1];
        assert_eq!(secret.id, "hardcoded_secret");
        assert_eq!(secret.file.as_deref(), Some(Path::new("src/lib.rs")));
        assert_eq!(secret.line, Some(2));
    }

    #[test]
    fn test_parse_audit_output() {
        let json = r#"{
            "vulnerabilities": {
                "found": true,
                "count": 1,
                "list": [{
                    "advisory": {"id": "RUSTSEC-2023-0001", "title": "Use after free"},
                    "package": {"name": "badcrate", "version": "0.1.0"}
                }]
            }
        }"#;
        let findings = ProjectSecurityFeed::parse_audit(json);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].id, "RUSTSEC-2023-0001");
        assert_eq!(findings[0].severity, Severity::Critical);
        assert!(findings[0].message.contains("badcrate 0.1.0"));
    }

    #[test]
    fn test_parse_rustfmt_output() {
        let root = Path::new("/work/project");
        let stdout = "Diff in /work/project/src/lib.rs at line 3:\n-fn a(){}\n+fn a() {}\n\
                      Diff in /work/project/src/main.rs:10:\n";
        let issues = RustfmtStyleFeed::parse_output(root, stdout);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].file, PathBuf::from("src/lib.rs"));
        assert_eq!(issues[0].line, Some(3));
        assert_eq!(issues[1].line, Some(10));
    }

    #[test]
    fn test_static_style_feed_none_is_unavailable() {
        let feed: StaticFeed<Vec<StyleIssue>> = StaticFeed::none();
        let err = feed.issues(Path::new("."), &[]).unwrap_err();
        assert!(err.is_fallback());
    }
}
