//! Code quality gate.
//!
//! Threshold checks over the scanned source tree:
//!
//! | Check            | Violation            | Severity |
//! |------------------|----------------------|----------|
//! | parse validity   | `syntax_error`       | Critical |
//! | `mod` resolution | `import_error`       | High     |
//! | complexity       | `high_complexity`    | High     |
//! | duplication      | `code_duplication`   | Medium   |
//! | documentation    | `low_documentation`  | Medium   |
//! | style            | `style_violations`   | Low      |

use anyhow::Result;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{capped, Gate, GateResult, Severity, Violation};
use crate::analysis::docs::DocCoverage;
use crate::analysis::style::{self, StyleIssue, REPORTED_ISSUES};
use crate::analysis::{complexity, docs, duplication};
use crate::config::QualityGateConfig;
use crate::error::GateError;
use crate::quality::cancel::CancellationSignal;
use crate::quality::feeds::StyleFeed;
use crate::quality::registry::{ExecutionContext, GateKind};
use crate::scanner::{SourceScanner, SourceTree};

/// Top-level directories whose files are test code.
const TEST_DIRS: &[&str] = &["tests", "benches"];

/// Style issues and where they came from.
#[derive(Debug, Clone)]
pub struct StyleReport {
    pub source: String,
    pub issues: Vec<StyleIssue>,
}

/// Threshold-based code quality gate.
pub struct CodeQualityGate {
    root: PathBuf,
    config: Arc<QualityGateConfig>,
    style: Option<Arc<dyn StyleFeed>>,
}

impl CodeQualityGate {
    /// Create a gate for `root`; style checks use the internal scan.
    pub fn new(root: impl AsRef<Path>, config: Arc<QualityGateConfig>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
            style: None,
        }
    }

    /// Prefer an external style checker, falling back to the internal scan.
    #[must_use]
    pub fn with_style_feed(mut self, feed: Option<Arc<dyn StyleFeed>>) -> Self {
        self.style = feed;
        self
    }

    /// Collect style issues, from the feed when it can run.
    pub fn style_report(&self, tree: &SourceTree) -> StyleReport {
        if let Some(feed) = &self.style {
            let files: Vec<PathBuf> = tree.files.iter().map(|f| f.relative.clone()).collect();
            match feed.issues(&tree.root, &files) {
                Ok(issues) => {
                    return StyleReport {
                        source: feed.name().to_string(),
                        issues,
                    }
                }
                Err(e) if e.is_fallback() => {
                    debug!(tool = feed.name(), "Style tool unavailable, using internal scan");
                }
                Err(e) => {
                    warn!(tool = feed.name(), error = %e, "Style tool failed, using internal scan");
                }
            }
        }

        let max = self.config.thresholds.max_line_length;
        StyleReport {
            source: "internal".to_string(),
            issues: tree
                .files
                .iter()
                .flat_map(|f| style::scan_source(&f.relative, &f.source, max))
                .collect(),
        }
    }

    /// Evaluate a scanned tree.
    pub fn evaluate(&self, tree: &SourceTree, style: StyleReport) -> GateResult {
        let t = &self.config.thresholds;
        let mut violations = Vec::new();
        let mut suggestions = Vec::new();

        // Parse validity
        let syntax_errors = tree.parse_failures().count();
        for (file, failure) in tree.parse_failures() {
            let error = GateError::Parse {
                file: file.relative.clone(),
                message: failure.message.clone(),
            };
            violations.push(
                Violation::new("syntax_error", Severity::Critical, error.to_string())
                    .at(&file.relative, failure.line),
            );
        }
        if syntax_errors > 0 {
            suggestions.push("Fix syntax errors before running further checks".to_string());
        }

        // Module declarations
        let missing = tree.missing_modules();
        let import_errors = missing.len();
        for (file, decl) in &missing {
            violations.push(
                Violation::new(
                    "import_error",
                    Severity::High,
                    format!("Module `{}` is declared but has no source file", decl.name),
                )
                .at(&file.relative, decl.line)
                .with_detail("module", decl.name.clone()),
            );
        }
        if import_errors > 0 {
            suggestions.push("Add the missing module files or remove the `mod` declarations".to_string());
        }

        // Complexity
        let functions: Vec<_> = tree
            .parsed()
            .flat_map(|(file, syntax)| complexity::analyze_file(syntax, &file.relative))
            .collect();
        let max = complexity::max_complexity(&functions);
        for f in functions.iter().filter(|f| f.complexity > t.max_complexity) {
            violations.push(
                Violation::new(
                    "high_complexity",
                    Severity::High,
                    format!(
                        "Function `{}` has complexity {} (max {})",
                        f.name, f.complexity, t.max_complexity
                    ),
                )
                .at(&f.file, f.line)
                .with_detail("complexity", f.complexity),
            );
        }
        let max_value = max.map_or(0, |f| f.complexity);
        let complexity_excess = f64::from(max_value.saturating_sub(t.max_complexity));
        if complexity_excess > 0.0 {
            suggestions.push(format!(
                "Split functions with complexity above {} into smaller helpers",
                t.max_complexity
            ));
        }

        // Duplication
        let dup = duplication::analyze(tree.files.iter().map(|f| f.source.as_str()));
        let duplication_excess = dup.percentage - t.max_duplications;
        if duplication_excess > 0.0 {
            violations.push(
                Violation::new(
                    "code_duplication",
                    Severity::Medium,
                    format!(
                        "{:.1}% of lines are duplicated (max {:.1}%)",
                        dup.percentage, t.max_duplications
                    ),
                )
                .with_detail("percentage", dup.percentage)
                .with_detail("duplicated_lines", dup.duplicated_lines),
            );
            suggestions.push("Extract repeated code into shared functions".to_string());
        }

        // Style
        let style_count = style.issues.len();
        if style_count > 0 {
            violations.push(
                Violation::new(
                    "style_violations",
                    Severity::Low,
                    format!("{style_count} style issue(s) reported by {}", style.source),
                )
                .with_detail("count", style_count),
            );
            suggestions.push("Run `cargo fmt` to fix formatting".to_string());
        }

        // Documentation
        let doc = tree
            .parsed()
            .filter(|(file, _)| !is_test_file(&file.relative))
            .map(|(_, syntax)| docs::analyze_file(syntax))
            .fold(DocCoverage::default(), DocCoverage::merge);
        let doc_percentage = doc.percentage();
        let doc_deficit = (t.min_doc_coverage - doc_percentage).max(0.0);
        if doc_deficit > 0.0 {
            violations.push(
                Violation::new(
                    "low_documentation",
                    Severity::Medium,
                    format!(
                        "Documentation coverage {:.1}% is below {:.1}%",
                        doc_percentage, t.min_doc_coverage
                    ),
                )
                .with_detail("documented", doc.documented)
                .with_detail("total", doc.total),
            );
            suggestions.push("Add doc comments to public functions and types".to_string());
        }

        let score = 100.0
            - capped(complexity_excess, 5.0, 30.0)
            - capped(duplication_excess, 2.0, 20.0)
            - capped(style_count as f64, 0.5, 15.0)
            - syntax_errors as f64 * 20.0
            - import_errors as f64 * 10.0
            - doc_deficit * 0.5;

        let message = format!(
            "{} file(s), max complexity {}, {:.1}% duplication, {:.1}% documented",
            tree.files.len(),
            max_value,
            dup.percentage,
            doc_percentage
        );

        let style_sample: Vec<&StyleIssue> = style.issues.iter().take(REPORTED_ISSUES).collect();

        let mut result = GateResult::evaluated(GateKind::CodeQuality.name(), score, violations, message)
            .with_suggestions(suggestions)
            .with_metadata("files_analyzed", tree.files.len())
            .with_metadata("functions_analyzed", functions.len())
            .with_metadata("duplication_percentage", dup.percentage)
            .with_metadata("top_duplicates", json!(dup.top))
            .with_metadata("doc_coverage", doc_percentage)
            .with_metadata("style_source", style.source.clone())
            .with_metadata("style_issues", json!(style_sample));
        if let Some(f) = max {
            result = result.with_metadata(
                "max_complexity",
                json!({
                    "value": f.complexity,
                    "function": f.name,
                    "file": f.file,
                    "line": f.line,
                }),
            );
        }
        result
    }
}

fn is_test_file(relative: &Path) -> bool {
    relative
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .is_some_and(|first| TEST_DIRS.contains(&first))
}

impl Gate for CodeQualityGate {
    fn name(&self) -> &str {
        GateKind::CodeQuality.name()
    }

    fn check(&self, _context: ExecutionContext, cancel: &CancellationSignal) -> Result<GateResult> {
        let scanner = SourceScanner::new(&self.root, &self.config.scan)?;
        let tree = scanner.scan(self.name(), cancel)?;
        cancel.check(self.name())?;
        let style = self.style_report(&tree);
        cancel.check(self.name())?;
        Ok(self.evaluate(&tree, style))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::feeds::StaticFeed;
    use crate::quality::gates::GateStatus;
    use tempfile::TempDir;

    fn gate(config: QualityGateConfig) -> CodeQualityGate {
        CodeQualityGate::new("/virtual", Arc::new(config))
    }

    fn evaluate(config: QualityGateConfig, sources: &[(&str, &str)]) -> GateResult {
        let tree = SourceTree::from_sources("/virtual", sources.iter().copied());
        let g = gate(config);
        let style = g.style_report(&tree);
        g.evaluate(&tree, style)
    }

    fn branches(n: usize) -> String {
        let body: String = (0..n).map(|i| format!("    if x == {i} {{ y(); }}\n")).collect();
        format!("/// Documented.\npub fn busy(x: u32) {{\n{body}}}\n")
    }

    #[test]
    fn test_clean_code_passes() {
        let result = evaluate(
            QualityGateConfig::default(),
            &[("src/lib.rs", "/// Adds.\npub fn add(a: u32, b: u32) -> u32 {\n    a + b\n}\n")],
        );
        assert_eq!(result.status, GateStatus::Passed);
        assert_eq!(result.score, 100.0);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_complexity_over_threshold_fails() {
        let config = QualityGateConfig::default().with_max_complexity(20);
        let result = evaluate(config, &[("src/lib.rs", &branches(25))]);

        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.count_kind("high_complexity"), 1);
        let v = &result.violations[0];
        assert_eq!(v.line, Some(2));
        assert_eq!(v.details["complexity"], json!(26));
        assert_eq!(result.metadata["max_complexity"]["value"], json!(26));
        // 6 over the limit, 5 points each, capped at 30
        assert_eq!(result.score, 70.0);
    }

    #[test]
    fn test_syntax_error_is_critical_and_fails() {
        let result = evaluate(
            QualityGateConfig::default(),
            &[("src/lib.rs", "pub fn broken( {\n")],
        );
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.count_kind("syntax_error"), 1);
        assert!(result.violations[0].message.starts_with("Failed to parse src/lib.rs:"));
        assert_eq!(result.score, 80.0);
    }

    #[test]
    fn test_duplication_is_medium_warning() {
        let line = "let repeated_value = compute(1, 2, 3);\n";
        let src = format!("/// Doc.\npub fn f() {{\n{}}}\n", line.repeat(4));
        let result = evaluate(QualityGateConfig::default(), &[("src/lib.rs", &src)]);

        assert_eq!(result.status, GateStatus::Warning);
        assert_eq!(result.count_kind("code_duplication"), 1);
        let top = result.metadata["top_duplicates"].as_array().unwrap();
        assert_eq!(top[0]["occurrences"], json!(4));
    }

    #[test]
    fn test_low_documentation() {
        let src = "pub fn a() {}\npub fn b() {}\n/// Only one.\npub fn c() {}\n";
        let result = evaluate(QualityGateConfig::default(), &[("src/lib.rs", src)]);
        assert_eq!(result.status, GateStatus::Warning);
        assert_eq!(result.count_kind("low_documentation"), 1);
        let deficit = 70.0 - 100.0 / 3.0;
        assert!((result.score - (100.0 - deficit * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_test_files_excluded_from_documentation() {
        let result = evaluate(
            QualityGateConfig::default(),
            &[
                ("src/lib.rs", "/// Doc.\npub fn a() {}\n"),
                ("tests/it.rs", "fn helper() {}\nfn other() {}\n"),
            ],
        );
        assert_eq!(result.count_kind("low_documentation"), 0);
    }

    #[test]
    fn test_internal_style_scan_used_without_feed() {
        let src = format!("/// Doc.\npub fn f() {{}} \n// {}\n", "x".repeat(120));
        let result = evaluate(QualityGateConfig::default(), &[("src/lib.rs", &src)]);
        assert_eq!(result.count_kind("style_violations"), 1);
        assert_eq!(result.violations[0].details["count"], json!(2));
        assert_eq!(result.metadata["style_source"], json!("internal"));
        assert_eq!(result.score, 99.0);
    }

    #[test]
    fn test_style_feed_preferred_and_falls_back() {
        let tree = SourceTree::from_sources("/virtual", [("src/lib.rs", "fn f() {} \n")]);

        let feed = StaticFeed::some(vec![StyleIssue::new("src/lib.rs", Some(1), "fmt")]);
        let g = gate(QualityGateConfig::default()).with_style_feed(Some(Arc::new(feed)));
        let report = g.style_report(&tree);
        assert_eq!(report.source, "static");
        assert_eq!(report.issues.len(), 1);

        let missing: StaticFeed<Vec<StyleIssue>> = StaticFeed::none();
        let g = gate(QualityGateConfig::default()).with_style_feed(Some(Arc::new(missing)));
        assert_eq!(g.style_report(&tree).source, "internal");
    }

    #[test]
    fn test_check_scans_project_and_reports_missing_module() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(
            temp.path().join("src/lib.rs"),
            "//! Crate.\n\n/// Missing.\nmod absent;\n",
        )
        .unwrap();

        let g = CodeQualityGate::new(temp.path(), Arc::new(QualityGateConfig::default()));
        let result = g
            .check(ExecutionContext::Commit, &CancellationSignal::new())
            .unwrap();
        assert_eq!(result.status, GateStatus::Failed);
        assert_eq!(result.count_kind("import_error"), 1);
        assert_eq!(result.score, 90.0);
    }

    #[test]
    fn test_check_honours_cancellation() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationSignal::new();
        cancel.cancel();
        let g = CodeQualityGate::new(temp.path(), Arc::new(QualityGateConfig::default()));
        let err = g.check(ExecutionContext::Commit, &cancel).unwrap_err();
        assert!(GateError::is_cancelled_anyhow(&err));
    }
}
