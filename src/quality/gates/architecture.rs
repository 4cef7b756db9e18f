//! Architecture gate.
//!
//! Builds the module dependency graph and checks layering, coupling,
//! cohesion, circular dependencies, interface size and file organization.
//! Detected design idioms add a small bonus to the score.

use anyhow::Result;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{capped, Gate, GateResult, Severity, Violation};
use crate::analysis::graph::DependencyGraph;
use crate::analysis::interface::{self, InterfaceFinding};
use crate::analysis::patterns::PatternDetector;
use crate::analysis::cohesion;
use crate::config::QualityGateConfig;
use crate::quality::cancel::CancellationSignal;
use crate::quality::registry::{ExecutionContext, GateKind};
use crate::scanner::{SourceScanner, SourceTree};

/// Outgoing edges above which a module counts as a hub.
pub const MAX_FAN_OUT: usize = 5;

/// Graph-based structural gate.
pub struct ArchitectureGate {
    root: PathBuf,
    config: Arc<QualityGateConfig>,
}

impl ArchitectureGate {
    pub fn new(root: impl AsRef<Path>, config: Arc<QualityGateConfig>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    /// Evaluate a scanned tree.
    pub fn evaluate(&self, tree: &SourceTree) -> GateResult {
        let t = &self.config.thresholds;
        let graph = DependencyGraph::from_tree(tree);
        let mut violations = Vec::new();
        let mut suggestions = Vec::new();

        // Layering
        let layering = graph.layer_violations(&self.config.layers);
        for v in &layering {
            violations.push(
                Violation::new(
                    "layer_violation",
                    Severity::High,
                    format!(
                        "{} ({}) must not depend on {} ({})",
                        v.from_module, v.from_layer, v.to_module, v.to_layer
                    ),
                )
                .at(&v.file, v.line)
                .with_detail("from_layer", v.from_layer.clone())
                .with_detail("to_layer", v.to_layer.clone())
                .with_detail("from_module", v.from_module.clone())
                .with_detail("to_module", v.to_module.clone())
                .with_detail("file", v.file.display().to_string()),
            );
        }
        if !layering.is_empty() {
            suggestions.push("Move shared code into a lower layer or invert the dependency".to_string());
        }

        // Coupling
        let coupling = graph.coupling();
        let coupling_excess = coupling - t.max_coupling_score;
        if coupling_excess > 0.0 {
            violations.push(
                Violation::new(
                    "high_coupling",
                    Severity::Medium,
                    format!(
                        "Coupling {:.2} exceeds {:.2}",
                        coupling, t.max_coupling_score
                    ),
                )
                .with_detail("coupling", coupling),
            );
            suggestions.push("Reduce cross-module imports by introducing narrower interfaces".to_string());
        }

        // Organization
        let mut organization = 0usize;
        for (module, fan_out) in graph.high_fan_out(MAX_FAN_OUT) {
            organization += 1;
            violations.push(
                Violation::new(
                    "high_fan_out",
                    Severity::Low,
                    format!("Module {module} depends on {fan_out} modules"),
                )
                .with_detail("module", module)
                .with_detail("fan_out", fan_out),
            );
        }
        for file in tree.files.iter().filter(|f| f.line_count() > t.max_file_lines) {
            organization += 1;
            violations.push(
                Violation::new(
                    "oversized_module",
                    Severity::Low,
                    format!(
                        "File has {} lines (max {})",
                        file.line_count(),
                        t.max_file_lines
                    ),
                )
                .in_file(&file.relative)
                .with_detail("lines", file.line_count()),
            );
        }
        if organization > 0 {
            suggestions.push("Split large or highly connected modules".to_string());
        }

        // Cohesion
        let cohesion = cohesion::average(tree.parsed().map(|(_, syntax)| syntax));
        let cohesion_deficit = t.min_cohesion_score - cohesion;
        if cohesion_deficit > 0.0 {
            violations.push(
                Violation::new(
                    "low_cohesion",
                    Severity::Medium,
                    format!(
                        "Cohesion {:.2} is below {:.2}",
                        cohesion, t.min_cohesion_score
                    ),
                )
                .with_detail("cohesion", cohesion),
            );
            suggestions.push("Group related items into the same module".to_string());
        }

        // Cycles
        let cycles = graph.find_cycles();
        for cycle in &cycles {
            let mut path = cycle.clone();
            if let Some(first) = cycle.first() {
                path.push(first.clone());
            }
            violations.push(
                Violation::new(
                    "circular_dependency",
                    Severity::High,
                    format!("Circular dependency: {}", path.join(" -> ")),
                )
                .with_detail("cycle", json!(cycle)),
            );
        }
        if !cycles.is_empty() {
            suggestions.push("Break circular dependencies by extracting shared types".to_string());
        }

        // Interfaces
        let findings = interface::analyze(tree);
        for located in &findings {
            let violation = match &located.finding {
                InterfaceFinding::LargeInterface { name, members } => Violation::new(
                    "large_interface",
                    Severity::Medium,
                    format!("`{name}` has {members} members (max {})", interface::MAX_MEMBERS),
                )
                .with_detail("members", *members),
                InterfaceFinding::TooManyParameters { name, parameters } => Violation::new(
                    "too_many_parameters",
                    Severity::Medium,
                    format!(
                        "`{name}` takes {parameters} parameters (max {})",
                        interface::MAX_PARAMETERS
                    ),
                )
                .with_detail("parameters", *parameters),
                InterfaceFinding::NoPublicInterface { name } => Violation::new(
                    "no_public_interface",
                    Severity::Low,
                    format!("Public struct `{name}` exposes no fields, methods or trait impls"),
                ),
            };
            violations.push(violation.at(&located.file, located.line));
        }
        if !findings.is_empty() {
            suggestions.push("Keep types and signatures small; group parameters into structs".to_string());
        }

        // Patterns
        let patterns = PatternDetector::new().detect(tree.files.iter().map(|f| f.source.as_str()));
        suggestions.extend(patterns.suggestions.iter().cloned());

        let score = 100.0
            - capped(layering.len() as f64, 10.0, 30.0)
            - capped(coupling_excess, 50.0, 25.0)
            - capped(cohesion_deficit, 30.0, 20.0)
            - capped(cycles.len() as f64, 15.0, 25.0)
            - capped(findings.len() as f64, 2.0, 15.0)
            - capped(organization as f64, 3.0, 15.0)
            + patterns.bonus();

        let message = format!(
            "{} module(s), {} dependencies, {} cycle(s), coupling {:.2}, cohesion {:.2}",
            graph.node_count(),
            graph.edge_count(),
            cycles.len(),
            coupling,
            cohesion
        );

        GateResult::evaluated(GateKind::Architecture.name(), score, violations, message)
            .with_suggestions(suggestions)
            .with_metadata("modules", graph.node_count())
            .with_metadata("dependencies", graph.edge_count())
            .with_metadata("coupling", coupling)
            .with_metadata("cohesion", cohesion)
            .with_metadata("cycles", cycles.len())
            .with_metadata("patterns", json!(patterns))
    }
}

impl Gate for ArchitectureGate {
    fn name(&self) -> &str {
        GateKind::Architecture.name()
    }

    fn check(&self, _context: ExecutionContext, cancel: &CancellationSignal) -> Result<GateResult> {
        let scanner = SourceScanner::new(&self.root, &self.config.scan)?;
        let tree = scanner.scan(self.name(), cancel)?;
        cancel.check(self.name())?;
        Ok(self.evaluate(&tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::gates::GateStatus;

    fn evaluate(sources: &[(&str, &str)]) -> GateResult {
        // Coupling is not under test here.
        let mut config = QualityGateConfig::default();
        config.thresholds.max_coupling_score = 1.0;
        let tree = SourceTree::from_sources("/virtual", sources.iter().copied());
        ArchitectureGate::new("/virtual", Arc::new(config)).evaluate(&tree)
    }

    #[test]
    fn test_two_module_cycle_is_one_violation() {
        let result = evaluate(&[
            ("src/lib.rs", "mod a;\nmod b;\n"),
            ("src/a.rs", "use crate::b::B;\npub struct A;\n"),
            ("src/b.rs", "use crate::a::A;\npub struct B;\n"),
        ]);
        assert_eq!(result.count_kind("circular_dependency"), 1);
        assert_eq!(result.status, GateStatus::Failed);
        let v = result
            .violations
            .iter()
            .find(|v| v.kind == "circular_dependency")
            .unwrap();
        assert_eq!(v.message, "Circular dependency: a -> b -> a");
        assert_eq!(v.severity, Severity::High);
    }

    #[test]
    fn test_acyclic_tree_has_no_cycles() {
        let result = evaluate(&[
            ("src/lib.rs", "mod a;\nmod b;\n"),
            ("src/a.rs", "use crate::b::B;\npub struct A;\n"),
            ("src/b.rs", "pub struct B;\n"),
        ]);
        assert_eq!(result.count_kind("circular_dependency"), 0);
        assert_eq!(result.metadata["cycles"], json!(0));
    }

    #[test]
    fn test_layer_violation_details() {
        let result = evaluate(&[
            ("src/core/mod.rs", "use crate::cli::Args;\npub struct Model;\n"),
            ("src/cli.rs", "use crate::core::Model;\npub struct Args;\n"),
        ]);
        let v = result
            .violations
            .iter()
            .find(|v| v.kind == "layer_violation")
            .unwrap();
        assert_eq!(v.details["from_layer"], json!("core"));
        assert_eq!(v.details["to_layer"], json!("orchestration"));
        assert_eq!(v.details["from_module"], json!("core"));
        assert_eq!(v.details["to_module"], json!("cli"));
        assert_eq!(v.details["file"], json!("src/core/mod.rs"));
        assert_eq!(v.line, Some(1));
        assert_eq!(result.count_kind("layer_violation"), 1);
    }

    #[test]
    fn test_high_coupling_is_warning() {
        let mut config = QualityGateConfig::default();
        config.thresholds.max_coupling_score = 0.1;
        config.layers = Vec::new();
        let tree = SourceTree::from_sources(
            "/virtual",
            [
                ("src/a.rs", "use crate::b::X;\n"),
                ("src/b.rs", "use crate::c::X;\n"),
                ("src/c.rs", "pub struct X;\n"),
            ],
        );
        let result = ArchitectureGate::new("/virtual", Arc::new(config)).evaluate(&tree);
        assert_eq!(result.count_kind("high_coupling"), 1);
        assert_eq!(result.status, GateStatus::Warning);
    }

    #[test]
    fn test_interface_findings_reported() {
        let result = evaluate(&[(
            "src/lib.rs",
            "pub struct Hidden { x: u8 }\n\
             pub fn wide(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8, g: u8, h: u8) {}\n",
        )]);
        assert_eq!(result.count_kind("too_many_parameters"), 1);
        assert_eq!(result.count_kind("no_public_interface"), 1);
        assert_eq!(result.status, GateStatus::Warning);
    }

    #[test]
    fn test_oversized_file_is_organization_issue() {
        let mut config = QualityGateConfig::default();
        config.thresholds.max_file_lines = 3;
        let tree = SourceTree::from_sources(
            "/virtual",
            [("src/lib.rs", "pub struct A;\npub struct B;\npub struct C;\npub struct D;\n")],
        );
        let result = ArchitectureGate::new("/virtual", Arc::new(config)).evaluate(&tree);
        assert_eq!(result.count_kind("oversized_module"), 1);
    }

    #[test]
    fn test_pattern_bonus_and_suggestions() {
        let result = evaluate(&[(
            "src/lib.rs",
            "/// Cache.\npub struct Cache;\nimpl Cache {\n    pub fn new() -> Self { Cache }\n}\n",
        )]);
        assert_eq!(result.status, GateStatus::Passed);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.suggestions.len(), 2);
        assert_eq!(result.metadata["patterns"]["found"], json!(["factory"]));
    }
}
