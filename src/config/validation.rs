//! Configuration validation.
//!
//! Runs before any gate starts. A config that fails here aborts the whole
//! invocation with [`GateError::Validation`]; nothing else is allowed to.

use std::collections::HashSet;

use globset::Glob;

use super::QualityGateConfig;
use crate::error::{GateError, Result};

/// Validate a configuration, returning the first problem found.
pub fn validate(config: &QualityGateConfig) -> Result<()> {
    let t = &config.thresholds;

    if t.max_complexity == 0 {
        return Err(GateError::validation(
            "thresholds.max_complexity",
            "must be at least 1",
        ));
    }

    for (field, value) in [
        ("thresholds.max_duplications", t.max_duplications),
        ("thresholds.min_line_coverage", t.min_line_coverage),
        ("thresholds.min_branch_coverage", t.min_branch_coverage),
        ("thresholds.min_function_coverage", t.min_function_coverage),
        ("thresholds.min_doc_coverage", t.min_doc_coverage),
    ] {
        check_range(field, value, 0.0, 100.0)?;
    }

    for (field, value) in [
        ("thresholds.max_coupling_score", t.max_coupling_score),
        ("thresholds.min_cohesion_score", t.min_cohesion_score),
    ] {
        check_range(field, value, 0.0, 1.0)?;
    }

    if !t.max_response_time_p95_ms.is_finite() || t.max_response_time_p95_ms <= 0.0 {
        return Err(GateError::validation(
            "thresholds.max_response_time_p95_ms",
            "must be a positive number",
        ));
    }
    if !t.min_throughput_rps.is_finite() || t.min_throughput_rps < 0.0 {
        return Err(GateError::validation(
            "thresholds.min_throughput_rps",
            "must be zero or positive",
        ));
    }
    if t.max_line_length == 0 {
        return Err(GateError::validation(
            "thresholds.max_line_length",
            "must be at least 1",
        ));
    }
    if t.max_file_lines == 0 {
        return Err(GateError::validation(
            "thresholds.max_file_lines",
            "must be at least 1",
        ));
    }

    if config.execution.timeout_seconds == 0 {
        return Err(GateError::validation(
            "execution.timeout_seconds",
            "must be at least 1",
        ));
    }

    for pattern in &config.scan.exclude {
        Glob::new(pattern).map_err(|e| {
            GateError::validation("scan.exclude", format!("invalid glob '{pattern}': {e}"))
        })?;
    }

    validate_layers(config)
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(GateError::validation(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
    Ok(())
}

fn validate_layers(config: &QualityGateConfig) -> Result<()> {
    let mut names = HashSet::new();
    for layer in &config.layers {
        if layer.name.trim().is_empty() {
            return Err(GateError::validation("layers", "layer name cannot be empty"));
        }
        if !names.insert(layer.name.as_str()) {
            return Err(GateError::validation(
                "layers",
                format!("duplicate layer '{}'", layer.name),
            ));
        }
        if layer.prefixes.is_empty() {
            return Err(GateError::validation(
                "layers",
                format!("layer '{}' has no prefixes", layer.name),
            ));
        }
    }

    for layer in &config.layers {
        for dep in &layer.may_depend_on {
            if !names.contains(dep.as_str()) {
                return Err(GateError::validation(
                    "layers",
                    format!("layer '{}' depends on unknown layer '{dep}'", layer.name),
                ));
            }
        }
    }

    Ok(())
}
