//! Duplicate line detection.

use serde::Serialize;
use std::collections::HashMap;

/// Lines this short (after trimming) are never considered.
const MIN_LINE_LENGTH: usize = 10;

/// How many repeated lines are surfaced in reports.
pub const TOP_DUPLICATES: usize = 10;

/// One repeated line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateLine {
    pub text: String,
    pub occurrences: usize,
}

/// Project-wide duplication measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicationReport {
    /// Non-trivial lines considered.
    pub total_lines: usize,
    /// Non-trivial lines whose text occurs more than once.
    pub duplicated_lines: usize,
    /// `duplicated_lines / total_lines * 100`.
    pub percentage: f64,
    /// Most repeated lines, most frequent first.
    pub top: Vec<DuplicateLine>,
}

/// Normalise a line for comparison, or `None` if it is trivial.
fn normalize(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.len() <= MIN_LINE_LENGTH
        || trimmed.starts_with("//")
        || trimmed.starts_with("/*")
        || trimmed.starts_with('*')
    {
        return None;
    }
    Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Measure duplication across the given sources.
pub fn analyze<'a>(sources: impl IntoIterator<Item = &'a str>) -> DuplicationReport {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total_lines = 0;

    for source in sources {
        for line in source.lines().filter_map(normalize) {
            total_lines += 1;
            *counts.entry(line).or_insert(0) += 1;
        }
    }

    let duplicated_lines = counts.values().filter(|&&c| c > 1).sum();
    let percentage = if total_lines == 0 {
        0.0
    } else {
        duplicated_lines as f64 / total_lines as f64 * 100.0
    };

    let mut top: Vec<DuplicateLine> = counts
        .into_iter()
        .filter(|(_, c)| *c > 1)
        .map(|(text, occurrences)| DuplicateLine { text, occurrences })
        .collect();
    top.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.text.cmp(&b.text)));
    top.truncate(TOP_DUPLICATES);

    DuplicationReport {
        total_lines,
        duplicated_lines,
        percentage,
        top,
    }
}
