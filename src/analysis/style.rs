//! Style issues and the internal style scan.
//!
//! The internal scan is the fallback used when no external formatter is
//! available. It reports over-long lines and trailing whitespace.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How many issues are kept in gate metadata.
pub const REPORTED_ISSUES: usize = 20;

/// One style problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleIssue {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
}

impl StyleIssue {
    pub fn new(file: impl AsRef<Path>, line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Scan one file's text.
#[must_use]
pub fn scan_source(file: &Path, source: &str, max_line_length: usize) -> Vec<StyleIssue> {
    let mut issues = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let line_no = Some(idx as u32 + 1);
        let width = line.chars().count();
        if width > max_line_length {
            issues.push(StyleIssue::new(
                file,
                line_no,
                format!("line is {width} characters (max {max_line_length})"),
            ));
        }
        if line.ends_with(' ') || line.ends_with('\t') {
            issues.push(StyleIssue::new(file, line_no, "trailing whitespace"));
        }
    }
    issues
}
