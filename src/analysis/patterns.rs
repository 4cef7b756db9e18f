//! Design-idiom presence detection.
//!
//! Purely informational: finding an idiom earns a small score bonus in the
//! architecture gate, a missing one produces a suggestion.

use regex::Regex;
use serde::Serialize;

/// Detection rules: (idiom, regex, suggestion when absent).
const PATTERN_RULES: &[(&str, &str, &str)] = &[
    (
        "singleton",
        r"\b(OnceLock|OnceCell|LazyLock|Lazy)\b|\blazy_static!",
        "Consider OnceLock/LazyLock for shared single-instance state instead of globals",
    ),
    (
        "factory",
        r"fn\s+(new|create|build)\w*\s*(<[^>]*>)?\s*\([^)]*\)\s*->\s*(Self|Result<Self)\b|fn\s+create_\w+",
        "Consider constructor functions (new/create/build) to centralise object creation",
    ),
    (
        "observer",
        r"fn\s+(notify\w*|subscribe\w*|add_listener\w*|on_\w+)\s*[<(]",
        "Consider a subscribe/notify interface to decouple event producers from consumers",
    ),
];

/// Which idioms were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternPresence {
    pub found: Vec<String>,
    pub missing: Vec<String>,
    #[serde(skip)]
    pub suggestions: Vec<String>,
}

impl PatternPresence {
    /// Number of detectable idioms.
    pub fn total() -> usize {
        PATTERN_RULES.len()
    }

    /// Score bonus: `5 * found / total`.
    #[must_use]
    pub fn bonus(&self) -> f64 {
        5.0 * self.found.len() as f64 / Self::total() as f64
    }
}

/// Compiled pattern rules.
pub struct PatternDetector {
    rules: Vec<(&'static str, Regex, &'static str)>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    pub fn new() -> Self {
        let rules = PATTERN_RULES
            .iter()
            .filter_map(|(name, pattern, hint)| {
                Regex::new(pattern).ok().map(|re| (*name, re, *hint))
            })
            .collect();
        Self { rules }
    }

    /// Detect idioms across all given sources.
    pub fn detect<'a>(&self, sources: impl IntoIterator<Item = &'a str>) -> PatternPresence {
        let sources: Vec<&str> = sources.into_iter().collect();
        let mut presence = PatternPresence::default();
        for (name, re, hint) in &self.rules {
            if sources.iter().any(|src| re.is_match(src)) {
                presence.found.push(name.to_string());
            } else {
                presence.missing.push(name.to_string());
                presence.suggestions.push(hint.to_string());
            }
        }
        presence
    }
}
