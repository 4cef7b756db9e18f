//! Shared-identifier cohesion.
//!
//! Each top-level function, struct, enum and trait in a file gets a set of
//! domain words drawn from its name and signature (fields, parameter and
//! return types, variants, trait methods). An item is cohesive when it shares
//! at least one word with another item in the same file. A file's score is
//! the cohesive fraction of its items; files with fewer than two items are
//! not scored.

use std::collections::BTreeSet;

use syn::visit::Visit;
use syn::{Ident, Item};

/// Words too generic to indicate a shared concern.
const STOPWORDS: &[&str] = &[
    "new", "get", "set", "from", "into", "with", "the", "and", "for", "self", "str", "string",
    "vec", "option", "result", "box", "arc", "default", "clone", "debug", "impl", "mut", "ref",
    "bool", "usize", "isize", "u8", "u16", "u32", "u64", "i32", "i64", "f32", "f64", "err",
    "error", "value", "data", "test", "fmt", "display",
];

/// Cohesion of one file, when it has enough items to measure.
#[must_use]
pub fn file_cohesion(file: &syn::File) -> Option<f64> {
    let items: Vec<BTreeSet<String>> = file.items.iter().filter_map(item_words).collect();
    if items.len() < 2 {
        return None;
    }

    let cohesive = items
        .iter()
        .enumerate()
        .filter(|(i, words)| {
            items
                .iter()
                .enumerate()
                .any(|(j, other)| j != *i && !words.is_disjoint(other))
        })
        .count();

    Some(cohesive as f64 / items.len() as f64)
}

/// Average cohesion across measured files; 1.0 when none can be measured.
#[must_use]
pub fn average<'a>(files: impl IntoIterator<Item = &'a syn::File>) -> f64 {
    let scores: Vec<f64> = files.into_iter().filter_map(file_cohesion).collect();
    if scores.is_empty() {
        1.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn item_words(item: &Item) -> Option<BTreeSet<String>> {
    let mut collector = IdentCollector::default();
    match item {
        Item::Fn(f) => collector.visit_signature(&f.sig),
        Item::Struct(s) => collector.visit_item_struct(s),
        Item::Enum(e) => collector.visit_item_enum(e),
        Item::Trait(t) => {
            collector.visit_ident(&t.ident);
            for trait_item in &t.items {
                if let syn::TraitItem::Fn(f) = trait_item {
                    collector.visit_signature(&f.sig);
                }
            }
        }
        _ => return None,
    }
    Some(collector.words)
}

#[derive(Default)]
struct IdentCollector {
    words: BTreeSet<String>,
}

impl<'ast> Visit<'ast> for IdentCollector {
    fn visit_ident(&mut self, ident: &'ast Ident) {
        let raw = ident.to_string();
        for word in split_words(raw.trim_start_matches("r#")) {
            if word.len() >= 3 && !STOPWORDS.contains(&word.as_str()) {
                self.words.insert(word);
            }
        }
    }

    // Attribute contents are not part of the item's vocabulary.
    fn visit_attribute(&mut self, _attr: &'ast syn::Attribute) {}
}

/// Split `snake_case` and `CamelCase` identifiers into lowercase words.
fn split_words(ident: &str) -> Vec<String> {
    let mut words = Vec::new();
    for part in ident.split('_').filter(|p| !p.is_empty()) {
        let mut current = String::new();
        let mut prev_lower = false;
        for ch in part.chars() {
            if ch.is_uppercase() && prev_lower && !current.is_empty() {
                words.push(current.to_lowercase());
                current.clear();
            }
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
            current.push(ch);
        }
        if !current.is_empty() {
            words.push(current.to_lowercase());
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohesion(src: &str) -> Option<f64> {
        file_cohesion(&syn::parse_file(src).unwrap())
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("HttpRequestParser"), vec!["http", "request", "parser"]);
        assert_eq!(split_words("parse_http_request"), vec!["parse", "http", "request"]);
        assert_eq!(split_words("URL"), vec!["url"]);
    }

    #[test]
    fn test_single_item_file_not_measured() {
        assert_eq!(cohesion("pub struct Only;"), None);
    }

    #[test]
    fn test_related_items_fully_cohesive() {
        let src = r#"
            pub struct Invoice { total: Money }
            pub fn render_invoice(invoice: &Invoice) -> String { String::new() }
            pub enum InvoiceState { Draft, Sent }
        "#;
        assert_eq!(cohesion(src), Some(1.0));
    }

    #[test]
    fn test_unrelated_items_partially_cohesive() {
        let src = r#"
            pub struct Invoice { total: u32 }
            pub fn print_invoice(x: &Invoice) {}
            pub fn spawn_worker() {}
            pub trait Socket { fn connect(&self); }
        "#;
        assert_eq!(cohesion(src), Some(0.5));
    }

    #[test]
    fn test_average_defaults_to_one() {
        let files: Vec<syn::File> = Vec::new();
        assert_eq!(average(&files), 1.0);
    }
}
