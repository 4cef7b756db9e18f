//! Static analyses over a scanned [`SourceTree`](crate::scanner::SourceTree).
//!
//! Each analysis is a pure function of the tree (and thresholds where it
//! needs them). Gates combine the raw measurements into violations and
//! scores:
//!
//! - [`complexity`] - Per-function cyclomatic complexity
//! - [`duplication`] - Project-wide duplicate line detection
//! - [`docs`] - Documentation coverage of public-facing items
//! - [`style`] - Internal style scan used when no formatter is available
//! - [`graph`] - Module dependency graph, layering and cycle detection
//! - [`cohesion`] - Shared-identifier cohesion per file
//! - [`interface`] - Type and signature size heuristics
//! - [`patterns`] - Design-idiom presence detection

pub mod cohesion;
pub mod complexity;
pub mod docs;
pub mod duplication;
pub mod graph;
pub mod interface;
pub mod patterns;
pub mod style;

use syn::{Attribute, Meta};

/// Whether the attributes contain `#[test]` or a `#[cfg(test)]`.
pub(crate) fn is_test_code(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        if attr.path().is_ident("test") {
            return true;
        }
        match &attr.meta {
            Meta::List(list) if list.path.is_ident("cfg") => {
                list.tokens.to_string().trim() == "test"
            }
            _ => false,
        }
    })
}

/// Whether the attributes carry documentation (`///` or `#[doc = ...]`).
pub(crate) fn has_doc(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .any(|attr| matches!(&attr.meta, Meta::NameValue(nv) if nv.path.is_ident("doc")))
}
