//! Documentation coverage.
//!
//! Counts functions, methods, structs, enums and traits, and how many of them
//! carry doc comments. Test functions and `#[cfg(test)]` modules are skipped.

use serde::Serialize;
use syn::visit::{self, Visit};
use syn::{ImplItemFn, ItemEnum, ItemFn, ItemImpl, ItemMod, ItemStruct, ItemTrait, TraitItemFn};

use super::{has_doc, is_test_code};

/// Documented vs. total documentable items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocCoverage {
    pub documented: usize,
    pub total: usize,
}

impl DocCoverage {
    /// Coverage percentage; an empty tree counts as fully documented.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.documented as f64 / self.total as f64 * 100.0
        }
    }

    /// Combine two measurements.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            documented: self.documented + other.documented,
            total: self.total + other.total,
        }
    }
}

/// Measure documentation coverage of one file.
#[must_use]
pub fn analyze_file(file: &syn::File) -> DocCoverage {
    let mut counter = DocCounter::default();
    counter.visit_file(file);
    counter.coverage
}

#[derive(Default)]
struct DocCounter {
    coverage: DocCoverage,
}

impl DocCounter {
    fn count(&mut self, attrs: &[syn::Attribute]) {
        self.coverage.total += 1;
        if has_doc(attrs) {
            self.coverage.documented += 1;
        }
    }
}

// Function bodies are not descended into: local helpers are not API.
impl<'ast> Visit<'ast> for DocCounter {
    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        if !is_test_code(&node.attrs) {
            self.count(&node.attrs);
        }
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        if !is_test_code(&node.attrs) {
            self.count(&node.attrs);
        }
    }

    fn visit_trait_item_fn(&mut self, node: &'ast TraitItemFn) {
        self.count(&node.attrs);
    }

    fn visit_item_struct(&mut self, node: &'ast ItemStruct) {
        self.count(&node.attrs);
    }

    fn visit_item_enum(&mut self, node: &'ast ItemEnum) {
        self.count(&node.attrs);
    }

    fn visit_item_trait(&mut self, node: &'ast ItemTrait) {
        self.count(&node.attrs);
        visit::visit_item_trait(self, node);
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        if !is_test_code(&node.attrs) {
            visit::visit_item_impl(self, node);
        }
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        if !is_test_code(&node.attrs) {
            visit::visit_item_mod(self, node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(src: &str) -> DocCoverage {
        analyze_file(&syn::parse_file(src).unwrap())
    }

    #[test]
    fn test_counts_documented_items() {
        let src = r#"
            /// Documented.
            pub struct A;
            pub struct B;
            #[doc = "attribute form"]
            pub enum C { X }
            /// Trait.
            pub trait D {
                /// Method.
                fn m(&self);
                fn n(&self) {}
            }
            impl B {
                /// New.
                pub fn new() -> Self { fn helper() {} B }
            }
        "#;
        let c = coverage(src);
        assert_eq!(c.total, 7);
        assert_eq!(c.documented, 5);
    }

    #[test]
    fn test_test_code_excluded() {
        let src = r#"
            /// Real.
            pub fn real() {}

            #[cfg(test)]
            mod tests {
                fn helper() {}
                #[test]
                fn test_it() {}
            }

            #[test]
            fn loose_test() {}
        "#;
        let c = coverage(src);
        assert_eq!(c, DocCoverage { documented: 1, total: 1 });
        assert_eq!(c.percentage(), 100.0);
    }

    #[test]
    fn test_doc_hidden_is_not_documentation() {
        let c = coverage("#[doc(hidden)]\npub fn f() {}\n");
        assert_eq!(c, DocCoverage { documented: 0, total: 1 });
    }

    #[test]
    fn test_empty_file_is_fully_covered() {
        assert_eq!(coverage("").percentage(), 100.0);
    }
}
