//! Cyclomatic complexity.
//!
//! Complexity of a function is `1 +` the number of branching constructs in
//! its body: `if` (an `else if` is its own `if`), `while`, `for`, `loop`,
//! every `match` arm after the first, and the `?` operator. The count stops
//! at nested items, so an inner `fn` is measured on its own and never adds
//! to the function that contains it. Closures are part of their enclosing
//! function.

use std::path::{Path, PathBuf};

use syn::visit::{self, Visit};
use syn::{
    Block, ExprForLoop, ExprIf, ExprLoop, ExprMatch, ExprTry, ExprWhile, ImplItemFn, Item,
    ItemFn, ItemImpl, TraitItemFn, Type,
};

/// Complexity of one function or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionComplexity {
    /// `name` for free functions, `Type::name` for methods.
    pub name: String,
    pub file: PathBuf,
    pub line: u32,
    pub complexity: u32,
}

/// Complexity of a single block: `1 +` its branching constructs.
#[must_use]
pub fn block_complexity(block: &Block) -> u32 {
    let mut counter = BranchCounter { branches: 0 };
    counter.visit_block(block);
    1 + counter.branches
}

/// Measure every function and method body in `file`.
#[must_use]
pub fn analyze_file(file: &syn::File, path: &Path) -> Vec<FunctionComplexity> {
    let mut collector = FunctionCollector {
        path,
        owner: Vec::new(),
        functions: Vec::new(),
    };
    collector.visit_file(file);
    collector.functions
}

/// The most complex function, first one wins on ties.
#[must_use]
pub fn max_complexity(functions: &[FunctionComplexity]) -> Option<&FunctionComplexity> {
    functions
        .iter()
        .reduce(|best, f| if f.complexity > best.complexity { f } else { best })
}

struct BranchCounter {
    branches: u32,
}

impl<'ast> Visit<'ast> for BranchCounter {
    fn visit_item(&mut self, _item: &'ast Item) {
        // nested items are measured separately
    }

    fn visit_expr_if(&mut self, node: &'ast ExprIf) {
        self.branches += 1;
        visit::visit_expr_if(self, node);
    }

    fn visit_expr_while(&mut self, node: &'ast ExprWhile) {
        self.branches += 1;
        visit::visit_expr_while(self, node);
    }

    fn visit_expr_for_loop(&mut self, node: &'ast ExprForLoop) {
        self.branches += 1;
        visit::visit_expr_for_loop(self, node);
    }

    fn visit_expr_loop(&mut self, node: &'ast ExprLoop) {
        self.branches += 1;
        visit::visit_expr_loop(self, node);
    }

    fn visit_expr_match(&mut self, node: &'ast ExprMatch) {
        self.branches += node.arms.len().saturating_sub(1) as u32;
        visit::visit_expr_match(self, node);
    }

    fn visit_expr_try(&mut self, node: &'ast ExprTry) {
        self.branches += 1;
        visit::visit_expr_try(self, node);
    }
}

struct FunctionCollector<'p> {
    path: &'p Path,
    /// Self-type names of the enclosing `impl`/`trait` blocks.
    owner: Vec<String>,
    functions: Vec<FunctionComplexity>,
}

impl FunctionCollector<'_> {
    fn record(&mut self, ident: &syn::Ident, block: &Block) {
        let name = match self.owner.last() {
            Some(owner) => format!("{owner}::{ident}"),
            None => ident.to_string(),
        };
        self.functions.push(FunctionComplexity {
            name,
            file: self.path.to_path_buf(),
            line: ident.span().start().line as u32,
            complexity: block_complexity(block),
        });
    }
}

impl<'ast> Visit<'ast> for FunctionCollector<'_> {
    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        self.record(&node.sig.ident, &node.block);
        // A free fn inside a method body is not a method of the impl.
        let saved = std::mem::take(&mut self.owner);
        visit::visit_item_fn(self, node);
        self.owner = saved;
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        self.owner.push(type_name(&node.self_ty));
        visit::visit_item_impl(self, node);
        self.owner.pop();
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        self.owner.push(node.ident.to_string());
        visit::visit_item_trait(self, node);
        self.owner.pop();
    }

    fn visit_impl_item_fn(&mut self, node: &'ast ImplItemFn) {
        self.record(&node.sig.ident, &node.block);
        visit::visit_impl_item_fn(self, node);
    }

    fn visit_trait_item_fn(&mut self, node: &'ast TraitItemFn) {
        if let Some(block) = &node.default {
            self.record(&node.sig.ident, block);
        }
        visit::visit_trait_item_fn(self, node);
    }
}

/// Last path segment of a type, or `_` for anything else.
pub(crate) fn type_name(ty: &Type) -> String {
    match ty {
        Type::Path(p) => p
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_else(|| "_".to_string()),
        Type::Reference(r) => type_name(&r.elem),
        _ => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complexities(src: &str) -> Vec<(String, u32)> {
        let file = syn::parse_file(src).unwrap();
        analyze_file(&file, Path::new("src/lib.rs"))
            .into_iter()
            .map(|f| (f.name, f.complexity))
            .collect()
    }

    #[test]
    fn test_straight_line_function_is_one() {
        assert_eq!(complexities("fn f() { let x = 1; }"), vec![("f".to_string(), 1)]);
    }

    #[test]
    fn test_k_branches_give_k_plus_one() {
        for k in 0..8 {
            let body: String = (0..k).map(|i| format!("if a == {i} {{ b(); }}\n")).collect();
            let src = format!("fn f(a: u32) {{\n{body}}}");
            assert_eq!(complexities(&src), vec![("f".to_string(), k + 1)], "k = {k}");
        }
    }

    #[test]
    fn test_each_construct_counts() {
        let src = r#"
            fn f(x: Option<u32>) -> Result<u32, E> {
                if x.is_some() { } else if x.is_none() { }
                while false { }
                for _ in 0..3 { }
                loop { break; }
                match x { Some(1) => {}, Some(_) => {}, None => {} }
                let y = g()?;
                Ok(y)
            }
        "#;
        // 2 ifs + while + for + loop + 2 extra arms + ?
        assert_eq!(complexities(src), vec![("f".to_string(), 9)]);
    }

    #[test]
    fn test_nested_fn_measured_separately() {
        let src = r#"
            fn outer() {
                if a { }
                fn inner() {
                    if b { }
                    if c { }
                }
            }
        "#;
        assert_eq!(
            complexities(src),
            vec![("outer".to_string(), 2), ("inner".to_string(), 3)]
        );
    }

    #[test]
    fn test_closures_belong_to_enclosing_function() {
        let src = "fn f() { let c = |x: u32| if x > 1 { 1 } else { 0 }; c(2); }";
        assert_eq!(complexities(src), vec![("f".to_string(), 2)]);
    }

    #[test]
    fn test_methods_are_named_by_owner() {
        let src = r#"
            struct Engine;
            impl Engine {
                fn run(&self) { for _ in 0..2 { } }
            }
            trait Gate {
                fn check(&self) { if true { } }
                fn name(&self) -> &str;
            }
        "#;
        assert_eq!(
            complexities(src),
            vec![("Engine::run".to_string(), 2), ("Gate::check".to_string(), 2)]
        );
    }

    #[test]
    fn test_max_and_location() {
        let src = "fn a() {}\n\nfn b() { if x { } }\n";
        let file = syn::parse_file(src).unwrap();
        let functions = analyze_file(&file, Path::new("src/x.rs"));
        let max = max_complexity(&functions).unwrap();
        assert_eq!(max.name, "b");
        assert_eq!(max.complexity, 2);
        assert_eq!(max.line, 3);
    }
}
