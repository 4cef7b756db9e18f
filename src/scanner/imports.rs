//! `use` and `mod` extraction from a parsed file.

use std::collections::HashSet;

use syn::visit::{self, Visit};
use syn::{Attribute, Expr, Item, ItemMod, ItemUse, Lit, Meta, UseTree};

/// How a `use` path is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseAnchor {
    /// `crate::`, `self::` or `super::`; `segments` is already crate-absolute.
    Crate,
    /// A bare path; may name a child module or an external crate.
    Bare,
}

/// One flattened `use` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseRef {
    pub anchor: UseAnchor,
    /// Crate-absolute segments for [`UseAnchor::Crate`], the raw path otherwise.
    pub segments: Vec<String>,
    /// For bare paths: the enclosing module followed by the raw path.
    pub scoped: Vec<String>,
    /// Length of the enclosing-module part of `scoped`.
    pub scope_len: usize,
    /// For bare paths: the first segment names a `mod` item of the enclosing scope.
    pub declared_locally: bool,
    /// 1-based line of the `use` item.
    pub line: u32,
}

/// A `mod name;` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub name: String,
    /// Value of a `#[path = "..."]` attribute.
    pub path_attr: Option<String>,
    pub line: u32,
    /// Declared inside an inline `mod { }` block.
    pub nested: bool,
}

/// Everything extracted from one file.
#[derive(Debug, Default)]
pub struct Collected {
    pub uses: Vec<UseRef>,
    pub module_decls: Vec<ModuleDecl>,
}

/// Collect `use` references and `mod` declarations from `file`, whose
/// crate-local module path is `module`.
pub fn collect(file: &syn::File, module: &[String]) -> Collected {
    let mut collector = UseCollector {
        scope: module.to_vec(),
        declared: Vec::new(),
        inline_depth: 0,
        out: Collected::default(),
    };
    collector.visit_file(file);
    collector.out
}

struct UseCollector {
    scope: Vec<String>,
    /// Module names declared in each open scope, innermost last.
    declared: Vec<HashSet<String>>,
    inline_depth: usize,
    out: Collected,
}

impl<'ast> Visit<'ast> for UseCollector {
    fn visit_file(&mut self, file: &'ast syn::File) {
        self.declared.push(module_names(&file.items));
        visit::visit_file(self, file);
        self.declared.pop();
    }

    fn visit_item_use(&mut self, item: &'ast ItemUse) {
        // `use ::name` always refers to an external crate.
        if item.leading_colon.is_some() {
            return;
        }
        let line = item.use_token.span.start().line as u32;
        let mut paths = Vec::new();
        flatten(&item.tree, &mut Vec::new(), &mut paths);
        let declared = self.declared.last();
        for path in paths {
            let declared_locally = match (declared, path.first()) {
                (Some(names), Some(first)) => names.contains(first),
                _ => false,
            };
            if let Some(use_ref) = anchor(path, &self.scope, line, declared_locally) {
                self.out.uses.push(use_ref);
            }
        }
    }

    fn visit_item_mod(&mut self, item: &'ast ItemMod) {
        let name = item.ident.to_string();
        if let Some((_, ref items)) = item.content {
            self.scope.push(name);
            self.declared.push(module_names(items));
            self.inline_depth += 1;
            visit::visit_item_mod(self, item);
            self.inline_depth -= 1;
            self.declared.pop();
            self.scope.pop();
        } else {
            self.out.module_decls.push(ModuleDecl {
                name,
                path_attr: path_attribute(&item.attrs),
                line: item.mod_token.span.start().line as u32,
                nested: self.inline_depth > 0,
            });
        }
    }
}

fn flatten(tree: &UseTree, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            flatten(&p.tree, prefix, out);
            prefix.pop();
        }
        UseTree::Name(n) => {
            let mut path = prefix.clone();
            if n.ident != "self" {
                path.push(n.ident.to_string());
            }
            out.push(path);
        }
        UseTree::Rename(r) => {
            let mut path = prefix.clone();
            if r.ident != "self" {
                path.push(r.ident.to_string());
            }
            out.push(path);
        }
        UseTree::Glob(_) => out.push(prefix.clone()),
        UseTree::Group(g) => {
            for item in &g.items {
                flatten(item, prefix, out);
            }
        }
    }
}

fn module_names(items: &[Item]) -> HashSet<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Item::Mod(m) => Some(m.ident.to_string()),
            _ => None,
        })
        .collect()
}

fn anchor(
    path: Vec<String>,
    scope: &[String],
    line: u32,
    declared_locally: bool,
) -> Option<UseRef> {
    let first = path.first()?.as_str();
    let crate_ref = |segments: Vec<String>| UseRef {
        anchor: UseAnchor::Crate,
        segments,
        scoped: Vec::new(),
        scope_len: 0,
        declared_locally: false,
        line,
    };

    match first {
        "crate" => Some(crate_ref(path[1..].to_vec())),
        "self" => Some(crate_ref([scope, &path[1..]].concat())),
        "super" => {
            let supers = path.iter().take_while(|s| *s == "super").count();
            if supers > scope.len() {
                return None;
            }
            let base = &scope[..scope.len() - supers];
            Some(crate_ref([base, &path[supers..]].concat()))
        }
        _ => Some(UseRef {
            anchor: UseAnchor::Bare,
            scoped: [scope, &path[..]].concat(),
            scope_len: scope.len(),
            declared_locally,
            segments: path,
            line,
        }),
    }
}

fn path_attribute(attrs: &[Attribute]) -> Option<String> {
    attrs.iter().find_map(|attr| match &attr.meta {
        Meta::NameValue(nv) if nv.path.is_ident("path") => match &nv.value {
            Expr::Lit(expr) => match &expr.lit {
                Lit::Str(s) => Some(s.value()),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_src(src: &str, module: &[&str]) -> Collected {
        let file = syn::parse_file(src).unwrap();
        let module: Vec<String> = module.iter().map(|s| s.to_string()).collect();
        collect(&file, &module)
    }

    fn segs(r: &UseRef) -> Vec<&str> {
        r.segments.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_groups_and_renames_flatten() {
        let c = collect_src(
            "use crate::a::{b, c::D as E, f::*, self};\n",
            &[],
        );
        let all: Vec<Vec<&str>> = c.uses.iter().map(segs).collect();
        assert_eq!(
            all,
            vec![
                vec!["a", "b"],
                vec!["a", "c", "D"],
                vec!["a", "f"],
                vec!["a"],
            ]
        );
        assert!(c.uses.iter().all(|u| u.anchor == UseAnchor::Crate));
    }

    #[test]
    fn test_super_beyond_root_dropped() {
        let c = collect_src("use super::super::x;\n", &["a"]);
        assert!(c.uses.is_empty());
    }

    #[test]
    fn test_leading_colon_is_external() {
        let c = collect_src("use ::serde::Serialize;\n", &[]);
        assert!(c.uses.is_empty());
    }

    #[test]
    fn test_inline_modules_extend_scope() {
        let c = collect_src(
            "mod inner {\n    use super::sibling::X;\n    use self::deep::Y;\n}\n",
            &["outer"],
        );
        assert_eq!(segs(&c.uses[0]), vec!["outer", "sibling", "X"]);
        assert_eq!(segs(&c.uses[1]), vec!["outer", "inner", "deep", "Y"]);
        assert_eq!(c.uses[1].line, 3);
    }

    #[test]
    fn test_bare_path_keeps_scope() {
        let c = collect_src("use engine::Engine;\n", &["app"]);
        let u = &c.uses[0];
        assert_eq!(u.anchor, UseAnchor::Bare);
        assert_eq!(u.scoped, vec!["app", "engine", "Engine"]);
        assert_eq!(u.scope_len, 1);
        assert!(!u.declared_locally);
    }

    #[test]
    fn test_bare_path_marks_local_module_declarations() {
        let c = collect_src(
            "use log::info;
mod log;
mod inner {
    use log::warn;
    mod log {}
}
",
            &[],
        );
        assert!(c.uses[0].declared_locally);
        assert!(c.uses[1].declared_locally);

        let c = collect_src("mod inner {
    use log::warn;
}
mod log;
", &[]);
        assert!(!c.uses[0].declared_locally);
    }

    #[test]
    fn test_module_declarations() {
        let c = collect_src(
            "mod a;\n#[path = \"custom/b.rs\"]\nmod b;\nmod inline {\n    mod nested;\n}\n",
            &[],
        );
        assert_eq!(c.module_decls.len(), 3);
        assert_eq!(c.module_decls[0].name, "a");
        assert_eq!(c.module_decls[0].line, 1);
        assert_eq!(c.module_decls[1].path_attr.as_deref(), Some("custom/b.rs"));
        assert!(c.module_decls[2].nested);
    }
}
