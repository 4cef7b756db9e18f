//! Interface size heuristics.
//!
//! Three checks over the whole tree:
//! - types with too many members (struct fields plus inherent methods, or
//!   trait items),
//! - functions with too many parameters,
//! - `pub` structs that expose nothing: no `pub` fields, no `pub` inherent
//!   methods and no trait implementations.
//!
//! Types are keyed by their defining module, so same-named structs in
//! different modules are counted separately. Impl blocks are matched to the
//! struct of the same name in the module they appear in.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use syn::visit::{self, Visit};
use syn::{FnArg, ImplItem, ItemImpl, ItemMod, ItemStruct, ItemTrait, Signature, Visibility};

use super::complexity::type_name;
use crate::scanner::SourceTree;

/// Members above which a type is reported.
pub const MAX_MEMBERS: usize = 20;

/// Parameters above which a function is reported.
pub const MAX_PARAMETERS: usize = 7;

/// What was found and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceFinding {
    LargeInterface { name: String, members: usize },
    TooManyParameters { name: String, parameters: usize },
    NoPublicInterface { name: String },
}

/// A finding with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub finding: InterfaceFinding,
    pub file: PathBuf,
    pub line: u32,
}

/// A type's defining module and name.
type TypeKey = (String, String);

#[derive(Debug)]
struct StructInfo {
    file: PathBuf,
    line: u32,
    is_pub: bool,
    fields: usize,
    pub_fields: usize,
}

#[derive(Debug, Default)]
struct ImplInfo {
    methods: usize,
    pub_methods: usize,
    has_trait_impl: bool,
}

/// Run every interface check over the parsed files in `tree`.
#[must_use]
pub fn analyze(tree: &SourceTree) -> Vec<Located> {
    let mut collector = InterfaceCollector::default();
    for (file, syntax) in tree.parsed() {
        collector.file = file.relative.clone();
        collector.module = file.module.clone();
        collector.visit_file(syntax);
    }
    collector.finish()
}

#[derive(Default)]
struct InterfaceCollector {
    file: PathBuf,
    module: String,
    structs: BTreeMap<TypeKey, StructInfo>,
    impls: HashMap<TypeKey, ImplInfo>,
    findings: Vec<Located>,
}

impl InterfaceCollector {
    fn key(&self, name: String) -> TypeKey {
        (self.module.clone(), name)
    }

    fn check_signature(&mut self, sig: &Signature) {
        let parameters = sig
            .inputs
            .iter()
            .filter(|arg| matches!(arg, FnArg::Typed(_)))
            .count();
        if parameters > MAX_PARAMETERS {
            self.push(
                InterfaceFinding::TooManyParameters {
                    name: sig.ident.to_string(),
                    parameters,
                },
                sig.ident.span().start().line as u32,
            );
        }
    }

    fn push(&mut self, finding: InterfaceFinding, line: u32) {
        self.findings.push(Located {
            finding,
            file: self.file.clone(),
            line,
        });
    }

    fn finish(mut self) -> Vec<Located> {
        let empty = ImplInfo::default();
        let mut type_findings = Vec::new();

        for (key, info) in &self.structs {
            let name = &key.1;
            let imp = self.impls.get(key).unwrap_or(&empty);
            let members = info.fields + imp.methods;
            if members > MAX_MEMBERS {
                type_findings.push(Located {
                    finding: InterfaceFinding::LargeInterface {
                        name: name.clone(),
                        members,
                    },
                    file: info.file.clone(),
                    line: info.line,
                });
            }
            if info.is_pub
                && info.fields > 0
                && info.pub_fields == 0
                && imp.pub_methods == 0
                && !imp.has_trait_impl
            {
                type_findings.push(Located {
                    finding: InterfaceFinding::NoPublicInterface { name: name.clone() },
                    file: info.file.clone(),
                    line: info.line,
                });
            }
        }

        self.findings.extend(type_findings);
        self.findings
    }
}

impl<'ast> Visit<'ast> for InterfaceCollector {
    fn visit_item_struct(&mut self, node: &'ast ItemStruct) {
        let fields = node.fields.len();
        let pub_fields = node
            .fields
            .iter()
            .filter(|f| !matches!(f.vis, Visibility::Inherited))
            .count();
        let key = self.key(node.ident.to_string());
        self.structs.entry(key).or_insert_with(|| StructInfo {
            file: self.file.clone(),
            line: node.ident.span().start().line as u32,
            is_pub: matches!(node.vis, Visibility::Public(_)),
            fields,
            pub_fields,
        });
        visit::visit_item_struct(self, node);
    }

    fn visit_item_impl(&mut self, node: &'ast ItemImpl) {
        let key = self.key(type_name(&node.self_ty));
        let entry = self.impls.entry(key).or_default();
        if node.trait_.is_some() {
            entry.has_trait_impl = true;
        } else {
            for item in &node.items {
                if let ImplItem::Fn(f) = item {
                    entry.methods += 1;
                    if !matches!(f.vis, Visibility::Inherited) {
                        entry.pub_methods += 1;
                    }
                }
            }
        }
        visit::visit_item_impl(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        let outer = self.module.clone();
        self.module = format!("{outer}::{}", node.ident);
        visit::visit_item_mod(self, node);
        self.module = outer;
    }

    fn visit_item_trait(&mut self, node: &'ast ItemTrait) {
        let members = node.items.len();
        if members > MAX_MEMBERS {
            let line = node.ident.span().start().line as u32;
            self.push(
                InterfaceFinding::LargeInterface {
                    name: node.ident.to_string(),
                    members,
                },
                line,
            );
        }
        visit::visit_item_trait(self, node);
    }

    fn visit_signature(&mut self, sig: &'ast Signature) {
        self.check_signature(sig);
        visit::visit_signature(self, sig);
    }
}
