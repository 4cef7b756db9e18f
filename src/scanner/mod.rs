//! Source tree scanning.
//!
//! The scanner walks a project, parses every `.rs` file into a `syn` syntax
//! tree and records the file's `use` references and `mod` declarations.
//! Both the code-quality and architecture gates build on a [`SourceTree`];
//! each gate scans independently so no state is shared between them.
//!
//! # Module identity
//!
//! A file's module path is derived from its location: everything up to the
//! first `src` directory names the crate (empty for the top-level crate), the
//! rest names the module inside it. `src/lib.rs` and `src/main.rs` are the
//! crate root (`crate`), `src/quality/mod.rs` is `quality`, and
//! `crates/api/src/routes.rs` is `crates::api::routes`.

pub mod imports;

pub use imports::{ModuleDecl, UseAnchor, UseRef};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{default_ignore_dirs, ScanConfig};
use crate::quality::cancel::CancellationSignal;

/// File names whose `mod` declarations resolve relative to their own directory.
const MOD_ROOT_FILES: &[&str] = &["mod.rs", "lib.rs", "main.rs", "build.rs"];

/// Directories whose files are crate roots of their own.
const CRATE_ROOT_DIRS: &[&str] = &["bin", "tests", "benches", "examples"];

/// Why a file could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseFailure {
    /// Parser message.
    pub message: String,
    /// 1-based line of the error (0 when unknown).
    pub line: u32,
}

/// A resolved intra-project import.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportEdge {
    /// Importing module.
    pub from: String,
    /// Imported module.
    pub to: String,
    /// File (relative to the project root) containing the `use`.
    pub file: PathBuf,
    /// Line of the `use`.
    pub line: u32,
}

/// One scanned source file.
#[derive(Debug)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the project root.
    pub relative: PathBuf,
    /// Module-path prefix of the crate this file belongs to ("" for the root crate).
    pub crate_root: String,
    /// Crate-relative module segments (empty for the crate root).
    pub local_module: Vec<String>,
    /// Project-wide module identifier.
    pub module: String,
    /// Raw source text.
    pub source: String,
    /// Parsed syntax tree, when parsing succeeded.
    pub syntax: Option<syn::File>,
    /// Parse failure, when parsing failed.
    pub parse_error: Option<ParseFailure>,
    /// `use` references found in the file.
    pub uses: Vec<UseRef>,
    /// `mod name;` declarations found in the file.
    pub module_decls: Vec<ModuleDecl>,
}

impl SourceFile {
    /// Build a source file from its text; parsing happens here.
    pub fn from_source(root: &Path, path: &Path, source: String) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let (crate_root, local_module) = module_location(&relative);
        let module = module_id(&crate_root, &local_module);

        let (syntax, parse_error, uses, module_decls) = match syn::parse_file(&source) {
            Ok(file) => {
                let collected = imports::collect(&file, &local_module);
                (Some(file), None, collected.uses, collected.module_decls)
            }
            Err(e) => {
                let failure = ParseFailure {
                    message: e.to_string(),
                    line: e.span().start().line as u32,
                };
                (None, Some(failure), Vec::new(), Vec::new())
            }
        };

        Self {
            path: path.to_path_buf(),
            relative,
            crate_root,
            local_module,
            module,
            source,
            syntax,
            parse_error,
            uses,
            module_decls,
        }
    }

    /// Number of physical lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.source.lines().count()
    }

    /// Whether `mod x;` in this file resolves next to the file rather than
    /// in a directory named after it.
    #[must_use]
    pub fn is_mod_root(&self) -> bool {
        let name = self.path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let parent = self
            .path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("");
        MOD_ROOT_FILES.contains(&name) || CRATE_ROOT_DIRS.contains(&parent)
    }
}

/// All scanned files of a project.
#[derive(Debug)]
pub struct SourceTree {
    /// Project root.
    pub root: PathBuf,
    /// Files sorted by relative path.
    pub files: Vec<SourceFile>,
}

impl SourceTree {
    /// Build a tree from in-memory `(relative path, source)` pairs.
    ///
    /// Module-declaration checks still consult the filesystem under `root`.
    pub fn from_sources<'a>(
        root: impl AsRef<Path>,
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut files: Vec<SourceFile> = sources
            .into_iter()
            .map(|(rel, src)| SourceFile::from_source(&root, &root.join(rel), src.to_string()))
            .collect();
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Self { root, files }
    }

    /// Files that parsed, with their syntax trees.
    pub fn parsed(&self) -> impl Iterator<Item = (&SourceFile, &syn::File)> {
        self.files
            .iter()
            .filter_map(|f| f.syntax.as_ref().map(|syntax| (f, syntax)))
    }

    /// Files that failed to parse.
    pub fn parse_failures(&self) -> impl Iterator<Item = (&SourceFile, &ParseFailure)> {
        self.files
            .iter()
            .filter_map(|f| f.parse_error.as_ref().map(|err| (f, err)))
    }

    /// Every module identifier in the tree.
    #[must_use]
    pub fn modules(&self) -> BTreeSet<String> {
        self.files.iter().map(|f| f.module.clone()).collect()
    }

    /// Resolve `use` references into intra-project module edges.
    ///
    /// A reference resolves to the longest known module prefix of its path.
    /// References into other crates and self-imports produce no edge.
    #[must_use]
    pub fn import_edges(&self) -> Vec<ImportEdge> {
        let mut known: HashMap<&str, HashSet<&[String]>> = HashMap::new();
        for file in &self.files {
            known
                .entry(file.crate_root.as_str())
                .or_default()
                .insert(file.local_module.as_slice());
        }

        let mut edges = Vec::new();
        for file in &self.files {
            let Some(crate_modules) = known.get(file.crate_root.as_str()) else {
                continue;
            };
            for use_ref in &file.uses {
                let Some(target) = resolve(use_ref, crate_modules) else {
                    continue;
                };
                let to = module_id(&file.crate_root, target);
                if to != file.module {
                    edges.push(ImportEdge {
                        from: file.module.clone(),
                        to,
                        file: file.relative.clone(),
                        line: use_ref.line,
                    });
                }
            }
        }
        edges
    }

    /// `mod name;` declarations with no backing file.
    #[must_use]
    pub fn missing_modules(&self) -> Vec<(&SourceFile, &ModuleDecl)> {
        let mut missing = Vec::new();
        for file in &self.files {
            let Some(dir) = file.path.parent() else {
                continue;
            };
            for decl in file.module_decls.iter().filter(|d| !d.nested) {
                let found = match decl.path_attr {
                    Some(ref custom) => dir.join(custom).is_file(),
                    None => {
                        let base = if file.is_mod_root() {
                            dir.to_path_buf()
                        } else {
                            let stem = file
                                .path
                                .file_stem()
                                .and_then(|s| s.to_str())
                                .unwrap_or_default();
                            dir.join(stem)
                        };
                        base.join(format!("{}.rs", decl.name)).is_file()
                            || base.join(&decl.name).join("mod.rs").is_file()
                    }
                };
                if !found {
                    missing.push((file, decl));
                }
            }
        }
        missing
    }
}

fn resolve<'a>(use_ref: &'a UseRef, known: &HashSet<&[String]>) -> Option<&'a [String]> {
    let longest = |path: &'a [String], min_len: usize| -> Option<&'a [String]> {
        (min_len..=path.len())
            .rev()
            .map(|k| &path[..k])
            .find(|prefix| known.contains(prefix))
    };

    match use_ref.anchor {
        UseAnchor::Crate => longest(&use_ref.segments, 0),
        UseAnchor::Bare => longest(&use_ref.scoped, use_ref.scope_len + 1).or_else(|| {
            use_ref
                .declared_locally
                .then(|| longest(&use_ref.segments, 1))
                .flatten()
        }),
    }
}

/// Split a relative path into (crate prefix, crate-local module segments).
fn module_location(relative: &Path) -> (String, Vec<String>) {
    let components: Vec<String> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .map(|c| c.replace('-', "_"))
        .collect();

    let (prefix, mut inner) = match components.iter().position(|c| c == "src") {
        Some(i) => (components[..i].to_vec(), components[i + 1..].to_vec()),
        None => (Vec::new(), components),
    };

    if let Some(last) = inner.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let is_crate_root = inner.is_empty() && matches!(stem.as_str(), "lib" | "main");
        if stem != "mod" && !is_crate_root {
            inner.push(stem);
        }
    }

    (prefix.join("::"), inner)
}

fn module_id(crate_root: &str, local: &[String]) -> String {
    match (crate_root.is_empty(), local.is_empty()) {
        (true, true) => "crate".to_string(),
        (true, false) => local.join("::"),
        (false, true) => crate_root.to_string(),
        (false, false) => format!("{}::{}", crate_root, local.join("::")),
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// Walks a project and produces a [`SourceTree`].
#[derive(Debug, Clone)]
pub struct SourceScanner {
    root: PathBuf,
    excludes: GlobSet,
}

impl SourceScanner {
    /// Create a scanner for `root` honouring the configured excludes.
    ///
    /// # Errors
    ///
    /// Returns an error if an exclude pattern is not a valid glob.
    pub fn new(root: impl AsRef<Path>, config: &ScanConfig) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {pattern}"))?);
        }
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            excludes: builder.build()?,
        })
    }

    /// Project root being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn should_skip_dir(path: &Path) -> bool {
        let ignore = default_ignore_dirs();
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| ignore.contains(name))
    }

    /// List the Rust files that will be analysed, sorted.
    #[must_use]
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !Self::should_skip_dir(e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "rs"))
            .filter(|p| {
                let rel = p.strip_prefix(&self.root).unwrap_or(p);
                !self.excludes.is_match(rel)
            })
            .collect();
        files.sort();
        files
    }

    /// Read and parse every discovered file.
    ///
    /// Polls `cancel` between files on behalf of `gate`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Cancelled`](crate::error::GateError::Cancelled)
    /// when cancelled, or an IO error if a file cannot be read.
    pub fn scan(&self, gate: &str, cancel: &CancellationSignal) -> Result<SourceTree> {
        let paths = self.discover();
        let mut files = Vec::with_capacity(paths.len());

        for path in paths {
            cancel.check(gate)?;

            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let file = match String::from_utf8(bytes) {
                Ok(source) => SourceFile::from_source(&self.root, &path, source),
                Err(_) => {
                    let mut file = SourceFile::from_source(&self.root, &path, String::new());
                    file.syntax = None;
                    file.parse_error = Some(ParseFailure {
                        message: "file is not valid UTF-8".to_string(),
                        line: 0,
                    });
                    file
                }
            };
            files.push(file);
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        debug!(
            gate = %gate,
            files = files.len(),
            root = %self.root.display(),
            "Scanned source tree"
        );

        Ok(SourceTree {
            root: self.root.clone(),
            files,
        })
    }
}
