//! Benchmark suite for gatewarden's analysis pipeline.
//!
//! This module provides performance benchmarks for:
//! - Source scanning (discovery + `syn` parsing)
//! - Cyclomatic complexity counting
//! - Dependency graph construction and cycle detection
//! - Duplicate-line detection
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use gatewarden::analysis::{complexity, duplication};
use gatewarden::analysis::graph::DependencyGraph;
use gatewarden::config::ScanConfig;
use gatewarden::scanner::{SourceScanner, SourceTree};
use gatewarden::CancellationSignal;

// ============================================================================
// Scanning Benchmarks
// ============================================================================

/// Measures discovery plus parsing of projects of various sizes.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for size in [10, 50, 100] {
        let temp_dir = create_rust_project_with_files(size);
        let project_path = temp_dir.path().to_path_buf();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("scan_tree", size), &project_path, |b, path| {
            let cancel = CancellationSignal::new();
            b.iter(|| {
                let scanner = SourceScanner::new(black_box(path), &ScanConfig::default())
                    .expect("scanner");
                black_box(scanner.scan("bench", &cancel).expect("scan"))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Complexity Benchmarks
// ============================================================================

/// Measures branch counting over functions with a growing number of branches.
fn bench_complexity(c: &mut Criterion) {
    let mut group = c.benchmark_group("complexity");

    for branches in [10, 100, 500] {
        let source = branchy_function(branches);
        let file: syn::File = syn::parse_file(&source).expect("valid source");

        group.throughput(Throughput::Elements(branches as u64));
        group.bench_with_input(BenchmarkId::new("analyze_file", branches), &file, |b, file| {
            b.iter(|| black_box(complexity::analyze_file(black_box(file), Path::new("src/lib.rs"))));
        });
    }

    group.finish();
}

// ============================================================================
// Graph Benchmarks
// ============================================================================

/// Measures graph construction and cycle search on a ring of modules.
fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_graph");

    for modules in [10, 50, 200] {
        let sources = ring_of_modules(modules);
        let tree = SourceTree::from_sources(
            "/bench",
            sources.iter().map(|(path, src)| (path.as_str(), src.as_str())),
        );

        group.throughput(Throughput::Elements(modules as u64));
        group.bench_with_input(BenchmarkId::new("build_and_find_cycles", modules), &tree, |b, tree| {
            b.iter(|| {
                let graph = DependencyGraph::from_tree(black_box(tree));
                black_box(graph.find_cycles())
            });
        });
    }

    group.finish();
}

// ============================================================================
// Duplication Benchmarks
// ============================================================================

fn bench_duplication(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplication");

    for files in [10, 100] {
        let sources: Vec<String> = (0..files).map(|_| branchy_function(50)).collect();

        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(BenchmarkId::new("analyze", files), &sources, |b, sources| {
            b.iter(|| black_box(duplication::analyze(sources.iter().map(String::as_str))));
        });
    }

    group.finish();
}

// ============================================================================
// Fixtures
// ============================================================================

/// Create a Rust project with the specified number of source files.
fn create_rust_project_with_files(file_count: usize) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let src_dir = temp_dir.path().join("src");
    fs::create_dir_all(&src_dir).expect("Failed to create src dir");

    let mods: String = (0..file_count).map(|i| format!("pub mod file_{i};\n")).collect();
    fs::write(src_dir.join("lib.rs"), format!("//! Benchmark test library\n\n{mods}"))
        .expect("Failed to write lib.rs");

    for i in 0..file_count {
        let next = (i + 1) % file_count;
        let content = format!(
            "//! Module {i}\nuse crate::file_{next}::function_{next};\n\n\
             /// Function that does something.\npub fn function_{i}(x: i32) -> i32 {{\n    \
             if x > {i} {{\n        x\n    }} else {{\n        {i}\n    }}\n}}\n"
        );
        fs::write(src_dir.join(format!("file_{i}.rs")), content)
            .expect("Failed to write source file");
    }

    temp_dir
}

fn branchy_function(branches: usize) -> String {
    let body: String = (0..branches)
        .map(|i| format!("    if x == {i} {{\n        y += {i};\n    }}\n"))
        .collect();
    format!("pub fn busy(x: u32) -> u32 {{\n    let mut y = 0;\n{body}    y\n}}\n")
}

fn ring_of_modules(count: usize) -> Vec<(String, String)> {
    let mut sources = vec![(
        "src/lib.rs".to_string(),
        (0..count).map(|i| format!("mod m{i};\n")).collect::<String>(),
    )];
    for i in 0..count {
        let next = (i + 1) % count;
        sources.push((
            format!("src/m{i}.rs"),
            format!("use crate::m{next}::T{next};\npub struct T{i};\n"),
        ));
    }
    sources
}

criterion_group!(
    benches,
    bench_scan,
    bench_complexity,
    bench_graph,
    bench_duplication
);
criterion_main!(benches);
