//! Module dependency graph.
//!
//! Nodes are modules, edges are intra-project imports. The graph is rebuilt
//! on every run from a [`SourceTree`] and never persisted. All iteration is
//! over sorted collections so results are deterministic.

use std::collections::{btree_set, BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;

use crate::config::{classify, LayerRule};
use crate::scanner::SourceTree;

static NO_EDGES: BTreeSet<String> = BTreeSet::new();

/// An import that crosses layers in a forbidden direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerViolation {
    pub from_module: String,
    pub to_module: String,
    pub from_layer: String,
    pub to_layer: String,
    pub file: PathBuf,
    pub line: u32,
}

/// Directed module graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Module id → crate-local path used for layer classification.
    nodes: BTreeMap<String, String>,
    edges: BTreeMap<String, BTreeSet<String>>,
    /// First import site of each edge.
    sites: BTreeMap<(String, String), (PathBuf, u32)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a scanned tree.
    #[must_use]
    pub fn from_tree(tree: &SourceTree) -> Self {
        let mut graph = Self::new();
        for file in &tree.files {
            graph.add_node(&file.module, &file.local_module.join("::"));
        }
        for edge in tree.import_edges() {
            graph.add_edge(&edge.from, &edge.to, edge.file, edge.line);
        }
        graph
    }

    /// Add a module. `local_path` is the crate-relative path (`""` for a root).
    pub fn add_node(&mut self, module: &str, local_path: &str) {
        self.nodes
            .entry(module.to_string())
            .or_insert_with(|| local_path.to_string());
    }

    /// Add an import edge; duplicates and self-edges are ignored.
    pub fn add_edge(&mut self, from: &str, to: &str, file: PathBuf, line: u32) {
        if from == to {
            return;
        }
        self.add_node(from, from);
        self.add_node(to, to);
        if self
            .edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string())
        {
            self.sites
                .insert((from.to_string(), to.to_string()), (file, line));
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Sorted out-neighbours of `module`.
    pub fn dependencies(&self, module: &str) -> &BTreeSet<String> {
        self.edges.get(module).unwrap_or(&NO_EDGES)
    }

    /// Every distinct edge, sorted.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(from, tos)| tos.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    /// `edges / (n * (n - 1))`, or 0 for fewer than two modules.
    #[must_use]
    pub fn coupling(&self) -> f64 {
        let n = self.node_count();
        if n < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (n * (n - 1)) as f64
    }

    /// Modules with more than `limit` outgoing edges, with their fan-out.
    #[must_use]
    pub fn high_fan_out(&self, limit: usize) -> Vec<(&str, usize)> {
        self.edges
            .iter()
            .filter(|(_, tos)| tos.len() > limit)
            .map(|(from, tos)| (from.as_str(), tos.len()))
            .collect()
    }

    /// Edges whose target layer is not allowed by the source layer.
    #[must_use]
    pub fn layer_violations(&self, layers: &[LayerRule]) -> Vec<LayerViolation> {
        let layer_of = |module: &str| {
            self.nodes
                .get(module)
                .and_then(|local| classify(layers, local))
        };

        let mut violations = Vec::new();
        for (from, to) in self.edges() {
            let (Some(from_layer), Some(to_layer)) = (layer_of(from), layer_of(to)) else {
                continue;
            };
            if from_layer.allows(&to_layer.name) {
                continue;
            }
            let (file, line) = self
                .sites
                .get(&(from.to_string(), to.to_string()))
                .cloned()
                .unwrap_or_default();
            violations.push(LayerViolation {
                from_module: from.to_string(),
                to_module: to.to_string(),
                from_layer: from_layer.name.clone(),
                to_layer: to_layer.name.clone(),
                file,
                line,
            });
        }
        violations
    }

    /// Find circular dependencies.
    ///
    /// Enumerates every elementary cycle (Johnson's algorithm) with an
    /// explicit stack. Starts are taken in sorted order and each search only
    /// visits modules not smaller than its start, so a cycle is found exactly
    /// once, beginning at its smallest module.
    #[must_use]
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: BTreeSet<Vec<String>> = BTreeSet::new();
        for start in self.nodes.keys() {
            self.cycles_through(start, &mut cycles);
        }
        cycles.into_iter().collect()
    }

    /// Every elementary cycle whose smallest module is `start`.
    fn cycles_through(&self, start: &str, cycles: &mut BTreeSet<Vec<String>>) {
        let in_scope = |m: &str| m >= start;
        let mut blocked: HashSet<&str> = HashSet::new();
        let mut blocked_by: HashMap<&str, BTreeSet<&str>> = HashMap::new();

        let mut path: Vec<&str> = vec![start];
        let mut stack = vec![Frame::new(start, self.dependencies(start))];
        blocked.insert(start);

        while let Some(frame) = stack.last_mut() {
            if let Some(next) = frame.neighbours.next() {
                let next = next.as_str();
                if !in_scope(next) {
                    continue;
                }
                if next == start {
                    frame.closed = true;
                    cycles.insert(path.iter().map(|m| m.to_string()).collect());
                } else if blocked.insert(next) {
                    path.push(next);
                    stack.push(Frame::new(next, self.dependencies(next)));
                }
                continue;
            }

            let Some(done) = stack.pop() else { break };
            path.pop();
            if done.closed {
                unblock(done.module, &mut blocked, &mut blocked_by);
            } else {
                for dep in self.dependencies(done.module) {
                    if in_scope(dep.as_str()) {
                        blocked_by.entry(dep.as_str()).or_default().insert(done.module);
                    }
                }
            }
            if let Some(parent) = stack.last_mut() {
                parent.closed |= done.closed;
            }
        }
    }
}

/// One level of the cycle search.
struct Frame<'g> {
    module: &'g str,
    neighbours: btree_set::Iter<'g, String>,
    /// A cycle back to the start was found below this frame.
    closed: bool,
}

impl<'g> Frame<'g> {
    fn new(module: &'g str, deps: &'g BTreeSet<String>) -> Self {
        Self {
            module,
            neighbours: deps.iter(),
            closed: false,
        }
    }
}

/// Release `module` and, transitively, every module waiting on it.
fn unblock<'g>(
    module: &'g str,
    blocked: &mut HashSet<&'g str>,
    blocked_by: &mut HashMap<&'g str, BTreeSet<&'g str>>,
) {
    let mut pending = vec![module];
    while let Some(m) = pending.pop() {
        blocked.remove(m);
        if let Some(waiting) = blocked_by.remove(m) {
            pending.extend(waiting.into_iter().filter(|w| blocked.contains(w)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_layers;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (from, to) in edges {
            g.add_edge(from, to, PathBuf::from(format!("src/{from}.rs")), 1);
        }
        g
    }

    #[test]
    fn test_two_node_cycle_found_once() {
        let g = graph(&[("a", "b"), ("b", "a")]);
        assert_eq!(g.find_cycles(), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_cycle_through_finished_module_not_lost() {
        let g = graph(&[("a", "b"), ("b", "a"), ("a", "c"), ("c", "b")]);
        assert_eq!(
            g.find_cycles(),
            vec![vec!["a", "b"], vec!["a", "c", "b"]]
        );
    }

    #[test]
    fn test_every_elementary_cycle_in_dense_component() {
        // Complete digraph on three modules: three 2-cycles and two 3-cycles.
        let g = graph(&[
            ("a", "b"),
            ("b", "a"),
            ("a", "c"),
            ("c", "a"),
            ("b", "c"),
            ("c", "b"),
        ]);
        assert_eq!(
            g.find_cycles(),
            vec![
                vec!["a", "b"],
                vec!["a", "b", "c"],
                vec!["a", "c"],
                vec!["a", "c", "b"],
                vec!["b", "c"],
            ]
        );
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let g = graph(&[("a", "b"), ("b", "c"), ("a", "c")]);
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn test_distinct_cycles_reported_separately() {
        let g = graph(&[("a", "b"), ("b", "a"), ("c", "d"), ("d", "e"), ("e", "c")]);
        let cycles = g.find_cycles();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[1], vec!["c", "d", "e"]);
    }

    #[test]
    fn test_cycle_rotation_is_canonical() {
        let g = graph(&[("m", "z"), ("z", "b"), ("b", "m")]);
        assert_eq!(g.find_cycles(), vec![vec!["b", "m", "z"]]);
    }

    #[test]
    fn test_self_edges_and_duplicates_ignored() {
        let mut g = graph(&[("a", "a"), ("a", "b"), ("a", "b")]);
        g.add_node("c", "c");
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.node_count(), 3);
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn test_coupling() {
        assert_eq!(DependencyGraph::new().coupling(), 0.0);
        let g = graph(&[("a", "b"), ("b", "c")]);
        assert!((g.coupling() - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_fan_out() {
        let edges: Vec<(&str, &str)> = ["b", "c", "d", "e", "f", "g"]
            .into_iter()
            .map(|to| ("hub", to))
            .collect();
        let g = graph(&edges);
        assert_eq!(g.high_fan_out(5), vec![("hub", 6)]);
        assert!(g.high_fan_out(6).is_empty());
    }

    #[test]
    fn test_layer_violations() {
        let g = graph(&[
            ("core", "cli"),
            ("cli", "core"),
            ("util", "services"),
            ("services", "util"),
            ("core", "misc"),
        ]);
        let violations = g.layer_violations(&default_layers());
        let pairs: Vec<(&str, &str)> = violations
            .iter()
            .map(|v| (v.from_layer.as_str(), v.to_layer.as_str()))
            .collect();
        assert_eq!(pairs, vec![("core", "orchestration"), ("util", "feature")]);
        assert_eq!(violations[0].file, PathBuf::from("src/core.rs"));
    }
}
