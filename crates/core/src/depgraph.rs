//! Dependency Graph (spec §4.5).
//!
//! In-memory directed multigraph of files, coalesced to weighted edges per (from, to,
//! kind). Grounded on the "repomap" lineage's `petgraph::graph::DiGraph<String, _>`
//! shape for file-dependency graphs (`examples/other_examples/*-repomap-graph.rs.rs`);
//! the teacher itself has no in-process graph type, only a flat edge list.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::algo::tarjan_scc;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::types::{Call, DependencyEdge, EdgeKind, Import, Tag};

/// Built once per analysis, then shared read-only (spec §5).
pub struct DependencyGraph {
    graph: DiGraph<String, (EdgeKind, u32)>,
    index_of: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from indexed files plus resolved imports/calls (spec §4.5
    /// "Construction"): one node per indexed file, one coalesced edge per
    /// (from, to, kind) with `weight` counting how many raw edges it represents.
    pub fn build<'a>(
        files: impl IntoIterator<Item = &'a str>,
        imports: &[Import],
        calls: &[Call],
    ) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of: HashMap<String, NodeIndex> = HashMap::new();

        for file in files {
            let idx = graph.add_node(file.to_string());
            index_of.insert(file.to_string(), idx);
        }

        let mut ensure_node = |graph: &mut DiGraph<String, (EdgeKind, u32)>, index_of: &mut HashMap<String, NodeIndex>, file: &str| -> NodeIndex {
            *index_of.entry(file.to_string()).or_insert_with(|| graph.add_node(file.to_string()))
        };

        let mut weights: HashMap<(NodeIndex, NodeIndex, EdgeKind), u32> = HashMap::new();

        for import in imports {
            let Some(to) = &import.resolved_file else { continue };
            let from_idx = ensure_node(&mut graph, &mut index_of, &import.importing_file);
            let to_idx = ensure_node(&mut graph, &mut index_of, to);
            *weights.entry((from_idx, to_idx, EdgeKind::Import)).or_insert(0) += 1;
        }

        for call in calls {
            let Some(to) = &call.resolved_callee_file else { continue };
            let from_idx = ensure_node(&mut graph, &mut index_of, &call.caller_file);
            let to_idx = ensure_node(&mut graph, &mut index_of, to);
            *weights.entry((from_idx, to_idx, EdgeKind::Call)).or_insert(0) += 1;
        }

        for ((from, to, kind), weight) in weights {
            graph.add_edge(from, to, (kind, weight));
        }

        Self { graph, index_of }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(|s| s.as_str())
    }

    fn node_of(&self, file: &str) -> Option<NodeIndex> {
        self.index_of.get(file).copied()
    }

    /// All edges in `DependencyEdge` form, one per coalesced (from, to, kind).
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.graph
            .edge_references()
            .map(|e| DependencyEdge {
                from_file: self.graph[e.source()].clone(),
                to_file: self.graph[e.target()].clone(),
                kind: e.weight().0,
                weight: e.weight().1,
            })
            .collect()
    }

    /// Successors: files this one depends on.
    pub fn dependencies(&self, file: &str) -> HashSet<String> {
        let Some(idx) = self.node_of(file) else { return HashSet::new() };
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// Predecessors: files that depend on this one.
    pub fn dependents(&self, file: &str) -> HashSet<String> {
        let Some(idx) = self.node_of(file) else { return HashSet::new() };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// Reflexive-transitive closure of `dependents`, minus the seed, via BFS.
    pub fn transitive_dependents(&self, file: &str) -> HashSet<String> {
        let Some(start) = self.node_of(file) else { return HashSet::new() };
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(idx) = queue.pop_front() {
            for pred in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if visited.insert(pred) {
                    queue.push_back(pred);
                }
            }
        }
        visited.remove(&start);
        visited.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    /// Strongly-connected components of size > 1, plus every self-loop, deduplicated
    /// and ordered by size descending (spec §4.5).
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();

        for scc in tarjan_scc(&self.graph) {
            if scc.len() > 1 {
                let mut names: Vec<String> = scc.iter().map(|n| self.graph[*n].clone()).collect();
                names.sort();
                if seen.insert(names.clone()) {
                    cycles.push(names);
                }
            }
        }

        for idx in self.graph.node_indices() {
            if self.graph.find_edge(idx, idx).is_some() {
                let names = vec![self.graph[idx].clone()];
                if seen.insert(names.clone()) {
                    cycles.push(names);
                }
            }
        }

        cycles.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        cycles
    }

    /// Whether `f2` is reachable from `f1` via dependency edges.
    pub fn is_connected(&self, f1: &str, f2: &str) -> bool {
        let (Some(start), Some(target)) = (self.node_of(f1), self.node_of(f2)) else {
            return false;
        };
        if start == target {
            return true;
        }
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);
        while let Some(idx) = queue.pop_front() {
            for succ in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if succ == target {
                    return true;
                }
                if visited.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        false
    }
}

/// Build the resolved-file set a node needs from a file's own definitions, used by
/// the Centrality Engine/Impact Analyzer to label nodes (spec §3 `DependencyNode`).
pub fn declared_symbols_for(tags: &[Tag], file: &str) -> Vec<String> {
    let mut names: Vec<String> = tags
        .iter()
        .filter(|t| t.file_path == file && t.kind.is_definition())
        .map(|t| t.name.clone())
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(from: &str, to: &str) -> Import {
        Import {
            importing_file: from.to_string(),
            module_ref: to.to_string(),
            resolved_file: Some(to.to_string()),
            is_relative: true,
            line: 1,
        }
    }

    fn call(caller: &str, callee_file: &str) -> Call {
        Call {
            caller_file: caller.to_string(),
            caller_function: None,
            callee_name: "f".to_string(),
            resolved_callee_file: Some(callee_file.to_string()),
            resolved_callee_function: None,
            line: 1,
        }
    }

    #[test]
    fn same_file_call_records_a_self_loop() {
        let calls = vec![call("a.py", "a.py")];
        let graph = DependencyGraph::build(["a.py"], &[], &calls);
        let cycles = graph.find_cycles();
        assert_eq!(cycles, vec![vec!["a.py".to_string()]]);
    }

    #[test]
    fn dependencies_and_dependents_are_inverse() {
        let imports = vec![import("a.py", "b.py")];
        let graph = DependencyGraph::build(["a.py", "b.py"], &imports, &[]);
        assert_eq!(graph.dependencies("a.py"), HashSet::from(["b.py".to_string()]));
        assert_eq!(graph.dependents("b.py"), HashSet::from(["a.py".to_string()]));
    }

    #[test]
    fn transitive_dependents_follows_chain() {
        let imports = vec![import("a.py", "b.py"), import("b.py", "c.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py"], &imports, &[]);
        let deps = graph.transitive_dependents("c.py");
        assert_eq!(deps, HashSet::from(["a.py".to_string(), "b.py".to_string()]));
    }

    #[test]
    fn finds_three_file_cycle() {
        let imports = vec![import("a.py", "b.py"), import("b.py", "c.py"), import("c.py", "a.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py"], &imports, &[]);
        let cycles = graph.find_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn finds_self_loop() {
        let imports = vec![import("a.py", "a.py")];
        let graph = DependencyGraph::build(["a.py"], &imports, &[]);
        let cycles = graph.find_cycles();
        assert_eq!(cycles, vec![vec!["a.py".to_string()]]);
    }

    #[test]
    fn edges_coalesce_with_weight() {
        let imports = vec![import("a.py", "b.py"), import("a.py", "b.py")];
        let graph = DependencyGraph::build(["a.py", "b.py"], &imports, &[]);
        let edges = graph.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 2);
    }

    #[test]
    fn is_connected_detects_reachability() {
        let imports = vec![import("a.py", "b.py"), import("b.py", "c.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py"], &imports, &[]);
        assert!(graph.is_connected("a.py", "c.py"));
        assert!(!graph.is_connected("c.py", "a.py"));
    }

    #[test]
    fn empty_graph_has_no_cycles() {
        let graph = DependencyGraph::build(Vec::<&str>::new(), &[], &[]);
        assert!(graph.find_cycles().is_empty());
    }
}
