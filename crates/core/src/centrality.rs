//! Centrality Engine (spec §4.6).
//!
//! Degree, Brandes' betweenness, and PageRank, combined into a normalized composite.
//! No corpus implementation of these algorithms exists in the retrieval pack (the
//! "repomap" lineage only shows the `DependencyGraph`/`PageRanker` orchestration
//! shape, with no `pagerank.rs` file present) — hand-implemented from the spec's
//! literal algorithm description, using the Dependency Graph's adjacency as input.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::depgraph::DependencyGraph;
use crate::types::CentralityScores;

const DAMPING: f64 = 0.85;
const TOLERANCE: f64 = 1e-6;
const MAX_ITERATIONS: usize = 100;
/// Default overall wall-clock budget for a `compute()` call (spec §5: "Centrality
/// computations carry an overall wall-clock timeout (default 60 s)").
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

struct Indexed {
    files: Vec<String>,
    index_of: HashMap<String, usize>,
    /// Outgoing adjacency (dependencies), by node index.
    out_adj: Vec<Vec<usize>>,
    /// Incoming adjacency (dependents), by node index.
    in_adj: Vec<Vec<usize>>,
}

fn index_graph(graph: &DependencyGraph) -> Indexed {
    let mut files: Vec<String> = graph.files().map(String::from).collect();
    files.sort();
    let index_of: HashMap<String, usize> = files.iter().cloned().enumerate().map(|(i, f)| (f, i)).collect();

    let n = files.len();
    let mut out_adj = vec![Vec::new(); n];
    let mut in_adj = vec![Vec::new(); n];
    for (i, file) in files.iter().enumerate() {
        for dep in graph.dependencies(file) {
            if let Some(&j) = index_of.get(&dep) {
                out_adj[i].push(j);
            }
        }
        for dep in graph.dependents(file) {
            if let Some(&j) = index_of.get(&dep) {
                in_adj[i].push(j);
            }
        }
    }
    Indexed { files, index_of, out_adj, in_adj }
}

fn degree_centrality(g: &Indexed) -> Vec<f64> {
    let n = g.files.len();
    if n == 0 {
        return Vec::new();
    }
    let raw: Vec<f64> = (0..n)
        .map(|i| (g.out_adj[i].len() + g.in_adj[i].len()) as f64)
        .collect();
    normalize_max(&raw)
}

/// Brandes' algorithm (unweighted, directed), O(V*E). Aborts early if `deadline`
/// passes between source nodes, returning the partial sum normalized so far (spec
/// §5: "on timeout, the engine returns best-so-far with a warning").
fn betweenness_centrality(g: &Indexed, deadline: Instant) -> Vec<f64> {
    let n = g.files.len();
    let mut centrality = vec![0.0f64; n];
    if n == 0 {
        return centrality;
    }

    for s in 0..n {
        if Instant::now() >= deadline {
            warn!(completed = s, total = n, "betweenness centrality timed out, returning best-so-far");
            break;
        }
        let mut stack: Vec<usize> = Vec::new();
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist = vec![-1i64; n];
        sigma[s] = 1.0;
        dist[s] = 0;

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &g.out_adj[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    normalize_max(&centrality)
}

/// PageRank with damping 0.85, tolerance 1e-6, max 100 iterations, uniform initial
/// distribution (spec §4.6). Dangling nodes (no outlinks) redistribute their mass
/// uniformly, matching the standard random-surfer formulation. Aborts early if
/// `deadline` passes between iterations, returning the current distribution.
fn pagerank(g: &Indexed, deadline: Instant) -> Vec<f64> {
    let n = g.files.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }

    let mut ranks = vec![1.0 / n as f64; n];
    let base = (1.0 - DAMPING) / n as f64;

    for iter in 0..MAX_ITERATIONS {
        if Instant::now() >= deadline {
            warn!(iter, "pagerank timed out, returning best-so-far");
            return ranks;
        }
        let dangling_mass: f64 = (0..n)
            .filter(|&i| g.out_adj[i].is_empty())
            .map(|i| ranks[i])
            .sum();

        let mut next = vec![base + DAMPING * dangling_mass / n as f64; n];
        for v in 0..n {
            if g.out_adj[v].is_empty() {
                continue;
            }
            let share = DAMPING * ranks[v] / g.out_adj[v].len() as f64;
            for &w in &g.out_adj[v] {
                next[w] += share;
            }
        }

        let delta: f64 = next.iter().zip(&ranks).map(|(a, b)| (a - b).abs()).sum();
        ranks = next;
        if delta < TOLERANCE {
            return ranks;
        }
        if iter == MAX_ITERATIONS - 1 {
            warn!(delta, "pagerank did not converge within iteration cap, returning best-so-far");
        }
    }
    ranks
}

fn normalize_max(values: &[f64]) -> Vec<f64> {
    let max = values.iter().cloned().fold(0.0, f64::max);
    if max <= 0.0 {
        // A lone node has nothing to be relatively central to; spec §4.6 defines it as
        // scoring 1.0 on every metric rather than 0.0. Multiple all-zero nodes (e.g. no
        // edges at all) stay tied at 0.0.
        return if values.len() == 1 { vec![1.0] } else { vec![0.0; values.len()] };
    }
    values.iter().map(|v| v / max).collect()
}

/// `compute` with the spec's default 60s overall timeout.
pub fn compute(graph: &DependencyGraph) -> HashMap<String, CentralityScores> {
    compute_with_timeout(graph, DEFAULT_TIMEOUT)
}

/// Compute per-file `CentralityScores` for every node in `graph` (spec §4.6), aborting
/// the betweenness and PageRank passes at `timeout` and returning their best-so-far
/// values (spec §5). Empty graph yields an empty map without error; a single node
/// scores 1.0 on every metric.
pub fn compute_with_timeout(graph: &DependencyGraph, timeout: Duration) -> HashMap<String, CentralityScores> {
    let deadline = Instant::now() + timeout;
    let g = index_graph(graph);
    let n = g.files.len();
    if n == 0 {
        return HashMap::new();
    }

    let degree = degree_centrality(&g);
    let betweenness = betweenness_centrality(&g, deadline);
    let rank = normalize_max(&pagerank(&g, deadline));

    let mut composite: Vec<f64> = (0..n)
        .map(|i| 0.4 * degree[i] + 0.3 * betweenness[i] + 0.3 * rank[i])
        .collect();
    let composite_norm = normalize_max(&composite);
    composite = composite_norm;

    g.index_of
        .iter()
        .map(|(file, &i)| {
            (
                file.clone(),
                CentralityScores {
                    degree: degree[i],
                    betweenness: betweenness[i],
                    pagerank: rank[i],
                    composite: composite[i],
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Import;

    fn import(from: &str, to: &str) -> Import {
        Import {
            importing_file: from.to_string(),
            module_ref: to.to_string(),
            resolved_file: Some(to.to_string()),
            is_relative: true,
            line: 1,
        }
    }

    #[test]
    fn empty_graph_yields_empty_scores() {
        let graph = DependencyGraph::build(Vec::<&str>::new(), &[], &[]);
        assert!(compute(&graph).is_empty());
    }

    #[test]
    fn single_node_scores_are_all_one() {
        let graph = DependencyGraph::build(["a.py"], &[], &[]);
        let scores = compute(&graph);
        let s = &scores["a.py"];
        assert_eq!(s.degree, 1.0);
        assert_eq!(s.betweenness, 1.0);
        assert_eq!(s.pagerank, 1.0);
        assert_eq!(s.composite, 1.0);
    }

    #[test]
    fn hub_has_higher_degree_than_leaf() {
        let imports = vec![import("a.py", "hub.py"), import("b.py", "hub.py"), import("c.py", "hub.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py", "hub.py"], &imports, &[]);
        let scores = compute(&graph);
        assert!(scores["hub.py"].degree > scores["a.py"].degree);
    }

    #[test]
    fn top_file_composite_is_one() {
        let imports = vec![import("a.py", "hub.py"), import("b.py", "hub.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "hub.py"], &imports, &[]);
        let scores = compute(&graph);
        let max = scores.values().map(|s| s.composite).fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pagerank_sums_close_to_one() {
        let imports = vec![import("a.py", "b.py"), import("b.py", "c.py"), import("c.py", "a.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py"], &imports, &[]);
        let g = index_graph(&graph);
        let rank = pagerank(&g, Instant::now() + Duration::from_secs(60));
        let sum: f64 = rank.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
    }
}
