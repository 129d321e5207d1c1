//! Impact Analyzer (spec §4.7).
//!
//! Given a set of changed files, computes direct/transitive dependents, a scalar
//! risk score, and a suggested test list. Built directly on the Dependency Graph
//! and Centrality Engine; no dedicated teacher module covers this, so it's grounded
//! on the same BFS/centrality primitives those components already expose.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::centrality::compute as compute_centrality;
use crate::depgraph::DependencyGraph;
use crate::types::ImpactReport;

/// Heuristic test-path patterns (spec §4.7).
fn looks_like_test(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let in_test_dir = path.split('/').any(|seg| matches!(seg, "tests" | "__tests__" | "spec"));
    in_test_dir
        || file_name.starts_with("test_")
        || file_name.contains("_test.")
        || file_name.contains(".spec.")
        || file_name.contains(".test.")
}

/// BFS distance (in dependents-edges) from `seeds` to every reachable file, used to
/// order `suggested_tests` by "dependency proximity to the seed" (spec §4.7).
fn distances_from_seeds(graph: &DependencyGraph, seeds: &[String]) -> HashMap<String, usize> {
    let mut dist: HashMap<String, usize> = HashMap::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    for seed in seeds {
        if dist.insert(seed.clone(), 0).is_none() {
            queue.push_back(seed.clone());
        }
    }
    while let Some(file) = queue.pop_front() {
        let d = dist[&file];
        for dependent in graph.dependents(&file) {
            if !dist.contains_key(&dependent) {
                dist.insert(dependent.clone(), d + 1);
                queue.push_back(dependent);
            }
        }
    }
    dist
}

/// Analyze the impact of changing `seeds` (spec §4.7's contract).
pub fn analyze(graph: &DependencyGraph, seeds: &[String]) -> ImpactReport {
    let total = graph.node_count().max(1) as f64;

    let mut direct: HashSet<String> = HashSet::new();
    let mut transitive: HashSet<String> = HashSet::new();
    for seed in seeds {
        direct.extend(graph.dependents(seed));
        transitive.extend(graph.transitive_dependents(seed));
    }

    let centrality = compute_centrality(graph);
    let max_composite = seeds
        .iter()
        .filter_map(|s| centrality.get(s).map(|c| c.composite))
        .fold(0.0_f64, f64::max);

    let risk_score = (0.4 * (direct.len() as f64 / total)
        + 0.4 * max_composite
        + 0.2 * (transitive.len() as f64 / total))
        .clamp(0.0, 1.0);

    let proximity = distances_from_seeds(graph, seeds);
    let mut suggested_tests: Vec<String> = transitive
        .iter()
        .filter(|f| looks_like_test(f))
        .cloned()
        .collect();
    suggested_tests.sort_by(|a, b| {
        let da = proximity.get(a).copied().unwrap_or(usize::MAX);
        let db = proximity.get(b).copied().unwrap_or(usize::MAX);
        da.cmp(&db).then_with(|| a.cmp(b))
    });

    let mut direct_dependents: Vec<String> = direct.into_iter().collect();
    direct_dependents.sort();
    let mut transitive_dependents: Vec<String> = transitive.into_iter().collect();
    transitive_dependents.sort();

    ImpactReport {
        seed_files: seeds.to_vec(),
        direct_dependents,
        transitive_dependents,
        risk_score,
        suggested_tests,
    }
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
    fn direct_and_transitive_dependents_follow_chain() {
        let imports = vec![import("a.py", "b.py"), import("b.py", "c.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py"], &imports, &[]);
        let report = analyze(&graph, &["c.py".to_string()]);
        assert_eq!(report.direct_dependents, vec!["b.py".to_string()]);
        assert_eq!(report.transitive_dependents, vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn risk_score_is_clamped_to_unit_interval() {
        let imports = vec![import("a.py", "c.py"), import("b.py", "c.py")];
        let graph = DependencyGraph::build(["a.py", "b.py", "c.py"], &imports, &[]);
        let report = analyze(&graph, &["c.py".to_string()]);
        assert!(report.risk_score >= 0.0 && report.risk_score <= 1.0);
    }

    #[test]
    fn suggested_tests_matches_heuristic_patterns() {
        let imports = vec![
            import("src/a.py", "src/lib.py"),
            import("tests/test_lib.py", "src/lib.py"),
        ];
        let graph = DependencyGraph::build(["src/a.py", "src/lib.py", "tests/test_lib.py"], &imports, &[]);
        let report = analyze(&graph, &["src/lib.py".to_string()]);
        assert_eq!(report.suggested_tests, vec!["tests/test_lib.py".to_string()]);
    }

    #[test]
    fn no_dependents_yields_zero_direct_and_transitive() {
        let graph = DependencyGraph::build(["a.py"], &[], &[]);
        let report = analyze(&graph, &["a.py".to_string()]);
        assert!(report.direct_dependents.is_empty());
        assert!(report.transitive_dependents.is_empty());
    }
}
