//! End-to-end scenarios against the public `AnalysisFacade` surface.

use std::fs;
use std::path::Path;

use symgraph_core::config::Config;
use symgraph_core::facade::{AnalysisFacade, SearchStrategy};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn facade_for(dir: &Path) -> AnalysisFacade {
    let config = Config {
        project_root: dir.to_path_buf(),
        cache_dir: dir.join(".cache"),
        ..Config::default()
    };
    AnalysisFacade::new(config).unwrap()
}

#[test]
fn scenario_1_python_cycle_detection() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "import b\n");
    write(dir.path(), "b.py", "import c\n");
    write(dir.path(), "c.py", "import a\n");

    let mut facade = facade_for(dir.path());
    facade.index().unwrap();

    let cycles = facade.find_cycles().unwrap();
    assert_eq!(cycles.len(), 1);
    let mut members = cycles[0].clone();
    members.sort();
    assert_eq!(members, vec!["a.py", "b.py", "c.py"]);

    let scores = facade.centrality(None).unwrap();
    let composites: Vec<f64> = ["a.py", "b.py", "c.py"]
        .iter()
        .map(|f| scores.get(*f).unwrap().composite)
        .collect();
    for c in &composites[1..] {
        assert!((c - composites[0]).abs() < 1e-6);
    }
}

#[test]
fn scenario_2_cache_hit_then_miss_on_edit() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def one():\n    pass\n");

    let mut facade = facade_for(dir.path());
    let first = facade.index().unwrap();
    assert_eq!(first.cache_misses, 1);
    assert_eq!(first.cache_hits, 0);
    let initial_tags = first.tag_count;

    let mut facade = facade_for(dir.path());
    let unchanged = facade.index().unwrap();
    assert_eq!(unchanged.cache_hits, 1);
    assert_eq!(unchanged.cache_misses, 0);
    assert_eq!(unchanged.tag_count, initial_tags);

    write(dir.path(), "a.py", "def one():\n    pass\n\ndef two():\n    pass\n");
    let mut facade = facade_for(dir.path());
    let edited = facade.index().unwrap();
    assert_eq!(edited.cache_misses, 1);
    assert_eq!(edited.cache_hits, 0);
    assert!(edited.tag_count > initial_tags);
}

#[test]
fn scenario_3_impact_analysis_on_diamond_graph() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "core.py", "x = 1\n");
    write(dir.path(), "a.py", "import core\n");
    write(dir.path(), "b.py", "import core\n");
    write(dir.path(), "x.py", "import a\n");
    write(dir.path(), "y.py", "import b\n");

    let mut facade = facade_for(dir.path());
    facade.index().unwrap();

    let report = facade.impact(&["core.py".to_string()]).unwrap();

    let mut direct = report.direct_dependents.clone();
    direct.sort();
    assert_eq!(direct, vec!["a.py", "b.py"]);

    let mut transitive = report.transitive_dependents.clone();
    transitive.sort();
    assert_eq!(transitive, vec!["a.py", "b.py", "x.py", "y.py"]);

    assert!(report.risk_score > 0.0);
}

#[test]
fn scenario_4_hybrid_search_ranks_auth_terms_above_unrelated() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "auth.py",
        "def authenticate_user():\n    pass\n\ndef authUser():\n    pass\n\ndef login():\n    pass\n\ndef verify():\n    pass\n",
    );

    let mut facade = facade_for(dir.path());
    facade.index().unwrap();

    let hits = facade.search("auth", SearchStrategy::Hybrid, 0.3, 10).unwrap();
    let names: Vec<&str> = hits.iter().map(|h| h.identifier.as_str()).collect();

    assert!(names.contains(&"authenticate_user"));
    assert!(names.contains(&"authUser"));

    let auth_pos = names.iter().position(|n| *n == "authenticate_user").unwrap();
    if let Some(login_pos) = names.iter().position(|n| *n == "login") {
        assert!(auth_pos < login_pos);
    }
}

#[test]
fn scenario_5_unsupported_languages_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "readme.md", "# hello\n");
    write(dir.path(), "script.rb", "puts 'hi'\n");
    write(dir.path(), "main.py", "def main():\n    pass\n");

    let mut facade = facade_for(dir.path());
    let summary = facade.index().unwrap();
    assert!(summary.tag_count >= 1);

    let stats = facade.stats();
    assert_eq!(stats.skipped_count, 2);
    assert_eq!(stats.file_count, 1);
}

#[test]
fn scenario_6_parse_failure_does_not_surface_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken.py", "def f(:\n    this is not python\n");
    write(dir.path(), "ok.py", "def g():\n    pass\n");

    let mut facade = facade_for(dir.path());
    let summary = facade.index().unwrap();
    assert_eq!(summary.files_failed, 0);

    let hits = facade.search("g", SearchStrategy::Fuzzy, 0.0, 10).unwrap();
    assert!(!hits.is_empty());

    let cycles = facade.find_cycles().unwrap();
    assert!(cycles.is_empty());
}
