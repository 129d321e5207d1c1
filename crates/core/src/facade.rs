//! Analysis Façade (spec §6).
//!
//! The only component the external CLI speaks to. Wires File Discoverer → Tag Cache
//! ⇄ AST Tag Extractor → (Identifier Extractor, Import Resolver, Call Graph Builder)
//! → Dependency Graph → (Centrality Engine, Impact Analyzer); matchers consume the
//! identifier set independently. New: grounded on the shape of `server/src/main.rs`'s
//! command dispatch (which operations the CLI actually calls) but kept free of
//! CLI/HTTP concerns.

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::ast;
use crate::cache::{hash_bytes, TagCache};
use crate::callgraph;
use crate::centrality;
use crate::config::Config;
use crate::depgraph::DependencyGraph;
use crate::error::{Error, Result};
use crate::fuzzy::{self, FuzzyConfig};
use crate::hybrid::{self, HybridConfig};
use crate::identifiers::build_identifiers;
use crate::impact;
use crate::imports::{self, FileIndex};
use crate::scan;
use crate::tfidf;
use crate::types::{CentralityScores, Identifier, ImpactReport, IndexSummary, Stats, Tag};

#[cfg(feature = "semantic")]
use crate::embedding::EmbeddingMatcher;

/// Strategy selector for `search()` (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Fuzzy,
    Tfidf,
    Hybrid,
    Embedding,
}

/// One ranked search hit (spec §6: "(identifier, score, defining_files)").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub identifier: String,
    pub score: f64,
    pub defining_files: Vec<String>,
}

/// Immutable snapshot built by `index()`; all subsequent operations read from it
/// (spec §5: "Dependency Graph: built once per analysis; immutable afterward").
struct Snapshot {
    tags: Vec<Tag>,
    identifiers: Vec<Identifier>,
    graph: DependencyGraph,
    tfidf_corpus: tfidf::Corpus,
    skipped_count: usize,
}

/// Per-file result of the parallel extraction pass in `index()`.
enum FileOutcome {
    Hit(Vec<Tag>),
    Miss(Vec<Tag>),
    Failed,
}

pub struct AnalysisFacade {
    config: Config,
    cache: TagCache,
    snapshot: Option<Snapshot>,
    #[cfg(feature = "semantic")]
    embedding: Option<EmbeddingMatcher>,
}

impl AnalysisFacade {
    /// Open (or create) the cache for `config.project_root` without indexing yet.
    pub fn new(config: Config) -> Result<Self> {
        if !config.project_root.exists() {
            return Err(Error::ProjectNotFound(config.project_root.clone()));
        }
        let cache = TagCache::open(&config.cache_dir)?;
        Ok(Self {
            config,
            cache,
            snapshot: None,
            #[cfg(feature = "semantic")]
            embedding: None,
        })
    }

    /// Cache-check and, on a miss, read/parse/cache-write a single discovered file.
    /// Called concurrently across the rayon pool from `index()`.
    fn extract_one(&self, file: &scan::DiscoveredFile) -> FileOutcome {
        if let Some(cached) = self.cache.get(&file.rel_path, &file.abs_path) {
            return FileOutcome::Hit(cached);
        }

        let Ok(bytes) = std::fs::read(&file.abs_path) else {
            return FileOutcome::Failed;
        };
        if bytes.len() as u64 > self.config.file_size_limit_bytes {
            return FileOutcome::Failed;
        }
        let Some(tags) =
            ast::extract_file(&file.abs_path, &file.rel_path, file.language, self.config.extraction_timeout)
        else {
            return FileOutcome::Failed;
        };

        let hash = hash_bytes(&bytes);
        let mtime = std::fs::metadata(&file.abs_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        if let Err(e) = self.cache.put(&file.rel_path, &hash, mtime, file.language, &tags) {
            warn!(file = %file.rel_path, error = %e, "failed to write tag cache entry");
        }
        FileOutcome::Miss(tags)
    }

    /// `index(project_root, options)` (spec §6): discover, extract (cache-aware),
    /// resolve imports/calls, build the dependency graph. Per-file failures are
    /// counted, never surfaced.
    pub fn index(&mut self) -> Result<IndexSummary> {
        let start = Instant::now();
        let discovery = scan::discover(&self.config);

        // Cache checks and extraction run on a fixed-size worker pool sized from config
        // (spec §5: "parallel worker threads coordinated by a fixed-size pool... default
        // = logical CPUs, capped at 16"), not rayon's ambient global pool. Cache writes
        // stay serialized behind `TagCache`'s single connection mutex (spec §4.1
        // single-writer contract), so the pool only buys concurrent parsing.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .build()
            .map_err(|e| Error::Internal(e.to_string()))?;
        let this: &Self = self;
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            discovery
                .files
                .par_iter()
                .map(|file| this.extract_one(file))
                .collect()
        });

        let mut all_tags: Vec<Tag> = Vec::new();
        let mut cache_hits = 0usize;
        let mut cache_misses = 0usize;
        let mut files_failed = 0usize;

        for outcome in outcomes {
            match outcome {
                FileOutcome::Hit(tags) => {
                    cache_hits += 1;
                    all_tags.extend(tags);
                }
                FileOutcome::Miss(tags) => {
                    cache_misses += 1;
                    all_tags.extend(tags);
                }
                FileOutcome::Failed => {
                    cache_misses += 1;
                    files_failed += 1;
                }
            }
        }

        let rel_paths: Vec<String> = discovery.files.iter().map(|f| f.rel_path.clone()).collect();
        let file_index = FileIndex::build(rel_paths.iter().cloned());

        let mut imports = Vec::new();
        for file in &discovery.files {
            imports.extend(imports::resolve_imports(
                &file_index,
                &file.rel_path,
                file.language,
                &all_tags,
            ));
        }

        let calls = callgraph::build_calls(&all_tags, &imports);
        let graph = DependencyGraph::build(rel_paths.iter().map(String::as_str), &imports, &calls);
        let identifiers = build_identifiers(&all_tags);
        let tfidf_corpus = tfidf::Corpus::build(&identifiers);

        let summary = IndexSummary {
            files_discovered: discovery.files.len() + discovery.skipped_count,
            files_indexed: discovery.files.len() - files_failed,
            files_skipped: discovery.skipped_count,
            files_failed,
            tag_count: all_tags.len(),
            cache_hits,
            cache_misses,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            files_indexed = summary.files_indexed,
            tag_count = summary.tag_count,
            elapsed_ms = summary.elapsed_ms,
            "index complete"
        );

        self.snapshot = Some(Snapshot {
            tags: all_tags,
            identifiers,
            graph,
            tfidf_corpus,
            skipped_count: discovery.skipped_count,
        });

        #[cfg(feature = "semantic")]
        {
            if let Some(model) = self.config.embedding_model.clone() {
                self.embedding = Some(EmbeddingMatcher::load(Some(&model), &self.config.cache_dir));
            }
        }

        Ok(summary)
    }

    fn snapshot(&self) -> Result<&Snapshot> {
        self.snapshot.as_ref().ok_or(Error::IndexNotReady)
    }

    /// `search(query, strategy, threshold, k)` (spec §6).
    pub fn search(
        &self,
        query: &str,
        strategy: SearchStrategy,
        threshold: f64,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidQuery(format!("threshold {threshold} out of range [0,1]")));
        }
        if k == 0 {
            return Err(Error::InvalidQuery("k must be >= 1".into()));
        }

        let snapshot = self.snapshot()?;

        let fuzzy_scores: Vec<(String, f64)> = {
            let config = FuzzyConfig { threshold: 0.0, ..FuzzyConfig::default() };
            fuzzy::search(&snapshot.identifiers, query, &config)
                .into_iter()
                .map(|m| (m.identifier, m.score))
                .collect()
        };
        let tfidf_scores: Vec<(String, f64)> = tfidf::search(&snapshot.tfidf_corpus, query, 0.0, usize::MAX)
            .into_iter()
            .map(|m| (m.identifier, m.score))
            .collect();

        #[cfg(feature = "semantic")]
        let embedding_scores: Vec<(String, f64)> = self
            .embedding
            .as_ref()
            .map(|m| {
                m.search(&snapshot.identifiers, query, 0.0, usize::MAX)
                    .into_iter()
                    .map(|r| (r.identifier, r.score))
                    .collect()
            })
            .unwrap_or_default();
        #[cfg(not(feature = "semantic"))]
        let embedding_scores: Vec<(String, f64)> = Vec::new();

        #[cfg(feature = "semantic")]
        let embedding_enabled = self.embedding.is_some();
        #[cfg(not(feature = "semantic"))]
        let embedding_enabled = false;

        let ranked: Vec<(String, f64)> = match strategy {
            SearchStrategy::Fuzzy => {
                let mut v = fuzzy_scores;
                v.retain(|(_, s)| *s >= threshold);
                v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
                v
            }
            SearchStrategy::Tfidf => {
                let mut v = tfidf_scores;
                v.retain(|(_, s)| *s >= threshold);
                v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
                v
            }
            SearchStrategy::Embedding => {
                let mut v = embedding_scores;
                v.retain(|(_, s)| *s >= threshold);
                v.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
                v
            }
            SearchStrategy::Hybrid => {
                let config = HybridConfig { threshold, top_k: k, ..HybridConfig::default() };
                hybrid::combine(&fuzzy_scores, &tfidf_scores, &embedding_scores, embedding_enabled, &config)
                    .into_iter()
                    .map(|m| (m.identifier, m.composite))
                    .collect()
            }
        };

        let by_name: HashMap<&str, &Identifier> =
            snapshot.identifiers.iter().map(|i| (i.name.as_str(), i)).collect();

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(name, score)| SearchHit {
                defining_files: by_name.get(name.as_str()).map(|i| i.defining_files.clone()).unwrap_or_default(),
                identifier: name,
                score,
            })
            .collect())
    }

    /// `centrality(scope)` (spec §6).
    pub fn centrality(&self, scope: Option<&[String]>) -> Result<HashMap<String, CentralityScores>> {
        let snapshot = self.snapshot()?;
        let mut scores = centrality::compute_with_timeout(&snapshot.graph, self.config.centrality_timeout);
        if let Some(scope) = scope {
            let keep: std::collections::HashSet<&str> = scope.iter().map(String::as_str).collect();
            scores.retain(|file, _| keep.contains(file.as_str()));
        }
        Ok(scores)
    }

    /// `impact(seed_files)` (spec §6).
    pub fn impact(&self, seed_files: &[String]) -> Result<ImpactReport> {
        if seed_files.is_empty() {
            return Err(Error::InvalidQuery("seed_files must not be empty".into()));
        }
        let snapshot = self.snapshot()?;
        let known: std::collections::HashSet<&str> = snapshot.graph.files().collect();
        for seed in seed_files {
            if !known.contains(seed.as_str()) {
                return Err(Error::UnknownFile(seed.clone()));
            }
        }
        Ok(impact::analyze(&snapshot.graph, seed_files))
    }

    /// `find_cycles()` (spec §6).
    pub fn find_cycles(&self) -> Result<Vec<Vec<String>>> {
        Ok(self.snapshot()?.graph.find_cycles())
    }

    /// `stats()` (spec §6). Never fails even with no index built.
    pub fn stats(&self) -> Stats {
        let cache_stats = self.cache.stats();
        match &self.snapshot {
            Some(snapshot) => Stats {
                file_count: snapshot.graph.node_count(),
                tag_count: snapshot.tags.len(),
                edge_count: snapshot.graph.edges().len(),
                skipped_count: snapshot.skipped_count,
            },
            None => Stats {
                file_count: cache_stats.file_count,
                tag_count: cache_stats.tag_count,
                edge_count: 0,
                skipped_count: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;

    fn write(dir: &std::path::Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn facade_for(dir: &std::path::Path) -> AnalysisFacade {
        let config = Config {
            project_root: dir.to_path_buf(),
            cache_dir: dir.join(".cache"),
            ..Config::default()
        };
        AnalysisFacade::new(config).unwrap()
    }

    #[test]
    fn search_before_index_returns_index_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade_for(dir.path());
        let err = facade.search("foo", SearchStrategy::Fuzzy, 0.0, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IndexNotReady);
    }

    #[test]
    fn index_then_search_finds_definitions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "def get_user():\n    pass\n");
        let mut facade = facade_for(dir.path());
        facade.index().unwrap();

        let hits = facade.search("get_user", SearchStrategy::Fuzzy, 0.0, 5).unwrap();
        assert!(hits.iter().any(|h| h.identifier == "get_user"));
    }

    #[test]
    fn empty_query_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut facade = facade_for(dir.path());
        facade.index().unwrap();
        let err = facade.search("", SearchStrategy::Fuzzy, 0.0, 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    }

    #[test]
    fn impact_on_unknown_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut facade = facade_for(dir.path());
        facade.index().unwrap();
        let err = facade.impact(&["missing.py".to_string()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownFile);
    }

    #[test]
    fn find_cycles_on_three_file_python_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "import b\n");
        write(dir.path(), "b.py", "import c\n");
        write(dir.path(), "c.py", "import a\n");
        let mut facade = facade_for(dir.path());
        facade.index().unwrap();

        let cycles = facade.find_cycles().unwrap();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 3);
    }

    #[test]
    fn stats_before_index_reports_cache_only() {
        let dir = tempfile::tempdir().unwrap();
        let facade = facade_for(dir.path());
        let stats = facade.stats();
        assert_eq!(stats.edge_count, 0);
    }
}
