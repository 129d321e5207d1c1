//! symgraph CLI — command-line code intelligence over a project's tag cache,
//! dependency graph, and hybrid identifier search.
//!
//! Calls `symgraph-core` directly with no server overhead.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use symgraph_core::config::Config;
use symgraph_core::error::ErrorKind;
use symgraph_core::facade::{AnalysisFacade, SearchStrategy};
use symgraph_core::Result;

/// symgraph — multi-language code intelligence from the terminal.
#[derive(Parser)]
#[command(name = "symgraph", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Project root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Cache directory (default: <root>/.symgraph)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover files, extract tags, and build the dependency graph
    Index,
    /// Search indexed identifiers
    Search {
        /// Search query
        query: String,

        /// Matching strategy
        #[arg(long, value_enum, default_value = "hybrid")]
        strategy: StrategyArg,

        /// Minimum score threshold, in [0, 1]
        #[arg(long, default_value = "0.3")]
        threshold: f64,

        /// Maximum number of results
        #[arg(long, default_value = "20")]
        k: usize,
    },
    /// Report per-file centrality scores
    Centrality {
        /// Restrict to these files (default: the whole project)
        files: Vec<String>,
    },
    /// Analyze the blast radius of a change to the given files
    Impact {
        /// Seed files the change touches
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// List import/call cycles in the dependency graph
    Cycles,
    /// Print cache and graph counters
    Stats,
}

#[derive(Clone, clap::ValueEnum)]
enum StrategyArg {
    Fuzzy,
    Tfidf,
    Hybrid,
    Embedding,
}

impl From<StrategyArg> for SearchStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Fuzzy => SearchStrategy::Fuzzy,
            StrategyArg::Tfidf => SearchStrategy::Tfidf,
            StrategyArg::Hybrid => SearchStrategy::Hybrid,
            StrategyArg::Embedding => SearchStrategy::Embedding,
        }
    }
}

fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| std::env::current_dir().expect("Could not determine current directory"))
}

/// Build a `Config` for this invocation and index the project.
///
/// Every subcommand re-indexes rather than reusing a prior process's in-memory
/// state; the tag cache on disk is what makes repeated runs cheap.
fn open_and_index(root: Option<PathBuf>, cache_dir: Option<PathBuf>) -> Result<AnalysisFacade> {
    let root = resolve_root(root);
    let mut config = Config::load(&root)?;
    config.project_root = root;
    if let Some(dir) = cache_dir {
        config.cache_dir = dir;
    }
    let mut facade = AnalysisFacade::new(config)?;
    facade.index()?;
    Ok(facade)
}

/// Exit codes per spec §7: success = 0; partial success with warnings = 0;
/// invalid input = 2; missing index = 3; unrecoverable internal error = 1.
fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidQuery => 2,
        ErrorKind::IndexNotReady => 3,
        ErrorKind::ProjectNotFound
        | ErrorKind::PermissionDenied
        | ErrorKind::UnknownFile
        | ErrorKind::CacheCorrupt
        | ErrorKind::Internal => 1,
    }
}

fn fail(err: symgraph_core::Error) -> ! {
    eprintln!("error: {err}");
    std::process::exit(exit_code_for(err.kind()));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("symgraph=warn".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Commands::Index => {
            let facade = open_and_index(cli.root, cli.cache_dir).unwrap_or_else(|e| fail(e));
            let stats = facade.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            } else {
                println!("Files:   {}", stats.file_count);
                println!("Tags:    {}", stats.tag_count);
                println!("Edges:   {}", stats.edge_count);
                println!("Skipped: {}", stats.skipped_count);
            }
        }
        Commands::Search { query, strategy, threshold, k } => {
            let facade = open_and_index(cli.root, cli.cache_dir).unwrap_or_else(|e| fail(e));
            let hits = facade
                .search(&query, strategy.into(), threshold, k)
                .unwrap_or_else(|e| fail(e));
            if json {
                println!("{}", serde_json::to_string_pretty(&hits).unwrap());
            } else if hits.is_empty() {
                eprintln!("No results for '{query}'");
            } else {
                for hit in &hits {
                    println!(
                        "{:<40} {:>6.3}  {}",
                        hit.identifier,
                        hit.score,
                        hit.defining_files.join(", ")
                    );
                }
            }
        }
        Commands::Centrality { files } => {
            let facade = open_and_index(cli.root, cli.cache_dir).unwrap_or_else(|e| fail(e));
            let scope = if files.is_empty() { None } else { Some(files.as_slice()) };
            let scores = facade.centrality(scope).unwrap_or_else(|e| fail(e));
            if json {
                println!("{}", serde_json::to_string_pretty(&scores).unwrap());
            } else {
                let mut rows: Vec<_> = scores.iter().collect();
                rows.sort_by(|a, b| {
                    b.1.composite.partial_cmp(&a.1.composite).unwrap_or(std::cmp::Ordering::Equal)
                });
                for (file, score) in rows {
                    println!(
                        "{:<50} composite={:.3} degree={:.3} betweenness={:.3} pagerank={:.3}",
                        file, score.composite, score.degree, score.betweenness, score.pagerank
                    );
                }
            }
        }
        Commands::Impact { files } => {
            let facade = open_and_index(cli.root, cli.cache_dir).unwrap_or_else(|e| fail(e));
            let report = facade.impact(&files).unwrap_or_else(|e| fail(e));
            if json {
                println!("{}", serde_json::to_string_pretty(&report).unwrap());
            } else {
                println!("Risk score: {:.3}", report.risk_score);
                println!("Direct dependents: {}", report.direct_dependents.len());
                for f in &report.direct_dependents {
                    println!("  {f}");
                }
                println!("Transitive dependents: {}", report.transitive_dependents.len());
                for f in &report.transitive_dependents {
                    println!("  {f}");
                }
                println!("Suggested tests:");
                for f in &report.suggested_tests {
                    println!("  {f}");
                }
            }
        }
        Commands::Cycles => {
            let facade = open_and_index(cli.root, cli.cache_dir).unwrap_or_else(|e| fail(e));
            let cycles = facade.find_cycles().unwrap_or_else(|e| fail(e));
            if json {
                println!("{}", serde_json::to_string_pretty(&cycles).unwrap());
            } else if cycles.is_empty() {
                println!("No cycles found");
            } else {
                for (i, cycle) in cycles.iter().enumerate() {
                    println!("cycle {}: {}", i + 1, cycle.join(" -> "));
                }
            }
        }
        Commands::Stats => {
            let facade = open_and_index(cli.root, cli.cache_dir).unwrap_or_else(|e| fail(e));
            let stats = facade.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap());
            } else {
                println!("Files:   {}", stats.file_count);
                println!("Tags:    {}", stats.tag_count);
                println!("Edges:   {}", stats.edge_count);
                println!("Skipped: {}", stats.skipped_count);
            }
        }
    }
}
