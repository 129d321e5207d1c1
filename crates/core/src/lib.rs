//! symgraph-core: multi-language code intelligence over a content-addressed tag
//! cache, a file-level dependency graph, and hybrid identifier search.
//!
//! The [`facade::AnalysisFacade`] is the single entry point external callers should
//! use; the other modules are composable building blocks it wires together.

pub mod ast;
pub mod cache;
pub mod callgraph;
pub mod centrality;
pub mod config;
pub mod depgraph;
#[cfg(feature = "semantic")]
pub mod embedding;
pub mod error;
pub mod facade;
pub mod fuzzy;
pub mod hybrid;
pub mod identifiers;
pub mod impact;
pub mod imports;
pub mod scan;
pub mod tfidf;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use facade::{AnalysisFacade, SearchHit, SearchStrategy};
