//! Configuration surface consumed by the core (spec §6, last paragraph).
//!
//! Output format, verbosity, and colors are peripheral CLI concerns and live outside
//! this crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_skip_dirs() -> Vec<String> {
    [
        ".git",
        "node_modules",
        "__pycache__",
        "target",
        "dist",
        "build",
        ".next",
        "vendor",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .min(16)
}

/// Project-indexing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory of the project being indexed.
    pub project_root: PathBuf,
    /// Directory for the persistent tag cache and embedding store.
    pub cache_dir: PathBuf,
    /// Worker pool size for the indexing phase (§5). Default: logical CPUs, capped 16.
    pub worker_threads: usize,
    /// Files larger than this are rejected by the extractor and never cached.
    pub file_size_limit_bytes: u64,
    /// Per-file wall-clock timeout for extraction (§5).
    #[serde(with = "duration_secs")]
    pub extraction_timeout: Duration,
    /// Overall wall-clock timeout for centrality computation (§5).
    #[serde(with = "duration_secs")]
    pub centrality_timeout: Duration,
    /// Optional dense-embedding model identifier (§4.10).
    pub embedding_model: Option<String>,
    /// Directory names skipped entirely during discovery.
    pub skip_dirs: Vec<String>,
    /// Only index files with one of these extensions; empty = all supported.
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            cache_dir: PathBuf::from(".symgraph"),
            worker_threads: default_worker_threads(),
            file_size_limit_bytes: 5 * 1024 * 1024,
            extraction_timeout: Duration::from_secs(30),
            centrality_timeout: Duration::from_secs(60),
            embedding_model: None,
            skip_dirs: default_skip_dirs(),
            extensions: Vec::new(),
        }
    }
}

impl Config {
    /// Load overrides from a `symgraph.toml` at the project root, if present.
    /// Missing file is not an error; malformed file is (`Error::InvalidQuery`-shaped
    /// via the caller, since this is a config-parse error not in §7's taxonomy proper).
    pub fn load(project_root: impl AsRef<Path>) -> crate::error::Result<Self> {
        let project_root = project_root.as_ref();
        let mut config = Self {
            project_root: project_root.to_path_buf(),
            ..Self::default()
        };
        let path = project_root.join("symgraph.toml");
        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let parsed: TomlConfig = toml::from_str(&text)
                .map_err(|e| crate::error::Error::Internal(format!("symgraph.toml: {e}")))?;
            parsed.apply(&mut config);
        }
        Ok(config)
    }
}

/// Partial config as read from TOML; only present fields override defaults.
#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    cache_dir: Option<PathBuf>,
    worker_threads: Option<usize>,
    file_size_limit_bytes: Option<u64>,
    extraction_timeout_secs: Option<u64>,
    centrality_timeout_secs: Option<u64>,
    embedding_model: Option<String>,
    skip_dirs: Option<Vec<String>>,
    extensions: Option<Vec<String>>,
}

impl TomlConfig {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.cache_dir {
            config.cache_dir = v;
        }
        if let Some(v) = self.worker_threads {
            config.worker_threads = v;
        }
        if let Some(v) = self.file_size_limit_bytes {
            config.file_size_limit_bytes = v;
        }
        if let Some(v) = self.extraction_timeout_secs {
            config.extraction_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.centrality_timeout_secs {
            config.centrality_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.embedding_model {
            config.embedding_model = Some(v);
        }
        if let Some(v) = self.skip_dirs {
            config.skip_dirs = v;
        }
        if let Some(v) = self.extensions {
            config.extensions = v;
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert!(config.worker_threads >= 1 && config.worker_threads <= 16);
        assert!(config.skip_dirs.contains(&".git".to_string()));
    }

    #[test]
    fn load_without_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.worker_threads, Config::default().worker_threads);
    }

    #[test]
    fn load_applies_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("symgraph.toml"),
            "worker_threads = 2\nfile_size_limit_bytes = 1024\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.file_size_limit_bytes, 1024);
    }
}
