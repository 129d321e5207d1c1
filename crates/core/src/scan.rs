//! File Discoverer (spec §2, §4 "File Discoverer (5%)").
//!
//! Enumerates candidate source files under a project root honoring ignore patterns,
//! yielding file paths tagged with an inferred `Language`. Grounded on
//! `server/src/scan.rs::{walk_files_parallel, scan_files, is_text_file}`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ignore::WalkBuilder;

use crate::config::Config;
use crate::types::Language;

/// One discovered file: its path relative to the project root and its classified
/// language (§6: files with unsupported extensions are skipped entirely here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub language: Language,
}

/// Result of a discovery pass: the files worth indexing, plus a count of files that
/// were seen but skipped (unsupported extension or binary content) for `stats()`.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub files: Vec<DiscoveredFile>,
    pub skipped_count: usize,
}

/// Read the first 8KB of a file and reject it as binary if a null byte appears.
fn is_text_file(path: &Path) -> bool {
    let mut file = match fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut buf = [0u8; 8192];
    let n = match std::io::Read::read(&mut file, &mut buf) {
        Ok(n) => n,
        Err(_) => return false,
    };
    !buf[..n].contains(&0)
}

/// Walk `project_root` in parallel, skipping `skip_dirs` by name at any depth.
fn walk_files_parallel(project_root: &Path, skip_dirs: &HashSet<String>) -> Vec<PathBuf> {
    let results: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());
    let skip = skip_dirs.clone();

    WalkBuilder::new(project_root)
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .threads(rayon::current_num_threads().min(12))
        .filter_entry(move |entry| {
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                let name = entry.file_name().to_string_lossy();
                return !skip.contains(name.as_ref());
            }
            true
        })
        .build_parallel()
        .run(|| {
            let results = &results;
            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => return ignore::WalkState::Continue,
                };
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    results.lock().unwrap().push(entry.path().to_path_buf());
                }
                ignore::WalkState::Continue
            })
        });

    results.into_inner().unwrap()
}

/// Enumerate candidate source files under `config.project_root`.
///
/// A file is included iff its extension maps to a supported `Language` (spec §6's
/// minimum extension list) and, when no extension filter is configured, its content
/// looks textual. Files over `config.file_size_limit_bytes` are still discovered here
/// (the size cap is enforced by the Extractor, per spec §4.1) but are reported in
/// `skipped_count` is not applied at this stage — only unsupported-extension/binary
/// files count as "skipped" for discovery purposes.
pub fn discover(config: &Config) -> DiscoveryResult {
    let skip_dirs: HashSet<String> = config.skip_dirs.iter().cloned().collect();
    let ext_filter: HashSet<String> = config.extensions.iter().cloned().collect();

    let raw_files = walk_files_parallel(&config.project_root, &skip_dirs);

    let mut files = Vec::with_capacity(raw_files.len());
    let mut skipped_count = 0usize;

    for abs_path in raw_files {
        let ext = abs_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        if !ext_filter.is_empty() && !ext_filter.contains(&ext) {
            continue;
        }

        let language = match Language::from_extension(&ext) {
            Some(lang) => lang,
            None => {
                skipped_count += 1;
                continue;
            }
        };

        if ext_filter.is_empty() && !is_text_file(&abs_path) {
            skipped_count += 1;
            continue;
        }

        let rel_path = abs_path
            .strip_prefix(&config.project_root)
            .unwrap_or(&abs_path)
            .to_string_lossy()
            .replace('\\', "/");

        files.push(DiscoveredFile {
            abs_path,
            rel_path,
            language,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    DiscoveryResult {
        files,
        skipped_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn discovers_supported_extensions_and_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "x = 1\n");
        write(dir.path(), "b.rb", "x = 1\n");
        write(dir.path(), "README.md", "hello\n");

        let config = Config {
            project_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let result = discover(&config);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].rel_path, "a.py");
        assert_eq!(result.skipped_count, 2);
    }

    #[test]
    fn skips_configured_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/a.py", "x = 1\n");
        write(dir.path(), "node_modules/pkg/index.js", "x = 1\n");

        let config = Config {
            project_root: dir.path().to_path_buf(),
            ..Config::default()
        };
        let result = discover(&config);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].rel_path, "src/a.py");
    }

    #[test]
    fn extension_filter_restricts_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", "x = 1\n");
        write(dir.path(), "b.go", "package main\n");

        let config = Config {
            project_root: dir.path().to_path_buf(),
            extensions: vec!["py".to_string()],
            ..Config::default()
        };
        let result = discover(&config);

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].rel_path, "a.py");
    }
}
