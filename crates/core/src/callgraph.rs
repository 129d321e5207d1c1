//! Call Graph Builder (spec §4.4).
//!
//! Resolves each call-site tag to its defining file/function using a per-project
//! symbol index plus the import map as scope context. Grounded on
//! `server/src/graph.rs::{build_symbol_lookup, resolve_symbol}`'s same-file >
//! imported-module > nearest-shared-package priority order, adapted from a
//! tree-sitter re-walk to operate directly on the `Tag` stream (the call-site name is
//! already captured by `ast.rs`).

use std::collections::HashMap;

use crate::types::{Call, Import, Tag, TagKind};

/// One definition site for a function name.
#[derive(Debug, Clone)]
struct Definition {
    file: String,
    name: String,
}

/// `function_name → [defining_file, ...]` (spec §4.4 step 1).
pub struct SymbolIndex {
    by_name: HashMap<String, Vec<Definition>>,
}

impl SymbolIndex {
    pub fn build<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> Self {
        let mut by_name: HashMap<String, Vec<Definition>> = HashMap::new();
        for tag in tags {
            if tag.kind == TagKind::FunctionDefinition {
                by_name.entry(tag.name.clone()).or_default().push(Definition {
                    file: tag.file_path.clone(),
                    name: tag.name.clone(),
                });
            }
        }
        Self { by_name }
    }

    /// Resolve `name` to a single definition using spec §4.4's priority order:
    /// same-file, then imported-module, then nearest shared package (longest common
    /// directory-prefix), returning `None` when the name has zero or many-with-no-tiebreak
    /// candidates found in scope.
    fn resolve(&self, name: &str, from_file: &str, imported_files: &[&str]) -> Option<&Definition> {
        let candidates = self.by_name.get(name)?;
        if candidates.is_empty() {
            return None;
        }
        if candidates.len() == 1 {
            return candidates.first();
        }

        if let Some(d) = candidates.iter().find(|d| d.file == from_file) {
            return Some(d);
        }
        if let Some(d) = candidates.iter().find(|d| imported_files.contains(&d.file.as_str())) {
            return Some(d);
        }

        let from_dir = from_file.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        candidates.iter().max_by_key(|d| {
            let loc_dir = d.file.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
            from_dir
                .chars()
                .zip(loc_dir.chars())
                .take_while(|(a, b)| a == b)
                .count()
        })
    }
}

/// Find the innermost `FunctionDefinition` tag in `file_tags` whose line range
/// contains `line`, used to report the calling function for a `Call` record.
fn enclosing_function<'a>(file_tags: &'a [&'a Tag], line: u32) -> Option<&'a str> {
    file_tags
        .iter()
        .filter(|t| {
            t.kind == TagKind::FunctionDefinition && t.start_line <= line && line <= t.end_line
        })
        .min_by_key(|t| t.end_line - t.start_line)
        .map(|t| t.name.as_str())
}

/// Build `Call` records for every call-site tag (spec §4.4 steps 2–3). Duplicate
/// call sites to the same target are preserved as separate entries — aggregation
/// into weighted edges happens in the Dependency Graph (spec §4.5).
pub fn build_calls(all_tags: &[Tag], imports: &[Import]) -> Vec<Call> {
    let index = SymbolIndex::build(all_tags);

    let mut imports_by_file: HashMap<&str, Vec<&str>> = HashMap::new();
    for import in imports {
        if let Some(resolved) = &import.resolved_file {
            imports_by_file
                .entry(import.importing_file.as_str())
                .or_default()
                .push(resolved.as_str());
        }
    }

    let mut tags_by_file: HashMap<&str, Vec<&Tag>> = HashMap::new();
    for tag in all_tags {
        tags_by_file.entry(tag.file_path.as_str()).or_default().push(tag);
    }

    let mut calls = Vec::new();
    for tag in all_tags {
        if tag.kind != TagKind::FunctionReference {
            continue;
        }
        let empty: Vec<&str> = Vec::new();
        let imported_files = imports_by_file.get(tag.file_path.as_str()).unwrap_or(&empty);
        let resolved = index.resolve(&tag.name, &tag.file_path, imported_files);

        let caller_function = tags_by_file
            .get(tag.file_path.as_str())
            .and_then(|file_tags| enclosing_function(file_tags, tag.start_line))
            .map(String::from);

        calls.push(Call {
            caller_file: tag.file_path.clone(),
            caller_function,
            callee_name: tag.name.clone(),
            resolved_callee_file: resolved.map(|d| d.file.clone()),
            resolved_callee_function: resolved.map(|d| d.name.clone()),
            line: tag.start_line,
        });
    }
    calls
}
