//! Import Resolver (spec §4.3).
//!
//! Reconstructs each file's `Import` entries from its `import.module` tags, resolving
//! module references to project-internal file paths where possible. Grounded on
//! `server/src/scan.rs::scan_imports`'s per-language regex extraction and filename
//! lookup maps, reworked to the spec's exact tie-break order.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::types::{Import, Language, Tag, TagKind};

/// Index of project files used to resolve module references to concrete paths.
pub struct FileIndex {
    /// All discovered relative paths (spec: "discovered by the File Discoverer").
    all_paths: HashSet<String>,
    /// Filename stem (no extension) → candidate paths sharing that stem.
    by_stem: HashMap<String, Vec<String>>,
}

impl FileIndex {
    pub fn build(rel_paths: impl IntoIterator<Item = String>) -> Self {
        let all_paths: HashSet<String> = rel_paths.into_iter().collect();
        let mut by_stem: HashMap<String, Vec<String>> = HashMap::new();
        for path in &all_paths {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            let stem = file_name
                .rsplit_once('.')
                .map(|(s, _)| s)
                .unwrap_or(file_name);
            by_stem.entry(stem.to_string()).or_default().push(path.clone());
        }
        for v in by_stem.values_mut() {
            v.sort();
        }
        Self { all_paths, by_stem }
    }

    fn exists(&self, path: &str) -> bool {
        self.all_paths.contains(path)
    }
}

fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Rank a candidate for spec §4.3's tie-break: exact file (0) beats
/// directory-with-index (1); within a tier, shallower (fewer path segments) wins,
/// then lexicographically smaller.
fn pick_best(mut candidates: Vec<(String, u8)>) -> Option<String> {
    candidates.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.matches('/').count().cmp(&b.0.matches('/').count()))
            .then_with(|| a.0.cmp(&b.0))
    });
    candidates.into_iter().next().map(|(p, _)| p)
}

/// Try relative-import resolution: exact extensioned file, or directory index file.
fn resolve_relative(index: &FileIndex, base_dir: &str, target: &str, exts: &[&str]) -> Option<String> {
    let joined = if base_dir.is_empty() {
        target.to_string()
    } else {
        format!("{base_dir}/{target}")
    };
    let normalized = normalize(&joined);

    let mut candidates = Vec::new();
    for ext in exts {
        let with_ext = format!("{normalized}.{ext}");
        if index.exists(&with_ext) {
            candidates.push((with_ext, 0u8));
        }
    }
    if index.exists(&normalized) {
        candidates.push((normalized.clone(), 0));
    }
    for ext in exts {
        for index_name in ["index", "__init__", "mod"] {
            let idx_path = format!("{normalized}/{index_name}.{ext}");
            if index.exists(&idx_path) {
                candidates.push((idx_path, 1));
            }
        }
    }
    pick_best(candidates)
}

/// Try absolute/project-internal resolution: module path relative to project root.
fn resolve_absolute(index: &FileIndex, module_path: &str, exts: &[&str]) -> Option<String> {
    resolve_relative(index, "", module_path, exts)
}

/// One parsed Python import statement. `from` imports name specific members of a
/// package, each of which may resolve to its own submodule file or fall back to the
/// package's `__init__.py` when the package re-exports it (spec §4.3).
enum PythonImportForm {
    Plain { module: String, is_relative: bool },
    From { module: String, is_relative: bool, names: Vec<String> },
}

/// Split `from <module> import <names>`'s trailing name list into bare identifiers,
/// dropping `as`-aliases and surrounding parens.
fn parse_import_names(raw_names: &str) -> Vec<String> {
    raw_names
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.split_whitespace().next().unwrap_or(s).to_string())
        .collect()
}

fn parse_python_import(raw: &str) -> Option<PythonImportForm> {
    let from_re = Regex::new(r"^\s*from\s+(\.*[\w.]*)\s+import\s+(.+)$").ok()?;
    if let Some(caps) = from_re.captures(raw) {
        let module = caps.get(1)?.as_str().to_string();
        let is_relative = module.starts_with('.');
        let names = parse_import_names(caps.get(2)?.as_str());
        return Some(PythonImportForm::From { module, is_relative, names });
    }
    let import_re = Regex::new(r"^\s*import\s+(\.*[\w.]+)").ok()?;
    let caps = import_re.captures(raw)?;
    let module = caps.get(1)?.as_str().to_string();
    let is_relative = module.starts_with('.');
    Some(PythonImportForm::Plain { module, is_relative })
}

/// Parse one raw `import.module` tag's text into (module_ref, is_relative) per
/// language, per spec §4.3. Python is handled separately by `parse_python_import`
/// since its `from ... import names` form needs per-name resolution.
fn parse_module_ref(raw: &str, lang: Language) -> Option<(String, bool)> {
    match lang {
        Language::JavaScript | Language::TypeScript => {
            let re = Regex::new(r#"from\s+['"]([^'"]+)['"]|require\(\s*['"]([^'"]+)['"]\s*\)"#).ok()?;
            let caps = re.captures(raw)?;
            let module = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let is_relative = module.starts_with('.');
            Some((module.to_string(), is_relative))
        }
        Language::Go => {
            let re = Regex::new(r#""([^"]+)""#).ok()?;
            let caps = re.captures(raw)?;
            Some((caps.get(1)?.as_str().to_string(), false))
        }
        Language::Java => {
            let re = Regex::new(r"^\s*import\s+(?:static\s+)?([\w.]+)\s*;").ok()?;
            let caps = re.captures(raw)?;
            Some((caps.get(1)?.as_str().to_string(), false))
        }
        Language::CSharp => {
            let re = Regex::new(r"^\s*using\s+(?:static\s+)?([\w.]+)\s*;").ok()?;
            let caps = re.captures(raw)?;
            Some((caps.get(1)?.as_str().to_string(), false))
        }
        // C/C++/Rust are outside spec's required minimum set (§4.3); left unresolved.
        _ => None,
    }
}

fn dotted_to_path(dotted: &str) -> String {
    dotted.replace('.', "/")
}

fn base_dir_of(file_path: &str) -> &str {
    file_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("")
}

/// Walk up `dots - 1` directories from `importing_file`'s own directory, per
/// Python's relative-import dot-count convention (one dot = same package).
fn python_relative_base_dir(importing_file: &str, dots: usize) -> String {
    let mut base_dir = base_dir_of(importing_file).to_string();
    for _ in 1..dots {
        base_dir = base_dir_of(&base_dir).to_string();
    }
    base_dir
}

/// Resolve one import, applying spec §4.3's algorithm: relative → directory-relative
/// lookup; absolute project-internal → project-root-relative lookup; external →
/// left unresolved.
fn resolve_one(index: &FileIndex, importing_file: &str, module: &str, is_relative: bool, lang: Language) -> Option<String> {
    let exts: &[&str] = match lang {
        Language::Python => &["py"],
        Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
        Language::TypeScript => &["ts", "tsx"],
        Language::Go => &["go"],
        Language::Java => &["java"],
        Language::CSharp => &["cs"],
        _ => &[],
    };

    match lang {
        Language::Python if is_relative => {
            let dots = module.chars().take_while(|&c| c == '.').count();
            let rest = &module[dots..];
            let base_dir = python_relative_base_dir(importing_file, dots);
            let target = dotted_to_path(rest);
            resolve_relative(index, &base_dir, &target, exts)
        }
        Language::Python => resolve_absolute(index, &dotted_to_path(module), exts),
        Language::JavaScript | Language::TypeScript if is_relative => {
            resolve_relative(index, base_dir_of(importing_file), module, exts)
        }
        Language::JavaScript | Language::TypeScript => None, // bare specifier: external
        Language::Go => {
            // Go import paths name a package (directory); pick the lexicographically
            // smallest .go file in the matching directory as the resolution target,
            // matching spec's "lexicographically smaller" tie-break.
            let mut candidates: Vec<(String, u8)> = Vec::new();
            let dir_suffix = module.rsplit('/').next().unwrap_or(module);
            for path in &index.all_paths {
                if path.ends_with(".go") {
                    let dir = base_dir_of(path);
                    if dir == module || dir.ends_with(&format!("/{dir_suffix}")) || dir == dir_suffix {
                        candidates.push((path.clone(), 0));
                    }
                }
            }
            pick_best(candidates)
        }
        Language::Java => resolve_absolute(index, &dotted_to_path(module), exts),
        Language::CSharp => {
            // Namespaces don't map 1:1 to files; best-effort via filename-stem match
            // on the namespace's last segment.
            let last = module.rsplit('.').next().unwrap_or(module);
            index.by_stem.get(last).and_then(|paths| {
                pick_best(paths.iter().cloned().map(|p| (p, 0)).collect())
            })
        }
        _ => None,
    }
}

/// Resolve a Python `from <module> import <names>` statement to one `Import` per
/// named member: try `<pkg>/<name>.py` first (the name is its own submodule), then
/// fall back to the package file itself (`<pkg>/__init__.py`) when the package
/// re-exports the name, per spec §4.3.
fn resolve_python_from_import(
    index: &FileIndex,
    importing_file: &str,
    module: &str,
    is_relative: bool,
    names: &[String],
    line: u32,
) -> Vec<Import> {
    let dots = module.chars().take_while(|&c| c == '.').count();
    let rest = &module[dots..];
    let base_dir = if is_relative {
        python_relative_base_dir(importing_file, dots)
    } else {
        String::new()
    };
    let pkg_path = dotted_to_path(rest);
    let dot_prefix = ".".repeat(dots);

    names
        .iter()
        .map(|name| {
            let module_ref = if name == "*" {
                format!("{dot_prefix}{rest}")
            } else if rest.is_empty() {
                format!("{dot_prefix}{name}")
            } else {
                format!("{dot_prefix}{rest}.{name}")
            };

            let resolved_file = if name == "*" {
                if pkg_path.is_empty() {
                    None
                } else {
                    resolve_relative(index, &base_dir, &pkg_path, &["py"])
                }
            } else {
                let submodule_target =
                    if pkg_path.is_empty() { name.clone() } else { format!("{pkg_path}/{name}") };
                resolve_relative(index, &base_dir, &submodule_target, &["py"]).or_else(|| {
                    if pkg_path.is_empty() {
                        None
                    } else {
                        resolve_relative(index, &base_dir, &pkg_path, &["py"])
                    }
                })
            };

            Import {
                importing_file: importing_file.to_string(),
                module_ref,
                resolved_file,
                is_relative,
                line,
            }
        })
        .collect()
}

/// Reconstruct every `Import` for one file from its `import.module` tags.
pub fn resolve_imports(index: &FileIndex, importing_file: &str, lang: Language, tags: &[Tag]) -> Vec<Import> {
    tags.iter()
        .filter(|t| t.kind == TagKind::ImportModule && t.file_path == importing_file)
        .flat_map(|t| -> Vec<Import> {
            if lang == Language::Python {
                return match parse_python_import(&t.name) {
                    Some(PythonImportForm::From { module, is_relative, names }) => {
                        resolve_python_from_import(
                            index,
                            importing_file,
                            &module,
                            is_relative,
                            &names,
                            t.start_line,
                        )
                    }
                    Some(PythonImportForm::Plain { module, is_relative }) => {
                        let resolved_file =
                            resolve_one(index, importing_file, &module, is_relative, lang);
                        vec![Import {
                            importing_file: importing_file.to_string(),
                            module_ref: module,
                            resolved_file,
                            is_relative,
                            line: t.start_line,
                        }]
                    }
                    None => Vec::new(),
                };
            }
            match parse_module_ref(&t.name, lang) {
                Some((module, is_relative)) => {
                    let resolved_file = resolve_one(index, importing_file, &module, is_relative, lang);
                    vec![Import {
                        importing_file: importing_file.to_string(),
                        module_ref: module,
                        resolved_file,
                        is_relative,
                        line: t.start_line,
                    }]
                }
                None => Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import_tag(file: &str, text: &str, line: u32) -> Tag {
        Tag {
            name: text.to_string(),
            kind: TagKind::ImportModule,
            file_path: file.to_string(),
            start_line: line,
            start_column: 0,
            end_line: line,
            end_column: 0,
        }
    }

    #[test]
    fn resolves_python_relative_import() {
        let index = FileIndex::build(["pkg/a.py".to_string(), "pkg/b.py".to_string()]);
        let tags = vec![import_tag("pkg/a.py", "from . import b", 1)];
        let imports = resolve_imports(&index, "pkg/a.py", Language::Python, &tags);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].resolved_file, Some("pkg/b.py".to_string()));
        assert!(imports[0].is_relative);
    }

    #[test]
    fn resolves_python_package_cycle() {
        let index = FileIndex::build(["a.py".to_string(), "b.py".to_string(), "c.py".to_string()]);
        let a_imports = resolve_imports(
            &index,
            "a.py",
            Language::Python,
            &[import_tag("a.py", "import b", 1)],
        );
        assert_eq!(a_imports[0].resolved_file, Some("b.py".to_string()));
    }

    #[test]
    fn external_import_left_unresolved() {
        let index = FileIndex::build(["a.py".to_string()]);
        let tags = vec![import_tag("a.py", "import os", 1)];
        let imports = resolve_imports(&index, "a.py", Language::Python, &tags);
        assert_eq!(imports[0].resolved_file, None);
    }

    #[test]
    fn resolves_js_relative_with_extension_search() {
        let index = FileIndex::build(["src/a.ts".to_string(), "src/util.ts".to_string()]);
        let tags = vec![import_tag("src/a.ts", "import { f } from './util'", 1)];
        let imports = resolve_imports(&index, "src/a.ts", Language::TypeScript, &tags);
        assert_eq!(imports[0].resolved_file, Some("src/util.ts".to_string()));
    }

    #[test]
    fn prefers_exact_file_over_directory_index() {
        let index = FileIndex::build([
            "src/a.ts".to_string(),
            "src/util.ts".to_string(),
            "src/util/index.ts".to_string(),
        ]);
        let tags = vec![import_tag("src/a.ts", "import { f } from './util'", 1)];
        let imports = resolve_imports(&index, "src/a.ts", Language::TypeScript, &tags);
        assert_eq!(imports[0].resolved_file, Some("src/util.ts".to_string()));
    }

    #[test]
    fn resolves_java_fully_qualified_import() {
        let index = FileIndex::build(["com/example/Util.java".to_string()]);
        let tags = vec![import_tag("com/example/Main.java", "import com.example.Util;", 1)];
        let imports = resolve_imports(&index, "com/example/Main.java", Language::Java, &tags);
        assert_eq!(imports[0].resolved_file, Some("com/example/Util.java".to_string()));
    }
}
