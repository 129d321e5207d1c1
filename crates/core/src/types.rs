//! Data model (spec §3).

use serde::{Deserialize, Serialize};

/// The language a file was classified as, inferred from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    CSharp,
    Rust,
    C,
    Cpp,
}

impl Language {
    /// Infer a language from a file extension (spec §6: minimum supported set).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Language::Python),
            "js" | "jsx" => Some(Language::JavaScript),
            "ts" | "tsx" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "cs" => Some(Language::CSharp),
            "rs" => Some(Language::Rust),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

/// The kind of a tagged syntactic entity (spec §4.2: "dynamic tag kind → tagged
/// variants"). `Display` renders the dotted form documented in spec §3
/// (`class.definition`, `function.reference`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    ClassDefinition,
    FunctionDefinition,
    FunctionReference,
    VariableDeclaration,
    ImportModule,
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TagKind::ClassDefinition => "class.definition",
            TagKind::FunctionDefinition => "function.definition",
            TagKind::FunctionReference => "function.reference",
            TagKind::VariableDeclaration => "variable.declaration",
            TagKind::ImportModule => "import.module",
        };
        f.write_str(s)
    }
}

impl TagKind {
    pub fn is_definition(self) -> bool {
        matches!(
            self,
            TagKind::ClassDefinition | TagKind::FunctionDefinition | TagKind::VariableDeclaration
        )
    }
}

/// One extracted symbol occurrence (spec §3). Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub kind: TagKind,
    pub file_path: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Tag {
    /// Invariant: `start_line <= end_line`; columns non-negative (always true for u32).
    pub fn is_well_formed(&self) -> bool {
        self.start_line <= self.end_line
    }
}

/// One indexed file's identity + cache metadata (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_path: String,
    pub content_hash: String,
    pub mtime: i64,
    pub language: Language,
    pub cached_at: i64,
}

/// Derived, ephemeral: rebuilt from tags for the duration of a query (spec §3).
#[derive(Debug, Clone, Default)]
pub struct Identifier {
    pub name: String,
    pub kind_set: Vec<TagKind>,
    pub defining_files: Vec<String>,
    pub referencing_files: Vec<String>,
}

/// One import statement, with resolution outcome (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub importing_file: String,
    pub module_ref: String,
    pub resolved_file: Option<String>,
    pub is_relative: bool,
    pub line: u32,
}

/// One call site, with resolution outcome (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub caller_file: String,
    pub caller_function: Option<String>,
    pub callee_name: String,
    pub resolved_callee_file: Option<String>,
    pub resolved_callee_function: Option<String>,
    pub line: u32,
}

/// One file-level node in the dependency graph (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub file_path: String,
    pub language: Language,
    pub tag_count: usize,
    pub declared_symbols: Vec<String>,
}

/// The kind of a dependency edge (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Import,
    Call,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EdgeKind::Import => "import",
            EdgeKind::Call => "call",
        })
    }
}

/// One directed edge between files; multi-edges of the same (from, to, kind) are
/// coalesced with summed weight (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from_file: String,
    pub to_file: String,
    pub kind: EdgeKind,
    pub weight: u32,
}

/// Per-file centrality scores, all normalized to [0, 1] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CentralityScores {
    pub degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
    pub composite: f64,
}

/// Result of an impact analysis over a seed file set (spec §3, §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub seed_files: Vec<String>,
    pub direct_dependents: Vec<String>,
    pub transitive_dependents: Vec<String>,
    pub risk_score: f64,
    pub suggested_tests: Vec<String>,
}

/// Summary returned by `index()` (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
    pub files_discovered: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub tag_count: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub elapsed_ms: u64,
}

/// Counters returned by `stats()` (spec §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub file_count: usize,
    pub tag_count: usize,
    pub edge_count: usize,
    pub skipped_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_kind_display_matches_spec_dotted_form() {
        assert_eq!(TagKind::ClassDefinition.to_string(), "class.definition");
        assert_eq!(TagKind::FunctionReference.to_string(), "function.reference");
        assert_eq!(TagKind::ImportModule.to_string(), "import.module");
    }

    #[test]
    fn tag_well_formed_rejects_inverted_range() {
        let mut tag = Tag {
            name: "foo".into(),
            kind: TagKind::FunctionDefinition,
            file_path: "a.py".into(),
            start_line: 5,
            start_column: 0,
            end_line: 3,
            end_column: 0,
        };
        assert!(!tag.is_well_formed());
        tag.end_line = 5;
        assert!(tag.is_well_formed());
    }

    #[test]
    fn language_from_extension_covers_minimum_set() {
        for (ext, lang) in [
            ("py", Language::Python),
            ("js", Language::JavaScript),
            ("jsx", Language::JavaScript),
            ("ts", Language::TypeScript),
            ("tsx", Language::TypeScript),
            ("go", Language::Go),
            ("java", Language::Java),
            ("cs", Language::CSharp),
            ("rs", Language::Rust),
        ] {
            assert_eq!(Language::from_extension(ext), Some(lang));
        }
        assert_eq!(Language::from_extension("md"), None);
        assert_eq!(Language::from_extension("rb"), None);
    }
}
