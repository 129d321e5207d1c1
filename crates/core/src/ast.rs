//! AST Tag Extractor (spec §4.2).
//!
//! Per-language tree-sitter grammar + tag query: parses a file's bytes, walks the
//! syntax tree, emits a `Tag` stream (definitions, references, imports). Grounded on
//! `server/src/ast.rs` (language dispatch, node classification, name/signature
//! extraction) generalized to spec's dotted `TagKind` capture-name mapping and
//! extended with call-site and import-statement capture plus a C# grammar branch.

use std::path::Path;
use std::time::Duration;

use tree_sitter::{Language as TsLanguage, Node, Parser};

use crate::types::{Language, Tag, TagKind};

/// Default per-file parse timeout used by call sites that don't have a configured
/// one (e.g. tests). Matches spec §5's documented default.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Map a file extension to the tree-sitter Language (spec §4.2 inputs: "language
/// identifier inferred from extension; fail-fast if unsupported").
fn ts_language_for(lang: Language) -> Option<TsLanguage> {
    match lang {
        Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        Language::C => Some(tree_sitter_c::LANGUAGE.into()),
        Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::CSharp => Some(tree_sitter_c_sharp::LANGUAGE.into()),
    }
}

/// The dotted capture→kind mapping named in spec §4.2: "definition.class →
/// class.definition, reference.call → function.reference", documented here as the
/// stable table every language's node kinds are classified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Definition(TagKind),
    Reference(TagKind),
    Import,
    /// Not a capture itself, but its children may be (e.g. `export_statement`).
    Transparent,
}

fn classify_node(kind: &str, lang: Language) -> Option<Capture> {
    use Capture::*;
    use TagKind::*;
    match kind {
        // Rust
        "function_item" => Some(Definition(FunctionDefinition)),
        "struct_item" | "enum_item" | "trait_item" | "impl_item" => {
            Some(Definition(ClassDefinition))
        }
        "const_item" | "static_item" if lang == Language::Rust => {
            Some(Definition(VariableDeclaration))
        }
        "use_declaration" if lang == Language::Rust => Some(Import),

        // JS / TS / Java shared
        "function_declaration" => Some(Definition(FunctionDefinition)),
        "class_declaration" => Some(Definition(ClassDefinition)),
        "interface_declaration" => Some(Definition(ClassDefinition)),
        "method_definition" | "method_declaration" => Some(Definition(FunctionDefinition)),
        "type_alias_declaration" => Some(Definition(ClassDefinition)),
        "export_statement" => Some(Transparent),
        "import_statement" | "import_declaration" => Some(Import),
        "lexical_declaration" | "variable_declaration"
            if matches!(lang, Language::JavaScript | Language::TypeScript) =>
        {
            Some(Definition(VariableDeclaration))
        }

        // Python
        "function_definition" => Some(Definition(FunctionDefinition)),
        "class_definition" => Some(Definition(ClassDefinition)),
        "import_from_statement" if lang == Language::Python => Some(Import),
        "assignment" if lang == Language::Python => Some(Definition(VariableDeclaration)),

        // Go
        "type_declaration" => Some(Transparent),
        "type_spec" if lang == Language::Go => Some(Definition(ClassDefinition)),
        "import_spec" if lang == Language::Go => Some(Import),
        "const_declaration" | "var_declaration" if lang == Language::Go => {
            Some(Definition(VariableDeclaration))
        }

        // C / C++
        "struct_specifier" | "enum_specifier" | "class_specifier" => {
            Some(Definition(ClassDefinition))
        }
        "preproc_include" => Some(Import),

        // Java
        "enum_declaration" => Some(Definition(ClassDefinition)),

        // C# (class_declaration/method_declaration already covered above)
        "using_directive" if lang == Language::CSharp => Some(Import),

        // Call sites, shared across languages
        "call_expression" | "call" | "method_invocation" => Some(Reference(FunctionReference)),

        _ => None,
    }
}

fn extract_name(node: &Node, source: &[u8], lang: Language) -> Option<String> {
    for field in ["name", "type"] {
        if let Some(name_node) = node.child_by_field_name(field) {
            if let Ok(text) = name_node.utf8_text(source) {
                let name = text.trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    if node.kind() == "impl_item" && lang == Language::Rust {
        if let Some(type_node) = node.child_by_field_name("type") {
            if let Ok(text) = type_node.utf8_text(source) {
                return Some(text.trim().to_string());
            }
        }
    }

    if node.kind() == "type_spec" && lang == Language::Go {
        if let Some(child) = node.named_child(0) {
            if let Ok(text) = child.utf8_text(source) {
                return Some(text.trim().to_string());
            }
        }
    }

    if (node.kind() == "function_definition" && matches!(lang, Language::C | Language::Cpp))
        || node.kind() == "function_item"
    {
        if let Some(decl) = node.child_by_field_name("declarator") {
            if let Some(name_node) = decl.child_by_field_name("declarator") {
                if let Ok(text) = name_node.utf8_text(source) {
                    return Some(text.trim().to_string());
                }
            }
            if let Ok(text) = decl.utf8_text(source) {
                let s = text.trim();
                if let Some(paren) = s.find('(') {
                    return Some(s[..paren].trim().to_string());
                }
                return Some(s.to_string());
            }
        }
    }

    // Call-site callee name: prefer "function" / "method" fields, strip qualifiers.
    if matches!(node.kind(), "call_expression" | "call" | "method_invocation") {
        for field in ["function", "method"] {
            if let Some(callee) = node.child_by_field_name(field) {
                if let Ok(text) = callee.utf8_text(source) {
                    let name = text
                        .rsplit("::")
                        .next()
                        .unwrap_or(text)
                        .rsplit('.')
                        .next()
                        .unwrap_or(text)
                        .trim();
                    if !name.is_empty() && !name.starts_with(|c: char| c.is_ascii_digit()) {
                        return Some(name.to_string());
                    }
                }
            }
        }
    }

    // Raw import text (module ref resolution happens downstream in imports.rs).
    if matches!(
        node.kind(),
        "use_declaration"
            | "import_statement"
            | "import_declaration"
            | "import_from_statement"
            | "import_spec"
            | "preproc_include"
            | "using_directive"
    ) {
        if let Ok(text) = node.utf8_text(source) {
            return Some(text.trim().to_string());
        }
    }

    None
}

fn walk_node(node: &Node, source: &[u8], rel_path: &str, lang: Language, tags: &mut Vec<Tag>) {
    let kind = node.kind();
    match classify_node(kind, lang) {
        Some(Capture::Definition(tag_kind)) | Some(Capture::Reference(tag_kind)) => {
            if let Some(name) = extract_name(node, source, lang) {
                let start = node.start_position();
                let end = node.end_position();
                tags.push(Tag {
                    name,
                    kind: tag_kind,
                    file_path: rel_path.to_string(),
                    start_line: start.row as u32 + 1,
                    start_column: start.column as u32,
                    end_line: end.row as u32 + 1,
                    end_column: end.column as u32,
                });
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk_node(&child, source, rel_path, lang, tags);
            }
        }
        Some(Capture::Import) => {
            if let Some(name) = extract_name(node, source, lang) {
                let start = node.start_position();
                let end = node.end_position();
                tags.push(Tag {
                    name,
                    kind: TagKind::ImportModule,
                    file_path: rel_path.to_string(),
                    start_line: start.row as u32 + 1,
                    start_column: start.column as u32,
                    end_line: end.row as u32 + 1,
                    end_column: end.column as u32,
                });
            }
        }
        Some(Capture::Transparent) | None => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                walk_node(&child, source, rel_path, lang, tags);
            }
        }
    }
}

/// Parse `content` as `lang` and extract its tag stream, aborting the parse if it
/// runs past `timeout` (spec §5: "individual extractions have a per-file wall-clock
/// timeout"). Returns `None` when the language has no grammar compiled in, or when
/// tree-sitter cancels the parse on timeout. A completely unparseable-but-not-timed-out
/// file still yields a tree via tree-sitter's error recovery (spec §4.2), modeled here
/// as `Some(vec![])` in the worst case.
pub fn extract_tags_with_timeout(
    content: &str,
    rel_path: &str,
    lang: Language,
    timeout: Duration,
) -> Option<Vec<Tag>> {
    let ts_lang = ts_language_for(lang)?;
    let mut parser = Parser::new();
    parser.set_language(&ts_lang).ok()?;
    parser.set_timeout_micros(timeout.as_micros() as u64);

    let tree = parser.parse(content, None)?;

    let mut tags = Vec::new();
    let source = content.as_bytes();
    let root = tree.root_node();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        walk_node(&child, source, rel_path, lang, &mut tags);
    }
    Some(tags)
}

/// `extract_tags_with_timeout` with the spec's default 30s per-file timeout.
pub fn extract_tags(content: &str, rel_path: &str, lang: Language) -> Option<Vec<Tag>> {
    extract_tags_with_timeout(content, rel_path, lang, DEFAULT_TIMEOUT)
}

/// Re-parse a single file from disk, for incremental re-indexing. Returns `None` on
/// read failure, unsupported language, or a parse that exceeds `timeout` — all three
/// are recorded as a failed file by the caller and never cached (spec §4.1, §5).
pub fn extract_file(abs_path: &Path, rel_path: &str, lang: Language, timeout: Duration) -> Option<Vec<Tag>> {
    let content = std::fs::read_to_string(abs_path).ok()?;
    extract_tags_with_timeout(&content, rel_path, lang, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_definitions() {
        let src = r#"
pub fn greet(name: &str) -> String {
    format!("Hello, {}!", name)
}

struct Config {
    name: String,
}

impl Config {
    fn new() -> Self {
        Config { name: String::new() }
    }
}
"#;
        let tags = extract_tags(src, "a.rs", Language::Rust).expect("supported language");
        assert!(tags
            .iter()
            .any(|t| t.name == "greet" && t.kind == TagKind::FunctionDefinition));
        assert!(tags
            .iter()
            .any(|t| t.name == "Config" && t.kind == TagKind::ClassDefinition));
        assert!(tags
            .iter()
            .any(|t| t.name == "new" && t.kind == TagKind::FunctionDefinition));
    }

    #[test]
    fn extracts_python_imports_and_calls() {
        let src = "import os\nfrom pkg import helper\n\ndef main():\n    helper()\n";
        let tags = extract_tags(src, "a.py", Language::Python).expect("supported language");
        assert!(tags.iter().any(|t| t.kind == TagKind::ImportModule));
        assert!(tags
            .iter()
            .any(|t| t.name == "main" && t.kind == TagKind::FunctionDefinition));
        assert!(tags
            .iter()
            .any(|t| t.name == "helper" && t.kind == TagKind::FunctionReference));
    }

    #[test]
    fn all_tags_are_well_formed() {
        let src = "def a():\n    pass\n\ndef b():\n    a()\n";
        let tags = extract_tags(src, "a.py", Language::Python).unwrap();
        assert!(!tags.is_empty());
        for tag in &tags {
            assert!(tag.is_well_formed());
        }
    }

    #[test]
    fn unparseable_content_yields_some_not_none() {
        // tree-sitter's error recovery still produces a tree for malformed source;
        // the extractor never treats a parse error as "unsupported".
        assert!(extract_tags("def (:\n", "bad.py", Language::Python).is_some());
    }

    #[test]
    fn nested_methods_are_captured() {
        let src = "class Config:\n    def validate(self):\n        return True\n";
        let tags = extract_tags(src, "a.py", Language::Python).unwrap();
        assert!(tags
            .iter()
            .any(|t| t.name == "Config" && t.kind == TagKind::ClassDefinition));
        assert!(tags
            .iter()
            .any(|t| t.name == "validate" && t.kind == TagKind::FunctionDefinition));
    }
}
