//! Tag Cache (spec §4.1).
//!
//! Persistent, content-addressed tag store: `get(path)` hits iff mtime and SHA-256 of
//! current bytes both match the stored `FileRecord`; `put(path, tags)` is an atomic
//! delete-then-insert. No teacher equivalent exists (the teacher re-parses on every
//! request); grounded on
//! `examples/josongsong-semantica-codegraph/packages/codegraph-storage/Cargo.toml`'s
//! rusqlite+sha2 pairing for exactly this kind of content-hash-keyed cache.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::{FileRecord, Language, Tag, TagKind};

const SCHEMA_VERSION: i64 = 1;

/// Single-writer, many-reader persistent tag store (spec §4.1, §5).
pub struct TagCache {
    conn: Mutex<Connection>,
}

/// Cache counters for `stats()` (spec §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub file_count: usize,
    pub tag_count: usize,
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn tag_kind_to_str(kind: TagKind) -> &'static str {
    match kind {
        TagKind::ClassDefinition => "class.definition",
        TagKind::FunctionDefinition => "function.definition",
        TagKind::FunctionReference => "function.reference",
        TagKind::VariableDeclaration => "variable.declaration",
        TagKind::ImportModule => "import.module",
    }
}

fn tag_kind_from_str(s: &str) -> Option<TagKind> {
    match s {
        "class.definition" => Some(TagKind::ClassDefinition),
        "function.definition" => Some(TagKind::FunctionDefinition),
        "function.reference" => Some(TagKind::FunctionReference),
        "variable.declaration" => Some(TagKind::VariableDeclaration),
        "import.module" => Some(TagKind::ImportModule),
        _ => None,
    }
}

fn language_to_str(lang: Language) -> &'static str {
    lang.label()
}

fn language_from_str(s: &str) -> Option<Language> {
    use Language::*;
    Some(match s {
        "python" => Python,
        "javascript" => JavaScript,
        "typescript" => TypeScript,
        "go" => Go,
        "java" => Java,
        "csharp" => CSharp,
        "rust" => Rust,
        "c" => C,
        "cpp" => Cpp,
        _ => return None,
    })
}

/// SHA-256 of file bytes, hex-encoded (spec §3: FileRecord.content_hash).
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl TagCache {
    /// Open (creating if absent) the cache database at `cache_dir/tags.sqlite3`.
    /// A `schema_version` mismatch clears the cache before use (spec §6).
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let db_path = cache_dir.join("tags.sqlite3");
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory cache, useful for tests and one-shot analyses.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
        )?;
        let stored_version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .ok();

        let needs_reset = match stored_version {
            Some(v) => v != SCHEMA_VERSION.to_string(),
            None => false,
        };

        if needs_reset {
            conn.execute_batch("DROP TABLE IF EXISTS tags; DROP TABLE IF EXISTS file_records;")?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS file_records (
                file_path TEXT PRIMARY KEY,
                content_hash TEXT NOT NULL,
                mtime INTEGER NOT NULL,
                language TEXT NOT NULL,
                cached_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_record TEXT NOT NULL REFERENCES file_records(file_path) ON DELETE CASCADE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                start_col INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                end_col INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tags_file ON tags(file_record);
            PRAGMA foreign_keys = ON;",
        )?;

        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![SCHEMA_VERSION.to_string()],
        )?;

        Ok(())
    }

    /// Returns cached tags for `path` iff the stored mtime and content hash both match
    /// the file's current state (spec §4.1 coherence rules). Any storage error is
    /// treated as a cache miss.
    pub fn get(&self, rel_path: &str, abs_path: &Path) -> Option<Vec<Tag>> {
        let metadata = std::fs::metadata(abs_path).ok()?;
        let current_mtime = metadata
            .modified()
            .ok()?
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs() as i64;

        let conn = self.conn.lock().ok()?;
        let record: Option<(String, i64)> = conn
            .query_row(
                "SELECT content_hash, mtime FROM file_records WHERE file_path = ?1",
                params![rel_path],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        let (stored_hash, stored_mtime) = record?;
        if current_mtime > stored_mtime {
            return None;
        }

        let bytes = std::fs::read(abs_path).ok()?;
        if hash_bytes(&bytes) != stored_hash {
            return None;
        }

        let mut stmt = conn
            .prepare(
                "SELECT name, kind, start_line, start_col, end_line, end_col
                 FROM tags WHERE file_record = ?1 ORDER BY start_line, start_col",
            )
            .ok()?;
        let rows = stmt
            .query_map(params![rel_path], |row| {
                let kind_str: String = row.get(1)?;
                Ok((
                    row.get::<_, String>(0)?,
                    kind_str,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .ok()?;

        let mut tags = Vec::new();
        for row in rows {
            let (name, kind_str, start_line, start_col, end_line, end_col) = row.ok()?;
            let kind = tag_kind_from_str(&kind_str)?;
            tags.push(Tag {
                name,
                kind,
                file_path: rel_path.to_string(),
                start_line: start_line as u32,
                start_column: start_col as u32,
                end_line: end_line as u32,
                end_column: end_col as u32,
            });
        }
        Some(tags)
    }

    /// Atomic replace: delete the existing FileRecord (cascading to its tags) then
    /// insert the new record and tags, all in one transaction (spec §4.1).
    pub fn put(
        &self,
        rel_path: &str,
        content_hash: &str,
        mtime: i64,
        language: Language,
        tags: &[Tag],
    ) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| Error::Internal("cache mutex poisoned".into()))?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM file_records WHERE file_path = ?1",
            params![rel_path],
        )?;

        tx.execute(
            "INSERT INTO file_records (file_path, content_hash, mtime, language, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![rel_path, content_hash, mtime, language_to_str(language), now_unix()],
        )?;

        for tag in tags {
            tx.execute(
                "INSERT INTO tags (file_record, name, kind, start_line, start_col, end_line, end_col)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rel_path,
                    tag.name,
                    tag_kind_to_str(tag.kind),
                    tag.start_line,
                    tag.start_column,
                    tag.end_line,
                    tag.end_column,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Remove a single file's record and tags (cascade delete).
    pub fn invalidate(&self, rel_path: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::Internal("cache mutex poisoned".into()))?;
        conn.execute(
            "DELETE FROM file_records WHERE file_path = ?1",
            params![rel_path],
        )?;
        Ok(())
    }

    /// Drop every record and tag.
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::Internal("cache mutex poisoned".into()))?;
        conn.execute_batch("DELETE FROM tags; DELETE FROM file_records;")?;
        Ok(())
    }

    /// Cache counters (spec §6 `stats()`).
    pub fn stats(&self) -> CacheStats {
        let conn = match self.conn.lock() {
            Ok(c) => c,
            Err(_) => return CacheStats::default(),
        };
        let file_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM file_records", [], |r| r.get(0))
            .unwrap_or(0);
        let tag_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap_or(0);
        CacheStats {
            file_count: file_count as usize,
            tag_count: tag_count as usize,
        }
    }

    /// Fetch the raw `FileRecord` metadata for a path, if present.
    pub fn file_record(&self, rel_path: &str) -> Option<FileRecord> {
        let conn = self.conn.lock().ok()?;
        conn.query_row(
            "SELECT file_path, content_hash, mtime, language, cached_at
             FROM file_records WHERE file_path = ?1",
            params![rel_path],
            |row| {
                let lang_str: String = row.get(3)?;
                Ok(FileRecord {
                    file_path: row.get(0)?,
                    content_hash: row.get(1)?,
                    mtime: row.get(2)?,
                    language: language_from_str(&lang_str).unwrap_or(Language::Rust),
                    cached_at: row.get(4)?,
                })
            },
        )
        .ok()
    }
}
