//! Identifier Extractor (spec §4 "Identifier Extractor (5%)").
//!
//! Thin projection of a tag stream into the set of identifier names and their kinds,
//! consumed independently by the matchers (§4.8–§4.11).

use std::collections::HashMap;

use crate::types::{Identifier, Tag, TagKind};

/// Fold a project-wide tag stream into one `Identifier` per unique name.
pub fn build_identifiers<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> Vec<Identifier> {
    let mut by_name: HashMap<String, Identifier> = HashMap::new();

    for tag in tags {
        let entry = by_name.entry(tag.name.clone()).or_insert_with(|| Identifier {
            name: tag.name.clone(),
            kind_set: Vec::new(),
            defining_files: Vec::new(),
            referencing_files: Vec::new(),
        });

        if !entry.kind_set.contains(&tag.kind) {
            entry.kind_set.push(tag.kind);
        }

        let files = if tag.kind.is_definition() {
            &mut entry.defining_files
        } else {
            &mut entry.referencing_files
        };
        if !files.iter().any(|f| f == &tag.file_path) {
            files.push(tag.file_path.clone());
        }
    }

    let mut identifiers: Vec<Identifier> = by_name.into_values().collect();
    identifiers.sort_by(|a, b| a.name.cmp(&b.name));
    identifiers
}
