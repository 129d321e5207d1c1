//! Fuzzy Matcher (spec §4.8).
//!
//! Scores identifiers against a query with four independent strategies — prefix,
//! substring, edit distance, word overlap — combined by max. Grounded on this
//! crate's own prior FZF v2 implementation: `char_class`/boundary detection supplies
//! the camelCase/snake_case/kebab-case tokenizer reused here for word overlap.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::Identifier;

#[derive(Clone, Copy, PartialEq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
    Delimiter,
}

fn char_class(c: char) -> CharClass {
    match c {
        'a'..='z' => CharClass::Lower,
        'A'..='Z' => CharClass::Upper,
        '0'..='9' => CharClass::Digit,
        _ => CharClass::Delimiter,
    }
}

/// Split an identifier into lowercase tokens on camelCase/PascalCase boundaries and
/// snake_case/kebab-case delimiters. Shared by the word-overlap strategy here and by
/// the TF-IDF Matcher's document model (spec §4.9 requires "the same splitter").
pub fn tokenize_identifier(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let class = char_class(c);
        if class == CharClass::Delimiter {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }

        if i > 0 {
            let prev_class = char_class(chars[i - 1]);
            let is_boundary = matches!(
                (prev_class, class),
                (CharClass::Lower, CharClass::Upper) | (CharClass::Digit, CharClass::Lower | CharClass::Upper)
            ) || (prev_class == CharClass::Upper
                && class == CharClass::Upper
                && i + 1 < chars.len()
                && char_class(chars[i + 1]) == CharClass::Lower);

            if is_boundary && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// One of spec §4.8's four configurable strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FuzzyStrategy {
    Prefix,
    Substring,
    EditDistance,
    WordOverlap,
}

/// Strategy selection and score floor for a fuzzy query (spec §4.8 "Combination").
#[derive(Debug, Clone)]
pub struct FuzzyConfig {
    pub enabled: HashSet<FuzzyStrategy>,
    pub threshold: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            enabled: HashSet::from([
                FuzzyStrategy::Prefix,
                FuzzyStrategy::Substring,
                FuzzyStrategy::EditDistance,
                FuzzyStrategy::WordOverlap,
            ]),
            threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub identifier: String,
    pub score: f64,
}

fn prefix_score(query: &str, identifier: &str) -> f64 {
    if identifier.to_lowercase().starts_with(&query.to_lowercase()) {
        1.0
    } else {
        0.0
    }
}

fn substring_score(query: &str, identifier: &str) -> f64 {
    let (q, ident) = (query.to_lowercase(), identifier.to_lowercase());
    match ident.find(&q) {
        Some(pos) => 1.0 - (pos as f64 / ident.len().max(1) as f64),
        None => 0.0,
    }
}

/// Classic Levenshtein edit distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }

    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];

    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

fn edit_distance_score(query: &str, identifier: &str) -> f64 {
    let max_len = query.chars().count().max(identifier.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let dist = levenshtein(&query.to_lowercase(), &identifier.to_lowercase());
    1.0 - (dist as f64 / max_len as f64)
}

fn word_overlap_score(query_tokens: &HashSet<String>, identifier: &str) -> f64 {
    let ident_tokens: HashSet<String> = tokenize_identifier(identifier).into_iter().collect();
    if query_tokens.is_empty() || ident_tokens.is_empty() {
        return 0.0;
    }
    let intersection = query_tokens.intersection(&ident_tokens).count();
    let union = query_tokens.union(&ident_tokens).count();
    intersection as f64 / union as f64
}

/// Score and rank `identifiers` against `query` (spec §4.8). Per-identifier score is
/// the max over enabled strategies; results are sorted by score descending, stable by
/// name ascending, and filtered to `config.threshold`.
pub fn search(identifiers: &[Identifier], query: &str, config: &FuzzyConfig) -> Vec<FuzzyMatch> {
    let query_tokens: HashSet<String> = tokenize_identifier(query).into_iter().collect();

    let mut matches: Vec<FuzzyMatch> = identifiers
        .iter()
        .filter_map(|ident| {
            let mut best = 0.0_f64;
            if config.enabled.contains(&FuzzyStrategy::Prefix) {
                best = best.max(prefix_score(query, &ident.name));
            }
            if config.enabled.contains(&FuzzyStrategy::Substring) {
                best = best.max(substring_score(query, &ident.name));
            }
            if config.enabled.contains(&FuzzyStrategy::EditDistance) {
                best = best.max(edit_distance_score(query, &ident.name));
            }
            if config.enabled.contains(&FuzzyStrategy::WordOverlap) {
                best = best.max(word_overlap_score(&query_tokens, &ident.name));
            }
            (best >= config.threshold && best > 0.0).then_some(FuzzyMatch {
                identifier: ident.name.clone(),
                score: best,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Identifier {
        Identifier {
            name: name.to_string(),
            kind_set: vec![],
            defining_files: vec![],
            referencing_files: vec![],
        }
    }

    #[test]
    fn tokenizes_camel_snake_and_kebab() {
        assert_eq!(tokenize_identifier("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(tokenize_identifier("get_user_name"), vec!["get", "user", "name"]);
        assert_eq!(tokenize_identifier("get-user-name"), vec!["get", "user", "name"]);
        assert_eq!(tokenize_identifier("HTTPServer"), vec!["http", "server"]);
    }

    #[test]
    fn prefix_match_scores_one() {
        let idents = vec![ident("getUser"), ident("setUser")];
        let config = FuzzyConfig::default();
        let results = search(&idents, "get", &config);
        assert_eq!(results[0].identifier, "getUser");
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn word_overlap_matches_reordered_tokens() {
        let idents = vec![ident("name_user_get")];
        let mut config = FuzzyConfig::default();
        config.enabled = HashSet::from([FuzzyStrategy::WordOverlap]);
        let results = search(&idents, "get user name", &config);
        assert_eq!(results[0].score, 1.0);
    }

    #[test]
    fn no_match_is_excluded() {
        let idents = vec![ident("completely_unrelated")];
        let mut config = FuzzyConfig::default();
        config.enabled = HashSet::from([FuzzyStrategy::Prefix, FuzzyStrategy::Substring]);
        let results = search(&idents, "xyz123", &config);
        assert!(results.is_empty());
    }

    #[test]
    fn results_sorted_by_score_then_name() {
        let idents = vec![ident("zget"), ident("aget"), ident("get")];
        let config = FuzzyConfig::default();
        let results = search(&idents, "get", &config);
        assert_eq!(results[0].identifier, "get");
        assert_eq!(results[1].identifier, "aget");
        assert_eq!(results[2].identifier, "zget");
    }

    #[test]
    fn threshold_filters_low_scores() {
        let idents = vec![ident("completely_different_word")];
        let config = FuzzyConfig { enabled: HashSet::from([FuzzyStrategy::EditDistance]), threshold: 0.9 };
        let results = search(&idents, "get", &config);
        assert!(results.is_empty());
    }
}
