//! TF-IDF Matcher (spec §4.9).
//!
//! Ranks identifiers by cosine similarity of TF-IDF vectors built over the same
//! camelCase/snake_case/kebab-case token splitter as the Fuzzy Matcher. The smoothed
//! IDF formula is carried over unchanged from this crate's own `TermDocFreq::idf`.

use std::collections::HashMap;

use crate::fuzzy::tokenize_identifier;
use crate::types::Identifier;

const MIN_TOKEN_LEN: usize = 2;

fn tokens_for(name: &str) -> Vec<String> {
    tokenize_identifier(name)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Document-frequency table over a project's identifier corpus (spec §4.9
/// "Document model"). Each identifier is one document.
pub struct Corpus {
    total_docs: usize,
    doc_freq: HashMap<String, usize>,
    /// Precomputed TF-IDF vector per identifier name.
    vectors: HashMap<String, HashMap<String, f64>>,
}

impl Corpus {
    pub fn build(identifiers: &[Identifier]) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_lists: Vec<(String, Vec<String>)> = Vec::with_capacity(identifiers.len());

        for ident in identifiers {
            let terms = tokens_for(&ident.name);
            let unique: std::collections::HashSet<&String> = terms.iter().collect();
            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_lists.push((ident.name.clone(), terms));
        }

        let total_docs = identifiers.len();
        let corpus = Self { total_docs, doc_freq, vectors: HashMap::new() };

        let vectors = term_lists
            .into_iter()
            .map(|(name, terms)| {
                let vector = corpus.vectorize(&terms);
                (name, vector)
            })
            .collect();

        Self { vectors, ..corpus }
    }

    /// Smoothed IDF: `log((N+1)/(df+1)) + 1` (spec §4.9).
    fn idf(&self, term: &str) -> f64 {
        let df = self.doc_freq.get(term).copied().unwrap_or(0);
        ((self.total_docs as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0
    }

    fn vectorize(&self, terms: &[String]) -> HashMap<String, f64> {
        let mut tf: HashMap<String, f64> = HashMap::new();
        for term in terms {
            *tf.entry(term.clone()).or_insert(0.0) += 1.0;
        }
        tf.into_iter().map(|(term, count)| (term.clone(), count * self.idf(&term))).collect()
    }

    fn query_vector(&self, query: &str) -> HashMap<String, f64> {
        self.vectorize(&tokens_for(query))
    }
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = shorter.iter().filter_map(|(k, v)| longer.get(k).map(|w| v * w)).sum();
    let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfidfMatch {
    pub identifier: String,
    pub score: f64,
}

/// Rank `identifiers` against `query` by TF-IDF cosine similarity (spec §4.9),
/// filtered to `threshold` and capped at `top_k`.
pub fn search(corpus: &Corpus, query: &str, threshold: f64, top_k: usize) -> Vec<TfidfMatch> {
    let query_vector = corpus.query_vector(query);
    if query_vector.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<TfidfMatch> = corpus
        .vectors
        .iter()
        .filter_map(|(name, vector)| {
            let score = cosine_similarity(&query_vector, vector);
            (score >= threshold && score > 0.0).then_some(TfidfMatch { identifier: name.clone(), score })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    matches.truncate(top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Identifier {
        Identifier { name: name.to_string(), kind_set: vec![], defining_files: vec![], referencing_files: vec![] }
    }

    #[test]
    fn exact_token_overlap_scores_highest() {
        let idents = vec![ident("get_user_name"), ident("set_user_name"), ident("delete_file")];
        let corpus = Corpus::build(&idents);
        let results = search(&corpus, "get user", 0.0, 10);
        assert_eq!(results[0].identifier, "get_user_name");
    }

    #[test]
    fn rare_shared_term_ranks_above_common_term() {
        let idents = vec![
            ident("parse_json"),
            ident("parse_yaml"),
            ident("parse_toml"),
            ident("parse_config_xml"),
        ];
        let corpus = Corpus::build(&idents);
        let results = search(&corpus, "xml", 0.0, 10);
        assert_eq!(results[0].identifier, "parse_config_xml");
    }

    #[test]
    fn empty_corpus_yields_no_matches() {
        let corpus = Corpus::build(&[]);
        assert!(search(&corpus, "anything", 0.0, 10).is_empty());
    }

    #[test]
    fn top_k_caps_result_count() {
        let idents = vec![ident("get_a"), ident("get_b"), ident("get_c")];
        let corpus = Corpus::build(&idents);
        let results = search(&corpus, "get", 0.0, 2);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn short_tokens_are_dropped_as_stop_tokens() {
        assert_eq!(tokens_for("a_get_b"), vec!["get".to_string()]);
    }
}
