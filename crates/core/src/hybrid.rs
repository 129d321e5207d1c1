//! Hybrid Ranker (spec §4.11).
//!
//! Combines per-strategy score vectors (fuzzy, TF-IDF, embedding) into one ranking.
//! New: no teacher equivalent combines multiple independent scorers this way — the
//! teacher's `fuzzy::run_search` and `grep_relevance_score` are each single-strategy.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
pub struct HybridWeights {
    pub fuzzy: f64,
    pub tfidf: f64,
    pub embedding: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self { fuzzy: 0.5, tfidf: 0.3, embedding: 0.2 }
    }
}

#[derive(Debug, Clone)]
pub struct HybridConfig {
    pub weights: HybridWeights,
    pub threshold: f64,
    pub top_k: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self { weights: HybridWeights::default(), threshold: 0.3, top_k: 50 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HybridMatch {
    pub identifier: String,
    pub composite: f64,
    pub fuzzy: f64,
    pub tfidf: f64,
    pub embedding: f64,
}

/// Combine fuzzy/tfidf/embedding score vectors into a final ranking (spec §4.11).
/// Fuzzy and TF-IDF are always-on matchers — an identifier absent from their score
/// vector contributes `0`, per spec §4.11's "missing = 0", never treated as a disabled
/// component. Only the optional Embedding Matcher can be disabled (spec §4.10, e.g.
/// model load failure), signaled explicitly via `embedding_enabled` rather than
/// inferred from an empty score vector (a query that every identifier legitimately
/// scores 0.0 on would otherwise look indistinguishable from "disabled").
pub fn combine(
    fuzzy_scores: &[(String, f64)],
    tfidf_scores: &[(String, f64)],
    embedding_scores: &[(String, f64)],
    embedding_enabled: bool,
    config: &HybridConfig,
) -> Vec<HybridMatch> {
    let fuzzy_enabled = true;
    let tfidf_enabled = true;

    let weight_sum = [
        fuzzy_enabled.then_some(config.weights.fuzzy),
        tfidf_enabled.then_some(config.weights.tfidf),
        embedding_enabled.then_some(config.weights.embedding),
    ]
    .into_iter()
    .flatten()
    .sum::<f64>();

    if weight_sum <= 0.0 {
        return Vec::new();
    }

    let norm = |w: f64, enabled: bool| if enabled { w / weight_sum } else { 0.0 };
    let w_fuzzy = norm(config.weights.fuzzy, fuzzy_enabled);
    let w_tfidf = norm(config.weights.tfidf, tfidf_enabled);
    let w_embedding = norm(config.weights.embedding, embedding_enabled);

    let fuzzy_map: HashMap<&str, f64> = fuzzy_scores.iter().map(|(n, s)| (n.as_str(), *s)).collect();
    let tfidf_map: HashMap<&str, f64> = tfidf_scores.iter().map(|(n, s)| (n.as_str(), *s)).collect();
    let embedding_map: HashMap<&str, f64> =
        embedding_scores.iter().map(|(n, s)| (n.as_str(), *s)).collect();

    let mut names: Vec<&str> = fuzzy_map
        .keys()
        .chain(tfidf_map.keys())
        .chain(embedding_map.keys())
        .copied()
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut matches: Vec<HybridMatch> = names
        .into_iter()
        .map(|name| {
            let fuzzy = fuzzy_map.get(name).copied().unwrap_or(0.0);
            let tfidf = tfidf_map.get(name).copied().unwrap_or(0.0);
            let embedding = embedding_map.get(name).copied().unwrap_or(0.0);
            let composite = w_fuzzy * fuzzy + w_tfidf * tfidf + w_embedding * embedding;
            HybridMatch { identifier: name.to_string(), composite, fuzzy, tfidf, embedding }
        })
        .filter(|m| m.composite >= config.threshold)
        .collect();

    // Dedup by identifier name keeping max composite (names are already unique from
    // the HashMap-backed union above, so this is a no-op safeguard against callers
    // passing duplicate entries within a single score vector).
    let mut best: HashMap<String, HybridMatch> = HashMap::new();
    for m in matches.drain(..) {
        best.entry(m.identifier.clone())
            .and_modify(|existing| {
                if m.composite > existing.composite {
                    *existing = m.clone();
                }
            })
            .or_insert(m);
    }
    let mut result: Vec<HybridMatch> = best.into_values().collect();

    result.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.fuzzy.partial_cmp(&a.fuzzy).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    result.truncate(config.top_k);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combines_all_three_components_with_default_weights() {
        let fuzzy = vec![("a".to_string(), 1.0)];
        let tfidf = vec![("a".to_string(), 1.0)];
        let embedding = vec![("a".to_string(), 1.0)];
        let results = combine(&fuzzy, &tfidf, &embedding, true, &HybridConfig::default());
        assert_eq!(results.len(), 1);
        assert!((results[0].composite - 1.0).abs() < 1e-9);
    }

    #[test]
    fn renormalizes_when_embedding_disabled() {
        let fuzzy = vec![("a".to_string(), 1.0)];
        let tfidf = vec![("a".to_string(), 1.0)];
        let results = combine(&fuzzy, &tfidf, &[], false, &HybridConfig::default());
        assert!((results[0].composite - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_scoring_always_on_component_is_not_mistaken_for_disabled() {
        // Every identifier legitimately scores 0.0 on fuzzy (e.g. no prefix/substring/
        // edit-distance/word-overlap match), so fuzzy_scores comes back empty. That must
        // not renormalize fuzzy's weight away: it still counts in the weight sum, driving
        // the composite down rather than letting tfidf alone decide it.
        let tfidf = vec![("a".to_string(), 1.0)];
        let config = HybridConfig {
            weights: HybridWeights { fuzzy: 0.5, tfidf: 0.5, embedding: 0.0 },
            threshold: 0.0,
            top_k: 50,
        };
        let results = combine(&[], &tfidf, &[], false, &config);
        let a = results.iter().find(|m| m.identifier == "a").unwrap();
        assert!((a.composite - 0.5).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_is_discarded() {
        let fuzzy = vec![("a".to_string(), 0.1)];
        let results = combine(&fuzzy, &[], &[], false, &HybridConfig::default());
        assert!(results.is_empty());
    }

    #[test]
    fn missing_component_defaults_to_zero() {
        let fuzzy = vec![("a".to_string(), 1.0), ("b".to_string(), 1.0)];
        let tfidf = vec![("a".to_string(), 1.0)];
        let results = combine(&fuzzy, &tfidf, &[], false, &HybridConfig::default());
        let b = results.iter().find(|m| m.identifier == "b").unwrap();
        assert_eq!(b.tfidf, 0.0);
    }

    #[test]
    fn ties_break_by_fuzzy_then_name() {
        let fuzzy = vec![("zeta".to_string(), 0.9), ("alpha".to_string(), 0.9)];
        let config = HybridConfig { threshold: 0.0, ..HybridConfig::default() };
        let results = combine(&fuzzy, &[], &[], false, &config);
        assert_eq!(results[0].identifier, "alpha");
    }

    #[test]
    fn top_k_truncates() {
        let fuzzy: Vec<(String, f64)> =
            (0..10).map(|i| (format!("id{i}"), 1.0 - i as f64 * 0.01)).collect();
        let config = HybridConfig { threshold: 0.0, top_k: 3, ..HybridConfig::default() };
        let results = combine(&fuzzy, &[], &[], false, &config);
        assert_eq!(results.len(), 3);
    }
}
