// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weighted merge of lexical and semantic hits.

use std::cmp::Ordering;
use std::collections::HashMap;

use deskflow_config::model::RetrievalConfig;
use deskflow_core::state::ScoredHit;
use deskflow_core::types::{SearchHit, SearchSource};

/// Per-call search options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub limit: usize,
    pub vector_weight: f64,
    pub bm25_weight: f64,
    /// Minimum semantic similarity kept before merging.
    pub threshold: f64,
}

impl SearchOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            limit: config.limit,
            vector_weight: config.vector_weight,
            bm25_weight: config.bm25_weight,
            threshold: config.threshold,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

/// Merges both hit lists into one ranking.
///
/// Items are deduplicated by id (a source repeating an id keeps its best
/// score). An item found by both sources scores
/// `lexical * bm25_weight + semantic * vector_weight`; a single-source item
/// scores that source's weighted term alone. Scores are not normalized, so
/// raw BM25 scores above 1 keep their order. Non-finite raw scores count as
/// zero. Semantic hits under `threshold` are dropped first. Output is sorted by score descending,
/// ties broken by id, and truncated to `limit`.
pub fn merge(
    lexical: &[SearchHit],
    semantic: &[SearchHit],
    options: &SearchOptions,
) -> Vec<ScoredHit> {
    let mut merged: HashMap<&str, ScoredHit> = HashMap::new();

    for hit in lexical {
        let entry = merged.entry(hit.id.as_str()).or_insert_with(|| blank(hit));
        entry.lexical_score = Some(best(entry.lexical_score, hit.score));
    }
    for hit in semantic.iter().filter(|h| h.score >= options.threshold) {
        let entry = merged.entry(hit.id.as_str()).or_insert_with(|| blank(hit));
        entry.semantic_score = Some(best(entry.semantic_score, hit.score));
    }

    let mut out: Vec<ScoredHit> = merged
        .into_values()
        .map(|mut item| {
            let lexical = item.lexical_score.map(|s| s * options.bm25_weight);
            let semantic = item.semantic_score.map(|s| s * options.vector_weight);
            item.score = lexical.unwrap_or(0.0) + semantic.unwrap_or(0.0);
            if lexical.is_some() {
                item.sources.push(SearchSource::Lexical);
            }
            if semantic.is_some() {
                item.sources.push(SearchSource::Semantic);
            }
            item
        })
        .collect();

    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    out.truncate(options.limit);
    out
}

fn blank(hit: &SearchHit) -> ScoredHit {
    ScoredHit {
        id: hit.id.clone(),
        title: hit.title.clone(),
        content: hit.content.clone(),
        score: 0.0,
        lexical_score: None,
        semantic_score: None,
        sources: Vec::with_capacity(2),
        metadata: hit.metadata.clone(),
    }
}

fn best(current: Option<f64>, score: f64) -> f64 {
    let score = if score.is_finite() { score } else { 0.0 };
    current.map_or(score, |c| c.max(score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            title: id.to_uppercase(),
            content: String::new(),
            score,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn shared_items_combine_weighted_scores() {
        let options = SearchOptions::default();
        let merged = merge(
            &[hit("a", 1.0), hit("b", 0.5)],
            &[hit("a", 0.5), hit("c", 0.9)],
            &options,
        );
        assert_eq!(merged.len(), 3);
        let a = merged.iter().find(|h| h.id == "a").unwrap();
        assert!((a.score - (1.0 * 0.4 + 0.5 * 0.6)).abs() < 1e-9);
        assert_eq!(a.sources, vec![SearchSource::Lexical, SearchSource::Semantic]);

        let c = merged.iter().find(|h| h.id == "c").unwrap();
        assert!((c.score - 0.54).abs() < 1e-9);
        assert_eq!(c.lexical_score, None);
        assert_eq!(merged[0].id, "a");
    }

    #[test]
    fn semantic_hits_below_threshold_are_dropped() {
        let options = SearchOptions {
            threshold: 0.3,
            ..SearchOptions::default()
        };
        let merged = merge(&[], &[hit("low", 0.2), hit("ok", 0.3)], &options);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "ok");
    }

    #[test]
    fn ties_are_broken_by_id_and_limit_applies() {
        let options = SearchOptions {
            limit: 2,
            ..SearchOptions::default()
        };
        let merged = merge(&[hit("z", 0.5), hit("m", 0.5), hit("a", 0.5)], &[], &options);
        let ids: Vec<&str> = merged.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m"]);
    }

    #[test]
    fn repeated_id_within_a_source_keeps_best_score() {
        let merged = merge(
            &[hit("a", 0.2), hit("a", 0.8)],
            &[],
            &SearchOptions::default(),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].lexical_score, Some(0.8));
    }

    #[test]
    fn non_finite_scores_count_as_zero() {
        let merged = merge(
            &[hit("a", 7.0), hit("b", f64::NAN), hit("c", f64::INFINITY)],
            &[],
            &SearchOptions::default(),
        );
        assert_eq!(merged[0].lexical_score, Some(7.0));
        assert_eq!(merged[1].id, "b");
        assert_eq!(merged[1].score, 0.0);
        assert_eq!(merged[2].lexical_score, Some(0.0));
    }

    #[test]
    fn unit_weights_keep_scores_above_one() {
        let options = SearchOptions {
            vector_weight: 1.0,
            bm25_weight: 1.0,
            ..SearchOptions::default()
        };
        let merged = merge(
            &[hit("a", 0.6), hit("z", 0.9)],
            &[hit("a", 0.5), hit("z", 0.9)],
            &options,
        );
        assert_eq!(merged[0].id, "z");
        assert!((merged[0].score - 1.8).abs() < 1e-9);
        assert!((merged[1].score - 1.1).abs() < 1e-9);
    }

    #[test]
    fn raw_bm25_scores_keep_their_order() {
        let merged = merge(
            &[hit("low", 3.0), hit("high", 12.0)],
            &[],
            &SearchOptions::default(),
        );
        assert_eq!(merged[0].id, "high");
        assert!((merged[0].score - 4.8).abs() < 1e-9);
        assert!((merged[1].score - 1.2).abs() < 1e-9);
    }

    fn hits() -> impl Strategy<Value = Vec<SearchHit>> {
        prop::collection::vec(("[a-f]{1,2}", 0.0f64..=1.0), 0..20).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(id, score)| hit(&id, score))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn merged_is_sorted_unique_and_bounded(
            lexical in hits(),
            semantic in hits(),
            limit in 0usize..15,
        ) {
            let options = SearchOptions { limit, ..SearchOptions::default() };
            let merged = merge(&lexical, &semantic, &options);

            prop_assert!(merged.len() <= limit);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            let ids: HashSet<&str> = merged.iter().map(|h| h.id.as_str()).collect();
            prop_assert_eq!(ids.len(), merged.len());
            for item in &merged {
                prop_assert!(item.score.is_finite() && item.score >= 0.0);
                prop_assert!(!item.sources.is_empty());
            }
        }
    }
}
