// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval workflow state.

use serde::{Deserialize, Serialize};

use crate::types::{SearchContext, SearchHit, SearchSource};

/// Strategy selection for one query, with the scores that drove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub lexical_score: u32,
    pub semantic_score: u32,
    pub use_lexical: bool,
    pub use_semantic: bool,
    /// Human-readable signals that contributed to the scores.
    pub reasons: Vec<String>,
}

impl RoutingDecision {
    /// Selected sources, lexical first.
    pub fn sources(&self) -> Vec<SearchSource> {
        let mut out = Vec::with_capacity(2);
        if self.use_lexical {
            out.push(SearchSource::Lexical);
        }
        if self.use_semantic {
            out.push(SearchSource::Semantic);
        }
        out
    }

    /// `hybrid`, `lexical`, `semantic`, or `none`.
    pub fn strategy_label(&self) -> &'static str {
        match (self.use_lexical, self.use_semantic) {
            (true, true) => "hybrid",
            (true, false) => "lexical",
            (false, true) => "semantic",
            (false, false) => "none",
        }
    }
}

/// A merged result with per-source provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Combined score in `[0, 1]`.
    pub score: f64,
    pub lexical_score: Option<f64>,
    pub semantic_score: Option<f64>,
    pub sources: Vec<SearchSource>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A strategy that was selected but did not produce results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: SearchSource,
    pub message: String,
}

/// Wall-clock time spent per strategy, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalTimings {
    pub lexical_ms: Option<u64>,
    pub semantic_ms: Option<u64>,
    pub total_ms: u64,
}

/// Everything one hybrid search produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalState {
    pub query: String,
    pub context: SearchContext,
    pub decision: RoutingDecision,
    pub lexical_results: Vec<SearchHit>,
    pub semantic_results: Vec<SearchHit>,
    /// Merged results, sorted by score descending.
    pub combined: Vec<ScoredHit>,
    /// Sources that answered without error.
    pub used_sources: Vec<SearchSource>,
    pub failures: Vec<SourceFailure>,
    pub timings: RetrievalTimings,
}

impl RetrievalState {
    /// True when every selected strategy failed.
    pub fn all_failed(&self) -> bool {
        let selected = self.decision.sources().len();
        selected > 0 && self.failures.len() >= selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(lex: bool, sem: bool) -> RoutingDecision {
        RoutingDecision {
            lexical_score: 0,
            semantic_score: 0,
            use_lexical: lex,
            use_semantic: sem,
            reasons: Vec::new(),
        }
    }

    #[test]
    fn strategy_labels() {
        assert_eq!(decision(true, true).strategy_label(), "hybrid");
        assert_eq!(decision(true, false).strategy_label(), "lexical");
        assert_eq!(decision(false, true).strategy_label(), "semantic");
        assert_eq!(
            decision(true, true).sources(),
            vec![SearchSource::Lexical, SearchSource::Semantic]
        );
    }

    #[test]
    fn all_failed_requires_every_selected_source() {
        let mut state = RetrievalState {
            query: "q".into(),
            context: SearchContext::General,
            decision: decision(true, true),
            lexical_results: Vec::new(),
            semantic_results: Vec::new(),
            combined: Vec::new(),
            used_sources: Vec::new(),
            failures: vec![SourceFailure {
                source: SearchSource::Semantic,
                message: "timeout".into(),
            }],
            timings: RetrievalTimings::default(),
        };
        assert!(!state.all_failed());
        state.failures.push(SourceFailure {
            source: SearchSource::Lexical,
            message: "down".into(),
        });
        assert!(state.all_failed());
    }
}
