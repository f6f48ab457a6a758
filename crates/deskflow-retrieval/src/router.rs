// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent hybrid search over a lexical and a semantic backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use deskflow_config::model::RetrievalConfig;
use deskflow_core::state::{RetrievalState, RetrievalTimings, RoutingDecision, SourceFailure};
use deskflow_core::types::{SearchContext, SearchHit, SearchQuery, SearchSource};
use deskflow_core::{DeskflowError, SearchBackend};

use crate::decision::decide;
use crate::merge::{SearchOptions, merge};

/// What one selected strategy produced.
struct StrategyOutcome {
    result: Result<Vec<SearchHit>, DeskflowError>,
    elapsed: Duration,
}

/// Routes each query to lexical, semantic or both backends and merges the answers.
///
/// Selected strategies run concurrently. A strategy that errors or exceeds
/// its timeout contributes zero results and a [`SourceFailure`]; it never
/// fails the other strategy or the search as a whole.
pub struct HybridSearchRouter {
    lexical: Arc<dyn SearchBackend>,
    semantic: Arc<dyn SearchBackend>,
    defaults: SearchOptions,
    strategy_timeout: Duration,
}

impl HybridSearchRouter {
    pub fn new(
        lexical: Arc<dyn SearchBackend>,
        semantic: Arc<dyn SearchBackend>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            lexical,
            semantic,
            defaults: SearchOptions::from_config(config),
            strategy_timeout: config.strategy_timeout(),
        }
    }

    pub fn defaults(&self) -> &SearchOptions {
        &self.defaults
    }

    /// Searches with the configured default options.
    pub async fn search(&self, query: &str, context: SearchContext) -> RetrievalState {
        self.search_with(query, context, self.defaults).await
    }

    /// Searches with explicit options.
    pub async fn search_with(
        &self,
        query: &str,
        context: SearchContext,
        options: SearchOptions,
    ) -> RetrievalState {
        let started = Instant::now();
        let text = query.trim();
        if text.is_empty() {
            debug!("empty query, no strategy invoked");
            return empty_state(text, context);
        }

        let decision = decide(text, context);
        debug!(
            strategy = decision.strategy_label(),
            lexical_score = decision.lexical_score,
            semantic_score = decision.semantic_score,
            %context,
            "retrieval strategy selected"
        );

        let lexical_query = SearchQuery {
            text: text.to_string(),
            context,
            limit: options.limit,
            min_score: None,
        };
        let semantic_query = SearchQuery {
            min_score: Some(options.threshold),
            ..lexical_query.clone()
        };

        let (lexical, semantic) = tokio::join!(
            self.run(self.lexical.as_ref(), decision.use_lexical, &lexical_query),
            self.run(self.semantic.as_ref(), decision.use_semantic, &semantic_query),
        );

        let mut failures = Vec::new();
        let mut used_sources = Vec::new();
        let mut timings = RetrievalTimings::default();
        let lexical_results = collect(
            SearchSource::Lexical,
            lexical,
            &mut timings.lexical_ms,
            &mut used_sources,
            &mut failures,
        );
        let semantic_results = collect(
            SearchSource::Semantic,
            semantic,
            &mut timings.semantic_ms,
            &mut used_sources,
            &mut failures,
        );

        let combined = merge(&lexical_results, &semantic_results, &options);
        timings.total_ms = elapsed_ms(started.elapsed());
        debug!(
            results = combined.len(),
            failures = failures.len(),
            total_ms = timings.total_ms,
            "hybrid search finished"
        );

        RetrievalState {
            query: text.to_string(),
            context,
            decision,
            lexical_results,
            semantic_results,
            combined,
            used_sources,
            failures,
            timings,
        }
    }

    async fn run(
        &self,
        backend: &dyn SearchBackend,
        selected: bool,
        query: &SearchQuery,
    ) -> Option<StrategyOutcome> {
        if !selected {
            return None;
        }
        let started = Instant::now();
        let result = tokio::time::timeout(self.strategy_timeout, backend.search(query))
            .await
            .unwrap_or(Err(DeskflowError::Timeout {
                duration: self.strategy_timeout,
            }));
        Some(StrategyOutcome {
            result,
            elapsed: started.elapsed(),
        })
    }
}

fn collect(
    source: SearchSource,
    outcome: Option<StrategyOutcome>,
    timing: &mut Option<u64>,
    used: &mut Vec<SearchSource>,
    failures: &mut Vec<SourceFailure>,
) -> Vec<SearchHit> {
    let Some(outcome) = outcome else {
        return Vec::new();
    };
    *timing = Some(elapsed_ms(outcome.elapsed));
    match outcome.result {
        Ok(hits) => {
            used.push(source);
            hits
        }
        Err(e) => {
            warn!(%source, error = %e, "retrieval strategy failed");
            failures.push(SourceFailure {
                source,
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn empty_state(query: &str, context: SearchContext) -> RetrievalState {
    RetrievalState {
        query: query.to_string(),
        context,
        decision: RoutingDecision {
            lexical_score: 0,
            semantic_score: 0,
            use_lexical: false,
            use_semantic: false,
            reasons: vec!["empty query".to_string()],
        },
        lexical_results: Vec::new(),
        semantic_results: Vec::new(),
        combined: Vec::new(),
        used_sources: Vec::new(),
        failures: Vec::new(),
        timings: RetrievalTimings::default(),
    }
}
