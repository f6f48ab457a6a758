// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-query choice between lexical and semantic retrieval.
//!
//! Scoring is pure and deterministic. Signals:
//!
//! | signal                                   | lexical | semantic |
//! |------------------------------------------|---------|----------|
//! | context order/ticket/customer lookup     | +3      |          |
//! | context recommendation                   |         | +3       |
//! | context product search                   | +1      | +1       |
//! | each matching lexical pattern group      | +2      |          |
//! | each matching semantic pattern group     |         | +2       |
//! | two words or fewer                       | +1      |          |
//! | five words or more                       |         | +1       |
//!
//! A strategy is selected when its score is positive and at least half of
//! the leading score. With no signal at all, lexical is used unless the
//! context is a recommendation.

use std::sync::LazyLock;

use regex::Regex;

use deskflow_core::state::RoutingDecision;
use deskflow_core::types::SearchContext;

const CONTEXT_WEIGHT: u32 = 3;
const SHARED_CONTEXT_WEIGHT: u32 = 1;
const PATTERN_WEIGHT: u32 = 2;
const LENGTH_WEIGHT: u32 = 1;

struct PatternGroup {
    label: &'static str,
    regex: LazyLock<Regex>,
}

static LEXICAL_PATTERNS: [PatternGroup; 4] = [
    PatternGroup {
        label: "numeric identifier",
        regex: LazyLock::new(|| Regex::new(r"#\d+|\b\d{3,}\b").unwrap()),
    },
    PatternGroup {
        label: "sku or reference code",
        regex: LazyLock::new(|| {
            Regex::new(r"(?i)\b(?:(?:sku|prod|ord)-[a-z0-9]+(?:-[a-z0-9]+)*|t-\d+)\b").unwrap()
        }),
    },
    PatternGroup {
        label: "exact-match language",
        regex: LazyLock::new(|| {
            Regex::new(r"(?i)\b(?:exact|exactly|specific|order number|tracking number|status of)\b")
                .unwrap()
        }),
    },
    PatternGroup {
        label: "email address",
        regex: LazyLock::new(|| {
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
        }),
    },
];

static SEMANTIC_PATTERNS: [PatternGroup; 3] = [
    PatternGroup {
        label: "similarity language",
        regex: LazyLock::new(|| {
            Regex::new(r"(?i)\b(?:similar|alternatives?|comparable|related|resembl\w*)\b").unwrap()
        }),
    },
    PatternGroup {
        label: "vague language",
        regex: LazyLock::new(|| {
            Regex::new(r"(?i)\b(?:something|anything|kind of|sort of|good for|best)\b").unwrap()
        }),
    },
    PatternGroup {
        label: "recommendation language",
        regex: LazyLock::new(|| Regex::new(r"(?i)\b(?:recommend\w*|suggest\w*)\b").unwrap()),
    },
];

#[derive(Default)]
struct Tally {
    lexical: u32,
    semantic: u32,
    reasons: Vec<String>,
}

impl Tally {
    fn lexical(&mut self, points: u32, reason: impl Into<String>) {
        self.lexical += points;
        self.reasons.push(format!("lexical +{points}: {}", reason.into()));
    }

    fn semantic(&mut self, points: u32, reason: impl Into<String>) {
        self.semantic += points;
        self.reasons.push(format!("semantic +{points}: {}", reason.into()));
    }
}

/// Scores a query and selects the strategies to run.
pub fn decide(query: &str, context: SearchContext) -> RoutingDecision {
    let mut tally = Tally::default();

    match context {
        SearchContext::OrderInquiry
        | SearchContext::TicketLookup
        | SearchContext::CustomerLookup => {
            tally.lexical(CONTEXT_WEIGHT, format!("{context} context"));
        }
        SearchContext::Recommendation => {
            tally.semantic(CONTEXT_WEIGHT, format!("{context} context"));
        }
        SearchContext::ProductSearch => {
            tally.lexical(SHARED_CONTEXT_WEIGHT, format!("{context} context"));
            tally.semantic(SHARED_CONTEXT_WEIGHT, format!("{context} context"));
        }
        SearchContext::General => {}
    }

    for group in &LEXICAL_PATTERNS {
        if group.regex.is_match(query) {
            tally.lexical(PATTERN_WEIGHT, group.label);
        }
    }
    for group in &SEMANTIC_PATTERNS {
        if group.regex.is_match(query) {
            tally.semantic(PATTERN_WEIGHT, group.label);
        }
    }

    let words = query.split_whitespace().count();
    if words > 0 && words <= 2 {
        tally.lexical(LENGTH_WEIGHT, format!("short query ({words} words)"));
    } else if words >= 5 {
        tally.semantic(LENGTH_WEIGHT, format!("long query ({words} words)"));
    }

    select(tally, context)
}

fn select(tally: Tally, context: SearchContext) -> RoutingDecision {
    let Tally {
        lexical,
        semantic,
        mut reasons,
    } = tally;
    let lead = lexical.max(semantic);
    let (use_lexical, use_semantic) = if lead == 0 {
        if context == SearchContext::Recommendation {
            reasons.push("no signal: semantic default for recommendations".to_string());
            (false, true)
        } else {
            reasons.push("no signal: lexical default".to_string());
            (true, false)
        }
    } else {
        (
            lexical > 0 && lexical * 2 >= lead,
            semantic > 0 && semantic * 2 >= lead,
        )
    };
    RoutingDecision {
        lexical_score: lexical,
        semantic_score: semantic,
        use_lexical,
        use_semantic,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_in_order_inquiry_is_lexical_only() {
        let d = decide("order #1234", SearchContext::OrderInquiry);
        assert!(d.use_lexical);
        assert!(!d.use_semantic);
        assert_eq!(d.semantic_score, 0);
        assert_eq!(d.strategy_label(), "lexical");
    }

    #[test]
    fn vague_recommendation_is_semantic() {
        let d = decide(
            "something similar to noise-cancelling headphones",
            SearchContext::Recommendation,
        );
        assert!(d.use_semantic);
        assert!(d.semantic_score > d.lexical_score);
        assert!(!d.use_lexical);
    }

    #[test]
    fn no_signal_defaults_to_lexical() {
        let d = decide("shipping info", SearchContext::General);
        assert!(d.use_lexical);
        assert!(!d.use_semantic);

        let d = decide("", SearchContext::General);
        assert_eq!(d.sources().len(), 1);
        assert!(d.use_lexical);
    }

    #[test]
    fn no_signal_recommendation_defaults_to_semantic() {
        let d = decide("any three word", SearchContext::Recommendation);
        assert!(d.use_semantic);
        let d = select(Tally::default(), SearchContext::Recommendation);
        assert!(d.use_semantic);
        assert!(!d.use_lexical);
    }

    #[test]
    fn product_search_with_sku_and_description_is_hybrid() {
        let d = decide(
            "headphones like SKU-100 but something cheaper please",
            SearchContext::ProductSearch,
        );
        assert!(d.use_lexical);
        assert!(d.use_semantic);
        assert_eq!(d.strategy_label(), "hybrid");
    }

    #[test]
    fn weaker_strategy_below_half_is_dropped() {
        let d = select(
            Tally {
                lexical: 7,
                semantic: 3,
                reasons: Vec::new(),
            },
            SearchContext::General,
        );
        assert!(d.use_lexical);
        assert!(!d.use_semantic);

        let d = select(
            Tally {
                lexical: 6,
                semantic: 3,
                reasons: Vec::new(),
            },
            SearchContext::General,
        );
        assert!(d.use_semantic);
    }

    #[test]
    fn reasons_explain_the_scores() {
        let d = decide("order #1234", SearchContext::OrderInquiry);
        assert!(d.reasons.iter().any(|r| r.contains("numeric identifier")));
        assert!(d.reasons.iter().any(|r| r.contains("order_inquiry context")));
    }

    #[test]
    fn at_least_one_strategy_is_always_selected() {
        let contexts = [
            SearchContext::OrderInquiry,
            SearchContext::TicketLookup,
            SearchContext::CustomerLookup,
            SearchContext::ProductSearch,
            SearchContext::Recommendation,
            SearchContext::General,
        ];
        for context in contexts {
            for query in ["", "x", "order 1234", "something nice for my dad please"] {
                assert!(!decide(query, context).sources().is_empty(), "{query} {context}");
            }
        }
    }
}
