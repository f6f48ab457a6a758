// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic intent classification.
//!
//! Scores each intent by keyword hits with zero-cost rules. No model call,
//! no network, no latency. Produces the same JSON shape a model-backed
//! classifier is asked for, so it can stand in for one.

use async_trait::async_trait;
use serde_json::json;

use deskflow_core::state::Intent;
use deskflow_core::types::ClassifierRequest;
use deskflow_core::{AdapterType, DeskflowError, HealthStatus, PluginAdapter, TextClassifier};

const REFUND_PATTERNS: &[&str] = &[
    "refund",
    "money back",
    "reimburse",
    "chargeback",
    "charge back",
    "charged twice",
    "double charged",
    "return my",
    "cancel my order",
];

const TICKET_PATTERNS: &[&str] = &[
    "ticket",
    "complaint",
    "escalate",
    "speak to a human",
    "talk to a person",
    "manager",
    "report a problem",
    "damaged",
    "broken",
    "not working",
    "defective",
];

const ORDER_PATTERNS: &[&str] = &[
    "where is my order",
    "order status",
    "my order",
    "track",
    "tracking",
    "shipping",
    "shipped",
    "delivery",
    "delivered",
    "arrive",
    "order #",
];

const PRODUCT_PATTERNS: &[&str] = &[
    "looking for",
    "recommend",
    "similar to",
    "search",
    "find",
    "do you have",
    "do you sell",
    "in stock",
    "show me",
    "alternative",
    "compare",
    "sku-",
];

/// Order of precedence when two intents score the same.
const PRECEDENCE: [(Intent, &[&str]); 4] = [
    (Intent::RefundRequest, REFUND_PATTERNS),
    (Intent::TicketCreate, TICKET_PATTERNS),
    (Intent::OrderInquiry, ORDER_PATTERNS),
    (Intent::ProductSearch, PRODUCT_PATTERNS),
];

/// Keyword classifier. Usable offline and as the default classifier of the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Picks an intent and a confidence for `message`.
    pub fn score(&self, message: &str) -> (Intent, f64, String) {
        let lower = message.to_lowercase();
        let mut best: Option<(Intent, usize)> = None;
        for (intent, patterns) in PRECEDENCE {
            let hits = patterns.iter().filter(|p| lower.contains(*p)).count();
            if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
                best = Some((intent, hits));
            }
        }
        match best {
            Some((intent, hits)) => {
                let confidence = (0.6 + 0.1 * (hits as f64 - 1.0)).min(0.95);
                (intent, confidence, format!("{hits} {intent} keyword(s)"))
            }
            None => (
                Intent::GeneralSupport,
                0.4,
                "no intent keywords".to_string(),
            ),
        }
    }
}

#[async_trait]
impl PluginAdapter for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        Ok(())
    }
}

#[async_trait]
impl TextClassifier for KeywordClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String, DeskflowError> {
        let (intent, confidence, reasoning) = self.score(&request.message);
        let query = matches!(intent, Intent::ProductSearch | Intent::OrderInquiry)
            .then(|| request.message.trim().to_string());
        Ok(json!({
            "intent": intent,
            "confidence": confidence,
            "entities": { "query": query },
            "reasoning": reasoning,
        })
        .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(message: &str) -> Intent {
        KeywordClassifier::new().score(message).0
    }

    #[test]
    fn refund_messages() {
        assert_eq!(intent("I want a refund for order #1234"), Intent::RefundRequest);
        assert_eq!(intent("I was charged twice, give me my money back"), Intent::RefundRequest);
    }

    #[test]
    fn order_messages() {
        assert_eq!(intent("Where is my order #1234?"), Intent::OrderInquiry);
        assert_eq!(intent("when will the delivery arrive"), Intent::OrderInquiry);
    }

    #[test]
    fn product_messages() {
        assert_eq!(
            intent("something similar to noise-cancelling headphones"),
            Intent::ProductSearch
        );
        assert_eq!(intent("do you have SKU-123 in stock"), Intent::ProductSearch);
    }

    #[test]
    fn ticket_messages() {
        assert_eq!(intent("my blender arrived broken, open a ticket"), Intent::TicketCreate);
    }

    #[test]
    fn unknown_is_general_with_low_confidence() {
        let (intent, confidence, _) = KeywordClassifier::new().score("hello");
        assert_eq!(intent, Intent::GeneralSupport);
        assert!(confidence < 0.5);
    }

    #[test]
    fn more_hits_raise_confidence() {
        let c = KeywordClassifier::new();
        let (_, one, _) = c.score("refund");
        let (_, three, _) = c.score("refund my money back, reimburse me");
        assert!(three > one);
        assert!(three <= 0.95);
    }

    #[tokio::test]
    async fn emits_parseable_json() {
        let request = ClassifierRequest {
            instructions: String::new(),
            message: "show me running shoes".to_string(),
            history: Vec::new(),
            context: Default::default(),
        };
        let raw = KeywordClassifier::new().classify(&request).await.unwrap();
        let parsed = crate::parse::parse_classifier_output(&raw).unwrap();
        assert_eq!(parsed.intent, Intent::ProductSearch);
        assert_eq!(parsed.entities.query.as_deref(), Some("show me running shoes"));
    }
}
