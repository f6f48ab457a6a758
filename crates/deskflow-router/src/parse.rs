// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of raw classifier output into a strict structure.
//!
//! Classifiers are asked for a bare JSON object but often wrap it in a
//! markdown fence or a sentence of prose. The outermost `{...}` span is
//! taken as the payload.

use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use deskflow_core::state::{ExtractedEntities, Intent};

/// Why classifier output was rejected.
#[derive(Debug, Error)]
pub enum ClassifierOutputError {
    #[error("classifier output contains no JSON object")]
    NoJsonObject,

    #[error("classifier output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown intent `{0}`")]
    UnknownIntent(String),
}

/// A validated classifier answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedClassification {
    pub intent: Intent,
    /// Clamped to `[0, 1]`. `None` when the classifier gave no confidence.
    pub confidence: Option<f64>,
    pub entities: ExtractedEntities,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    entities: RawEntities,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEntities {
    #[serde(default, alias = "orderId")]
    order_id: Option<String>,
    #[serde(default, alias = "productId")]
    product_id: Option<String>,
    #[serde(default, alias = "customerEmail", alias = "email")]
    customer_email: Option<String>,
    /// Major currency units, as a person would write them. Kept signed so
    /// refund validation can reject zero and negative requests.
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    query: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<RawEntities> for ExtractedEntities {
    fn from(raw: RawEntities) -> Self {
        Self {
            order_id: non_empty(raw.order_id).map(|id| id.trim_start_matches('#').to_string()),
            product_id: non_empty(raw.product_id),
            customer_email: non_empty(raw.customer_email).map(|e| e.to_ascii_lowercase()),
            amount: raw
                .amount
                .filter(|a| a.is_finite())
                .map(|a| (a * 100.0).round() as i64),
            query: non_empty(raw.query),
        }
    }
}

/// Maps `"Refund Request"`, `"refund-request"` and `"REFUND_REQUEST"` to the same intent.
pub fn normalize_intent(name: &str) -> Option<Intent> {
    let normalized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    Intent::from_str(&normalized).ok()
}

fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parses classifier output, tolerating code fences and surrounding prose.
pub fn parse_classifier_output(raw: &str) -> Result<ParsedClassification, ClassifierOutputError> {
    let span = json_span(raw).ok_or(ClassifierOutputError::NoJsonObject)?;
    let parsed: RawClassification = serde_json::from_str(span)?;
    let intent = normalize_intent(&parsed.intent)
        .ok_or_else(|| ClassifierOutputError::UnknownIntent(parsed.intent.clone()))?;

    Ok(ParsedClassification {
        intent,
        confidence: parsed
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0)),
        entities: parsed.entities.into(),
        reasoning: parsed.reasoning.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json() {
        let parsed = parse_classifier_output(
            r##"{"intent":"refund_request","confidence":0.92,"entities":{"order_id":"#1234","amount":25.5},"reasoning":"asks for money back"}"##,
        )
        .unwrap();
        assert_eq!(parsed.intent, Intent::RefundRequest);
        assert_eq!(parsed.confidence, Some(0.92));
        assert_eq!(parsed.entities.order_id.as_deref(), Some("1234"));
        assert_eq!(parsed.entities.amount, Some(2550));
        assert_eq!(parsed.reasoning, "asks for money back");
    }

    #[test]
    fn non_positive_amounts_are_kept() {
        let zero = parse_classifier_output(
            r#"{"intent":"refund_request","entities":{"order_id":"1234","amount":0}}"#,
        )
        .unwrap();
        assert_eq!(zero.entities.amount, Some(0));
        let negative = parse_classifier_output(
            r#"{"intent":"refund_request","entities":{"order_id":"1234","amount":-5}}"#,
        )
        .unwrap();
        assert_eq!(negative.entities.amount, Some(-500));
        let missing =
            parse_classifier_output(r#"{"intent":"refund_request","entities":{"order_id":"1"}}"#)
                .unwrap();
        assert_eq!(missing.entities.amount, None);
    }

    #[test]
    fn fenced_json_with_prose() {
        let raw = "Sure! Here is the classification:\n```json\n{\"intent\": \"Order Inquiry\", \"confidence\": 0.8}\n```\nLet me know.";
        let parsed = parse_classifier_output(raw).unwrap();
        assert_eq!(parsed.intent, Intent::OrderInquiry);
    }

    #[test]
    fn confidence_is_clamped() {
        let high = parse_classifier_output(r#"{"intent":"ticket_create","confidence":7}"#).unwrap();
        assert_eq!(high.confidence, Some(1.0));
        let low =
            parse_classifier_output(r#"{"intent":"ticket_create","confidence":-0.3}"#).unwrap();
        assert_eq!(low.confidence, Some(0.0));
        let none = parse_classifier_output(r#"{"intent":"ticket_create"}"#).unwrap();
        assert_eq!(none.confidence, None);
    }

    #[test]
    fn camel_case_entities_are_accepted() {
        let parsed = parse_classifier_output(
            r#"{"intent":"product_search","entities":{"productId":"SKU-1","customerEmail":"Bob@Example.com","query":"  red shoes "}}"#,
        )
        .unwrap();
        assert_eq!(parsed.entities.product_id.as_deref(), Some("SKU-1"));
        assert_eq!(
            parsed.entities.customer_email.as_deref(),
            Some("bob@example.com")
        );
        assert_eq!(parsed.entities.query.as_deref(), Some("red shoes"));
    }

    #[test]
    fn intent_spellings_normalize() {
        assert_eq!(normalize_intent("refund-request"), Some(Intent::RefundRequest));
        assert_eq!(normalize_intent(" GENERAL_SUPPORT "), Some(Intent::GeneralSupport));
        assert_eq!(normalize_intent("Product Search"), Some(Intent::ProductSearch));
        assert_eq!(normalize_intent("billing"), None);
    }

    #[test]
    fn rejections() {
        assert!(matches!(
            parse_classifier_output("I think it's a refund"),
            Err(ClassifierOutputError::NoJsonObject)
        ));
        assert!(matches!(
            parse_classifier_output("{not json}"),
            Err(ClassifierOutputError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_classifier_output(r#"{"intent":"billing"}"#),
            Err(ClassifierOutputError::UnknownIntent(name)) if name == "billing"
        ));
        assert!(matches!(
            parse_classifier_output("} backwards {"),
            Err(ClassifierOutputError::NoJsonObject)
        ));
    }
}
