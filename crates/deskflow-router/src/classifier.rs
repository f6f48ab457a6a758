// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification around an external text classifier.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use deskflow_config::model::RouterConfig;
use deskflow_core::state::{
    ChatMessage, ExtractedEntities, Intent, IntentClassification, QueryContext,
};
use deskflow_core::types::ClassifierRequest;
use deskflow_core::{DeskflowError, TextClassifier};

use crate::entities::extract_entities;
use crate::parse::parse_classifier_output;
use crate::routing::route;

/// Instructions sent with every classification request.
pub const CLASSIFIER_INSTRUCTIONS: &str = "Classify the customer's latest message into exactly one intent: \
refund_request, order_inquiry, product_search, ticket_create, general_support. \
Respond with a single JSON object and nothing else: \
{\"intent\": string, \"confidence\": number between 0 and 1, \
\"entities\": {\"order_id\": string|null, \"product_id\": string|null, \
\"customer_email\": string|null, \"amount\": number|null, \"query\": string|null}, \
\"reasoning\": short string}. `amount` is in major currency units.";

/// Classifies messages, owning the history window, output parsing and fallback.
///
/// `classify` never fails. Anything that goes wrong with the external
/// classifier yields a `general_support` classification marked `fallback`.
pub struct IntentClassifier {
    classifier: Arc<dyn TextClassifier>,
    history_window: usize,
    timeout: Duration,
    fallback_confidence: f64,
}

impl IntentClassifier {
    pub fn new(classifier: Arc<dyn TextClassifier>, config: &RouterConfig) -> Self {
        Self {
            classifier,
            history_window: config.history_window,
            timeout: config.classifier_timeout(),
            fallback_confidence: config.fallback_confidence.clamp(0.0, 1.0),
        }
    }

    /// The last `history_window` messages of `history`.
    pub fn window<'a>(&self, history: &'a [ChatMessage]) -> &'a [ChatMessage] {
        &history[history.len().saturating_sub(self.history_window)..]
    }

    pub async fn classify(
        &self,
        message: &str,
        history: &[ChatMessage],
        context: &QueryContext,
    ) -> IntentClassification {
        let extracted = extract_entities(message);
        let request = ClassifierRequest {
            instructions: CLASSIFIER_INSTRUCTIONS.to_string(),
            message: message.to_string(),
            history: self.window(history).to_vec(),
            context: context.clone(),
        };

        let raw = match tokio::time::timeout(self.timeout, self.classifier.classify(&request)).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return self.fallback(message, extracted, &e.to_string()),
            Err(_) => {
                let e = DeskflowError::Timeout {
                    duration: self.timeout,
                };
                return self.fallback(message, extracted, &e.to_string());
            }
        };

        let parsed = match parse_classifier_output(&raw) {
            Ok(parsed) => parsed,
            Err(e) => return self.fallback(message, extracted, &e.to_string()),
        };

        let mut entities = parsed.entities;
        entities.fill_from(&extracted);
        if entities.query.is_none()
            && matches!(parsed.intent, Intent::ProductSearch | Intent::OrderInquiry)
        {
            entities.query = Some(message.trim().to_string());
        }
        let confidence = parsed.confidence.unwrap_or(self.fallback_confidence);
        debug!(
            intent = %parsed.intent,
            confidence,
            classifier = self.classifier.name(),
            "message classified"
        );
        IntentClassification {
            intent: parsed.intent,
            confidence,
            entities,
            suggested_agent: route(Some(parsed.intent)),
            reasoning: parsed.reasoning,
            fallback: false,
        }
    }

    fn fallback(
        &self,
        message: &str,
        mut entities: ExtractedEntities,
        cause: &str,
    ) -> IntentClassification {
        warn!(
            classifier = self.classifier.name(),
            cause,
            "classification failed, using general_support fallback"
        );
        if entities.query.is_none() && !message.trim().is_empty() {
            entities.query = Some(message.trim().to_string());
        }
        IntentClassification {
            intent: Intent::GeneralSupport,
            confidence: self.fallback_confidence,
            entities,
            suggested_agent: route(Some(Intent::GeneralSupport)),
            reasoning: "classifier output unavailable".to_string(),
            fallback: true,
        }
    }
}
