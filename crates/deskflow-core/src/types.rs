// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Deskflow engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::state::{ChatMessage, ConversationState, QueryContext};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    CheckpointStore,
    Classifier,
    PaymentGateway,
    SearchBackend,
    RecordSource,
}

// --- Checkpoint types ---

/// A persisted snapshot of a thread's conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub thread_id: String,
    pub checkpoint_id: String,
    pub state: ConversationState,
    /// Arbitrary caller-supplied metadata.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Absolute expiry assigned at write time. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CheckpointRecord {
    /// Whether the record is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Denormalized summary of a thread, recomputed on every checkpoint write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub thread_id: String,
    pub user_id: Option<String>,
    pub message_count: usize,
    pub checkpoint_count: usize,
    pub latest_checkpoint_id: Option<String>,
    pub last_accessed: DateTime<Utc>,
}

// --- Classifier types ---

/// Input handed to the external text classifier.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierRequest {
    /// Instructions describing the expected JSON output.
    pub instructions: String,
    pub message: String,
    /// Already truncated to the configured history window.
    pub history: Vec<ChatMessage>,
    pub context: QueryContext,
}

// --- Payment types ---

/// Lifecycle status of a payment as reported by the gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    RequiresCapture,
    Canceled,
    Failed,
}

/// Payment-intent details for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub order_id: String,
    /// Original charge in minor units.
    pub amount: i64,
    /// Amount already refunded in minor units.
    pub amount_refunded: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// Parameters for a refund-creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRefund {
    pub payment_intent_id: String,
    /// Minor units. Always resolved before the call (full refunds pass the remaining amount).
    pub amount: i64,
    pub reason: String,
    pub order_id: String,
}

/// Status of a refund object at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefundRecordStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

/// A refund object as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: RefundRecordStatus,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// --- Search types ---

/// Retrieval strategies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchSource {
    /// Exact/near-exact (BM25-style) matching.
    Lexical,
    /// Vector similarity.
    Semantic,
}

/// Declared purpose of a search, used to bias strategy selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchContext {
    OrderInquiry,
    TicketLookup,
    CustomerLookup,
    ProductSearch,
    Recommendation,
    General,
}

/// A query handed to a single search backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub text: String,
    pub context: SearchContext,
    pub limit: usize,
    /// Minimum similarity for semantic backends.
    pub min_score: Option<f64>,
}

/// One raw hit from a search backend. Scores are expected in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

// --- Tool-call types ---

/// Record families reachable through tool calls.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    Customer,
    Product,
    Order,
    Ticket,
}

/// One identifier inside a tool-call request, as received from the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordIdentifier {
    pub email: Option<String>,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub ticket_id: Option<String>,
}

/// Raw tool-call request from the transport layer. Validate before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub user_email: String,
    #[serde(default)]
    pub identifiers: Vec<RecordIdentifier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_request_uses_transport_field_names() {
        let json = r#"{
            "type": "order",
            "userEmail": "alice@example.com",
            "identifiers": [{"email": "alice@example.com", "orderId": "1234"}]
        }"#;
        let req: ToolCallRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, RecordKind::Order);
        assert_eq!(req.identifiers[0].order_id.as_deref(), Some("1234"));
        assert!(req.identifiers[0].ticket_id.is_none());
    }

    #[test]
    fn payment_status_parses_snake_case() {
        use std::str::FromStr;
        assert_eq!(
            PaymentStatus::from_str("requires_capture").unwrap(),
            PaymentStatus::RequiresCapture
        );
        assert_eq!(PaymentStatus::Succeeded.to_string(), "succeeded");
    }

    #[test]
    fn checkpoint_expiry_is_inclusive() {
        let now = Utc::now();
        let record = CheckpointRecord {
            thread_id: "t".into(),
            checkpoint_id: "c".into(),
            state: ConversationState::new("t", None),
            metadata: serde_json::Value::Null,
            created_at: now,
            expires_at: Some(now),
        };
        assert!(record.is_expired_at(now));
        let forever = CheckpointRecord {
            expires_at: None,
            ..record
        };
        assert!(!forever.is_expired_at(now + chrono::Duration::days(3650)));
    }
}
