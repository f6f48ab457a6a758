// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent classification types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::conversation::AgentKind;

/// The classified purpose of a user's message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    RefundRequest,
    OrderInquiry,
    ProductSearch,
    TicketCreate,
    GeneralSupport,
}

impl Intent {
    /// Every intent, in declaration order.
    pub const ALL: [Intent; 5] = [
        Intent::RefundRequest,
        Intent::OrderInquiry,
        Intent::ProductSearch,
        Intent::TicketCreate,
        Intent::GeneralSupport,
    ];
}

/// Entities pulled out of a message by the classifier or the regex extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Requested amount in minor units.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Free-text search query.
    #[serde(default)]
    pub query: Option<String>,
}

impl ExtractedEntities {
    /// Fills fields that are missing here from `other`. Existing values win.
    pub fn fill_from(&mut self, other: &ExtractedEntities) {
        if self.order_id.is_none() {
            self.order_id.clone_from(&other.order_id);
        }
        if self.product_id.is_none() {
            self.product_id.clone_from(&other.product_id);
        }
        if self.customer_email.is_none() {
            self.customer_email.clone_from(&other.customer_email);
        }
        if self.amount.is_none() {
            self.amount = other.amount;
        }
        if self.query.is_none() {
            self.query.clone_from(&other.query);
        }
    }
}

/// Result of classifying one incoming message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub entities: ExtractedEntities,
    pub suggested_agent: AgentKind,
    pub reasoning: String,
    /// Set when the deterministic fallback produced this classification.
    #[serde(default)]
    pub fallback: bool,
}
