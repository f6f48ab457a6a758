// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refund workflow state, its update model, and the human-readable summary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{PaymentStatus, RefundRecord};

/// Nodes of the refund state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefundNode {
    Initiate,
    Validate,
    Execute,
    Complete,
}

/// Overall refund status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Reason code passed to the payment gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    #[default]
    RequestedByCustomer,
}

/// Payment details captured by the initiate node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment_intent_id: String,
    pub amount: i64,
    pub amount_refunded: i64,
    /// `amount - amount_refunded`, never negative.
    pub refundable_amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub order_created_at: DateTime<Utc>,
}

/// Result of the eligibility half of validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub eligible: bool,
    pub order_age_days: i64,
    pub window_days: i64,
    pub violations: Vec<String>,
}

/// Result of the amount half of validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountValidation {
    pub valid: bool,
    /// Amount that will be refunded when valid.
    pub amount_to_refund: i64,
    pub violations: Vec<String>,
}

/// State of one logical refund attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundState {
    pub order_id: String,
    pub payment_intent_id: Option<String>,
    /// `None` means refund everything that is still refundable.
    pub requested_amount: Option<i64>,
    pub reason: RefundReason,
    /// Captured once per logical attempt; input to the idempotency key.
    pub first_attempt_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub node: RefundNode,
    pub status: RefundStatus,
    pub payment: Option<PaymentDetails>,
    pub eligibility: Option<EligibilityCheck>,
    pub amount_validation: Option<AmountValidation>,
    pub refund: Option<RefundRecord>,
    pub refund_history: Vec<RefundRecord>,
    /// Failure reason recorded by the node that failed.
    pub error: Option<String>,
}

impl RefundState {
    pub fn new(
        order_id: impl Into<String>,
        requested_amount: Option<i64>,
        reason: RefundReason,
        first_attempt_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            payment_intent_id: None,
            requested_amount,
            reason,
            first_attempt_at,
            idempotency_key: None,
            node: RefundNode::Initiate,
            status: RefundStatus::Pending,
            payment: None,
            eligibility: None,
            amount_validation: None,
            refund: None,
            refund_history: Vec::new(),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, RefundStatus::Completed | RefundStatus::Failed)
    }

    /// Applies a node's partial update. Every present field replaces the current one.
    ///
    /// Terminal states are frozen: the update is dropped and `false` is returned.
    pub fn apply(&mut self, update: RefundUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }
        if let Some(node) = update.node {
            self.node = node;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.payment_intent_id.is_some() {
            self.payment_intent_id = update.payment_intent_id;
        }
        if update.idempotency_key.is_some() {
            self.idempotency_key = update.idempotency_key;
        }
        if update.payment.is_some() {
            self.payment = update.payment;
        }
        if update.eligibility.is_some() {
            self.eligibility = update.eligibility;
        }
        if update.amount_validation.is_some() {
            self.amount_validation = update.amount_validation;
        }
        if update.refund.is_some() {
            self.refund = update.refund;
        }
        if let Some(history) = update.refund_history {
            self.refund_history = history;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        true
    }

    /// Every violation recorded by validation, eligibility first.
    pub fn violations(&self) -> Vec<String> {
        let mut all = Vec::new();
        if let Some(e) = &self.eligibility {
            all.extend(e.violations.iter().cloned());
        }
        if let Some(a) = &self.amount_validation {
            all.extend(a.violations.iter().cloned());
        }
        all
    }

    /// Human-readable view of the state, separate from the raw fields.
    pub fn summary(&self) -> RefundSummary {
        match self.status {
            RefundStatus::Completed => match &self.refund {
                Some(refund) => RefundSummary::Completed {
                    order_id: self.order_id.clone(),
                    refund_id: refund.id.clone(),
                    amount: refund.amount,
                    currency: refund.currency.clone(),
                    status: refund.status.to_string(),
                    history_count: self.refund_history.len(),
                },
                None => RefundSummary::Failed {
                    order_id: self.order_id.clone(),
                    stage: self.node,
                    reasons: vec!["refund completed without a refund record".to_string()],
                },
            },
            RefundStatus::Failed => {
                let mut reasons = self.violations();
                if let Some(err) = &self.error {
                    reasons.push(err.clone());
                }
                RefundSummary::Failed {
                    order_id: self.order_id.clone(),
                    stage: self.node,
                    reasons,
                }
            }
            RefundStatus::Pending | RefundStatus::Processing => RefundSummary::InProgress {
                order_id: self.order_id.clone(),
                node: self.node,
                status: self.status,
            },
        }
    }
}

/// Partial update returned by a refund node. See [`RefundState::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefundUpdate {
    pub node: Option<RefundNode>,
    pub status: Option<RefundStatus>,
    pub payment_intent_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub payment: Option<PaymentDetails>,
    pub eligibility: Option<EligibilityCheck>,
    pub amount_validation: Option<AmountValidation>,
    pub refund: Option<RefundRecord>,
    pub refund_history: Option<Vec<RefundRecord>>,
    pub error: Option<String>,
}

impl RefundUpdate {
    /// Update that fails the workflow at the current node.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(RefundStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Outcome view of a refund for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefundSummary {
    Completed {
        order_id: String,
        refund_id: String,
        amount: i64,
        currency: String,
        status: String,
        history_count: usize,
    },
    Failed {
        order_id: String,
        stage: RefundNode,
        reasons: Vec<String>,
    },
    InProgress {
        order_id: String,
        node: RefundNode,
        status: RefundStatus,
    },
}

impl RefundSummary {
    pub fn is_success(&self) -> bool {
        matches!(self, RefundSummary::Completed { .. })
    }
}

impl fmt::Display for RefundSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefundSummary::Completed {
                order_id,
                refund_id,
                amount,
                currency,
                status,
                ..
            } => write!(
                f,
                "Refund {refund_id} of {} for order {order_id} is {status}.",
                format_amount(*amount, currency)
            ),
            RefundSummary::Failed {
                order_id,
                stage,
                reasons,
            } => {
                if reasons.is_empty() {
                    write!(f, "Refund for order {order_id} failed during {stage}.")
                } else {
                    write!(
                        f,
                        "Refund for order {order_id} failed during {stage}: {}.",
                        reasons.join("; ")
                    )
                }
            }
            RefundSummary::InProgress {
                order_id,
                node,
                status,
            } => write!(f, "Refund for order {order_id} is {status} at {node}."),
        }
    }
}

/// Formats minor units as `12.34 USD`.
pub fn format_amount(minor: i64, currency: &str) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02} {}", abs / 100, abs % 100, currency.to_uppercase())
}
