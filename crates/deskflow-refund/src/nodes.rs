// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The four refund nodes.
//!
//! Each node reads the current [`RefundState`] and returns a
//! [`RefundUpdate`]. A successful node advances `node` to the next one; a
//! failing node sets `status = failed` and leaves `node` where it failed.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use deskflow_core::state::{
    PaymentDetails, RefundNode, RefundState, RefundStatus, RefundUpdate,
};
use deskflow_core::types::CreateRefund;
use deskflow_core::{DeskflowError, PaymentGateway};

use crate::idempotency::idempotency_key;
use crate::policy::RefundPolicy;

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, DeskflowError>>,
) -> Result<T, DeskflowError> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| DeskflowError::Timeout { duration: timeout })?
}

/// Resolves the order's payment intent. No external commit.
pub async fn initiate(
    state: &RefundState,
    gateway: &dyn PaymentGateway,
    timeout: Duration,
) -> RefundUpdate {
    let intent = match bounded(timeout, gateway.payment_intent_for_order(&state.order_id)).await {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            return RefundUpdate::failed(format!(
                "no payment found for order {}",
                state.order_id
            ));
        }
        Err(e) => {
            warn!(order_id = %state.order_id, error = %e, "payment lookup failed");
            return RefundUpdate::failed(format!("payment lookup failed: {e}"));
        }
    };

    let payment = PaymentDetails {
        payment_intent_id: intent.id.clone(),
        amount: intent.amount,
        amount_refunded: intent.amount_refunded,
        refundable_amount: (intent.amount - intent.amount_refunded).max(0),
        currency: intent.currency,
        status: intent.status,
        order_created_at: intent.created_at,
    };
    debug!(
        order_id = %state.order_id,
        payment_intent_id = %intent.id,
        refundable = payment.refundable_amount,
        "refund initiated"
    );
    RefundUpdate {
        node: Some(RefundNode::Validate),
        status: Some(RefundStatus::Processing),
        payment_intent_id: Some(intent.id),
        idempotency_key: Some(idempotency_key(&state.order_id, state.first_attempt_at)),
        payment: Some(payment),
        ..RefundUpdate::default()
    }
}

/// Eligibility and amount checks. Never touches the gateway.
pub fn validate(state: &RefundState, policy: &RefundPolicy, now: DateTime<Utc>) -> RefundUpdate {
    let Some(payment) = &state.payment else {
        return RefundUpdate::failed("payment details missing; initiate did not run");
    };
    let eligibility = policy.check_eligibility(payment, now);
    let amount = policy.validate_amount(state.requested_amount, payment);
    let passed = eligibility.eligible && amount.valid;
    if !passed {
        info!(
            order_id = %state.order_id,
            violations = eligibility.violations.len() + amount.violations.len(),
            "refund rejected by policy"
        );
    }
    RefundUpdate {
        node: passed.then_some(RefundNode::Execute),
        status: (!passed).then_some(RefundStatus::Failed),
        eligibility: Some(eligibility),
        amount_validation: Some(amount),
        ..RefundUpdate::default()
    }
}

/// Creates the refund under the attempt's idempotency key, then fetches history.
pub async fn execute(
    state: &RefundState,
    gateway: &dyn PaymentGateway,
    timeout: Duration,
) -> RefundUpdate {
    let key = idempotency_key(&state.order_id, state.first_attempt_at);
    if state.refund.is_some() && state.idempotency_key.as_deref() == Some(key.as_str()) {
        debug!(order_id = %state.order_id, "refund already executed for this attempt");
        return RefundUpdate {
            node: Some(RefundNode::Complete),
            status: Some(RefundStatus::Completed),
            ..RefundUpdate::default()
        };
    }

    let (Some(payment_intent_id), Some(validation)) =
        (&state.payment_intent_id, &state.amount_validation)
    else {
        return RefundUpdate::failed("refund has not been validated");
    };
    if !validation.valid {
        return RefundUpdate::failed("refund has not been validated");
    }

    let request = CreateRefund {
        payment_intent_id: payment_intent_id.clone(),
        amount: validation.amount_to_refund,
        reason: state.reason.to_string(),
        order_id: state.order_id.clone(),
    };
    let refund = match bounded(timeout, gateway.create_refund(&request, &key)).await {
        Ok(refund) => refund,
        Err(e) => {
            warn!(order_id = %state.order_id, error = %e, "refund creation failed");
            return RefundUpdate {
                idempotency_key: Some(key),
                ..RefundUpdate::failed(format!("refund creation failed: {e}"))
            };
        }
    };
    info!(
        order_id = %state.order_id,
        refund_id = %refund.id,
        amount = refund.amount,
        "refund created"
    );

    let history = match bounded(timeout, gateway.list_refunds(payment_intent_id)).await {
        Ok(history) => Some(history),
        Err(e) => {
            warn!(order_id = %state.order_id, error = %e, "refund history unavailable");
            None
        }
    };

    RefundUpdate {
        node: Some(RefundNode::Complete),
        status: Some(RefundStatus::Completed),
        idempotency_key: Some(key),
        refund: Some(refund),
        refund_history: history,
        ..RefundUpdate::default()
    }
}

/// Terminal node. Changes nothing.
pub fn complete(_state: &RefundState) -> RefundUpdate {
    RefundUpdate::default()
}
