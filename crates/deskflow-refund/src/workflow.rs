// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refund orchestration: initiate, validate, execute.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use deskflow_core::PaymentGateway;
use deskflow_core::state::{RefundNode, RefundReason, RefundState, RefundStatus, RefundSummary};

use crate::nodes;
use crate::policy::RefundPolicy;

/// Runs refund attempts against a payment gateway under a [`RefundPolicy`].
pub struct RefundWorkflow {
    gateway: Arc<dyn PaymentGateway>,
    policy: RefundPolicy,
}

impl RefundWorkflow {
    pub fn new(gateway: Arc<dyn PaymentGateway>, policy: RefundPolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> &RefundPolicy {
        &self.policy
    }

    /// The state to run for a request.
    ///
    /// A non-terminal attempt for the same order is resumed so it keeps its
    /// first-attempt timestamp and therefore its idempotency key. An attempt
    /// for the same order and amount that failed at execution restarts from
    /// initiation under its original timestamp, since the gateway may have
    /// committed the refund before the failure was reported. Anything else
    /// starts a new attempt stamped `now`.
    pub fn resume_or_start(
        &self,
        existing: Option<&RefundState>,
        order_id: &str,
        requested_amount: Option<i64>,
        reason: Option<RefundReason>,
        now: DateTime<Utc>,
    ) -> RefundState {
        match existing {
            Some(state) if !state.is_terminal() && state.order_id == order_id => {
                debug!(order_id, node = %state.node, "resuming refund attempt");
                state.clone()
            }
            Some(state)
                if state.status == RefundStatus::Failed
                    && state.node == RefundNode::Execute
                    && state.order_id == order_id
                    && state.requested_amount == requested_amount =>
            {
                debug!(order_id, "retrying refund execution under the original key");
                RefundState::new(
                    order_id,
                    requested_amount,
                    reason.unwrap_or(state.reason),
                    state.first_attempt_at,
                )
            }
            _ => RefundState::new(
                order_id,
                requested_amount,
                reason.unwrap_or(self.policy.default_reason),
                now,
            ),
        }
    }

    /// Runs one node and applies its update. Returns whether the state changed node.
    pub async fn step(&self, state: &mut RefundState) -> bool {
        let timeout = self.policy.gateway_timeout;
        let update = match state.node {
            RefundNode::Initiate => nodes::initiate(state, self.gateway.as_ref(), timeout).await,
            RefundNode::Validate => nodes::validate(state, &self.policy, Utc::now()),
            RefundNode::Execute => nodes::execute(state, self.gateway.as_ref(), timeout).await,
            RefundNode::Complete => nodes::complete(state),
        };
        let before = state.node;
        state.apply(update);
        state.node != before
    }

    /// Runs nodes until the attempt completes, fails, or stops advancing.
    pub async fn run(&self, mut state: RefundState) -> RefundState {
        loop {
            let advanced = self.step(&mut state).await;
            if state.status == RefundStatus::Failed
                || !advanced
                || state.node == RefundNode::Complete
            {
                break;
            }
        }
        debug!(
            order_id = %state.order_id,
            node = %state.node,
            status = %state.status,
            "refund workflow stopped"
        );
        state
    }

    /// Runs and returns the final state with its summary.
    pub async fn run_with_summary(&self, state: RefundState) -> (RefundState, RefundSummary) {
        let state = self.run(state).await;
        let summary = state.summary();
        (state, summary)
    }
}
