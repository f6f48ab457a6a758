// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payment gateway trait used by the refund workflow.

use async_trait::async_trait;

use crate::error::DeskflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CreateRefund, PaymentIntent, RefundRecord};

/// Payment processor operations needed to issue refunds.
#[async_trait]
pub trait PaymentGateway: PluginAdapter {
    /// Looks up the payment intent of an order. `Ok(None)` means not found.
    async fn payment_intent_for_order(
        &self,
        order_id: &str,
    ) -> Result<Option<PaymentIntent>, DeskflowError>;

    /// Creates a refund.
    ///
    /// Calls sharing an `idempotency_key` must produce at most one refund;
    /// repeated calls return the refund created by the first.
    async fn create_refund(
        &self,
        request: &CreateRefund,
        idempotency_key: &str,
    ) -> Result<RefundRecord, DeskflowError>;

    /// Every refund issued against a payment intent.
    async fn list_refunds(
        &self,
        payment_intent_id: &str,
    ) -> Result<Vec<RefundRecord>, DeskflowError>;
}
