// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock payment gateway that honors idempotency keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use deskflow_core::types::{
    AdapterType, CreateRefund, HealthStatus, PaymentIntent, PaymentStatus, RefundRecord,
    RefundRecordStatus,
};
use deskflow_core::{DeskflowError, ExternalService, PaymentGateway, PluginAdapter};

#[derive(Default)]
struct Ledger {
    /// By order id.
    intents: HashMap<String, PaymentIntent>,
    /// By idempotency key.
    refunds_by_key: HashMap<String, RefundRecord>,
    /// By payment intent id, in creation order.
    refunds_by_intent: HashMap<String, Vec<RefundRecord>>,
}

/// In-process payment gateway.
///
/// Creating a refund under a key that was already used returns the refund
/// created the first time and changes nothing.
pub struct MockPaymentGateway {
    ledger: Arc<Mutex<Ledger>>,
    create_calls: AtomicUsize,
    refunds_created: AtomicUsize,
    fail_creates: AtomicBool,
    fail_history: AtomicBool,
    fail_after_commit: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            create_calls: AtomicUsize::new(0),
            refunds_created: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
            fail_history: AtomicBool::new(false),
            fail_after_commit: AtomicBool::new(false),
            create_delay: Mutex::new(None),
        }
    }

    /// Registers a payment for `order_id` placed `created_at`.
    pub async fn add_order(
        &self,
        order_id: &str,
        amount: i64,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
    ) -> PaymentIntent {
        let intent = PaymentIntent {
            id: format!("pi_{order_id}"),
            order_id: order_id.to_string(),
            amount,
            amount_refunded: 0,
            currency: "usd".to_string(),
            status,
            created_at,
        };
        self.ledger
            .lock()
            .await
            .intents
            .insert(order_id.to_string(), intent.clone());
        intent
    }

    /// Registers a succeeded payment placed `age_days` ago.
    pub async fn add_order_aged(
        &self,
        order_id: &str,
        amount: i64,
        age_days: i64,
    ) -> PaymentIntent {
        self.add_order(
            order_id,
            amount,
            PaymentStatus::Succeeded,
            Utc::now() - chrono::Duration::days(age_days),
        )
        .await
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_history(&self, fail: bool) {
        self.fail_history.store(fail, Ordering::SeqCst);
    }

    /// Records refunds as usual but reports a failure to the caller, like a
    /// gateway whose response is lost after the write.
    pub fn fail_after_commit(&self, fail: bool) {
        self.fail_after_commit.store(fail, Ordering::SeqCst);
    }

    pub async fn delay_creates(&self, delay: Duration) {
        *self.create_delay.lock().await = Some(delay);
    }

    /// How many times `create_refund` was called.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// How many distinct refunds exist.
    pub fn refunds_created(&self) -> usize {
        self.refunds_created.load(Ordering::SeqCst)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPaymentGateway {
    fn name(&self) -> &str {
        "mock-payments"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PaymentGateway
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn payment_intent_for_order(
        &self,
        order_id: &str,
    ) -> Result<Option<PaymentIntent>, DeskflowError> {
        Ok(self.ledger.lock().await.intents.get(order_id).cloned())
    }

    async fn create_refund(
        &self,
        request: &CreateRefund,
        idempotency_key: &str,
    ) -> Result<RefundRecord, DeskflowError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.create_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(DeskflowError::external(
                ExternalService::PaymentGateway,
                "card_declined: refund rejected by processor",
            ));
        }

        let lost_response = self.fail_after_commit.load(Ordering::SeqCst);
        let mut ledger = self.ledger.lock().await;
        if let Some(existing) = ledger.refunds_by_key.get(idempotency_key) {
            if lost_response {
                return Err(DeskflowError::external(
                    ExternalService::PaymentGateway,
                    "connection reset after refund was recorded",
                ));
            }
            return Ok(existing.clone());
        }
        let Some(intent) = ledger
            .intents
            .values_mut()
            .find(|i| i.id == request.payment_intent_id)
        else {
            return Err(DeskflowError::external(
                ExternalService::PaymentGateway,
                format!("no such payment_intent: {}", request.payment_intent_id),
            ));
        };
        if request.amount > intent.amount - intent.amount_refunded {
            return Err(DeskflowError::external(
                ExternalService::PaymentGateway,
                "amount exceeds refundable balance",
            ));
        }
        intent.amount_refunded += request.amount;
        let refund = RefundRecord {
            id: format!("re_{}", uuid::Uuid::new_v4().simple()),
            payment_intent_id: request.payment_intent_id.clone(),
            amount: request.amount,
            currency: intent.currency.clone(),
            status: RefundRecordStatus::Succeeded,
            reason: request.reason.clone(),
            created_at: Utc::now(),
        };
        ledger
            .refunds_by_key
            .insert(idempotency_key.to_string(), refund.clone());
        ledger
            .refunds_by_intent
            .entry(request.payment_intent_id.clone())
            .or_default()
            .push(refund.clone());
        self.refunds_created.fetch_add(1, Ordering::SeqCst);
        if lost_response {
            return Err(DeskflowError::external(
                ExternalService::PaymentGateway,
                "connection reset after refund was recorded",
            ));
        }
        Ok(refund)
    }

    async fn list_refunds(
        &self,
        payment_intent_id: &str,
    ) -> Result<Vec<RefundRecord>, DeskflowError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(DeskflowError::external(
                ExternalService::PaymentGateway,
                "history endpoint unavailable",
            ));
        }
        Ok(self
            .ledger
            .lock()
            .await
            .refunds_by_intent
            .get(payment_intent_id)
            .cloned()
            .unwrap_or_default())
    }
}
