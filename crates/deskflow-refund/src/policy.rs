// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refund eligibility and amount rules.

use std::time::Duration;

use chrono::{DateTime, Utc};

use deskflow_config::model::RefundConfig;
use deskflow_core::state::{
    AmountValidation, EligibilityCheck, PaymentDetails, RefundReason, format_amount,
};
use deskflow_core::types::PaymentStatus;

/// Configured refund rules.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundPolicy {
    pub window_days: i64,
    pub refundable_statuses: Vec<PaymentStatus>,
    pub gateway_timeout: Duration,
    pub default_reason: RefundReason,
}

impl RefundPolicy {
    pub fn from_config(config: &RefundConfig) -> Self {
        Self {
            window_days: config.window_days,
            refundable_statuses: config.refundable_statuses.clone(),
            gateway_timeout: config.gateway_timeout(),
            default_reason: config.default_reason,
        }
    }

    /// Order age and payment status checks.
    pub fn check_eligibility(
        &self,
        payment: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> EligibilityCheck {
        let order_age_days = (now - payment.order_created_at).num_days().max(0);
        let mut violations = Vec::new();
        if order_age_days > self.window_days {
            violations.push(format!(
                "order is {order_age_days} days old, outside the {}-day refund window",
                self.window_days
            ));
        }
        if !self.refundable_statuses.contains(&payment.status) {
            violations.push(format!("payment status {} is not refundable", payment.status));
        }
        EligibilityCheck {
            eligible: violations.is_empty(),
            order_age_days,
            window_days: self.window_days,
            violations,
        }
    }

    /// Resolves the amount to refund. `requested = None` refunds everything left.
    pub fn validate_amount(
        &self,
        requested: Option<i64>,
        payment: &PaymentDetails,
    ) -> AmountValidation {
        let refundable = payment.refundable_amount;
        let amount = requested.unwrap_or(refundable);
        let mut violations = Vec::new();
        match requested {
            Some(r) if r <= 0 => {
                violations.push("refund amount must be greater than zero".to_string());
            }
            Some(r) if r > refundable => violations.push(format!(
                "requested {} exceeds the refundable {}",
                format_amount(r, &payment.currency),
                format_amount(refundable, &payment.currency)
            )),
            None if refundable <= 0 => {
                violations.push("nothing left to refund on this order".to_string());
            }
            _ => {}
        }
        AmountValidation {
            valid: violations.is_empty(),
            amount_to_refund: if violations.is_empty() { amount } else { 0 },
            violations,
        }
    }
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self::from_config(&RefundConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(
        age_days: i64,
        status: PaymentStatus,
        amount: i64,
        refunded: i64,
    ) -> PaymentDetails {
        PaymentDetails {
            payment_intent_id: "pi_1".into(),
            amount,
            amount_refunded: refunded,
            refundable_amount: amount - refunded,
            currency: "usd".into(),
            status,
            order_created_at: Utc::now() - chrono::Duration::days(age_days),
        }
    }

    #[test]
    fn old_order_is_outside_window() {
        let check = RefundPolicy::default()
            .check_eligibility(&payment(45, PaymentStatus::Succeeded, 5000, 0), Utc::now());
        assert!(!check.eligible);
        assert_eq!(check.order_age_days, 45);
        assert!(check.violations[0].contains("30-day refund window"));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let check = RefundPolicy::default()
            .check_eligibility(&payment(30, PaymentStatus::Succeeded, 5000, 0), Utc::now());
        assert!(check.eligible, "{:?}", check.violations);
    }

    #[test]
    fn unrefundable_status() {
        let check = RefundPolicy::default()
            .check_eligibility(&payment(1, PaymentStatus::Canceled, 5000, 0), Utc::now());
        assert!(!check.eligible);
        assert!(check.violations[0].contains("canceled"));
    }

    #[test]
    fn full_refund_uses_remaining_amount() {
        let v = RefundPolicy::default()
            .validate_amount(None, &payment(1, PaymentStatus::Succeeded, 5000, 1500));
        assert!(v.valid);
        assert_eq!(v.amount_to_refund, 3500);
    }

    #[test]
    fn partial_refund_within_bounds() {
        let v = RefundPolicy::default()
            .validate_amount(Some(3500), &payment(1, PaymentStatus::Succeeded, 5000, 1500));
        assert!(v.valid);
        assert_eq!(v.amount_to_refund, 3500);
    }

    #[test]
    fn amount_violations() {
        let policy = RefundPolicy::default();
        let p = payment(1, PaymentStatus::Succeeded, 5000, 1500);

        let over = policy.validate_amount(Some(3501), &p);
        assert!(!over.valid);
        assert!(over.violations[0].contains("35.01 USD"));
        assert!(over.violations[0].contains("35.00 USD"));

        assert!(!policy.validate_amount(Some(0), &p).valid);
        assert!(!policy.validate_amount(Some(-5), &p).valid);

        let spent = payment(1, PaymentStatus::Succeeded, 5000, 5000);
        assert!(!policy.validate_amount(None, &spent).valid);
    }
}
