// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic idempotency keys for refund creation.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Key for one logical refund attempt.
///
/// Derived from the order id and the millisecond timestamp of the first
/// attempt, so retries of the same attempt reuse the key while a new
/// attempt for the same order gets a new one.
pub fn idempotency_key(order_id: &str, first_attempt_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    hasher.update(b":");
    hasher.update(first_attempt_at.timestamp_millis().to_be_bytes());
    let digest = hasher.finalize();
    format!("refund_{}", hex::encode(&digest[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_inputs_same_key() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(idempotency_key("1234", at), idempotency_key("1234", at));
    }

    #[test]
    fn key_changes_with_order_or_attempt() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let later = at + chrono::Duration::milliseconds(1);
        let base = idempotency_key("1234", at);
        assert_ne!(base, idempotency_key("1235", at));
        assert_ne!(base, idempotency_key("1234", later));
    }

    #[test]
    fn key_shape() {
        let key = idempotency_key("1234", Utc::now());
        assert!(key.starts_with("refund_"));
        assert_eq!(key.len(), "refund_".len() + 32);
        assert!(key["refund_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sub_millisecond_differences_are_ignored() {
        let at = Utc.timestamp_opt(1_700_000_000, 1_000_000).unwrap();
        let nudged = Utc.timestamp_opt(1_700_000_000, 1_000_500).unwrap();
        assert_eq!(idempotency_key("1", at), idempotency_key("1", nudged));
    }
}
