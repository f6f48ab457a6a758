// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation and authorization of tool-call requests, and isolation of
//! their results.
//!
//! A raw [`ToolCallRequest`] becomes a [`ScopedToolCall`] only when every
//! email is well formed, there is at least one identifier, and no
//! identifier names a different user than the caller. Identifiers without
//! an email are pinned to the caller's. Records coming back are then
//! filtered so nothing owned by another user reaches conversation state.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use deskflow_core::DeskflowError;
use deskflow_core::types::{RecordIdentifier, RecordKind, ToolCallRequest};

static EMAIL_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});

/// Record fields that name the owning customer.
const OWNER_FIELDS: &[&str] = &["email", "customer_email"];

/// A tool call that passed validation and authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedToolCall {
    pub kind: RecordKind,
    /// Lower-cased caller address.
    pub user_email: String,
    /// Every identifier carries the caller's email.
    pub identifiers: Vec<RecordIdentifier>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_FORMAT.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn has_lookup_key(id: &RecordIdentifier) -> bool {
    [&id.email, &id.order_id, &id.product_id, &id.ticket_id]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
}

/// Format checks only. Returns [`DeskflowError::Validation`].
pub fn validate_request(request: &ToolCallRequest) -> Result<(), DeskflowError> {
    let user_email = normalize_email(&request.user_email);
    if !is_valid_email(&user_email) {
        return Err(DeskflowError::validation("userEmail is not a valid email address"));
    }
    if request.identifiers.is_empty() {
        return Err(DeskflowError::validation("at least one identifier is required"));
    }
    for (i, id) in request.identifiers.iter().enumerate() {
        if !has_lookup_key(id) {
            return Err(DeskflowError::validation(format!(
                "identifier {i} has no lookup field"
            )));
        }
        if let Some(email) = &id.email {
            if !is_valid_email(&normalize_email(email)) {
                return Err(DeskflowError::validation(format!(
                    "identifier {i} email is not a valid email address"
                )));
            }
        }
    }
    Ok(())
}

/// Validates, then rejects any identifier naming another user.
pub fn authorize(request: &ToolCallRequest) -> Result<ScopedToolCall, DeskflowError> {
    validate_request(request)?;
    let user_email = normalize_email(&request.user_email);

    let mut identifiers = Vec::with_capacity(request.identifiers.len());
    for id in &request.identifiers {
        let email = match &id.email {
            Some(email) => normalize_email(email),
            None => user_email.clone(),
        };
        if email != user_email {
            warn!(kind = %request.kind, "tool call rejected: identifier names another user");
            return Err(DeskflowError::authorization(
                "identifier email does not match the requesting user",
            ));
        }
        identifiers.push(RecordIdentifier {
            email: Some(email),
            ..id.clone()
        });
    }

    Ok(ScopedToolCall {
        kind: request.kind,
        user_email,
        identifiers,
    })
}

/// Whether a record may be shown to `user_email`.
///
/// Records with no owner field (products) are visible to everyone.
pub fn owned_by(record: &Value, user_email: &str) -> bool {
    OWNER_FIELDS.iter().all(|field| match record.get(*field) {
        Some(Value::String(owner)) => normalize_email(owner) == user_email,
        Some(Value::Null) | None => true,
        Some(_) => false,
    })
}

/// Drops records owned by anyone but `user_email`. Returns the kept records
/// and how many were dropped.
pub fn isolate_records(user_email: &str, records: Vec<Value>) -> (Vec<Value>, usize) {
    let user_email = normalize_email(user_email);
    let before = records.len();
    let kept: Vec<Value> = records
        .into_iter()
        .filter(|record| owned_by(record, &user_email))
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        warn!(dropped, "foreign records removed from tool-call result");
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(user: &str, identifiers: Vec<RecordIdentifier>) -> ToolCallRequest {
        ToolCallRequest {
            kind: RecordKind::Order,
            user_email: user.to_string(),
            identifiers,
        }
    }

    fn by_email(email: &str) -> RecordIdentifier {
        RecordIdentifier {
            email: Some(email.to_string()),
            ..RecordIdentifier::default()
        }
    }

    fn by_order(order: &str) -> RecordIdentifier {
        RecordIdentifier {
            order_id: Some(order.to_string()),
            ..RecordIdentifier::default()
        }
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.co.uk"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@example"));
    }

    #[test]
    fn malformed_user_email_is_a_validation_error() {
        let err = authorize(&request("not-an-email", vec![by_order("1")])).unwrap_err();
        assert!(matches!(err, DeskflowError::Validation { .. }));
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        let err = authorize(&request("alice@example.com", vec![])).unwrap_err();
        assert!(matches!(err, DeskflowError::Validation { .. }));

        let err = authorize(&request(
            "alice@example.com",
            vec![RecordIdentifier::default()],
        ))
        .unwrap_err();
        assert!(matches!(err, DeskflowError::Validation { .. }));
    }

    #[test]
    fn malformed_identifier_email_is_validation_not_authorization() {
        let err = authorize(&request("alice@example.com", vec![by_email("bob@")])).unwrap_err();
        assert!(matches!(err, DeskflowError::Validation { .. }));
    }

    #[test]
    fn cross_user_identifier_is_unauthorized() {
        let err = authorize(&request(
            "alice@example.com",
            vec![by_email("alice@example.com"), by_email("bob@example.com")],
        ))
        .unwrap_err();
        assert!(matches!(err, DeskflowError::Authorization { .. }));
        assert!(err.is_terminal());
    }

    #[test]
    fn identifiers_are_pinned_to_caller() {
        let scoped = authorize(&request(
            "Alice@Example.com",
            vec![by_order("1234"), by_email("ALICE@example.com")],
        ))
        .unwrap();
        assert_eq!(scoped.user_email, "alice@example.com");
        for id in &scoped.identifiers {
            assert_eq!(id.email.as_deref(), Some("alice@example.com"));
        }
        assert_eq!(scoped.identifiers[0].order_id.as_deref(), Some("1234"));
    }

    #[test]
    fn isolation_drops_foreign_records() {
        let records = vec![
            json!({"order_id": "1", "email": "alice@example.com"}),
            json!({"order_id": "2", "email": "bob@example.com"}),
            json!({"order_id": "3", "customer_email": "BOB@example.com"}),
            json!({"product_id": "SKU-1"}),
            json!({"order_id": "4", "email": 42}),
        ];
        let (kept, dropped) = isolate_records("alice@example.com", records);
        assert_eq!(dropped, 3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0]["order_id"], "1");
        assert_eq!(kept[1]["product_id"], "SKU-1");
    }
}
