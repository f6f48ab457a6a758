// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Deskflow support engine.

use std::time::Duration;

use strum::Display;
use thiserror::Error;

/// External collaborators whose failures are reported as [`DeskflowError::ExternalService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ExternalService {
    Classifier,
    PaymentGateway,
    LexicalSearch,
    SemanticSearch,
    CheckpointStore,
    RecordSource,
}

/// The primary error type used across all Deskflow crates.
#[derive(Debug, Error)]
pub enum DeskflowError {
    /// Malformed input (bad email format, missing identifiers, empty message).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Cross-user data access attempt.
    #[error("authorization error: {message}")]
    Authorization { message: String },

    /// Refund policy violation.
    #[error("refund policy violation: {}", violations.join("; "))]
    Eligibility { violations: Vec<String> },

    /// Classifier, payment gateway, retrieval backend, or checkpoint store unreachable or erroring.
    #[error("{service} error: {message}")]
    ExternalService {
        service: ExternalService,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// External call exceeded its bound.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Checkpoint payload malformed on read, or a value could not be encoded.
    #[error("serialization error: {source}")]
    Serialization {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection failure, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeskflowError {
    /// Shorthand for a [`DeskflowError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`DeskflowError::Authorization`].
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Shorthand for a [`DeskflowError::ExternalService`] without an underlying source.
    pub fn external(service: ExternalService, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            message: message.into(),
            source: None,
        }
    }

    /// Wraps any displayable storage failure.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            source: message.into().into(),
        }
    }

    /// Validation and authorization failures end the current request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Authorization { .. })
    }

    /// Whether a checkpoint store failure should switch the engine to the in-memory store.
    pub fn triggers_store_fallback(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Timeout { .. }
                | Self::ExternalService {
                    service: ExternalService::CheckpointStore,
                    ..
                }
        )
    }

    /// Caller-facing text with no identifiers, stack traces, or credentials.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => format!("The request could not be processed: {message}"),
            Self::Authorization { .. } => {
                "You are not allowed to access one or more of the requested records.".to_string()
            }
            Self::Eligibility { violations } => {
                format!("This refund cannot be processed: {}", violations.join("; "))
            }
            Self::ExternalService { service, .. } => match service {
                ExternalService::PaymentGateway => {
                    "The payment service is temporarily unavailable. Please try again later."
                        .to_string()
                }
                ExternalService::LexicalSearch | ExternalService::SemanticSearch => {
                    "Search is temporarily unavailable. Please try again later.".to_string()
                }
                _ => "A required service is temporarily unavailable. Please try again later."
                    .to_string(),
            },
            Self::Timeout { .. } => {
                "The request took too long to complete. Please try again.".to_string()
            }
            Self::Serialization { .. }
            | Self::Config(_)
            | Self::Storage { .. }
            | Self::Internal(_) => "Something went wrong on our side. Please try again.".to_string(),
        }
    }
}

impl From<serde_json::Error> for DeskflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_validation_and_authorization() {
        assert!(DeskflowError::validation("bad email").is_terminal());
        assert!(DeskflowError::authorization("cross-user").is_terminal());
        assert!(!DeskflowError::external(ExternalService::PaymentGateway, "down").is_terminal());
        assert!(!DeskflowError::Internal("x".into()).is_terminal());
    }

    #[test]
    fn store_fallback_only_for_store_failures() {
        assert!(DeskflowError::storage("disk").triggers_store_fallback());
        assert!(
            DeskflowError::external(ExternalService::CheckpointStore, "refused")
                .triggers_store_fallback()
        );
        assert!(
            !DeskflowError::external(ExternalService::PaymentGateway, "refused")
                .triggers_store_fallback()
        );
        assert!(!DeskflowError::validation("x").triggers_store_fallback());
    }

    #[test]
    fn user_message_hides_internal_detail() {
        let err = DeskflowError::external(
            ExternalService::PaymentGateway,
            "sk-live-secret rejected pi_123",
        );
        let text = err.user_message();
        assert!(!text.contains("pi_123"));
        assert!(!text.contains("sk-live"));

        let err = DeskflowError::authorization("alice@example.com asked for bob@example.com");
        assert!(!err.user_message().contains("example.com"));
    }

    #[test]
    fn serde_errors_become_serialization() {
        let err: DeskflowError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, DeskflowError::Serialization { .. }));
    }

    #[test]
    fn external_service_display_is_snake_case() {
        assert_eq!(ExternalService::PaymentGateway.to_string(), "payment_gateway");
        let err = DeskflowError::external(ExternalService::SemanticSearch, "503");
        assert_eq!(err.to_string(), "semantic_search error: 503");
    }
}
