// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Deskflow integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockClassifier`] - Scripted classifier replies with a keyword fallback
//! - [`MockPaymentGateway`] - Payment gateway that honors idempotency keys
//! - [`MockSearchBackend`] / [`MockRecordSource`] - Fixed search hits and records
//! - [`TestHarness`] - A full engine over the mocks

pub mod harness;
pub mod mock_classifier;
pub mod mock_payment;
pub mod mock_search;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_classifier::{ClassifierReply, MockClassifier};
pub use mock_payment::MockPaymentGateway;
pub use mock_search::{MockRecordSource, MockSearchBackend, hit};
