// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Deskflow support engine.
//!
//! This crate provides the error type, the conversation state model, the
//! shared data types, and the adapter traits every external collaborator
//! implements. It performs no I/O itself.

pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use error::{DeskflowError, ExternalService};
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    CheckpointStore, PaymentGateway, PluginAdapter, RecordSource, SearchBackend, TextClassifier,
};
