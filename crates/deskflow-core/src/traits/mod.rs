// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for Deskflow's external collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod checkpoint;
pub mod classifier;
pub mod payment;
pub mod records;
pub mod search;

pub use adapter::PluginAdapter;
pub use checkpoint::CheckpointStore;
pub use classifier::TextClassifier;
pub use payment::PaymentGateway;
pub use records::RecordSource;
pub use search::SearchBackend;
