// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Refund workflow for the Deskflow support engine.
//!
//! A refund attempt moves through `initiate -> validate -> execute ->
//! complete`. Validation failures stop before the payment gateway is ever
//! contacted, and execution is keyed by a deterministic idempotency key so
//! repeats never create a second refund.

pub mod idempotency;
pub mod nodes;
pub mod policy;
pub mod workflow;

pub use idempotency::idempotency_key;
pub use policy::RefundPolicy;
pub use workflow::RefundWorkflow;
