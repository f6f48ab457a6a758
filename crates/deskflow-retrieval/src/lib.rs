// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retrieval for the Deskflow support engine.
//!
//! [`decide`] picks lexical, semantic or both strategies for a query,
//! [`HybridSearchRouter`] runs them concurrently with isolated failures,
//! and [`merge`] combines their hits into one weighted ranking.

pub mod decision;
pub mod merge;
pub mod router;

pub use decision::decide;
pub use merge::{SearchOptions, merge};
pub use router::HybridSearchRouter;
