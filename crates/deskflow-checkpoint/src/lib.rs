// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checkpoint persistence for the Deskflow support engine.
//!
//! A [`DurableCheckpointStore`] keeps per-thread snapshots in a TTL
//! key-value backend ([`SqliteKv`] by default). [`MemoryCheckpointStore`]
//! offers the same contract in process memory, and
//! [`CheckpointStoreFactory`] picks between them at startup after probing
//! the durable backend.

pub mod durable;
pub mod factory;
pub mod fallback;
pub mod kv;
pub mod memory;
pub mod sqlite;

pub use durable::{DEFAULT_TTL, DurableCheckpointStore};
pub use factory::{
    CheckpointStoreFactory, ProbeFailure, SelectedBackend, StoreSelection, probe,
};
pub use fallback::FallbackCheckpointStore;
pub use kv::{KeyTtl, KvBackend, KvWrite};
pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteKv;
