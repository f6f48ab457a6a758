// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value primitives the durable checkpoint store is written against.
//!
//! The operations mirror what a networked TTL key-value server offers:
//! string keys with optional expiry, sorted sets scored by integers, and a
//! batch of writes applied atomically.

use std::time::Duration;

use async_trait::async_trait;
use deskflow_core::DeskflowError;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (or already expired).
    Missing,
    /// Key exists without an expiry.
    Persistent,
    /// Milliseconds until the key expires.
    Millis(i64),
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum KvWrite {
    /// Replace a string key. `ttl = None` stores it without expiry.
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    /// Remove a key of any type.
    Del { key: String },
    /// Insert or rescore a sorted-set member. A new set has no expiry.
    ZAdd {
        key: String,
        member: String,
        score: i64,
    },
    /// Remove a sorted-set member. An emptied set is removed.
    ZRem { key: String, member: String },
    /// Set the remaining lifetime of an existing key.
    Expire { key: String, ttl: Duration },
}

/// A TTL key-value backend.
///
/// Expired keys must be invisible to every read, whether or not the
/// backend has physically removed them yet.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Short backend name for logs and doctor output.
    fn name(&self) -> &str;

    /// Round-trip check.
    async fn ping(&self) -> Result<(), DeskflowError>;

    async fn get(&self, key: &str) -> Result<Option<String>, DeskflowError>;

    /// Values of several string keys, in request order.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, DeskflowError>;

    async fn pttl(&self, key: &str) -> Result<KeyTtl, DeskflowError>;

    /// Members with scores, highest score first.
    ///
    /// `max_exclusive` keeps only members scored strictly below it;
    /// `limit = None` returns every match.
    async fn zrev_range(
        &self,
        key: &str,
        max_exclusive: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<(String, i64)>, DeskflowError>;

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<i64>, DeskflowError>;

    /// Every live key starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DeskflowError>;

    /// Applies every write or none of them.
    async fn apply(&self, writes: Vec<KvWrite>) -> Result<(), DeskflowError>;
}
