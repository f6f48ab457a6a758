// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checkpoint store trait for per-thread conversation persistence.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeskflowError;
use crate::state::ConversationState;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CheckpointRecord, ThreadMetadata};

/// Persists conversation snapshots keyed by `(thread_id, checkpoint_id)`.
///
/// Implementations must order checkpoints of one thread by creation time
/// and must never return a record whose TTL has elapsed.
#[async_trait]
pub trait CheckpointStore: PluginAdapter {
    /// Persists a snapshot and returns the stored record.
    ///
    /// `ttl = None` uses the store's default TTL. The thread's index and
    /// metadata get the same TTL, refreshing any earlier one.
    async fn save(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        state: &ConversationState,
        metadata: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<CheckpointRecord, DeskflowError>;

    /// Loads a specific checkpoint, or the latest one when `checkpoint_id` is `None`.
    async fn load_record(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<CheckpointRecord>, DeskflowError>;

    /// Loads only the state of a checkpoint.
    async fn load(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<ConversationState>, DeskflowError> {
        Ok(self
            .load_record(thread_id, checkpoint_id)
            .await?
            .map(|record| record.state))
    }

    /// Up to `limit` live checkpoint ids of a thread, newest first.
    ///
    /// With `before`, only checkpoints created strictly earlier than that
    /// checkpoint are listed. An unknown `before` id yields an empty list.
    async fn list(
        &self,
        thread_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<String>, DeskflowError>;

    /// Removes one checkpoint. Returns whether it existed.
    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, DeskflowError>;

    /// Removes every checkpoint of a thread along with its metadata and index.
    /// Returns how many checkpoints were removed.
    async fn delete_thread(&self, thread_id: &str) -> Result<usize, DeskflowError>;

    /// Pushes the expiry of every live checkpoint of a thread `additional` further out.
    /// Returns how many checkpoints were updated.
    async fn extend_ttl(&self, thread_id: &str, additional: Duration)
    -> Result<usize, DeskflowError>;

    /// Removes checkpoints of a thread that are expired or older than `max_age`.
    /// Returns how many were removed.
    async fn cleanup_expired(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<usize, DeskflowError>;

    /// Denormalized thread summary, if the thread exists.
    async fn thread_metadata(
        &self,
        thread_id: &str,
    ) -> Result<Option<ThreadMetadata>, DeskflowError>;

    /// Ids of every thread that currently has metadata.
    async fn list_threads(&self) -> Result<Vec<String>, DeskflowError>;
}
