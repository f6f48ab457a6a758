// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable store with a one-way switch to the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use deskflow_core::state::ConversationState;
use deskflow_core::types::{CheckpointRecord, ThreadMetadata};
use deskflow_core::{AdapterType, CheckpointStore, DeskflowError, HealthStatus, PluginAdapter};

use crate::memory::MemoryCheckpointStore;

/// Runs `$call` against the primary store unless degraded. A store failure
/// flips the switch and the same call is answered by the fallback.
macro_rules! route {
    ($self:ident, $op:literal, |$store:ident| $call:expr) => {{
        if !$self.is_degraded() {
            let $store: &dyn CheckpointStore = $self.primary.as_ref();
            match $call.await {
                Err(e) if e.triggers_store_fallback() => $self.degrade($op, &e),
                other => return other,
            }
        }
        let $store: &dyn CheckpointStore = $self.fallback.as_ref();
        $call.await
    }};
}

/// Wraps a durable store and serves every call from memory once the
/// durable store has failed.
///
/// The switch is never reset for the lifetime of the process. Checkpoints
/// written to the durable store before the switch are not copied over.
pub struct FallbackCheckpointStore {
    primary: Arc<dyn CheckpointStore>,
    fallback: Arc<MemoryCheckpointStore>,
    degraded: AtomicBool,
}

impl FallbackCheckpointStore {
    pub fn new(primary: Arc<dyn CheckpointStore>, fallback: Arc<MemoryCheckpointStore>) -> Self {
        Self {
            primary,
            fallback,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether calls are currently served from memory.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn degrade(&self, operation: &'static str, error: &DeskflowError) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(
                operation,
                primary = self.primary.name(),
                error = %error,
                "checkpoint store failed, switching to in-memory store"
            );
        }
    }
}

#[async_trait]
impl PluginAdapter for FallbackCheckpointStore {
    fn name(&self) -> &str {
        if self.is_degraded() {
            self.fallback.name()
        } else {
            self.primary.name()
        }
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CheckpointStore
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        if self.is_degraded() {
            return Ok(HealthStatus::Degraded(format!(
                "{} store unavailable, serving from memory",
                self.primary.name()
            )));
        }
        self.primary.health_check().await
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        let primary = self.primary.shutdown().await;
        self.fallback.shutdown().await?;
        primary
    }
}

#[async_trait]
impl CheckpointStore for FallbackCheckpointStore {
    async fn save(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        state: &ConversationState,
        metadata: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<CheckpointRecord, DeskflowError> {
        route!(self, "save", |store| store.save(
            thread_id,
            checkpoint_id,
            state,
            metadata.clone(),
            ttl
        ))
    }

    async fn load_record(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<CheckpointRecord>, DeskflowError> {
        route!(self, "load", |store| store.load_record(thread_id, checkpoint_id))
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<String>, DeskflowError> {
        route!(self, "list", |store| store.list(thread_id, limit, before))
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, DeskflowError> {
        route!(self, "delete", |store| store.delete(thread_id, checkpoint_id))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<usize, DeskflowError> {
        route!(self, "delete_thread", |store| store.delete_thread(thread_id))
    }

    async fn extend_ttl(
        &self,
        thread_id: &str,
        additional: Duration,
    ) -> Result<usize, DeskflowError> {
        route!(self, "extend_ttl", |store| store.extend_ttl(thread_id, additional))
    }

    async fn cleanup_expired(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<usize, DeskflowError> {
        route!(self, "cleanup_expired", |store| store
            .cleanup_expired(thread_id, max_age))
    }

    async fn thread_metadata(
        &self,
        thread_id: &str,
    ) -> Result<Option<ThreadMetadata>, DeskflowError> {
        route!(self, "thread_metadata", |store| store.thread_metadata(thread_id))
    }

    async fn list_threads(&self) -> Result<Vec<String>, DeskflowError> {
        route!(self, "list_threads", |store| store.list_threads())
    }
}
