// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inspection and maintenance of checkpointed threads.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use deskflow_core::types::{CheckpointRecord, ThreadMetadata};
use deskflow_core::{CheckpointStore, DeskflowError};

/// How many checkpoint ids `show` lists.
pub const SHOW_HISTORY: usize = 20;

/// A thread's metadata with its latest checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadView {
    pub metadata: ThreadMetadata,
    pub latest: Option<CheckpointRecord>,
    /// Newest first.
    pub checkpoints: Vec<String>,
}

/// Thread operations over a checkpoint store.
#[derive(Clone)]
pub struct ThreadManager {
    store: Arc<dyn CheckpointStore>,
}

impl ThreadManager {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub async fn show(&self, thread_id: &str) -> Result<Option<ThreadView>, DeskflowError> {
        let Some(metadata) = self.store.thread_metadata(thread_id).await? else {
            return Ok(None);
        };
        let latest = self.store.load_record(thread_id, None).await?;
        let checkpoints = self.store.list(thread_id, SHOW_HISTORY, None).await?;
        Ok(Some(ThreadView {
            metadata,
            latest,
            checkpoints,
        }))
    }

    /// Metadata of every known thread, most recently accessed first.
    pub async fn list(&self) -> Result<Vec<ThreadMetadata>, DeskflowError> {
        let mut threads = Vec::new();
        for thread_id in self.store.list_threads().await? {
            if let Some(metadata) = self.store.thread_metadata(&thread_id).await? {
                threads.push(metadata);
            }
        }
        threads.sort_by(|a, b| {
            b.last_accessed
                .cmp(&a.last_accessed)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        Ok(threads)
    }

    pub async fn delete(&self, thread_id: &str) -> Result<usize, DeskflowError> {
        let removed = self.store.delete_thread(thread_id).await?;
        info!(thread_id, removed, "thread deleted");
        Ok(removed)
    }

    pub async fn extend(
        &self,
        thread_id: &str,
        additional: Duration,
    ) -> Result<usize, DeskflowError> {
        let updated = self.store.extend_ttl(thread_id, additional).await?;
        info!(thread_id, updated, ?additional, "thread ttl extended");
        Ok(updated)
    }

    /// Removes expired checkpoints and those older than `max_age`, for one
    /// thread or, with `None`, for every thread.
    pub async fn cleanup(
        &self,
        thread_id: Option<&str>,
        max_age: Duration,
    ) -> Result<usize, DeskflowError> {
        let threads = match thread_id {
            Some(id) => vec![id.to_string()],
            None => self.store.list_threads().await?,
        };
        let mut removed = 0;
        for id in &threads {
            removed += self.store.cleanup_expired(id, max_age).await?;
        }
        info!(threads = threads.len(), removed, "checkpoint cleanup finished");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskflow_checkpoint::MemoryCheckpointStore;
    use deskflow_core::state::{ChatMessage, ConversationState, StateUpdate};
    use serde_json::json;

    async fn seeded() -> ThreadManager {
        let store = Arc::new(MemoryCheckpointStore::default());
        for (thread, checkpoints) in [("t-1", 2), ("t-2", 1)] {
            let mut state = ConversationState::new(thread, Some("u".into()));
            for i in 0..checkpoints {
                state.apply(StateUpdate {
                    messages: vec![ChatMessage::user(format!("message {i}"))],
                    ..StateUpdate::default()
                });
                store
                    .save(thread, &format!("c{i}"), &state, json!({}), None)
                    .await
                    .unwrap();
            }
        }
        ThreadManager::new(store)
    }

    #[tokio::test]
    async fn show_reports_latest_and_history() {
        let threads = seeded().await;
        let view = threads.show("t-1").await.unwrap().unwrap();
        assert_eq!(view.checkpoints, vec!["c1", "c0"]);
        assert_eq!(view.metadata.message_count, 2);
        assert_eq!(view.latest.unwrap().checkpoint_id, "c1");
        assert!(threads.show("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_and_delete() {
        let threads = seeded().await;
        assert_eq!(threads.list().await.unwrap().len(), 2);
        assert_eq!(threads.delete("t-1").await.unwrap(), 2);
        let remaining = threads.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].thread_id, "t-2");
    }

    #[tokio::test]
    async fn extend_and_cleanup() {
        let threads = seeded().await;
        assert_eq!(
            threads.extend("t-1", Duration::from_secs(60)).await.unwrap(),
            2
        );
        assert_eq!(
            threads.cleanup(None, Duration::from_secs(3600)).await.unwrap(),
            0
        );
        // Checkpoint timestamps may run a millisecond ahead of the clock.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(threads.cleanup(None, Duration::ZERO).await.unwrap(), 3);
    }
}
