// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local checkpoint store with the same TTL semantics as the durable one.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use deskflow_core::state::ConversationState;
use deskflow_core::types::{CheckpointRecord, ThreadMetadata};
use deskflow_core::{AdapterType, CheckpointStore, DeskflowError, HealthStatus, PluginAdapter};

use crate::durable::DEFAULT_TTL;

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug)]
struct ThreadEntry {
    /// Oldest first.
    records: Vec<CheckpointRecord>,
    metadata: ThreadMetadata,
    /// Expiry of the thread's index and metadata.
    expires_at: DateTime<Utc>,
}

impl ThreadEntry {
    fn prune(&mut self, now: DateTime<Utc>) {
        self.records.retain(|r| !r.is_expired_at(now));
    }

    fn sync_metadata(&mut self) {
        self.metadata.checkpoint_count = self.records.len();
        self.metadata.latest_checkpoint_id = self.records.last().map(|r| r.checkpoint_id.clone());
    }
}

#[derive(Debug, Default)]
struct Inner {
    threads: HashMap<String, ThreadEntry>,
    /// Creation time of the newest checkpoint in the store.
    last_created: Option<DateTime<Utc>>,
}

/// In-memory checkpoint store.
///
/// Creation times are strictly increasing across the whole store, so the
/// oldest checkpoint is always unique. Once the total number of checkpoints
/// exceeds `max_entries`, the oldest ones are evicted first.
pub struct MemoryCheckpointStore {
    inner: RwLock<Inner>,
    max_entries: usize,
    default_ttl: Duration,
}

impl MemoryCheckpointStore {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    /// Total live checkpoints across threads.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        self.inner
            .read()
            .await
            .threads
            .values()
            .filter(|t| t.expires_at > now)
            .map(|t| t.records.iter().filter(|r| !r.is_expired_at(now)).count())
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every expired checkpoint and thread. Returns how many checkpoints went away.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        inner.threads.retain(|_, entry| {
            if entry.expires_at <= now {
                removed += entry.records.len();
                return false;
            }
            let before = entry.records.len();
            entry.prune(now);
            removed += before - entry.records.len();
            if entry.records.is_empty() {
                return false;
            }
            entry.sync_metadata();
            true
        });
        removed
    }

    fn evict_oldest(threads: &mut HashMap<String, ThreadEntry>, max_entries: usize) -> usize {
        let mut total: usize = threads.values().map(|t| t.records.len()).sum();
        let mut evicted = 0;
        while total > max_entries {
            let oldest = threads
                .iter()
                .filter_map(|(id, t)| t.records.first().map(|r| (id.clone(), r.created_at)))
                .min_by_key(|(_, created)| *created)
                .map(|(id, _)| id);
            let Some(thread_id) = oldest else { break };
            let now_empty = match threads.get_mut(&thread_id) {
                Some(entry) => {
                    entry.records.remove(0);
                    entry.sync_metadata();
                    entry.records.is_empty()
                }
                None => break,
            };
            if now_empty {
                threads.remove(&thread_id);
            }
            total -= 1;
            evicted += 1;
        }
        evicted
    }

    /// Live entry for a thread, dropping it first when its index has expired.
    fn live_entry<'a>(
        threads: &'a mut HashMap<String, ThreadEntry>,
        thread_id: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut ThreadEntry> {
        if threads.get(thread_id).is_some_and(|t| t.expires_at <= now) {
            threads.remove(thread_id);
        }
        let entry = threads.get_mut(thread_id)?;
        entry.prune(now);
        Some(entry)
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new(10_000, DEFAULT_TTL)
    }
}

#[async_trait]
impl PluginAdapter for MemoryCheckpointStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CheckpointStore
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        *self.inner.write().await = Inner::default();
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        state: &ConversationState,
        metadata: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<CheckpointRecord, DeskflowError> {
        let ttl = chrono_duration(ttl.unwrap_or(self.default_ttl));
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let created_at = match inner.last_created {
            Some(prev) if prev >= now => prev + chrono::Duration::milliseconds(1),
            _ => now,
        };
        inner.last_created = Some(created_at);
        let threads = &mut inner.threads;
        // Drops an expired thread so it restarts with fresh metadata.
        let _ = Self::live_entry(threads, thread_id, now);
        let record = CheckpointRecord {
            thread_id: thread_id.to_string(),
            checkpoint_id: checkpoint_id.to_string(),
            state: state.clone(),
            metadata,
            created_at,
            expires_at: Some(created_at + ttl),
        };

        let entry = threads
            .entry(thread_id.to_string())
            .or_insert_with(|| ThreadEntry {
                records: Vec::new(),
                metadata: ThreadMetadata {
                    thread_id: thread_id.to_string(),
                    user_id: None,
                    message_count: 0,
                    checkpoint_count: 0,
                    latest_checkpoint_id: None,
                    last_accessed: now,
                },
                expires_at: now + ttl,
            });
        entry.records.retain(|r| r.checkpoint_id != checkpoint_id);
        entry.records.push(record.clone());
        entry.expires_at = now + ttl;
        entry.metadata.user_id = state.metadata.user_id.clone();
        entry.metadata.message_count = state.messages.len();
        entry.metadata.last_accessed = now;
        entry.sync_metadata();

        let evicted = Self::evict_oldest(threads, self.max_entries);
        if evicted > 0 {
            debug!(evicted, max_entries = self.max_entries, "memory store evicted checkpoints");
        }
        Ok(record)
    }

    async fn load_record(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<CheckpointRecord>, DeskflowError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let threads = &mut inner.threads;
        let Some(entry) = Self::live_entry(threads, thread_id, now) else {
            return Ok(None);
        };
        let found = match checkpoint_id {
            Some(id) => entry.records.iter().find(|r| r.checkpoint_id == id),
            None => entry.records.last(),
        };
        Ok(found.cloned())
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<String>, DeskflowError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let threads = &mut inner.threads;
        let Some(entry) = Self::live_entry(threads, thread_id, now) else {
            return Ok(Vec::new());
        };
        let cutoff = match before {
            Some(id) => match entry.records.iter().find(|r| r.checkpoint_id == id) {
                Some(r) => Some(r.created_at),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        Ok(entry
            .records
            .iter()
            .rev()
            .filter(|r| cutoff.is_none_or(|c| r.created_at < c))
            .take(limit)
            .map(|r| r.checkpoint_id.clone())
            .collect())
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, DeskflowError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let threads = &mut inner.threads;
        let Some(entry) = Self::live_entry(threads, thread_id, now) else {
            return Ok(false);
        };
        let before = entry.records.len();
        entry.records.retain(|r| r.checkpoint_id != checkpoint_id);
        let existed = entry.records.len() < before;
        entry.sync_metadata();
        if entry.records.is_empty() {
            threads.remove(thread_id);
        }
        Ok(existed)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<usize, DeskflowError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let threads = &mut inner.threads;
        let live = Self::live_entry(threads, thread_id, now).map_or(0, |t| t.records.len());
        threads.remove(thread_id);
        Ok(live)
    }

    async fn extend_ttl(
        &self,
        thread_id: &str,
        additional: Duration,
    ) -> Result<usize, DeskflowError> {
        let now = Utc::now();
        let additional = chrono_duration(additional);
        let mut inner = self.inner.write().await;
        let threads = &mut inner.threads;
        let Some(entry) = Self::live_entry(threads, thread_id, now) else {
            return Ok(0);
        };
        let mut updated = 0;
        for record in &mut entry.records {
            if let Some(expires_at) = record.expires_at {
                record.expires_at = Some(expires_at + additional);
                updated += 1;
            }
        }
        entry.expires_at += additional;
        Ok(updated)
    }

    async fn cleanup_expired(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<usize, DeskflowError> {
        let now = Utc::now();
        let cutoff = now - chrono_duration(max_age);
        let mut inner = self.inner.write().await;
        let threads = &mut inner.threads;
        let Some(entry) = threads.get_mut(thread_id) else {
            return Ok(0);
        };
        let before = entry.records.len();
        if entry.expires_at <= now {
            threads.remove(thread_id);
            return Ok(before);
        }
        entry
            .records
            .retain(|r| !r.is_expired_at(now) && r.created_at >= cutoff);
        let removed = before - entry.records.len();
        entry.sync_metadata();
        if entry.records.is_empty() {
            threads.remove(thread_id);
        }
        Ok(removed)
    }

    async fn thread_metadata(
        &self,
        thread_id: &str,
    ) -> Result<Option<ThreadMetadata>, DeskflowError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        Ok(Self::live_entry(&mut inner.threads, thread_id, now).map(|t| t.metadata.clone()))
    }

    async fn list_threads(&self) -> Result<Vec<String>, DeskflowError> {
        let now = Utc::now();
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner
            .threads
            .iter()
            .filter(|(_, t)| t.expires_at > now)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskflow_core::state::{ChatMessage, StateUpdate};

    fn state(thread: &str) -> ConversationState {
        let mut state = ConversationState::new(thread, Some("u".into()));
        state.apply(StateUpdate {
            messages: vec![ChatMessage::user("hello")],
            ..StateUpdate::default()
        });
        state
    }

    #[tokio::test]
    async fn round_trip_and_latest() {
        let store = MemoryCheckpointStore::default();
        let s = state("t1");
        store.save("t1", "a", &s, serde_json::Value::Null, None).await.unwrap();
        store.save("t1", "b", &s, serde_json::Value::Null, None).await.unwrap();
        let latest = store.load_record("t1", None).await.unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, "b");
        assert_eq!(latest.state, s);
        assert_eq!(store.list("t1", 10, None).await.unwrap(), vec!["b", "a"]);
        assert_eq!(store.list("t1", 10, Some("b")).await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn created_at_strictly_increases() {
        let store = MemoryCheckpointStore::default();
        let s = state("t1");
        let mut previous = None;
        for i in 0..20 {
            let rec = store
                .save("t1", &format!("c{i}"), &s, serde_json::Value::Null, None)
                .await
                .unwrap();
            if let Some(prev) = previous {
                assert!(rec.created_at > prev);
            }
            previous = Some(rec.created_at);
        }
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_capacity() {
        let store = MemoryCheckpointStore::new(3, DEFAULT_TTL);
        let s = state("t");
        store.save("t1", "a", &s, serde_json::Value::Null, None).await.unwrap();
        store.save("t2", "b", &s, serde_json::Value::Null, None).await.unwrap();
        store.save("t1", "c", &s, serde_json::Value::Null, None).await.unwrap();
        store.save("t2", "d", &s, serde_json::Value::Null, None).await.unwrap();

        assert_eq!(store.len().await, 3);
        assert!(store.load("t1", Some("a")).await.unwrap().is_none());
        assert!(store.load("t2", Some("b")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn ttl_expiry_hides_checkpoint() {
        let store = MemoryCheckpointStore::default();
        store
            .save("t1", "c1", &state("t1"), serde_json::Value::Null, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.load("t1", None).await.unwrap().is_none());
        assert!(store.thread_metadata("t1").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn delete_thread_and_metadata() {
        let store = MemoryCheckpointStore::default();
        let s = state("t1");
        store.save("t1", "a", &s, serde_json::Value::Null, None).await.unwrap();
        store.save("t1", "b", &s, serde_json::Value::Null, None).await.unwrap();
        let meta = store.thread_metadata("t1").await.unwrap().unwrap();
        assert_eq!(meta.checkpoint_count, 2);
        assert_eq!(meta.message_count, 1);

        assert_eq!(store.delete_thread("t1").await.unwrap(), 2);
        assert!(store.thread_metadata("t1").await.unwrap().is_none());
        assert!(store.list_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_expired_counts_removed() {
        let store = MemoryCheckpointStore::default();
        let s = state("t1");
        store
            .save("t1", "short", &s, serde_json::Value::Null, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        store.save("t2", "long", &s, serde_json::Value::Null, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.list_threads().await.unwrap(), vec!["t2"]);
    }
}
