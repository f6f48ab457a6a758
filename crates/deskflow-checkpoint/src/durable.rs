// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checkpoint store over a TTL key-value backend.
//!
//! Key schema:
//!
//! | key                                  | type       | content                          |
//! |--------------------------------------|------------|----------------------------------|
//! | `checkpoint:{thread}:{checkpoint}`   | string     | JSON [`CheckpointRecord`]        |
//! | `index:{thread}`                     | sorted set | checkpoint ids scored by ms time |
//! | `metadata:{thread}`                  | string     | JSON [`ThreadMetadata`]          |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use deskflow_core::state::ConversationState;
use deskflow_core::types::{CheckpointRecord, ThreadMetadata};
use deskflow_core::{AdapterType, CheckpointStore, DeskflowError, HealthStatus, PluginAdapter};

use crate::kv::{KeyTtl, KvBackend, KvWrite};

/// TTL used when neither the caller nor the configuration supplies one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

pub fn checkpoint_key(thread_id: &str, checkpoint_id: &str) -> String {
    format!("checkpoint:{thread_id}:{checkpoint_id}")
}

pub fn index_key(thread_id: &str) -> String {
    format!("index:{thread_id}")
}

pub fn metadata_key(thread_id: &str) -> String {
    format!("metadata:{thread_id}")
}

const METADATA_PREFIX: &str = "metadata:";

fn to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Durable checkpoint store. See the module docs for the key layout.
pub struct DurableCheckpointStore {
    kv: Arc<dyn KvBackend>,
    default_ttl: Duration,
}

impl DurableCheckpointStore {
    pub fn new(kv: Arc<dyn KvBackend>, default_ttl: Duration) -> Self {
        Self { kv, default_ttl }
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.kv
    }

    /// Index entries whose checkpoint record still exists, newest first.
    async fn live_members(
        &self,
        thread_id: &str,
        max_exclusive: Option<i64>,
    ) -> Result<Vec<(String, i64, String)>, DeskflowError> {
        let members = self
            .kv
            .zrev_range(&index_key(thread_id), max_exclusive, None)
            .await?;
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = members
            .iter()
            .map(|(id, _)| checkpoint_key(thread_id, id))
            .collect();
        let values = self.kv.mget(&keys).await?;
        Ok(members
            .into_iter()
            .zip(values)
            .filter_map(|((id, score), value)| value.map(|v| (id, score, v)))
            .collect())
    }

    /// Index members whose record has expired.
    async fn stale_members(&self, thread_id: &str) -> Result<Vec<String>, DeskflowError> {
        let members = self.kv.zrev_range(&index_key(thread_id), None, None).await?;
        let keys: Vec<String> = members
            .iter()
            .map(|(id, _)| checkpoint_key(thread_id, id))
            .collect();
        let values = self.kv.mget(&keys).await?;
        Ok(members
            .into_iter()
            .zip(values)
            .filter(|(_, value)| value.is_none())
            .map(|((id, _), _)| id)
            .collect())
    }

    fn parse_record(raw: &str) -> Result<CheckpointRecord, DeskflowError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Rewrites or removes thread metadata after checkpoints were removed.
    async fn refresh_metadata_after_removal(
        &self,
        thread_id: &str,
        writes: &mut Vec<KvWrite>,
        remaining: &[(String, i64, String)],
    ) -> Result<(), DeskflowError> {
        let meta_key = metadata_key(thread_id);
        if remaining.is_empty() {
            writes.push(KvWrite::Del { key: meta_key });
            writes.push(KvWrite::Del {
                key: index_key(thread_id),
            });
            return Ok(());
        }
        let Some(raw) = self.kv.get(&meta_key).await? else {
            return Ok(());
        };
        let mut meta: ThreadMetadata = serde_json::from_str(&raw)?;
        meta.checkpoint_count = remaining.len();
        meta.latest_checkpoint_id = remaining.first().map(|(id, _, _)| id.clone());
        let ttl = match self.kv.pttl(&meta_key).await? {
            KeyTtl::Millis(ms) if ms > 0 => Some(Duration::from_millis(ms as u64)),
            KeyTtl::Persistent => None,
            _ => return Ok(()),
        };
        writes.push(KvWrite::Set {
            key: meta_key,
            value: serde_json::to_string(&meta)?,
            ttl,
        });
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for DurableCheckpointStore {
    fn name(&self) -> &str {
        "durable"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::CheckpointStore
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        match self.kv.ping().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for DurableCheckpointStore {
    async fn save(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        state: &ConversationState,
        metadata: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<CheckpointRecord, DeskflowError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let index = index_key(thread_id);

        let latest = self.kv.zrev_range(&index, None, Some(1)).await?;
        let now_ms = Utc::now().timestamp_millis();
        let created_ms = latest
            .first()
            .map_or(now_ms, |(_, score)| now_ms.max(score + 1));
        let created_at = to_datetime(created_ms);

        let record = CheckpointRecord {
            thread_id: thread_id.to_string(),
            checkpoint_id: checkpoint_id.to_string(),
            state: state.clone(),
            metadata,
            created_at,
            expires_at: Some(created_at + chrono_duration(ttl)),
        };

        let stale = self.stale_members(thread_id).await?;
        let live_before = self.live_members(thread_id, None).await?;
        let replaces_existing = live_before.iter().any(|(id, _, _)| id == checkpoint_id);
        let checkpoint_count = live_before.len() + usize::from(!replaces_existing);

        let thread_meta = ThreadMetadata {
            thread_id: thread_id.to_string(),
            user_id: state.metadata.user_id.clone(),
            message_count: state.messages.len(),
            checkpoint_count,
            latest_checkpoint_id: Some(checkpoint_id.to_string()),
            last_accessed: Utc::now(),
        };

        let mut writes = vec![
            KvWrite::Set {
                key: checkpoint_key(thread_id, checkpoint_id),
                value: serde_json::to_string(&record)?,
                ttl: Some(ttl),
            },
            KvWrite::ZAdd {
                key: index.clone(),
                member: checkpoint_id.to_string(),
                score: created_ms,
            },
        ];
        writes.extend(stale.into_iter().map(|member| KvWrite::ZRem {
            key: index.clone(),
            member,
        }));
        writes.push(KvWrite::Expire { key: index, ttl });
        writes.push(KvWrite::Set {
            key: metadata_key(thread_id),
            value: serde_json::to_string(&thread_meta)?,
            ttl: Some(ttl),
        });
        self.kv.apply(writes).await?;

        debug!(
            thread_id = %thread_id,
            checkpoint_id = %checkpoint_id,
            ttl_secs = ttl.as_secs(),
            "checkpoint saved"
        );
        Ok(record)
    }

    async fn load_record(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<Option<CheckpointRecord>, DeskflowError> {
        let raw = match checkpoint_id {
            Some(id) => self.kv.get(&checkpoint_key(thread_id, id)).await?,
            None => self
                .live_members(thread_id, None)
                .await?
                .into_iter()
                .next()
                .map(|(_, _, raw)| raw),
        };
        let Some(raw) = raw else {
            return Ok(None);
        };
        let record = Self::parse_record(&raw)?;
        if record.is_expired_at(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn list(
        &self,
        thread_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<String>, DeskflowError> {
        let max_exclusive = match before {
            Some(id) => match self.kv.zscore(&index_key(thread_id), id).await? {
                Some(score) => Some(score),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        Ok(self
            .live_members(thread_id, max_exclusive)
            .await?
            .into_iter()
            .take(limit)
            .map(|(id, _, _)| id)
            .collect())
    }

    async fn delete(&self, thread_id: &str, checkpoint_id: &str) -> Result<bool, DeskflowError> {
        let key = checkpoint_key(thread_id, checkpoint_id);
        let existed = self.kv.get(&key).await?.is_some();
        let remaining: Vec<_> = self
            .live_members(thread_id, None)
            .await?
            .into_iter()
            .filter(|(id, _, _)| id != checkpoint_id)
            .collect();

        let mut writes = vec![
            KvWrite::Del { key },
            KvWrite::ZRem {
                key: index_key(thread_id),
                member: checkpoint_id.to_string(),
            },
        ];
        self.refresh_metadata_after_removal(thread_id, &mut writes, &remaining)
            .await?;
        self.kv.apply(writes).await?;
        Ok(existed)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<usize, DeskflowError> {
        let members = self.kv.zrev_range(&index_key(thread_id), None, None).await?;
        let live = self.live_members(thread_id, None).await?.len();

        let mut writes: Vec<KvWrite> = members
            .into_iter()
            .map(|(id, _)| KvWrite::Del {
                key: checkpoint_key(thread_id, &id),
            })
            .collect();
        writes.push(KvWrite::Del {
            key: index_key(thread_id),
        });
        writes.push(KvWrite::Del {
            key: metadata_key(thread_id),
        });
        self.kv.apply(writes).await?;

        debug!(thread_id = %thread_id, removed = live, "thread deleted");
        Ok(live)
    }

    async fn extend_ttl(
        &self,
        thread_id: &str,
        additional: Duration,
    ) -> Result<usize, DeskflowError> {
        let now = Utc::now();
        let mut writes = Vec::new();
        for (id, _, raw) in self.live_members(thread_id, None).await? {
            let mut record = Self::parse_record(&raw)?;
            let Some(expires_at) = record.expires_at else {
                continue;
            };
            let new_expiry = expires_at + chrono_duration(additional);
            record.expires_at = Some(new_expiry);
            let remaining = (new_expiry - now).to_std().unwrap_or(Duration::ZERO);
            writes.push(KvWrite::Set {
                key: checkpoint_key(thread_id, &id),
                value: serde_json::to_string(&record)?,
                ttl: Some(remaining),
            });
        }
        let updated = writes.len();

        for key in [index_key(thread_id), metadata_key(thread_id)] {
            if let KeyTtl::Millis(ms) = self.kv.pttl(&key).await? {
                let current = Duration::from_millis(ms.max(0) as u64);
                writes.push(KvWrite::Expire {
                    key,
                    ttl: current + additional,
                });
            }
        }
        self.kv.apply(writes).await?;
        Ok(updated)
    }

    async fn cleanup_expired(
        &self,
        thread_id: &str,
        max_age: Duration,
    ) -> Result<usize, DeskflowError> {
        let cutoff = Utc::now().timestamp_millis()
            - i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let stale = self.stale_members(thread_id).await?;
        let live = self.live_members(thread_id, None).await?;
        if stale.is_empty() && live.iter().all(|(_, score, _)| *score >= cutoff) {
            return Ok(0);
        }

        let index = index_key(thread_id);
        let (old, remaining): (Vec<_>, Vec<_>) =
            live.into_iter().partition(|(_, score, _)| *score < cutoff);
        let removed = stale.len() + old.len();

        let mut writes = Vec::new();
        for member in stale {
            writes.push(KvWrite::ZRem {
                key: index.clone(),
                member,
            });
        }
        for (id, _, _) in old {
            writes.push(KvWrite::Del {
                key: checkpoint_key(thread_id, &id),
            });
            writes.push(KvWrite::ZRem {
                key: index.clone(),
                member: id,
            });
        }
        self.refresh_metadata_after_removal(thread_id, &mut writes, &remaining)
            .await?;
        self.kv.apply(writes).await?;

        debug!(thread_id = %thread_id, removed, "expired checkpoints cleaned up");
        Ok(removed)
    }

    async fn thread_metadata(
        &self,
        thread_id: &str,
    ) -> Result<Option<ThreadMetadata>, DeskflowError> {
        match self.kv.get(&metadata_key(thread_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn list_threads(&self) -> Result<Vec<String>, DeskflowError> {
        Ok(self
            .kv
            .keys_with_prefix(METADATA_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(METADATA_PREFIX).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteKv;
    use deskflow_core::state::{ChatMessage, StateUpdate};

    async fn store() -> DurableCheckpointStore {
        let kv = SqliteKv::open_in_memory().await.unwrap();
        DurableCheckpointStore::new(Arc::new(kv), DEFAULT_TTL)
    }

    fn state_with(thread: &str, text: &str) -> ConversationState {
        let mut state = ConversationState::new(thread, Some("user-1".into()));
        state.apply(StateUpdate {
            messages: vec![ChatMessage::user(text)],
            ..StateUpdate::default()
        });
        state
    }

    #[test]
    fn key_schema() {
        assert_eq!(checkpoint_key("t1", "c1"), "checkpoint:t1:c1");
        assert_eq!(index_key("t1"), "index:t1");
        assert_eq!(metadata_key("t1"), "metadata:t1");
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = store().await;
        let state = state_with("t1", "refund order #1234");
        store
            .save("t1", "c1", &state, serde_json::json!({"step": 1}), None)
            .await
            .unwrap();
        let loaded = store.load("t1", None).await.unwrap().unwrap();
        assert_eq!(loaded, state);
        let record = store.load_record("t1", Some("c1")).await.unwrap().unwrap();
        assert_eq!(record.metadata["step"], 1);
    }

    #[tokio::test]
    async fn created_at_is_strictly_increasing() {
        let store = store().await;
        let state = state_with("t1", "hi");
        let a = store
            .save("t1", "a", &state, serde_json::Value::Null, None)
            .await
            .unwrap();
        let b = store
            .save("t1", "b", &state, serde_json::Value::Null, None)
            .await
            .unwrap();
        let c = store
            .save("t1", "c", &state, serde_json::Value::Null, None)
            .await
            .unwrap();
        assert!(a.created_at < b.created_at);
        assert!(b.created_at < c.created_at);
        assert_eq!(store.list("t1", 10, None).await.unwrap(), vec!["c", "b", "a"]);
        assert_eq!(store.list("t1", 10, Some("b")).await.unwrap(), vec!["a"]);
        assert_eq!(store.list("t1", 1, None).await.unwrap(), vec!["c"]);
        assert!(store.list("t1", 10, Some("nope")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_tracks_latest_write() {
        let store = store().await;
        store
            .save("t1", "a", &state_with("t1", "one"), serde_json::Value::Null, None)
            .await
            .unwrap();
        let mut state = state_with("t1", "one");
        state.apply(StateUpdate {
            messages: vec![ChatMessage::assistant("two")],
            ..StateUpdate::default()
        });
        store
            .save("t1", "b", &state, serde_json::Value::Null, None)
            .await
            .unwrap();
        let meta = store.thread_metadata("t1").await.unwrap().unwrap();
        assert_eq!(meta.message_count, 2);
        assert_eq!(meta.checkpoint_count, 2);
        assert_eq!(meta.latest_checkpoint_id.as_deref(), Some("b"));
        assert_eq!(meta.user_id.as_deref(), Some("user-1"));
        assert_eq!(store.list_threads().await.unwrap(), vec!["t1"]);
    }

    #[tokio::test]
    async fn delete_single_checkpoint() {
        let store = store().await;
        let state = state_with("t1", "x");
        store.save("t1", "a", &state, serde_json::Value::Null, None).await.unwrap();
        store.save("t1", "b", &state, serde_json::Value::Null, None).await.unwrap();

        assert!(store.delete("t1", "b").await.unwrap());
        assert!(!store.delete("t1", "b").await.unwrap());
        assert_eq!(store.list("t1", 10, None).await.unwrap(), vec!["a"]);
        let meta = store.thread_metadata("t1").await.unwrap().unwrap();
        assert_eq!(meta.checkpoint_count, 1);
        assert_eq!(meta.latest_checkpoint_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn delete_thread_removes_everything() {
        let store = store().await;
        let state = state_with("t1", "x");
        store.save("t1", "a", &state, serde_json::Value::Null, None).await.unwrap();
        store.save("t1", "b", &state, serde_json::Value::Null, None).await.unwrap();
        store.save("t2", "z", &state, serde_json::Value::Null, None).await.unwrap();

        assert_eq!(store.delete_thread("t1").await.unwrap(), 2);
        assert!(store.load("t1", None).await.unwrap().is_none());
        assert!(store.thread_metadata("t1").await.unwrap().is_none());
        assert!(store.load("t2", None).await.unwrap().is_some());
        assert_eq!(store.delete_thread("t1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ttl_expiry_hides_checkpoint() {
        let store = store().await;
        let state = state_with("t1", "x");
        store
            .save("t1", "c1", &state, serde_json::Value::Null, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(store.load("t1", None).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.load("t1", None).await.unwrap().is_none());
        assert!(store.load("t1", Some("c1")).await.unwrap().is_none());
        assert!(store.list("t1", 10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn extend_ttl_pushes_expiry_out() {
        let store = store().await;
        let state = state_with("t1", "x");
        let saved = store
            .save("t1", "c1", &state, serde_json::Value::Null, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(
            store.extend_ttl("t1", Duration::from_secs(3600)).await.unwrap(),
            1
        );
        let record = store.load_record("t1", Some("c1")).await.unwrap().unwrap();
        let pushed = record.expires_at.unwrap() - saved.expires_at.unwrap();
        assert_eq!(pushed, chrono::Duration::seconds(3600));
        assert_eq!(store.extend_ttl("ghost", Duration::from_secs(1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_removes_checkpoints_older_than_max_age() {
        let store = store().await;
        let state = state_with("t1", "x");
        store.save("t1", "old", &state, serde_json::Value::Null, None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.save("t1", "new", &state, serde_json::Value::Null, None).await.unwrap();

        let removed = store
            .cleanup_expired("t1", Duration::from_millis(25))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list("t1", 10, None).await.unwrap(), vec!["new"]);
        assert_eq!(
            store.thread_metadata("t1").await.unwrap().unwrap().checkpoint_count,
            1
        );
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_serialization_error() {
        let kv = Arc::new(SqliteKv::open_in_memory().await.unwrap());
        kv.apply(vec![
            KvWrite::Set {
                key: checkpoint_key("t1", "bad"),
                value: "{not json".into(),
                ttl: None,
            },
            KvWrite::ZAdd {
                key: index_key("t1"),
                member: "bad".into(),
                score: 1,
            },
        ])
        .await
        .unwrap();
        let store = DurableCheckpointStore::new(kv, DEFAULT_TTL);
        let err = store.load("t1", None).await.unwrap_err();
        assert!(matches!(err, DeskflowError::Serialization { .. }));
    }
}
