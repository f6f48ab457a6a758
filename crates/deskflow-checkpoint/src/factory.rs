// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chooses the checkpoint store for the process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use tracing::{info, warn};

use deskflow_config::model::{CheckpointBackend, CheckpointConfig};
use deskflow_core::CheckpointStore;

use crate::durable::DurableCheckpointStore;
use crate::fallback::FallbackCheckpointStore;
use crate::kv::KvBackend;
use crate::memory::MemoryCheckpointStore;
use crate::sqlite::SqliteKv;

/// Which store the factory settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedBackend {
    Durable,
    Memory,
}

/// Outcome of the startup probe, reported by `deskflow doctor`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSelection {
    pub backend: SelectedBackend,
    /// Round trip of the health probe, when one completed.
    pub probe_latency: Option<Duration>,
    /// Why the memory store was chosen.
    pub reason: Option<String>,
}

/// A health probe that did not pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeFailure {
    pub reason: String,
    /// Set when the ping completed but was too slow.
    pub latency: Option<Duration>,
}

impl ProbeFailure {
    fn new(reason: String) -> Self {
        Self {
            reason,
            latency: None,
        }
    }
}

/// Measures one `ping` round trip against `kv`.
///
/// Fails when the ping errors, does not finish within `timeout`, or takes
/// longer than `max_latency`.
pub async fn probe(
    kv: &dyn KvBackend,
    timeout: Duration,
    max_latency: Duration,
) -> Result<Duration, ProbeFailure> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, kv.ping()).await {
        Err(_) => Err(ProbeFailure::new(format!(
            "health probe timed out after {timeout:?}"
        ))),
        Ok(Err(e)) => Err(ProbeFailure::new(format!("health probe failed: {e}"))),
        Ok(Ok(())) => {
            let latency = started.elapsed();
            if latency > max_latency {
                Err(ProbeFailure {
                    reason: format!(
                        "health probe took {latency:?}, above the {max_latency:?} limit"
                    ),
                    latency: Some(latency),
                })
            } else {
                Ok(latency)
            }
        }
    }
}

/// Builds the checkpoint store once and hands the same instance to every caller.
///
/// Never fails: anything wrong with the durable backend selects the
/// in-memory store and logs why.
pub struct CheckpointStoreFactory {
    config: CheckpointConfig,
    backend: Option<Arc<dyn KvBackend>>,
    selected: OnceCell<(Arc<dyn CheckpointStore>, StoreSelection)>,
}

impl CheckpointStoreFactory {
    pub fn new(config: CheckpointConfig) -> Self {
        Self {
            config,
            backend: None,
            selected: OnceCell::new(),
        }
    }

    /// Uses `backend` instead of opening the configured database file.
    pub fn with_backend(config: CheckpointConfig, backend: Arc<dyn KvBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
            selected: OnceCell::new(),
        }
    }

    /// The process-wide checkpoint store.
    pub async fn store(&self) -> Arc<dyn CheckpointStore> {
        let (store, _) = self.selected.get_or_init(|| self.select()).await;
        Arc::clone(store)
    }

    /// How the store was chosen. Triggers selection if it has not run yet.
    pub async fn selection(&self) -> StoreSelection {
        let (_, selection) = self.selected.get_or_init(|| self.select()).await;
        selection.clone()
    }

    fn memory_store(&self) -> Arc<MemoryCheckpointStore> {
        Arc::new(MemoryCheckpointStore::new(
            self.config.max_memory_entries,
            self.config.default_ttl(),
        ))
    }

    fn memory_selection(
        &self,
        reason: String,
        probe_latency: Option<Duration>,
    ) -> (Arc<dyn CheckpointStore>, StoreSelection) {
        let store: Arc<dyn CheckpointStore> = self.memory_store();
        (
            store,
            StoreSelection {
                backend: SelectedBackend::Memory,
                probe_latency,
                reason: Some(reason),
            },
        )
    }

    async fn open_backend(&self) -> Result<Arc<dyn KvBackend>, String> {
        if let Some(backend) = &self.backend {
            return Ok(Arc::clone(backend));
        }
        SqliteKv::open(&self.config.database_path)
            .await
            .map(|kv| Arc::new(kv) as Arc<dyn KvBackend>)
            .map_err(|e| format!("cannot open {}: {e}", self.config.database_path))
    }

    async fn select(&self) -> (Arc<dyn CheckpointStore>, StoreSelection) {
        if self.config.backend == CheckpointBackend::Memory {
            info!("checkpoint store: memory (configured)");
            return self.memory_selection("memory backend configured".to_string(), None);
        }

        let kv = match self.open_backend().await {
            Ok(kv) => kv,
            Err(reason) => {
                warn!(reason = %reason, "durable checkpoint backend unavailable, using memory");
                return self.memory_selection(reason, None);
            }
        };

        let latency = match probe(
            kv.as_ref(),
            self.config.health_probe_timeout(),
            self.config.max_probe_latency(),
        )
        .await
        {
            Ok(latency) => latency,
            Err(failure) => {
                warn!(
                    backend = kv.name(),
                    reason = %failure.reason,
                    "durable checkpoint backend unhealthy, using memory"
                );
                return self.memory_selection(failure.reason, failure.latency);
            }
        };

        info!(
            backend = kv.name(),
            latency_ms = latency.as_millis() as u64,
            "checkpoint store: durable"
        );
        let durable = Arc::new(DurableCheckpointStore::new(kv, self.config.default_ttl()));
        let store: Arc<dyn CheckpointStore> =
            Arc::new(FallbackCheckpointStore::new(durable, self.memory_store()));
        (
            store,
            StoreSelection {
                backend: SelectedBackend::Durable,
                probe_latency: Some(latency),
                reason: None,
            },
        )
    }
}
