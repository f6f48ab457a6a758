// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` assembles a complete [`SupportEngine`] over mock adapters
//! and either the in-memory checkpoint store or a durable store on a temp
//! SQLite file. `send()` drives the full per-message pipeline.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;

use deskflow_agent::{EngineAdapters, EngineRequest, EngineResponse, SupportEngine};
use deskflow_checkpoint::{CheckpointStoreFactory, MemoryCheckpointStore, SqliteKv};
use deskflow_config::DeskflowConfig;
use deskflow_core::state::ConversationState;
use deskflow_core::types::{RecordKind, SearchHit, SearchSource};
use deskflow_core::{CheckpointStore, DeskflowError};
use deskflow_format::{StreamEvent, chunk_stream};

use crate::mock_classifier::MockClassifier;
use crate::mock_payment::MockPaymentGateway;
use crate::mock_search::{MockRecordSource, MockSearchBackend, hit};

/// Builder for test environments.
pub struct TestHarnessBuilder {
    config: DeskflowConfig,
    replies: Vec<String>,
    lexical_hits: Vec<SearchHit>,
    semantic_hits: Vec<SearchHit>,
    records: Option<Vec<(RecordKind, Value)>>,
    failing_lexical: bool,
    failing_semantic: bool,
    durable: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: DeskflowConfig::default(),
            replies: Vec::new(),
            lexical_hits: vec![
                hit("order-1234", "Order 1234 status", 0.95),
                hit("faq-shipping", "Shipping FAQ", 0.6),
            ],
            semantic_hits: vec![
                hit("sku-200", "Travel Headphones", 0.9),
                hit("sku-100", "Studio Headphones", 0.8),
                hit("faq-shipping", "Shipping FAQ", 0.5),
            ],
            records: None,
            failing_lexical: false,
            failing_semantic: false,
            durable: false,
        }
    }

    pub fn with_config(mut self, config: DeskflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Raw classifier replies, consumed in order. Once they run out the
    /// keyword classifier answers.
    pub fn with_classifier_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_lexical_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.lexical_hits = hits;
        self
    }

    pub fn with_semantic_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.semantic_hits = hits;
        self
    }

    /// Replaces the sample record fixture.
    pub fn with_records(mut self, records: Vec<(RecordKind, Value)>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_failing_lexical(mut self) -> Self {
        self.failing_lexical = true;
        self
    }

    pub fn with_failing_semantic(mut self) -> Self {
        self.failing_semantic = true;
        self
    }

    /// Checkpoints to a temp SQLite file instead of memory.
    pub fn with_durable_store(mut self) -> Self {
        self.durable = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, DeskflowError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| DeskflowError::Storage {
            source: Box::new(e),
        })?;

        let store: Arc<dyn CheckpointStore> = if self.durable {
            let kv = SqliteKv::open(temp_dir.path().join("checkpoints.db")).await?;
            CheckpointStoreFactory::with_backend(self.config.checkpoint.clone(), Arc::new(kv))
                .store()
                .await
        } else {
            Arc::new(MemoryCheckpointStore::new(
                self.config.checkpoint.max_memory_entries,
                self.config.checkpoint.default_ttl(),
            ))
        };

        let classifier = Arc::new(MockClassifier::with_replies(self.replies));
        let gateway = Arc::new(MockPaymentGateway::new());
        let lexical = Arc::new(if self.failing_lexical {
            MockSearchBackend::failing(SearchSource::Lexical)
        } else {
            MockSearchBackend::new(SearchSource::Lexical, self.lexical_hits)
        });
        let semantic = Arc::new(if self.failing_semantic {
            MockSearchBackend::failing(SearchSource::Semantic)
        } else {
            MockSearchBackend::new(SearchSource::Semantic, self.semantic_hits)
        });
        let records = Arc::new(match self.records {
            Some(records) => MockRecordSource::new(records),
            None => MockRecordSource::sample(),
        });

        let engine = SupportEngine::new(
            &self.config,
            EngineAdapters {
                store: Arc::clone(&store),
                classifier: classifier.clone(),
                gateway: gateway.clone(),
                lexical: lexical.clone(),
                semantic: semantic.clone(),
                records: records.clone(),
            },
        );

        Ok(TestHarness {
            engine,
            store,
            classifier,
            gateway,
            lexical,
            semantic,
            records,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine over mock adapters.
pub struct TestHarness {
    pub engine: SupportEngine,
    /// The engine's checkpoint store.
    pub store: Arc<dyn CheckpointStore>,
    pub classifier: Arc<MockClassifier>,
    pub gateway: Arc<MockPaymentGateway>,
    pub lexical: Arc<MockSearchBackend>,
    pub semantic: Arc<MockSearchBackend>,
    pub records: Arc<MockRecordSource>,
    pub config: DeskflowConfig,
    /// Kept alive so the SQLite file outlives the harness.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Sends `text` on `thread_id` as an anonymous user.
    pub async fn send(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<EngineResponse, DeskflowError> {
        self.engine
            .handle_message(&EngineRequest::new(thread_id, text))
            .await
    }

    /// Sends `text` on `thread_id` as the user with `email`.
    pub async fn send_as(
        &self,
        thread_id: &str,
        email: &str,
        text: &str,
    ) -> Result<EngineResponse, DeskflowError> {
        let request = EngineRequest::new(thread_id, text)
            .with_user(email)
            .with_email(email);
        self.engine.handle_message(&request).await
    }

    /// Sends `text` and reads the reply back through the chunk stream.
    pub async fn send_streamed(
        &self,
        thread_id: &str,
        text: &str,
    ) -> Result<(String, usize), DeskflowError> {
        let response = self.send(thread_id, text).await?;
        let chunk_size = self.config.formatter.chunk_size;
        let mut stream = Box::pin(chunk_stream(response.response.content.clone(), chunk_size));

        let mut collected = String::new();
        let mut total = 0;
        while let Some(event) = stream.next().await {
            match event {
                StreamEvent::Partial { content, .. } => collected.push_str(&content),
                StreamEvent::Complete { total_chunks } => {
                    total = total_chunks;
                    break;
                }
            }
        }
        Ok((collected, total))
    }

    /// The thread's latest checkpointed state.
    pub async fn state(
        &self,
        thread_id: &str,
    ) -> Result<Option<ConversationState>, DeskflowError> {
        self.store.load(thread_id, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.state("nobody").await.unwrap().is_none());
        assert!(harness.store.list_threads().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_checkpoints_the_thread() {
        let harness = TestHarness::builder().build().await.unwrap();
        let response = harness.send("t-1", "hello there").await.unwrap();
        assert!(response.checkpoint_id.is_some());

        let state = harness.state("t-1").await.unwrap().unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, response.content());
    }

    #[tokio::test]
    async fn streamed_reply_matches_content() {
        let harness = TestHarness::builder().build().await.unwrap();
        let (streamed, chunks) = harness.send_streamed("t-1", "hello there").await.unwrap();
        let state = harness.state("t-1").await.unwrap().unwrap();
        assert_eq!(streamed, state.messages[1].content);
        assert!(chunks > 0);
    }

    #[tokio::test]
    async fn durable_store_round_trips() {
        let harness = TestHarness::builder()
            .with_durable_store()
            .build()
            .await
            .unwrap();
        harness.send("t-1", "hello there").await.unwrap();
        let state = harness.state("t-1").await.unwrap().unwrap();
        assert_eq!(state.messages.len(), 2);
    }
}
