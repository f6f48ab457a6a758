// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock text classifier for deterministic testing.
//!
//! `MockClassifier` replays queued replies in FIFO order. When the queue is
//! empty it answers like the keyword classifier, so multi-turn tests only
//! need to script the turns they care about.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use deskflow_core::types::{AdapterType, ClassifierRequest, HealthStatus};
use deskflow_core::{DeskflowError, ExternalService, PluginAdapter, TextClassifier};
use deskflow_router::KeywordClassifier;

/// One scripted classifier reply.
#[derive(Debug, Clone)]
pub enum ClassifierReply {
    /// Raw text returned as classifier output.
    Text(String),
    /// Transport failure.
    Error(String),
}

/// A classifier that returns pre-configured replies.
pub struct MockClassifier {
    replies: Arc<Mutex<VecDeque<ClassifierReply>>>,
    requests: Arc<Mutex<Vec<ClassifierRequest>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pre-loads raw text replies.
    pub fn with_replies(replies: Vec<String>) -> Self {
        let mock = Self::new();
        if let Ok(mut queue) = mock.replies.try_lock() {
            queue.extend(replies.into_iter().map(ClassifierReply::Text));
        }
        mock
    }

    pub async fn push(&self, reply: ClassifierReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Queues a well-formed JSON answer.
    pub async fn push_intent(&self, intent: &str, confidence: f64) {
        let text = serde_json::json!({ "intent": intent, "confidence": confidence }).to_string();
        self.push(ClassifierReply::Text(text)).await;
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<ClassifierRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockClassifier {
    fn name(&self) -> &str {
        "mock-classifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Classifier
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        Ok(())
    }
}

#[async_trait]
impl TextClassifier for MockClassifier {
    async fn classify(&self, request: &ClassifierRequest) -> Result<String, DeskflowError> {
        self.requests.lock().await.push(request.clone());
        let next = self.replies.lock().await.pop_front();
        match next {
            Some(ClassifierReply::Text(text)) => Ok(text),
            Some(ClassifierReply::Error(message)) => {
                Err(DeskflowError::external(ExternalService::Classifier, message))
            }
            None => KeywordClassifier::new().classify(request).await,
        }
    }
}
