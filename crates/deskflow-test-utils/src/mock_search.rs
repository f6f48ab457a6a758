// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock search backend and record source.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use deskflow_core::types::{
    AdapterType, HealthStatus, RecordIdentifier, RecordKind, SearchHit, SearchQuery, SearchSource,
};
use deskflow_core::{DeskflowError, ExternalService, PluginAdapter, RecordSource, SearchBackend};

/// Builds a hit with empty metadata.
pub fn hit(id: &str, title: &str, score: f64) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        title: title.to_string(),
        content: format!("{title} details"),
        score,
        metadata: Value::Null,
    }
}

/// A search backend with a fixed result list.
///
/// Returns the configured hits (truncated to the query limit) for every
/// non-empty query. Can be made to fail or to respond slowly.
pub struct MockSearchBackend {
    source: SearchSource,
    hits: Vec<SearchHit>,
    failing: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    queries: Mutex<Vec<SearchQuery>>,
}

impl MockSearchBackend {
    pub fn new(source: SearchSource, hits: Vec<SearchHit>) -> Self {
        Self {
            source,
            hits,
            failing: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A backend whose every call errors.
    pub fn failing(source: SearchSource) -> Self {
        let backend = Self::new(source, Vec::new());
        backend.failing.store(true, Ordering::SeqCst);
        backend
    }

    /// Delays every response by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn queries(&self) -> Vec<SearchQuery> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockSearchBackend {
    fn name(&self) -> &str {
        match self.source {
            SearchSource::Lexical => "mock-lexical",
            SearchSource::Semantic => "mock-semantic",
        }
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SearchBackend
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        Ok(())
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    fn source(&self) -> SearchSource {
        self.source
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, DeskflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().await.push(query.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            let service = match self.source {
                SearchSource::Lexical => ExternalService::LexicalSearch,
                SearchSource::Semantic => ExternalService::SemanticSearch,
            };
            return Err(DeskflowError::external(service, "index unavailable"));
        }
        Ok(self.hits.iter().take(query.limit).cloned().collect())
    }
}

/// Customer, product, order and ticket records held in memory.
///
/// Lookups match identifier fields against the record's `email`,
/// `order_id`, `product_id` and `ticket_id` fields. A leaky source ignores
/// the identifiers and returns every record of the kind, which lets tests
/// check that foreign records are filtered out downstream.
pub struct MockRecordSource {
    records: Vec<(RecordKind, Value)>,
    leaky: bool,
    calls: AtomicUsize,
}

impl MockRecordSource {
    pub fn new(records: Vec<(RecordKind, Value)>) -> Self {
        Self {
            records,
            leaky: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn leaky(records: Vec<(RecordKind, Value)>) -> Self {
        Self {
            leaky: true,
            ..Self::new(records)
        }
    }

    /// A small fixture with two customers and their orders.
    pub fn sample() -> Self {
        Self::new(vec![
            (
                RecordKind::Customer,
                json!({"email": "alice@example.com", "name": "Alice"}),
            ),
            (
                RecordKind::Customer,
                json!({"email": "bob@example.com", "name": "Bob"}),
            ),
            (
                RecordKind::Order,
                json!({"order_id": "1234", "email": "alice@example.com", "status": "shipped", "total": 4999}),
            ),
            (
                RecordKind::Order,
                json!({"order_id": "5678", "email": "bob@example.com", "status": "processing", "total": 1599}),
            ),
            (
                RecordKind::Product,
                json!({"product_id": "SKU-100", "name": "Studio Headphones", "price": 19900}),
            ),
            (
                RecordKind::Ticket,
                json!({"ticket_id": "T-1", "email": "alice@example.com", "subject": "Late delivery"}),
            ),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn matches(record: &Value, id: &RecordIdentifier) -> bool {
        let field = |name: &str| record.get(name).and_then(Value::as_str);
        let checks = [
            ("email", id.email.as_deref()),
            ("order_id", id.order_id.as_deref()),
            ("product_id", id.product_id.as_deref()),
            ("ticket_id", id.ticket_id.as_deref()),
        ];
        let mut any = false;
        for (name, wanted) in checks {
            if let Some(wanted) = wanted {
                // Products carry no owner, so an email does not restrict them.
                if name == "email" && field("email").is_none() {
                    continue;
                }
                any = true;
                if field(name) != Some(wanted) {
                    return false;
                }
            }
        }
        any
    }
}

#[async_trait]
impl PluginAdapter for MockRecordSource {
    fn name(&self) -> &str {
        "mock-records"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordSource
    }

    async fn health_check(&self) -> Result<HealthStatus, DeskflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DeskflowError> {
        Ok(())
    }
}

#[async_trait]
impl RecordSource for MockRecordSource {
    async fn fetch(
        &self,
        kind: RecordKind,
        identifier: &RecordIdentifier,
    ) -> Result<Vec<Value>, DeskflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .iter()
            .filter(|(k, _)| *k == kind)
            .filter(|(_, record)| self.leaky || Self::matches(record, identifier))
            .map(|(_, record)| record.clone())
            .collect())
    }
}
