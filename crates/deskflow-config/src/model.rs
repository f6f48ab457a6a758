// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Deskflow support engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use deskflow_core::state::{OutputShape, RefundReason};
use deskflow_core::types::PaymentStatus;
use serde::{Deserialize, Serialize};

/// Top-level Deskflow configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeskflowConfig {
    /// Engine identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Checkpoint persistence settings.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Intent router settings.
    #[serde(default)]
    pub router: RouterConfig,

    /// Refund policy and gateway settings.
    #[serde(default)]
    pub refund: RefundConfig,

    /// Hybrid retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Response formatter settings.
    #[serde(default)]
    pub formatter: FormatterConfig,
}

/// Engine identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and doctor output.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "deskflow".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which checkpoint backend the factory should try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    /// SQLite-backed TTL key-value store, probed at startup.
    #[default]
    Durable,
    /// Process-local store only.
    Memory,
}

/// Checkpoint store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: CheckpointBackend,

    /// Path to the durable key-value database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// TTL applied when a save does not pass one.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// In-memory store evicts the oldest checkpoints above this count.
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Upper bound on the startup health probe.
    #[serde(default = "default_health_probe_timeout_ms")]
    pub health_probe_timeout_ms: u64,

    /// Probe round trips slower than this count as unhealthy.
    #[serde(default = "default_max_probe_latency_ms")]
    pub max_probe_latency_ms: u64,
}

impl CheckpointConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }

    pub fn max_probe_latency(&self) -> Duration {
        Duration::from_millis(self.max_probe_latency_ms)
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::default(),
            database_path: default_database_path(),
            default_ttl_secs: default_ttl_secs(),
            max_memory_entries: default_max_memory_entries(),
            health_probe_timeout_ms: default_health_probe_timeout_ms(),
            max_probe_latency_ms: default_max_probe_latency_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("deskflow").join("checkpoints.db"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "deskflow-checkpoints.db".to_string())
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_max_memory_entries() -> usize {
    10_000
}

fn default_health_probe_timeout_ms() -> u64 {
    2_000
}

fn default_max_probe_latency_ms() -> u64 {
    500
}

/// Intent router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// How many recent messages the classifier sees.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_classifier_timeout_ms")]
    pub classifier_timeout_ms: u64,

    /// Confidence attached to the fallback classification.
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,
}

impl RouterConfig {
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            classifier_timeout_ms: default_classifier_timeout_ms(),
            fallback_confidence: default_fallback_confidence(),
        }
    }
}

fn default_history_window() -> usize {
    10
}

fn default_classifier_timeout_ms() -> u64 {
    10_000
}

fn default_fallback_confidence() -> f64 {
    0.5
}

/// Refund policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefundConfig {
    /// Orders older than this many days are not refundable.
    #[serde(default = "default_window_days")]
    pub window_days: i64,

    /// Payment statuses that may be refunded.
    #[serde(default = "default_refundable_statuses")]
    pub refundable_statuses: Vec<PaymentStatus>,

    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,

    /// Reason code used when the request does not name one.
    #[serde(default)]
    pub default_reason: RefundReason,
}

impl RefundConfig {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            refundable_statuses: default_refundable_statuses(),
            gateway_timeout_ms: default_gateway_timeout_ms(),
            default_reason: RefundReason::default(),
        }
    }
}

fn default_window_days() -> i64 {
    30
}

fn default_refundable_statuses() -> Vec<PaymentStatus> {
    vec![PaymentStatus::Succeeded]
}

fn default_gateway_timeout_ms() -> u64 {
    15_000
}

/// Hybrid retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Maximum merged results returned.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Weight applied to semantic scores when merging.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,

    /// Weight applied to lexical scores when merging.
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f64,

    /// Minimum semantic similarity kept before merging.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,
}

impl RetrievalConfig {
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            vector_weight: default_vector_weight(),
            bm25_weight: default_bm25_weight(),
            threshold: default_threshold(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_vector_weight() -> f64 {
    0.6
}

fn default_bm25_weight() -> f64 {
    0.4
}

fn default_threshold() -> f64 {
    0.25
}

fn default_strategy_timeout_ms() -> u64 {
    5_000
}

/// Response formatter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FormatterConfig {
    /// Words per streamed chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub default_shape: OutputShape,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            default_shape: OutputShape::default(),
        }
    }
}

fn default_chunk_size() -> usize {
    5
}
