// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: ranges, non-empty paths and
//! lists, and cross-field rules such as non-zero merge weights.

use crate::diagnostic::ConfigError;
use crate::model::{CheckpointBackend, DeskflowConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &DeskflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.to_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.agent.log_level
        )));
    }

    let checkpoint = &config.checkpoint;
    if checkpoint.backend == CheckpointBackend::Durable
        && checkpoint.database_path.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "checkpoint.database_path must not be empty for the durable backend",
        ));
    }
    if checkpoint.default_ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "checkpoint.default_ttl_secs must be at least 1",
        ));
    }
    if checkpoint.max_memory_entries == 0 {
        errors.push(ConfigError::validation(
            "checkpoint.max_memory_entries must be at least 1",
        ));
    }
    if checkpoint.health_probe_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "checkpoint.health_probe_timeout_ms must be at least 1",
        ));
    }

    let router = &config.router;
    if router.history_window == 0 {
        errors.push(ConfigError::validation(
            "router.history_window must be at least 1",
        ));
    }
    if router.classifier_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "router.classifier_timeout_ms must be at least 1",
        ));
    }
    check_unit_interval(
        &mut errors,
        "router.fallback_confidence",
        router.fallback_confidence,
    );

    let refund = &config.refund;
    if refund.window_days < 0 {
        errors.push(ConfigError::validation(format!(
            "refund.window_days must be non-negative, got {}",
            refund.window_days
        )));
    }
    if refund.refundable_statuses.is_empty() {
        errors.push(ConfigError::validation(
            "refund.refundable_statuses must list at least one status",
        ));
    }
    if refund.gateway_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "refund.gateway_timeout_ms must be at least 1",
        ));
    }

    let retrieval = &config.retrieval;
    if retrieval.limit == 0 {
        errors.push(ConfigError::validation("retrieval.limit must be at least 1"));
    }
    check_unit_interval(&mut errors, "retrieval.vector_weight", retrieval.vector_weight);
    check_unit_interval(&mut errors, "retrieval.bm25_weight", retrieval.bm25_weight);
    check_unit_interval(&mut errors, "retrieval.threshold", retrieval.threshold);
    if retrieval.vector_weight == 0.0 && retrieval.bm25_weight == 0.0 {
        errors.push(ConfigError::validation(
            "retrieval.vector_weight and retrieval.bm25_weight must not both be zero",
        ));
    }
    if retrieval.strategy_timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "retrieval.strategy_timeout_ms must be at least 1",
        ));
    }

    if config.formatter.chunk_size == 0 {
        errors.push(ConfigError::validation(
            "formatter.chunk_size must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_unit_interval(errors: &mut Vec<ConfigError>, key: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::validation(format!(
            "{key} must be between 0 and 1, got {value}"
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &DeskflowConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&DeskflowConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_only_matters_for_durable() {
        let mut config = DeskflowConfig::default();
        config.checkpoint.database_path = "  ".to_string();
        assert!(messages(&config)[0].contains("database_path"));

        config.checkpoint.backend = CheckpointBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn out_of_range_weights_fail() {
        let mut config = DeskflowConfig::default();
        config.retrieval.vector_weight = 1.5;
        config.retrieval.threshold = -0.1;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("vector_weight")));
        assert!(msgs.iter().any(|m| m.contains("threshold")));
    }

    #[test]
    fn zero_weights_fail() {
        let mut config = DeskflowConfig::default();
        config.retrieval.vector_weight = 0.0;
        config.retrieval.bm25_weight = 0.0;
        assert!(messages(&config).iter().any(|m| m.contains("both be zero")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = DeskflowConfig::default();
        config.formatter.chunk_size = 0;
        config.router.history_window = 0;
        config.refund.window_days = -1;
        config.refund.refundable_statuses.clear();
        config.agent.log_level = "loud".into();
        assert_eq!(messages(&config).len(), 5);
    }
}
