// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Deskflow configuration system.

use deskflow_config::diagnostic::ConfigError;
use deskflow_config::model::{CheckpointBackend, DeskflowConfig};
use deskflow_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use deskflow_core::state::{OutputShape, RefundReason};
use deskflow_core::types::PaymentStatus;

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[agent]
name = "support-desk"
log_level = "debug"

[checkpoint]
backend = "memory"
database_path = "/tmp/checkpoints.db"
default_ttl_secs = 3600
max_memory_entries = 50

[router]
history_window = 4
classifier_timeout_ms = 2500

[refund]
window_days = 14
refundable_statuses = ["succeeded", "requires_capture"]
default_reason = "duplicate"

[retrieval]
limit = 3
vector_weight = 0.7
bm25_weight = 0.3
threshold = 0.5

[formatter]
chunk_size = 8
default_shape = "structured"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "support-desk");
    assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
    assert_eq!(config.checkpoint.default_ttl_secs, 3600);
    assert_eq!(config.checkpoint.max_memory_entries, 50);
    assert_eq!(config.router.history_window, 4);
    assert_eq!(config.refund.window_days, 14);
    assert_eq!(
        config.refund.refundable_statuses,
        vec![PaymentStatus::Succeeded, PaymentStatus::RequiresCapture]
    );
    assert_eq!(config.refund.default_reason, RefundReason::Duplicate);
    assert_eq!(config.retrieval.limit, 3);
    assert_eq!(config.retrieval.threshold, 0.5);
    assert_eq!(config.formatter.chunk_size, 8);
    assert_eq!(config.formatter.default_shape, OutputShape::Structured);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.agent.name, "deskflow");
    assert_eq!(config.agent.log_level, "info");
    assert_eq!(config.checkpoint.backend, CheckpointBackend::Durable);
    assert_eq!(config.checkpoint.default_ttl_secs, 86_400);
    assert_eq!(config.router.history_window, 10);
    assert_eq!(config.router.fallback_confidence, 0.5);
    assert_eq!(config.refund.window_days, 30);
    assert_eq!(
        config.refund.refundable_statuses,
        vec![PaymentStatus::Succeeded]
    );
    assert_eq!(config.formatter.default_shape, OutputShape::Markdown);
}

#[test]
fn unknown_field_is_rejected() {
    let toml = r#"
[refund]
windw_days = 10
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("windw_days"),
        "error should mention unknown field, got: {err_str}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[telegram]
bot_token = "x"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// Dot-notation overrides are what the env provider produces.
#[test]
fn dotted_override_wins_over_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: DeskflowConfig = Figment::new()
        .merge(Serialized::defaults(DeskflowConfig::default()))
        .merge(Toml::string("[checkpoint]\ndefault_ttl_secs = 60\n"))
        .merge(("checkpoint.default_ttl_secs", 120))
        .extract()
        .expect("should merge override");
    assert_eq!(config.checkpoint.default_ttl_secs, 120);
}

#[test]
fn unknown_key_diagnostic_suggests_correction() {
    let toml = r#"
[retrieval]
limt = 5
"#;
    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "limt"
                && suggestion.as_deref() == Some("limit")
                && valid_keys.contains("bm25_weight")
        })
    });
    assert!(found, "expected UnknownKey for `limt`, got: {errors:?}");
}

#[test]
fn invalid_variant_is_reported() {
    let toml = r#"
[checkpoint]
backend = "redis"
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown backend should fail");
    assert!(!errors.is_empty());
    let text = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("backend") || text.contains("redis"), "{text}");
}

#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[formatter]
chunk_size = "lots"
"#;
    let errors = load_and_validate_str(toml).expect_err("bad type should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_)))
    );
}

#[test]
fn validation_runs_after_parsing() {
    let toml = r#"
[retrieval]
vector_weight = 2.0
"#;
    let errors = load_and_validate_str(toml).expect_err("weight above 1 should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("vector_weight"))
    ));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "limt".to_string(),
        suggestion: Some("limit".to_string()),
        valid_keys: "limit, vector_weight".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `limit`"), "{help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("limt"));
}

#[test]
fn explicit_path_is_loaded_and_validated() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("deskflow.toml");
    std::fs::write(&path, "[agent]\nname = \"from-file\"\n").expect("write config");

    let config = load_and_validate_path(&path).expect("file config should validate");
    assert_eq!(config.agent.name, "from-file");

    std::fs::write(&path, "[agent]\nnmae = \"typo\"\n").expect("write config");
    let errors = load_and_validate_path(&path).expect_err("typo should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "nmae"))
    );
}
