// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskflow doctor` command implementation.
//!
//! Runs the same backend selection the engine does at startup, then a
//! write/read/delete round trip through the chosen store.

use std::time::{Duration, Instant};

use serde_json::json;

use deskflow_checkpoint::{CheckpointStoreFactory, SelectedBackend, StoreSelection};
use deskflow_config::{CheckpointBackend, DeskflowConfig};
use deskflow_core::state::ConversationState;
use deskflow_core::{CheckpointStore, DeskflowError, PluginAdapter};

/// Thread used for the round-trip check. Deleted afterwards.
const DOCTOR_THREAD: &str = "__deskflow_doctor__";

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

/// Run the `deskflow doctor` command. Fails when any check fails.
pub async fn run_doctor(config: &DeskflowConfig) -> Result<(), DeskflowError> {
    let results = run_checks(config).await;

    println!();
    println!("  deskflow doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;
    for result in &results {
        let label = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => {
                warn_count += 1;
                "[WARN]"
            }
            CheckStatus::Fail => {
                fail_count += 1;
                "[FAIL]"
            }
        };
        println!(
            "    {label} {:<20} {} ({}ms)",
            result.name,
            result.message,
            result.duration.as_millis()
        );
    }
    println!();

    let issues = fail_count + warn_count;
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
    }
    println!();

    if fail_count > 0 {
        return Err(DeskflowError::Internal(format!(
            "{fail_count} doctor check(s) failed"
        )));
    }
    Ok(())
}

/// Runs every check in order.
pub async fn run_checks(config: &DeskflowConfig) -> Vec<CheckResult> {
    let mut results = vec![CheckResult {
        name: "config".to_string(),
        status: CheckStatus::Pass,
        message: format!("valid (agent.name={})", config.agent.name),
        duration: Duration::ZERO,
    }];

    let factory = CheckpointStoreFactory::new(config.checkpoint.clone());
    let start = Instant::now();
    let selection = factory.selection().await;
    results.push(backend_check(config, &selection, start.elapsed()));

    let store = factory.store().await;
    results.push(round_trip_check(store.as_ref()).await);
    results
}

fn backend_check(
    config: &DeskflowConfig,
    selection: &StoreSelection,
    duration: Duration,
) -> CheckResult {
    let reason = selection.reason.as_deref().unwrap_or("unknown");
    let latency = selection
        .probe_latency
        .map(|l| format!("{:.2}ms", l.as_secs_f64() * 1000.0));
    let (status, message) = match selection.backend {
        SelectedBackend::Durable => {
            let latency = latency.unwrap_or_else(|| "n/a".to_string());
            (
                CheckStatus::Pass,
                format!(
                    "durable ({}), probe {latency}",
                    config.checkpoint.database_path
                ),
            )
        }
        SelectedBackend::Memory if config.checkpoint.backend == CheckpointBackend::Memory => {
            (CheckStatus::Pass, "memory (configured)".to_string())
        }
        SelectedBackend::Memory => {
            let message = match latency {
                Some(latency) => format!("fell back to memory: {reason} (probe {latency})"),
                None => format!("fell back to memory: {reason}"),
            };
            (CheckStatus::Warn, message)
        }
    };
    CheckResult {
        name: "checkpoint backend".to_string(),
        status,
        message,
        duration,
    }
}

async fn round_trip_check(store: &dyn CheckpointStore) -> CheckResult {
    let start = Instant::now();
    let outcome = round_trip(store).await;
    let (status, message) = match outcome {
        Ok(()) => (CheckStatus::Pass, format!("save/load/delete via {}", store.name())),
        Err(e) => (CheckStatus::Fail, e.to_string()),
    };
    CheckResult {
        name: "checkpoint round trip".to_string(),
        status,
        message,
        duration: start.elapsed(),
    }
}

async fn round_trip(store: &dyn CheckpointStore) -> Result<(), DeskflowError> {
    let checkpoint_id = uuid::Uuid::new_v4().to_string();
    let state = ConversationState::new(DOCTOR_THREAD, None);
    store
        .save(
            DOCTOR_THREAD,
            &checkpoint_id,
            &state,
            json!({ "doctor": true }),
            Some(Duration::from_secs(60)),
        )
        .await?;
    let loaded = store.load_record(DOCTOR_THREAD, Some(&checkpoint_id)).await;
    store.delete_thread(DOCTOR_THREAD).await?;
    match loaded? {
        Some(record) if record.checkpoint_id == checkpoint_id => Ok(()),
        Some(_) => Err(DeskflowError::storage("checkpoint read back differs")),
        None => Err(DeskflowError::storage("checkpoint missing after save")),
    }
}
