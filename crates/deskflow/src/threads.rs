// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `deskflow threads` command implementation.
//!
//! Every subcommand prints one JSON document on stdout.

use std::time::Duration;

use clap::Subcommand;
use serde_json::{Value, json};
use tracing::warn;

use deskflow_agent::ThreadManager;
use deskflow_checkpoint::{CheckpointStoreFactory, SelectedBackend};
use deskflow_config::{CheckpointBackend, DeskflowConfig};
use deskflow_core::DeskflowError;

#[derive(Subcommand, Debug)]
pub enum ThreadCommand {
    /// Show a thread's metadata, latest checkpoint and recent checkpoint ids.
    Show { thread_id: String },
    /// List every known thread, most recently accessed first.
    List,
    /// Delete a thread and all of its checkpoints.
    Delete { thread_id: String },
    /// Push back the expiry of a thread's checkpoints.
    Extend {
        thread_id: String,
        /// Seconds added to every checkpoint's expiry.
        #[arg(long)]
        secs: u64,
    },
    /// Remove expired checkpoints and those older than the max age.
    Cleanup {
        /// Limit cleanup to one thread.
        thread_id: Option<String>,
        /// Defaults to `checkpoint.default_ttl_secs`.
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

/// Run a `deskflow threads` subcommand against the configured store.
pub async fn run_threads(
    config: &DeskflowConfig,
    command: ThreadCommand,
) -> Result<(), DeskflowError> {
    let factory = CheckpointStoreFactory::new(config.checkpoint.clone());
    let store = factory.store().await;
    let selection = factory.selection().await;
    if selection.backend == SelectedBackend::Memory
        && config.checkpoint.backend == CheckpointBackend::Durable
    {
        warn!(
            reason = selection.reason.as_deref().unwrap_or("unknown"),
            "durable store unavailable, only this process's threads are visible"
        );
    }

    let manager = ThreadManager::new(store);
    let output = execute(&manager, command, config.checkpoint.default_ttl()).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Runs `command` and returns its JSON report.
pub async fn execute(
    manager: &ThreadManager,
    command: ThreadCommand,
    default_max_age: Duration,
) -> Result<Value, DeskflowError> {
    match command {
        ThreadCommand::Show { thread_id } => match manager.show(&thread_id).await? {
            Some(view) => Ok(serde_json::to_value(view)?),
            None => Err(DeskflowError::validation(format!(
                "no checkpoints for thread {thread_id}"
            ))),
        },
        ThreadCommand::List => Ok(serde_json::to_value(manager.list().await?)?),
        ThreadCommand::Delete { thread_id } => {
            let removed = manager.delete(&thread_id).await?;
            Ok(json!({ "thread_id": thread_id, "removed": removed }))
        }
        ThreadCommand::Extend { thread_id, secs } => {
            let updated = manager.extend(&thread_id, Duration::from_secs(secs)).await?;
            Ok(json!({
                "thread_id": thread_id,
                "updated": updated,
                "additional_secs": secs,
            }))
        }
        ThreadCommand::Cleanup {
            thread_id,
            max_age_secs,
        } => {
            let max_age = max_age_secs.map_or(default_max_age, Duration::from_secs);
            let removed = manager.cleanup(thread_id.as_deref(), max_age).await?;
            Ok(json!({
                "thread_id": thread_id,
                "max_age_secs": max_age.as_secs(),
                "removed": removed,
            }))
        }
    }
}
