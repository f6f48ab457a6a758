// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deskflow - support-agent orchestration and checkpointing.
//!
//! Binary entry point: configuration checks, checkpoint backend
//! diagnostics and thread maintenance.

mod doctor;
mod threads;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use clap::{Parser, Subcommand};

use deskflow_config::{ConfigError, DeskflowConfig};
use deskflow_core::DeskflowError;

/// Deskflow - support-agent orchestration and checkpointing.
#[derive(Parser, Debug)]
#[command(name = "deskflow", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the standard search path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Probe the checkpoint backend and report what the engine would use.
    Doctor,
    /// Inspect and maintain checkpointed threads.
    Threads {
        #[command(subcommand)]
        action: threads::ThreadCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Check {
        /// Print the effective configuration as TOML.
        #[arg(long)]
        print: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            deskflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Some(Commands::Config {
            action: ConfigCommand::Check { print },
        }) => check_config(&config, print),
        Some(Commands::Doctor) => doctor::run_doctor(&config).await,
        Some(Commands::Threads { action }) => threads::run_threads(&config, action).await,
        None => {
            println!("deskflow: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("deskflow: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<DeskflowConfig, Vec<ConfigError>> {
    match path {
        Some(path) => deskflow_config::load_and_validate_path(path),
        None => deskflow_config::load_and_validate(),
    }
}

fn check_config(config: &DeskflowConfig, print: bool) -> Result<(), DeskflowError> {
    println!("deskflow: config ok (agent.name={})", config.agent.name);
    if print {
        let rendered =
            toml::to_string_pretty(config).map_err(|e| DeskflowError::Config(e.to_string()))?;
        println!("{rendered}");
    }
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over `agent.log_level`.
///
/// Output goes to stderr through the redacting writer so command output on
/// stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use deskflow_security::RedactingWriter;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deskflow={log_level},warn")));
    let values: Arc<RwLock<Vec<String>>> = Arc::default();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), Arc::clone(&values)))
        .init();
}
