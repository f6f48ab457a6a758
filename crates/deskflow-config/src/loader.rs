// SPDX-FileCopyrightText: 2026 Deskflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./deskflow.toml` > `~/.config/deskflow/deskflow.toml` >
//! `/etc/deskflow/deskflow.toml` with environment variable overrides via `DESKFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DeskflowConfig;

/// Top-level sections recognized in `DESKFLOW_<SECTION>_<KEY>` variables.
const SECTIONS: &[&str] = &[
    "agent",
    "checkpoint",
    "router",
    "refund",
    "retrieval",
    "formatter",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/deskflow/deskflow.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "deskflow.toml";

pub(crate) fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("deskflow/deskflow.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/deskflow/deskflow.toml` (system-wide)
/// 3. `~/.config/deskflow/deskflow.toml` (user XDG config)
/// 4. `./deskflow.toml` (local directory)
/// 5. `DESKFLOW_*` environment variables
pub fn load_config() -> Result<DeskflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DeskflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DeskflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DeskflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DeskflowConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a prefix-stripped, lowercased env key to its dotted config path.
///
/// Only the first `_` after a known section name becomes a dot, so
/// `checkpoint_default_ttl_secs` maps to `checkpoint.default_ttl_secs`.
/// Keys outside every section pass through unchanged.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("DESKFLOW_").map(|key| map_env_key(key.as_str()).into())
}
