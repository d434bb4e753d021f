// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for opslog.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.opslog/config.json
//! - Workspace config: .opslog.json, .opslog/config.json, opslog.config.json or .opslog.yaml
//! - Environment: `OPSLOG_*` and a few legacy names (`AGENT_NAME`, `PORT`, `ROOT_URL`, ...)
//! - CLI options: command-line arguments
//!
//! Configuration is merged with precedence (CLI > environment > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_config_file, find_workspace_root, get_global_config_dir, get_global_config_path,
    load_config_file, load_global_config, load_workspace_config, CONFIG_FILES,
    GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{
    default_config, merge_config, parse_target, parse_targets, validate_config, CliOptions,
    EnvOverrides,
};

pub use types::{
    default_targets, DashboardConfig, DashboardConfigPartial, ResolvedConfig, ServerConfig,
    WorkspaceConfig, DEFAULT_CAPACITY, DEFAULT_HOST, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT,
    DEFAULT_SERVICE,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge all configuration sources for a workspace.
///
/// This is the main entry point for configuration loading.
pub fn load_config(
    workspace_root: &Path,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    load_config_with_env(workspace_root, EnvOverrides::from_env(), cli_options)
}

/// Like [`load_config`], with explicit environment overrides.
pub fn load_config_with_env(
    workspace_root: &Path,
    env: EnvOverrides,
    cli_options: CliOptions,
) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(workspace_root)?;

    let config = merge_config(global, workspace, env, cli_options);
    validate_config(&config)?;
    Ok(config)
}
