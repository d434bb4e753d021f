// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::server::HttpBackend;
use crate::types::LevelFilter;

use super::types::{DashboardConfigPartial, ResolvedConfig, WorkspaceConfig};

/// CLI options that can override configuration.
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub service: Option<String>,
    pub capacity: Option<usize>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend: Option<HttpBackend>,
    pub log_level: Option<String>,
    pub targets: Option<BTreeMap<String, String>>,
    pub poll_interval_ms: Option<u64>,
    pub level: Option<LevelFilter>,
    pub limit: Option<usize>,
}

/// Settings taken from environment variables.
///
/// Values that fail to parse are skipped and described in `ignored`. Reading
/// usually happens before a subscriber exists, so nothing is logged here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    /// `OPSLOG_*` variables, applied like a config file.
    pub config: WorkspaceConfig,
    /// `ROOT_URL`, `DISCOVERY_URL`, `ROUTING_URL`: per-name URL overrides.
    pub target_urls: BTreeMap<String, String>,
    /// One message per variable that was set but unusable.
    pub ignored: Vec<String>,
}

/// Legacy per-backend URL variables and the target they override.
const TARGET_URL_VARS: &[(&str, &str)] = &[
    ("ROOT_URL", "root_agent"),
    ("DISCOVERY_URL", "discovery_agent"),
    ("ROUTING_URL", "routing_agent"),
];

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        let mut config = WorkspaceConfig {
            service: get(&["OPSLOG_SERVICE", "AGENT_NAME"]),
            host: get(&["OPSLOG_HOST", "HOST"]),
            log_level: get(&["OPSLOG_LOG_LEVEL", "LOG_LEVEL"]),
            capacity: get(&["OPSLOG_CAPACITY"])
                .and_then(|v| parse_or_note("OPSLOG_CAPACITY", &v, &mut ignored)),
            port: get(&["OPSLOG_PORT", "PORT"])
                .and_then(|v| parse_or_note("OPSLOG_PORT", &v, &mut ignored)),
            backend: get(&["OPSLOG_BACKEND"])
                .and_then(|v| parse_or_note("OPSLOG_BACKEND", &v, &mut ignored)),
            dashboard: None,
        };

        let dashboard = DashboardConfigPartial {
            targets: get(&["OPSLOG_TARGETS"]).and_then(|v| match parse_targets(&v) {
                Ok(targets) => Some(targets),
                Err(e) => {
                    ignored.push(format!("Ignoring OPSLOG_TARGETS: {}", e));
                    None
                }
            }),
            poll_interval_ms: get(&["OPSLOG_POLL_INTERVAL_MS"])
                .and_then(|v| parse_or_note("OPSLOG_POLL_INTERVAL_MS", &v, &mut ignored)),
            level: get(&["OPSLOG_LEVEL"]).map(|v| LevelFilter::parse_lenient(&v)),
            ..Default::default()
        };
        if dashboard != DashboardConfigPartial::default() {
            config.dashboard = Some(dashboard);
        }

        let target_urls = TARGET_URL_VARS
            .iter()
            .filter_map(|(var, name)| get(&[*var]).map(|url| (name.to_string(), url)))
            .collect();

        Self {
            config,
            target_urls,
            ignored,
        }
    }
}

fn parse_or_note<T: std::str::FromStr>(key: &str, value: &str, ignored: &mut Vec<String>) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            ignored.push(format!("Ignoring {}: cannot parse {:?}", key, value));
            None
        }
    }
}

/// Parse one `name=url` pair.
pub fn parse_target(pair: &str) -> Result<(String, String), ConfigError> {
    let (name, url) = pair
        .split_once('=')
        .ok_or_else(|| ConfigError::invalid("target", format!("expected name=url, got {:?}", pair)))?;
    let (name, url) = (name.trim(), url.trim());
    if name.is_empty() || url.is_empty() {
        return Err(ConfigError::invalid(
            "target",
            format!("expected name=url, got {:?}", pair),
        ));
    }
    Ok((name.to_string(), url.to_string()))
}

/// Parse a comma-separated list of `name=url` pairs.
pub fn parse_targets(list: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_target)
        .collect()
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI options
/// 2. Environment variables
/// 3. Workspace config (.opslog.json)
/// 4. Global config (~/.opslog/config.json)
/// 5. Default values
///
/// A `targets` map replaces the inherited one wholesale. The legacy
/// `*_URL` variables only override the URL of their named target.
pub fn merge_config(
    global: Option<WorkspaceConfig>,
    workspace: Option<WorkspaceConfig>,
    env: EnvOverrides,
    cli: CliOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_workspace_config(&mut result, &config);
    }

    if let Some(config) = workspace {
        apply_workspace_config(&mut result, &config);
    }

    apply_workspace_config(&mut result, &env.config);
    for (name, url) in env.target_urls {
        match result.dashboard.targets.get_mut(&name) {
            Some(existing) => *existing = url,
            None => result
                .warnings
                .push(format!("Ignoring URL override for {}: not a configured target", name)),
        }
    }
    result.warnings.extend(env.ignored);

    // Apply CLI options (highest precedence)
    apply_cli_options(&mut result, &cli);

    result
}

fn apply_workspace_config(result: &mut ResolvedConfig, config: &WorkspaceConfig) {
    let server = &mut result.server;

    if let Some(ref service) = config.service {
        server.service = service.clone();
    }
    if let Some(capacity) = config.capacity {
        server.capacity = capacity;
    }
    if let Some(ref host) = config.host {
        server.host = host.clone();
    }
    if let Some(port) = config.port {
        server.port = port;
    }
    if let Some(backend) = config.backend {
        server.backend = backend;
    }
    if let Some(ref log_level) = config.log_level {
        server.log_level = log_level.clone();
    }

    let Some(ref partial) = config.dashboard else {
        return;
    };
    let dashboard = &mut result.dashboard;

    if let Some(ref targets) = partial.targets {
        dashboard.targets = targets.clone();
    }
    if let Some(interval) = partial.poll_interval_ms {
        dashboard.poll_interval_ms = interval;
    }
    if let Some(level) = partial.level {
        dashboard.level = level;
    }
    if let Some(limit) = partial.limit {
        dashboard.limit = limit;
    }
    if let Some(policy) = partial.local_log {
        dashboard.local_log = policy;
    }
}

fn apply_cli_options(result: &mut ResolvedConfig, cli: &CliOptions) {
    if let Some(ref service) = cli.service {
        result.server.service = service.clone();
    }
    if let Some(capacity) = cli.capacity {
        result.server.capacity = capacity;
    }
    if let Some(ref host) = cli.host {
        result.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        result.server.port = port;
    }
    if let Some(backend) = cli.backend {
        result.server.backend = backend;
    }
    if let Some(ref log_level) = cli.log_level {
        result.server.log_level = log_level.clone();
    }
    if let Some(ref targets) = cli.targets {
        result.dashboard.targets = targets.clone();
    }
    if let Some(interval) = cli.poll_interval_ms {
        result.dashboard.poll_interval_ms = interval;
    }
    if let Some(level) = cli.level {
        result.dashboard.level = level;
    }
    if let Some(limit) = cli.limit {
        result.dashboard.limit = limit;
    }
}

/// Reject settings that cannot be run.
pub fn validate_config(config: &ResolvedConfig) -> Result<(), ConfigError> {
    if config.server.capacity == 0 {
        return Err(ConfigError::invalid("capacity", "must be at least 1"));
    }
    if config.server.service.trim().is_empty() {
        return Err(ConfigError::invalid("service", "must not be empty"));
    }
    Ok(())
}
