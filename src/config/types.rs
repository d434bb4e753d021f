// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! `WorkspaceConfig` is the partial, file- or environment-sourced shape where
//! every field is optional. `ResolvedConfig` is the fully merged result.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dashboard::{clamp_interval, LocalLogPolicy, PollSettings, DEFAULT_PAGE_LIMIT};
use crate::query::MAX_LIMIT;
use crate::server::HttpBackend;
use crate::types::{LevelFilter, LogLevel};

/// Default ring buffer capacity.
pub const DEFAULT_CAPACITY: usize = 2000;

/// Default service label.
pub const DEFAULT_SERVICE: &str = "root_agent";

/// Default bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
pub const DEFAULT_PORT: u16 = 10022;

/// Default dashboard poll interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Backends watched when nothing else is configured.
pub fn default_targets() -> BTreeMap<String, String> {
    [
        ("root_agent", "http://localhost:10022"),
        ("discovery_agent", "http://localhost:10020"),
        ("routing_agent", "http://localhost:10021"),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_string(), url.to_string()))
    .collect()
}

/// Partial configuration, as found in `.opslog.json` or built from the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    /// Service label stamped on every entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Ring buffer capacity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Bind host for `serve`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Bind port for `serve`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// HTTP host implementation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<HttpBackend>,

    /// Tracing filter for the serving process (e.g. `info`, `opslog=debug`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Dashboard settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<DashboardConfigPartial>,
}

/// Partial dashboard configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfigPartial {
    /// Backend name to base URL. Replaces the inherited map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<LevelFilter>,

    /// Page size per fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_log: Option<LocalLogPolicy>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub server: ServerConfig,
    pub dashboard: DashboardConfig,
    /// Problems found while merging, for the caller to log once tracing is up.
    #[serde(skip)]
    pub warnings: Vec<String>,
}

/// Settings for a process hosting the log endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub service: String,
    pub capacity: usize,
    pub host: String,
    pub port: u16,
    pub backend: HttpBackend,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            capacity: DEFAULT_CAPACITY,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backend: HttpBackend::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the polling dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub targets: BTreeMap<String, String>,
    pub poll_interval_ms: u64,
    pub level: LevelFilter,
    pub limit: usize,
    pub local_log: LocalLogPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            level: LevelFilter::Only(LogLevel::Info),
            limit: DEFAULT_PAGE_LIMIT,
            local_log: LocalLogPolicy::default(),
        }
    }
}

impl DashboardConfig {
    /// Poll interval, clamped into the supported range.
    pub fn poll_interval(&self) -> Duration {
        clamp_interval(Duration::from_millis(self.poll_interval_ms))
    }

    /// Fetch settings for a [`Dashboard`](crate::dashboard::Dashboard).
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            level: self.level,
            limit: self.limit.clamp(1, MAX_LIMIT),
            policy: self.local_log.normalized(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_config_parse() {
        let json = r#"{
            "service": "routing_agent",
            "capacity": 500,
            "backend": "hyper",
            "dashboard": {
                "targets": {"routing_agent": "http://localhost:10021"},
                "pollIntervalMs": 1000,
                "level": "ERROR",
                "localLog": {"maxEntries": 100, "keepAfterTrim": 50}
            }
        }"#;

        let config: WorkspaceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.service.as_deref(), Some("routing_agent"));
        assert_eq!(config.capacity, Some(500));
        assert_eq!(config.backend, Some(HttpBackend::Hyper));

        let dashboard = config.dashboard.unwrap();
        assert_eq!(dashboard.poll_interval_ms, Some(1000));
        assert_eq!(dashboard.level, Some(LevelFilter::Only(LogLevel::Error)));
        assert_eq!(dashboard.local_log.unwrap().keep_after_trim, 50);
        assert_eq!(dashboard.targets.unwrap().len(), 1);
    }

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();
        assert_eq!(config.server.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:10022");
        assert_eq!(config.dashboard.targets.len(), 3);
        assert_eq!(config.dashboard.level, LevelFilter::Only(LogLevel::Info));
        assert_eq!(config.dashboard.poll_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn test_poll_settings_clamped() {
        let config = DashboardConfig {
            limit: 0,
            poll_interval_ms: 10,
            ..Default::default()
        };
        assert_eq!(config.poll_settings().limit, 1);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_resolved_serializes_camel_case() {
        let value = serde_json::to_value(ResolvedConfig::default()).unwrap();
        assert_eq!(value["server"]["logLevel"], "info");
        assert_eq!(value["dashboard"]["pollIntervalMs"], 2000);
        assert_eq!(value["dashboard"]["level"], "INFO");
    }
}
