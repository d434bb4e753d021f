// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry initialization and configuration.

use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::layer::RingBufferLayer;
use super::ring::SharedRingBuffer;

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Whether to include span events (enter/exit).
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include target module path.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Whether to use compact log format.
    pub compact: bool,

    /// Whether to print events to stderr at all. The ring buffer layer is
    /// unaffected.
    pub stderr_output: bool,

    /// Custom filter directive (overrides default_level).
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            stderr_output: true,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Create a config suitable for development with verbose output.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            include_target: true,
            ansi_colors: true,
            compact: false,
            stderr_output: true,
            filter_directive: None,
        }
    }

    /// Create a config with minimal output: warnings only, no colors.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_span_events: false,
            include_file_line: false,
            include_target: false,
            ansi_colors: false,
            compact: true,
            stderr_output: true,
            filter_directive: None,
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    /// Enable or disable the stderr formatter.
    pub fn with_stderr(mut self, enabled: bool) -> Self {
        self.stderr_output = enabled;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        // RUST_LOG takes precedence unless an explicit directive was given
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive)
                .unwrap_or_else(|_| EnvFilter::new(format!("{}", self.default_level))),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}", self.default_level))),
        }
    }
}

/// Guard returned by [`init_telemetry`].
///
/// Keeps the ring buffer handle alive for the duration of the program.
pub struct TelemetryGuard {
    ring: Option<SharedRingBuffer>,
}

impl TelemetryGuard {
    /// The ring buffer receiving events, if one was installed.
    pub fn ring(&self) -> Option<&SharedRingBuffer> {
        self.ring.as_ref()
    }
}

/// Initialize telemetry with the given configuration.
///
/// When `ring` is given, every event that passes the filter is also appended
/// to it. This should be called once at application startup.
///
/// # Example
///
/// ```rust,ignore
/// use opslog::telemetry::{init_telemetry, RingBuffer, TelemetryConfig};
///
/// let ring = RingBuffer::new(2000, "routing_agent")?.shared();
/// let _guard = init_telemetry(&TelemetryConfig::default(), Some(ring.clone()))?;
/// ```
pub fn init_telemetry(
    config: &TelemetryConfig,
    ring: Option<SharedRingBuffer>,
) -> io::Result<TelemetryGuard> {
    let filter = config.env_filter();

    let span_events = if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let ring_layer = ring.clone().map(RingBufferLayer::new);

    let fmt_layer = config.stderr_output.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(config.ansi_colors)
            .with_target(config.include_target)
            .with_file(config.include_file_line)
            .with_line_number(config.include_file_line)
            .with_span_events(span_events)
    });

    // Apply compact format if requested
    if config.compact {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.map(|layer| layer.compact()))
            .with(ring_layer)
            .try_init()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(ring_layer)
            .try_init()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    }

    Ok(TelemetryGuard { ring })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.ansi_colors);
        assert!(config.compact);
        assert!(config.stderr_output);
    }

    #[test]
    fn test_telemetry_config_development() {
        let config = TelemetryConfig::development();
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.include_span_events);
    }

    #[test]
    fn test_telemetry_config_production() {
        let config = TelemetryConfig::production();
        assert_eq!(config.default_level, Level::WARN);
        assert!(!config.include_span_events);
    }

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("opslog=trace")
            .with_ansi(false)
            .with_stderr(false);

        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.filter_directive, Some("opslog=trace".to_string()));
        assert!(!config.ansi_colors);
        assert!(!config.stderr_output);
    }
}
