// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for opslog.
//!
//! This module provides strongly-typed errors for the sink, the HTTP hosts,
//! the dashboard fetch path and configuration loading, using `thiserror` for
//! the definitions and `anyhow` for propagation in the binary.

use thiserror::Error;

/// Failures while turning a raw event into a stored entry.
///
/// These never reach the emitting code path; they are handed to the sink's
/// error hook instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Failed to format log record from {logger}: {message}")]
    Format { logger: String, message: String },

    #[error("Log formatting panicked in {logger}: {message}")]
    Panicked { logger: String, message: String },
}

impl SinkError {
    /// Create a formatting error.
    pub fn format(logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            logger: logger.into(),
            message: message.into(),
        }
    }

    /// Create an error from a caught panic payload.
    pub fn panicked(logger: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked {
            logger: logger.into(),
            message,
        }
    }
}

/// Errors that can occur while a dashboard fetches a page of logs.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Response decoding error: {0}")]
    Decode(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether the next poll has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

/// Errors raised while starting or running an HTTP host.
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_retryable() {
        assert!(FetchError::Network("refused".to_string()).is_retryable());
        assert!(FetchError::Timeout(5000).is_retryable());
        assert!(FetchError::Status {
            status: 503,
            url: "http://x".to_string()
        }
        .is_retryable());
        assert!(!FetchError::Status {
            status: 404,
            url: "http://x".to_string()
        }
        .is_retryable());
        assert!(!FetchError::Decode("bad json".to_string()).is_retryable());
    }

    #[test]
    fn test_sink_error_from_panic_payload() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let err = SinkError::panicked("app", payload.as_ref());
        assert_eq!(
            err,
            SinkError::Panicked {
                logger: "app".to_string(),
                message: "boom".to_string()
            }
        );

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let err = SinkError::panicked("app", payload.as_ref());
        assert!(err.to_string().contains("owned"));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Status {
            status: 502,
            url: "http://localhost:10020/ops/logs".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("502"));
        assert!(display.contains("10020"));
    }
}
