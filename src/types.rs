// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core types shared by the sink, the query service and the dashboard.
//!
//! The wire names (`ts`, `time`, `logger`, ...) are the JSON shape served by
//! `GET /ops/logs` and must stay stable across both HTTP bindings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Format used for the human-readable `time` field.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ============================================================================
// Levels
// ============================================================================

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// All levels, lowest severity first.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a level name, case-insensitively. `WARN` is accepted for `WARNING`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" | "WARN" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::ERROR => LogLevel::Error,
        }
    }
}

/// Level filter accepted by the query endpoint.
///
/// Matching is exact: `Only(Warning)` does not include `Error` or `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelFilter {
    #[default]
    All,
    Only(LogLevel),
}

impl LevelFilter {
    /// Whether an entry at `level` passes this filter.
    pub fn matches(&self, level: LogLevel) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Only(wanted) => *wanted == level,
        }
    }

    /// Wire name (`ALL` or a level name).
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelFilter::All => "ALL",
            LevelFilter::Only(level) => level.as_str(),
        }
    }

    /// Lenient parse: anything unrecognised becomes `All`.
    pub fn parse_lenient(s: &str) -> Self {
        LogLevel::parse(s).map(LevelFilter::Only).unwrap_or_default()
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LevelFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            return Ok(LevelFilter::All);
        }
        LogLevel::parse(s)
            .map(LevelFilter::Only)
            .ok_or_else(|| format!("unknown level: {}", s))
    }
}

impl Serialize for LevelFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LevelFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Records and entries
// ============================================================================

/// A raw record handed to the sink by a producer.
///
/// This is the whole producer contract: anything that can supply these four
/// fields can feed a [`RingBuffer`](crate::telemetry::RingBuffer).
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub level: LogLevel,
    pub logger: String,
    /// Rendered message text.
    pub message: String,
}

impl LogRecord {
    /// Create a record stamped with the current time.
    pub fn now(level: LogLevel, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: unix_now(),
            level,
            logger: logger.into(),
            message: message.into(),
        }
    }

    /// Create a record with an explicit timestamp.
    pub fn at(
        timestamp: f64,
        level: LogLevel,
        logger: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            logger: logger.into(),
            message: message.into(),
        }
    }
}

/// An immutable entry retained by the ring buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "ts")]
    pub timestamp: f64,

    #[serde(rename = "time")]
    pub formatted_time: String,

    pub level: LogLevel,

    pub logger: String,

    pub message: String,

    pub service: String,

    pub host: String,
}

impl LogEntry {
    /// The `time` field, or a rendering of `ts` when the producer left it empty.
    pub fn display_time(&self) -> String {
        if !self.formatted_time.is_empty() {
            return self.formatted_time.clone();
        }
        DateTime::<Utc>::from_timestamp_micros((self.timestamp * 1_000_000.0) as i64)
            .map(|dt| dt.with_timezone(&Local).to_rfc3339_opts(chrono::SecondsFormat::Secs, false))
            .unwrap_or_default()
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub items: Vec<Arc<LogEntry>>,
    pub next_since: f64,
}

impl LogPage {
    /// An empty page that keeps the caller's watermark.
    pub fn empty(since: f64) -> Self {
        Self {
            items: Vec::new(),
            next_since: since,
        }
    }
}

// ============================================================================
// Time helpers
// ============================================================================

/// Current wall-clock time as float seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Render a Unix timestamp in local time at second granularity.
pub fn format_timestamp(ts: f64) -> String {
    let secs = ts.floor() as i64;
    match Local.timestamp_opt(secs, 0).single() {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse(" Critical "), Some(LogLevel::Critical));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_level_serde_names() {
        let json = serde_json::to_string(&LogLevel::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        let level: LogLevel = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(level, LogLevel::Critical);
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(LogLevel::from(&tracing::Level::TRACE), LogLevel::Debug);
        assert_eq!(LogLevel::from(&tracing::Level::WARN), LogLevel::Warning);
        assert_eq!(LogLevel::from(&tracing::Level::ERROR), LogLevel::Error);
    }

    #[test]
    fn test_level_filter_is_exact() {
        let filter = LevelFilter::Only(LogLevel::Warning);
        assert!(filter.matches(LogLevel::Warning));
        assert!(!filter.matches(LogLevel::Error));
        assert!(!filter.matches(LogLevel::Critical));
        assert!(LevelFilter::All.matches(LogLevel::Debug));
    }

    #[test]
    fn test_level_filter_parse() {
        assert_eq!("all".parse::<LevelFilter>().unwrap(), LevelFilter::All);
        assert_eq!(
            "error".parse::<LevelFilter>().unwrap(),
            LevelFilter::Only(LogLevel::Error)
        );
        assert!("nope".parse::<LevelFilter>().is_err());
        assert_eq!(LevelFilter::parse_lenient("nope"), LevelFilter::All);
    }

    #[test]
    fn test_entry_wire_names() {
        let entry = LogEntry {
            timestamp: 1.5,
            formatted_time: "1970-01-01T00:00:01".to_string(),
            level: LogLevel::Info,
            logger: "app".to_string(),
            message: "hello".to_string(),
            service: "svc".to_string(),
            host: "box".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["ts"], 1.5);
        assert_eq!(value["time"], "1970-01-01T00:00:01");
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["logger"], "app");
        assert_eq!(value["service"], "svc");
        assert_eq!(value["host"], "box");
    }

    #[test]
    fn test_display_time_fallback() {
        let entry = LogEntry {
            timestamp: 0.0,
            formatted_time: String::new(),
            level: LogLevel::Info,
            logger: String::new(),
            message: String::new(),
            service: String::new(),
            host: String::new(),
        };
        assert!(!entry.display_time().is_empty());
    }

    #[test]
    fn test_format_timestamp_shape() {
        let formatted = format_timestamp(unix_now());
        assert_eq!(formatted.len(), 19);
        assert_eq!(&formatted[10..11], "T");
    }

    #[test]
    fn test_empty_page_keeps_watermark() {
        let page = LogPage::empty(42.0);
        assert!(page.items.is_empty());
        assert_eq!(page.next_since, 42.0);
    }
}
