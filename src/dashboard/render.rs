// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Terminal rendering of log entries.

use colored::{ColoredString, Colorize};

use crate::types::{LogEntry, LogLevel};

/// Icon shown in front of each line.
pub fn level_icon(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "⚙️",
        LogLevel::Info => "ℹ️",
        LogLevel::Warning => "⚠️",
        LogLevel::Error => "❌",
        LogLevel::Critical => "🚨",
    }
}

fn paint(level: LogLevel, text: &str) -> ColoredString {
    match level {
        LogLevel::Debug => text.dimmed(),
        LogLevel::Info => text.normal(),
        LogLevel::Warning => text.yellow(),
        LogLevel::Error => text.red(),
        LogLevel::Critical => text.red().bold(),
    }
}

/// `{icon} {time} {LEVEL} [{logger}] {message}`, colored by level.
pub fn render_entry(entry: &LogEntry) -> String {
    format!(
        "{} {} {} [{}] {}",
        level_icon(entry.level),
        entry.display_time().bold(),
        paint(entry.level, entry.level.as_str()),
        entry.logger.cyan(),
        paint(entry.level, &entry.message),
    )
}

/// Same as [`render_entry`], prefixed with the backend name.
pub fn render_entry_for(backend: &str, entry: &LogEntry) -> String {
    format!("{} {}", format!("{:<16}", backend).magenta(), render_entry(entry))
}

/// Transient fetch warning.
pub fn render_warning(message: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), message.yellow())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: LogLevel) -> LogEntry {
        LogEntry {
            timestamp: 0.0,
            formatted_time: "2025-01-01T10:00:00".to_string(),
            level,
            logger: "routing".to_string(),
            message: "route found".to_string(),
            service: "svc".to_string(),
            host: "host".to_string(),
        }
    }

    #[test]
    fn test_render_entry_plain() {
        colored::control::set_override(false);
        assert_eq!(
            render_entry(&entry(LogLevel::Warning)),
            "⚠️ 2025-01-01T10:00:00 WARNING [routing] route found"
        );
    }

    #[test]
    fn test_render_entry_for_backend() {
        colored::control::set_override(false);
        let line = render_entry_for("routing_agent", &entry(LogLevel::Info));
        assert!(line.starts_with("routing_agent "));
        assert!(line.ends_with("INFO [routing] route found"));
    }

    #[test]
    fn test_icons_distinct() {
        let icons: std::collections::HashSet<&str> =
            LogLevel::ALL.iter().map(|l| level_icon(*l)).collect();
        assert_eq!(icons.len(), LogLevel::ALL.len());
    }
}
