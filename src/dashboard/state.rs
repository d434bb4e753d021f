// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-backend polling state.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::source::SharedLogSource;
use crate::types::{LogEntry, LogPage};

/// Bound on a backend's local log.
///
/// Once the log grows past `max_entries` it is cut back to the newest
/// `keep_after_trim`, so trimming happens in batches rather than per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalLogPolicy {
    pub max_entries: usize,
    pub keep_after_trim: usize,
}

impl Default for LocalLogPolicy {
    fn default() -> Self {
        Self {
            max_entries: 2000,
            keep_after_trim: 1000,
        }
    }
}

impl LocalLogPolicy {
    /// Normalize so that `1 <= keep_after_trim <= max_entries`.
    pub fn normalized(self) -> Self {
        let max_entries = self.max_entries.max(1);
        Self {
            max_entries,
            keep_after_trim: self.keep_after_trim.clamp(1, max_entries),
        }
    }
}

/// Everything the dashboard knows about one watched backend.
pub struct BackendState {
    url: String,
    source: Option<SharedLogSource>,
    cursor: f64,
    log: VecDeque<Arc<LogEntry>>,
    paused: bool,
    last_error: Option<String>,
}

impl BackendState {
    /// State for a backend with a working source.
    pub fn new(url: impl Into<String>, source: SharedLogSource) -> Self {
        Self::with_source(url, Some(source), None)
    }

    /// State for a backend whose URL could not be turned into a source.
    pub fn unreachable(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_source(url, None, Some(error.into()))
    }

    fn with_source(url: impl Into<String>, source: Option<SharedLogSource>, last_error: Option<String>) -> Self {
        Self {
            url: url.into(),
            source,
            cursor: 0.0,
            log: VecDeque::new(),
            paused: false,
            last_error,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> Option<&SharedLogSource> {
        self.source.as_ref()
    }

    /// Watermark to send on the next fetch.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Error from the most recent failed fetch, cleared on the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Local log, oldest first.
    pub fn entries(&self) -> &VecDeque<Arc<LogEntry>> {
        &self.log
    }

    /// The newest `n` entries, oldest first.
    pub fn newest(&self, n: usize) -> impl Iterator<Item = &Arc<LogEntry>> {
        self.log.iter().skip(self.log.len().saturating_sub(n))
    }

    /// Merge a successful page. Returns how many entries it added.
    pub fn apply_page(&mut self, page: LogPage, policy: LocalLogPolicy) -> usize {
        let added = page.items.len();
        self.log.extend(page.items);

        // Never move the watermark backwards.
        if page.next_since > self.cursor {
            self.cursor = page.next_since;
        }

        let policy = policy.normalized();
        if self.log.len() > policy.max_entries {
            let excess = self.log.len() - policy.keep_after_trim;
            self.log.drain(..excess);
        }

        self.last_error = None;
        added
    }

    /// Record a failed fetch. Cursor and log stay as they were.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Forget the local log and start again from the beginning of the server's buffer.
    pub fn clear(&mut self) {
        self.log.clear();
        self.cursor = 0.0;
    }
}

impl std::fmt::Debug for BackendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendState")
            .field("url", &self.url)
            .field("cursor", &self.cursor)
            .field("entries", &self.log.len())
            .field("paused", &self.paused)
            .field("last_error", &self.last_error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogLevel;

    fn entry(ts: f64) -> Arc<LogEntry> {
        Arc::new(LogEntry {
            timestamp: ts,
            formatted_time: String::new(),
            level: LogLevel::Info,
            logger: "test".to_string(),
            message: format!("entry {}", ts),
            service: "svc".to_string(),
            host: "host".to_string(),
        })
    }

    fn page(stamps: &[f64], next_since: f64) -> LogPage {
        LogPage {
            items: stamps.iter().map(|ts| entry(*ts)).collect(),
            next_since,
        }
    }

    fn state() -> BackendState {
        BackendState::unreachable("http://x", "no source in tests")
    }

    #[test]
    fn test_apply_page_advances_cursor() {
        let mut state = state();
        let added = state.apply_page(page(&[1.0, 2.0], 2.0), LocalLogPolicy::default());
        assert_eq!(added, 2);
        assert_eq!(state.cursor(), 2.0);
        assert_eq!(state.entries().len(), 2);
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_empty_page_keeps_cursor() {
        let mut state = state();
        state.apply_page(page(&[5.0], 5.0), LocalLogPolicy::default());
        state.apply_page(page(&[], 3.0), LocalLogPolicy::default());
        assert_eq!(state.cursor(), 5.0);
    }

    #[test]
    fn test_failure_keeps_state() {
        let mut state = state();
        state.apply_page(page(&[1.0], 1.0), LocalLogPolicy::default());
        state.record_failure("connection refused");
        assert_eq!(state.cursor(), 1.0);
        assert_eq!(state.entries().len(), 1);
        assert_eq!(state.last_error(), Some("connection refused"));
    }

    #[test]
    fn test_trim_keeps_newest() {
        let policy = LocalLogPolicy {
            max_entries: 5,
            keep_after_trim: 2,
        };
        let mut state = state();
        state.apply_page(page(&[1.0, 2.0, 3.0, 4.0, 5.0], 5.0), policy);
        assert_eq!(state.entries().len(), 5);

        state.apply_page(page(&[6.0], 6.0), policy);
        let stamps: Vec<f64> = state.entries().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![5.0, 6.0]);
    }

    #[test]
    fn test_policy_normalized() {
        let policy = LocalLogPolicy {
            max_entries: 0,
            keep_after_trim: 10,
        }
        .normalized();
        assert_eq!(policy.max_entries, 1);
        assert_eq!(policy.keep_after_trim, 1);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut state = state();
        state.apply_page(page(&[1.0, 2.0], 2.0), LocalLogPolicy::default());
        state.clear();
        assert_eq!(state.cursor(), 0.0);
        assert!(state.entries().is_empty());
    }

    #[test]
    fn test_newest() {
        let mut state = state();
        state.apply_page(page(&[1.0, 2.0, 3.0], 3.0), LocalLogPolicy::default());
        let stamps: Vec<f64> = state.newest(2).map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![2.0, 3.0]);
        assert_eq!(state.newest(10).count(), 3);
    }
}
