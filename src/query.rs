// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cursor query over a ring buffer snapshot.
//!
//! [`query`] is a pure function of `(snapshot, since, limit, level)`; both HTTP
//! bindings call it unchanged so their responses cannot drift apart.
//!
//! Cursoring uses an open interval (`ts > since`). A client that feeds
//! `next_since` back never sees an entry twice. The cost: if a single burst
//! puts more than `limit` entries on one timestamp, the older ones on that
//! tick are skipped by the next poll.

use std::sync::Arc;

use serde::Deserialize;

use crate::telemetry::RingBuffer;
use crate::types::{LevelFilter, LogEntry, LogPage};

/// Route served by both HTTP bindings.
pub const LOGS_PATH: &str = "/ops/logs";

/// Page size when the client does not ask for one.
pub const DEFAULT_LIMIT: usize = 200;

/// Largest page a client can request.
pub const MAX_LIMIT: usize = 1000;

/// A validated query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogQuery {
    pub since: f64,
    pub limit: usize,
    pub level: LevelFilter,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            since: 0.0,
            limit: DEFAULT_LIMIT,
            level: LevelFilter::All,
        }
    }
}

impl LogQuery {
    /// Build a query, clamping `limit` into `[1, MAX_LIMIT]`.
    pub fn new(since: f64, limit: usize, level: LevelFilter) -> Self {
        Self {
            since: if since.is_finite() { since } else { 0.0 },
            limit: limit.clamp(1, MAX_LIMIT),
            level,
        }
    }

    /// Coerce raw transport parameters. Never fails.
    pub fn from_params(params: &RawLogParams) -> Self {
        let since = params
            .since
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite())
            .unwrap_or(0.0);

        let limit = params
            .limit
            .as_deref()
            .and_then(parse_limit)
            .unwrap_or(DEFAULT_LIMIT);

        let level = params
            .level
            .as_deref()
            .map(LevelFilter::parse_lenient)
            .unwrap_or_default();

        Self { since, limit, level }
    }
}

/// Parse and clamp a limit. Integers too large for `i64` saturate.
fn parse_limit(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n.clamp(1, MAX_LIMIT as i64) as usize);
    }
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { 1 } else { MAX_LIMIT })
}

/// Query parameters exactly as they arrive on the wire.
///
/// Every field is an optional string so that no input can make extraction
/// fail; [`LogQuery::from_params`] does the coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawLogParams {
    pub since: Option<String>,
    pub limit: Option<String>,
    pub level: Option<String>,
}

impl RawLogParams {
    /// Parse a URL query string (without the leading `?`).
    ///
    /// Unknown keys are ignored; the last occurrence of a repeated key wins.
    pub fn from_query_string(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "since" => params.since = value,
                "limit" => params.limit = value,
                "level" => params.level = value,
                _ => {}
            }
        }
        params
    }
}

/// Select the entries newer than `q.since` that match `q.level`, newest `q.limit` kept.
pub fn query(snapshot: &[Arc<LogEntry>], q: &LogQuery) -> LogPage {
    let mut items: Vec<Arc<LogEntry>> = snapshot
        .iter()
        .filter(|entry| q.level.matches(entry.level))
        .filter(|entry| entry.timestamp > q.since)
        .cloned()
        .collect();

    if items.len() > q.limit {
        items = items.split_off(items.len() - q.limit);
    }

    let next_since = items.last().map(|e| e.timestamp).unwrap_or(q.since);
    LogPage { items, next_since }
}

/// Snapshot `buffer` and run [`query`] on it.
pub fn query_buffer(buffer: &RingBuffer, q: &LogQuery) -> LogPage {
    query(&buffer.snapshot(), q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogLevel, LogRecord};

    fn buffer_with(capacity: usize, records: &[(f64, LogLevel)]) -> RingBuffer {
        let buffer = RingBuffer::new(capacity, "svc").unwrap();
        for (ts, level) in records {
            buffer.append(LogRecord::at(*ts, *level, "test", "m"));
        }
        buffer
    }

    fn stamps(page: &LogPage) -> Vec<f64> {
        page.items.iter().map(|e| e.timestamp).collect()
    }

    #[test]
    fn test_scenario_capacity_three() {
        let buffer = buffer_with(
            3,
            &[
                (1.0, LogLevel::Info),
                (2.0, LogLevel::Info),
                (3.0, LogLevel::Info),
                (4.0, LogLevel::Info),
            ],
        );

        let page = query_buffer(&buffer, &LogQuery::new(0.0, 10, LevelFilter::All));
        assert_eq!(stamps(&page), vec![2.0, 3.0, 4.0]);
        assert_eq!(page.next_since, 4.0);

        let page = query_buffer(&buffer, &LogQuery::new(4.0, 10, LevelFilter::All));
        assert!(page.items.is_empty());
        assert_eq!(page.next_since, 4.0);
    }

    #[test]
    fn test_level_filter_exact_match() {
        let buffer = buffer_with(
            8,
            &[
                (1.0, LogLevel::Warning),
                (2.0, LogLevel::Error),
                (3.0, LogLevel::Critical),
            ],
        );

        let page = query_buffer(
            &buffer,
            &LogQuery::new(0.0, 10, LevelFilter::Only(LogLevel::Error)),
        );
        assert_eq!(stamps(&page), vec![2.0]);
        assert_eq!(page.next_since, 2.0);
    }

    #[test]
    fn test_tail_truncation_keeps_newest() {
        let records: Vec<(f64, LogLevel)> = (1..=10).map(|i| (i as f64, LogLevel::Info)).collect();
        let buffer = buffer_with(20, &records);

        let page = query_buffer(&buffer, &LogQuery::new(0.0, 3, LevelFilter::All));
        assert_eq!(stamps(&page), vec![8.0, 9.0, 10.0]);
        assert_eq!(page.next_since, 10.0);
    }

    #[test]
    fn test_since_is_exclusive() {
        let buffer = buffer_with(8, &[(1.0, LogLevel::Info), (2.0, LogLevel::Info)]);
        let page = query_buffer(&buffer, &LogQuery::new(1.0, 10, LevelFilter::All));
        assert_eq!(stamps(&page), vec![2.0]);
    }

    #[test]
    fn test_empty_result_preserves_watermark() {
        let buffer = buffer_with(8, &[(1.0, LogLevel::Info)]);
        let page = query_buffer(&buffer, &LogQuery::new(99.5, 10, LevelFilter::All));
        assert!(page.items.is_empty());
        assert_eq!(page.next_since, 99.5);
    }

    #[test]
    fn test_idempotent_on_unchanged_buffer() {
        let buffer = buffer_with(8, &[(1.0, LogLevel::Info), (2.0, LogLevel::Debug)]);
        let q = LogQuery::new(0.5, 10, LevelFilter::All);
        assert_eq!(query_buffer(&buffer, &q), query_buffer(&buffer, &q));
    }

    #[test]
    fn test_advancing_polls_never_overlap() {
        let buffer = RingBuffer::new(64, "svc").unwrap();
        let mut since = 0.0;
        let mut seen = Vec::new();

        for round in 0..5 {
            for i in 0..7 {
                let ts = (round * 10 + i) as f64;
                buffer.append(LogRecord::at(ts, LogLevel::Info, "test", "m"));
            }
            let page = query_buffer(&buffer, &LogQuery::new(since, 4, LevelFilter::All));
            for item in &page.items {
                assert!(item.timestamp > since);
                assert!(!seen.contains(&item.timestamp));
                seen.push(item.timestamp);
            }
            since = page.next_since;
        }
    }

    #[test]
    fn test_params_coerced_to_defaults() {
        let q = LogQuery::from_params(&RawLogParams {
            since: Some("yesterday".to_string()),
            limit: Some("lots".to_string()),
            level: Some("LOUD".to_string()),
        });
        assert_eq!(q, LogQuery::default());

        let q = LogQuery::from_params(&RawLogParams::default());
        assert_eq!(q, LogQuery::default());

        let q = LogQuery::from_params(&RawLogParams {
            since: Some("NaN".to_string()),
            ..Default::default()
        });
        assert_eq!(q.since, 0.0);
    }

    #[test]
    fn test_limit_clamped() {
        let parse = |limit: &str| {
            LogQuery::from_params(&RawLogParams {
                limit: Some(limit.to_string()),
                ..Default::default()
            })
            .limit
        };
        assert_eq!(parse("0"), 1);
        assert_eq!(parse("-5"), 1);
        assert_eq!(parse("5000"), MAX_LIMIT);
        assert_eq!(parse(" 50 "), 50);
        assert_eq!(LogQuery::new(0.0, 0, LevelFilter::All).limit, 1);
    }

    #[test]
    fn test_huge_limit_saturates() {
        let parse = |limit: &str| {
            LogQuery::from_params(&RawLogParams {
                limit: Some(limit.to_string()),
                ..Default::default()
            })
            .limit
        };
        assert_eq!(parse("99999999999999999999"), MAX_LIMIT);
        assert_eq!(parse("+99999999999999999999"), MAX_LIMIT);
        assert_eq!(parse("-99999999999999999999"), 1);
        assert_eq!(parse("9999x"), DEFAULT_LIMIT);
        assert_eq!(parse("-"), DEFAULT_LIMIT);
    }

    #[test]
    fn test_level_param_case_insensitive() {
        let q = LogQuery::from_params(&RawLogParams {
            level: Some("warn".to_string()),
            ..Default::default()
        });
        assert_eq!(q.level, LevelFilter::Only(LogLevel::Warning));
    }

    #[test]
    fn test_query_string_parsing() {
        let params = RawLogParams::from_query_string("since=12.5&limit=20&level=error&x=1");
        assert_eq!(params.since.as_deref(), Some("12.5"));
        assert_eq!(params.limit.as_deref(), Some("20"));
        assert_eq!(params.level.as_deref(), Some("error"));

        let params = RawLogParams::from_query_string("level=INFO&level=DEBUG");
        assert_eq!(params.level.as_deref(), Some("DEBUG"));

        assert_eq!(RawLogParams::from_query_string(""), RawLogParams::default());
    }
}
