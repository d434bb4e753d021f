// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded, thread-safe log sink.
//!
//! Producers call [`RingBuffer::append`] from any thread; readers call
//! [`RingBuffer::snapshot`]. Both take the same short lock: producers format
//! their entry before acquiring it, and readers only copy `Arc` pointers while
//! holding it.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{ConfigError, SinkError};
use crate::types::{format_timestamp, LogEntry, LogRecord};

/// Handle shared between the tracing layer and the HTTP bindings.
pub type SharedRingBuffer = Arc<RingBuffer>;

/// Callback receiving records the sink could not store.
pub type ErrorHook = Arc<dyn Fn(&SinkError) + Send + Sync>;

/// How the stored `message` field is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStyle {
    /// `"{time} {LEVEL} [{logger}] {message}"`.
    #[default]
    Line,
    /// The producer's message, unchanged.
    Bare,
}

/// Lock-protected state.
struct Ring {
    entries: VecDeque<Arc<LogEntry>>,
    /// Timestamp of the newest stored entry, used to keep `ts` non-decreasing.
    last_ts: f64,
    /// Entries evicted since construction.
    dropped: u64,
}

/// Fixed-capacity, insertion-ordered log buffer with FIFO eviction.
pub struct RingBuffer {
    ring: Mutex<Ring>,
    capacity: usize,
    service: String,
    host: String,
    style: MessageStyle,
    error_hook: ErrorHook,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` entries, labelled with `service`.
    ///
    /// The hostname is resolved once here and reused for every entry.
    pub fn new(capacity: usize, service: impl Into<String>) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::invalid("capacity", "must be at least 1"));
        }

        Ok(Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                last_ts: f64::NEG_INFINITY,
                dropped: 0,
            }),
            capacity,
            service: service.into(),
            host: resolve_hostname(),
            style: MessageStyle::default(),
            error_hook: Arc::new(default_error_hook),
        })
    }

    /// Override the host label.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set how messages are rendered.
    pub fn with_style(mut self, style: MessageStyle) -> Self {
        self.style = style;
        self
    }

    /// Install the hook that receives dropped-record errors.
    pub fn with_error_hook(mut self, hook: impl Fn(&SinkError) + Send + Sync + 'static) -> Self {
        self.error_hook = Arc::new(hook);
        self
    }

    /// Wrap in an `Arc` for sharing.
    pub fn shared(self) -> SharedRingBuffer {
        Arc::new(self)
    }

    /// Append a record. Never fails and never panics; problems go to the error hook.
    pub fn append(&self, record: LogRecord) {
        let logger = record.logger.clone();
        self.append_with(&logger, move || Ok(record));
    }

    /// Append a record produced lazily by `produce`.
    ///
    /// Both `produce` and entry formatting run outside the lock. A panic in
    /// either (for instance from a user `Debug` impl) is caught and reported.
    pub fn append_with<F>(&self, logger: &str, produce: F)
    where
        F: FnOnce() -> Result<LogRecord, SinkError>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            produce().and_then(|record| self.build_entry(record))
        }));

        match outcome {
            Ok(Ok(entry)) => self.push(entry),
            Ok(Err(err)) => (self.error_hook)(&err),
            Err(payload) => (self.error_hook)(&SinkError::panicked(logger, payload.as_ref())),
        }
    }

    /// Point-in-time copy of all retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the buffer holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted since construction.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Service label stamped on every entry.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Host label stamped on every entry.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_entry(&self, record: LogRecord) -> Result<LogEntry, SinkError> {
        if !record.timestamp.is_finite() {
            return Err(SinkError::format(
                record.logger,
                format!("non-finite timestamp {}", record.timestamp),
            ));
        }

        let formatted_time = format_timestamp(record.timestamp);
        let message = match self.style {
            MessageStyle::Line => format!(
                "{} {} [{}] {}",
                formatted_time, record.level, record.logger, record.message
            ),
            MessageStyle::Bare => record.message,
        };

        Ok(LogEntry {
            timestamp: record.timestamp,
            formatted_time,
            level: record.level,
            logger: record.logger,
            message,
            service: self.service.clone(),
            host: self.host.clone(),
        })
    }

    fn push(&self, mut entry: LogEntry) {
        let mut ring = self.lock();

        // Concurrent producers stamp time before taking the lock; clamp so the
        // stored sequence stays non-decreasing in arrival order.
        if entry.timestamp < ring.last_ts {
            entry.timestamp = ring.last_ts;
            self.restamp(&mut entry);
        }
        ring.last_ts = entry.timestamp;

        if ring.entries.len() == self.capacity {
            ring.entries.pop_front();
            ring.dropped += 1;
        }
        ring.entries.push_back(Arc::new(entry));
    }

    /// Re-render the time fields after a clamp moved `timestamp`.
    fn restamp(&self, entry: &mut LogEntry) {
        let time = format_timestamp(entry.timestamp);
        if time == entry.formatted_time {
            return;
        }
        if self.style == MessageStyle::Line && entry.message.starts_with(&entry.formatted_time) {
            entry.message.replace_range(..entry.formatted_time.len(), &time);
        }
        entry.formatted_time = time;
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        // A producer that panicked mid-push cannot leave a torn entry behind
        // (entries are inserted whole), so a poisoned lock is safe to reuse.
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("service", &self.service)
            .field("host", &self.host)
            .field("style", &self.style)
            .finish()
    }
}

/// Report to stderr. Never routes back through `tracing`, which would recurse.
fn default_error_hook(err: &SinkError) {
    eprintln!("opslog: dropped log record: {}", err);
}

fn resolve_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}
