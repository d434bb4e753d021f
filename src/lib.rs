// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! opslog - in-process log capture with a cursor-based HTTP endpoint.
//!
//! A service keeps its most recent log entries in a bounded ring buffer,
//! exposes them at `GET /ops/logs?since=<ts>&limit=<n>&level=<LEVEL>`, and a
//! dashboard polls one or more such services incrementally.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`types`] - Log levels, records, entries and pages
//! - [`error`] - Error types and result aliases
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Tracing setup, the ring buffer and the layer feeding it
//! - [`query`] - Filtering and pagination over a buffer snapshot
//! - [`server`] - The `/ops/logs` endpoint on axum or on a bare hyper host
//! - [`dashboard`] - Incremental polling of many endpoints and terminal output
//!
//! # Example
//!
//! ```rust,ignore
//! use opslog::server::{self, HttpBackend};
//! use opslog::telemetry::{init_telemetry, RingBuffer, TelemetryConfig};
//!
//! let ring = RingBuffer::new(2000, "root_agent")?.shared();
//! let _guard = init_telemetry(&TelemetryConfig::default(), Some(ring.clone()))?;
//!
//! let listener = server::bind("0.0.0.0:10022").await?;
//! server::serve(HttpBackend::Axum, listener, ring, shutdown).await?;
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod query;
pub mod server;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConfigError, FetchError, Result, ServeError, SinkError};
pub use query::{query, LogQuery, RawLogParams, LOGS_PATH};
pub use server::{HttpBackend, MountLogs};
pub use telemetry::{RingBuffer, RingBufferLayer, SharedRingBuffer};
pub use types::{LevelFilter, LogEntry, LogLevel, LogPage, LogRecord};

/// opslog version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let ring = RingBuffer::new(4, "svc").unwrap().shared();
        ring.append(LogRecord::now(LogLevel::Info, "app", "hello"));

        let page = query(&ring.snapshot(), &LogQuery::default());
        assert_eq!(page.items.len(), 1);
        assert_eq!(LOGS_PATH, "/ops/logs");
    }
}
