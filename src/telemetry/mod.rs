// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry: tracing setup and the in-memory log sink.
//!
//! - **Tracing**: structured logging to stderr through `tracing-subscriber`
//! - **Ring buffer**: a bounded, thread-safe copy of recent events that the
//!   HTTP bindings in [`crate::server`] expose at `GET /ops/logs`
//!
//! # Usage
//!
//! Create the buffer once, hand it to telemetry init, and keep a clone of the
//! handle for the HTTP side:
//!
//! ```rust,ignore
//! use opslog::telemetry::{init_telemetry, RingBuffer, TelemetryConfig};
//!
//! let ring = RingBuffer::new(2000, "root_agent")?.shared();
//! let _guard = init_telemetry(&TelemetryConfig::default(), Some(ring.clone()))?;
//!
//! tracing::info!("service started");
//! assert_eq!(ring.len(), 1);
//! ```
//!
//! Producers outside `tracing` can call [`RingBuffer::append`] directly with a
//! [`LogRecord`](crate::types::LogRecord).

mod init;
mod layer;
mod ring;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
pub use layer::{RingBufferLayer, CRITICAL_FIELD};
pub use ring::{ErrorHook, MessageStyle, RingBuffer, SharedRingBuffer};
