// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! `tracing` layer that copies every event into a [`RingBuffer`].

use std::fmt::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::ring::SharedRingBuffer;
use crate::error::SinkError;
use crate::types::{unix_now, LogLevel, LogRecord};

/// Boolean event field that upgrades an ERROR event to CRITICAL.
pub const CRITICAL_FIELD: &str = "critical";

/// Layer feeding a shared ring buffer.
///
/// ```rust,ignore
/// let ring = RingBuffer::new(2000, "routing_agent")?.shared();
/// tracing_subscriber::registry()
///     .with(RingBufferLayer::new(ring.clone()))
///     .init();
///
/// tracing::error!(critical = true, "disk full");
/// ```
#[derive(Debug, Clone)]
pub struct RingBufferLayer {
    buffer: SharedRingBuffer,
}

impl RingBufferLayer {
    pub fn new(buffer: SharedRingBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &SharedRingBuffer {
        &self.buffer
    }
}

impl<S> Layer<S> for RingBufferLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let timestamp = unix_now();
        let metadata = event.metadata();
        let target = metadata.target();

        self.buffer.append_with(target, || {
            let mut visitor = EventVisitor::default();
            event.record(&mut visitor);

            if let Some(err) = visitor.error {
                return Err(SinkError::format(target, err));
            }

            let mut level = LogLevel::from(metadata.level());
            if visitor.critical && level == LogLevel::Error {
                level = LogLevel::Critical;
            }

            let logger = visitor.log_target.take().unwrap_or_else(|| target.to_string());
            Ok(LogRecord {
                timestamp,
                level,
                logger,
                message: visitor.render(),
            })
        });
    }
}

/// Collects the `message` field and renders the rest as `key=value` pairs.
#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: String,
    critical: bool,
    /// Original target of events bridged from the `log` crate.
    log_target: Option<String>,
    error: Option<String>,
}

impl EventVisitor {
    fn render(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        if let Err(err) = write!(self.fields, "{}={}", field.name(), value) {
            self.error.get_or_insert_with(|| format!("{}: {}", field.name(), err));
        }
    }
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message.push_str(value),
            "log.target" => self.log_target = Some(value.to_string()),
            name if name.starts_with("log.") => {}
            _ => self.push_field(field, format_args!("{}", value)),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == CRITICAL_FIELD {
            self.critical = value;
            return;
        }
        self.push_field(field, format_args!("{}", value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => {
                if let Err(err) = write!(self.message, "{:?}", value) {
                    self.error.get_or_insert_with(|| format!("message: {}", err));
                }
            }
            name if name.starts_with("log.") => {}
            _ => self.push_field(field, format_args!("{:?}", value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RingBuffer;
    use crate::types::LogLevel;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture<F: FnOnce()>(f: F) -> SharedRingBuffer {
        let ring = RingBuffer::new(16, "svc")
            .unwrap()
            .with_style(crate::telemetry::MessageStyle::Bare)
            .shared();
        let subscriber = tracing_subscriber::registry().with(RingBufferLayer::new(ring.clone()));
        tracing::subscriber::with_default(subscriber, f);
        ring
    }

    #[test]
    fn test_event_captured() {
        let ring = capture(|| tracing::info!(target: "discovery", "found {} places", 3));

        let entries = ring.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].logger, "discovery");
        assert_eq!(entries[0].message, "found 3 places");
    }

    #[test]
    fn test_fields_rendered() {
        let ring = capture(|| tracing::warn!(port = 10021, host = "local", "slow"));

        let entry = &ring.snapshot()[0];
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.message, "slow port=10021 host=local");
    }

    #[test]
    fn test_critical_flag_upgrades_error() {
        let ring = capture(|| {
            tracing::error!(critical = true, "disk full");
            tracing::error!("recoverable");
            tracing::warn!(critical = true, "ignored flag");
        });

        let levels: Vec<LogLevel> = ring.snapshot().iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![LogLevel::Critical, LogLevel::Error, LogLevel::Warning]
        );
        assert_eq!(ring.snapshot()[0].message, "disk full");
    }

    #[test]
    fn test_bridged_log_target_names_logger() {
        let ring = capture(|| {
            tracing::info!(
                log.target = "legacy::routing",
                log.module_path = "legacy::routing",
                "bridged record"
            )
        });

        let entry = &ring.snapshot()[0];
        assert_eq!(entry.logger, "legacy::routing");
        assert_eq!(entry.message, "bridged record");
    }

    #[test]
    fn test_trace_maps_to_debug() {
        let ring = capture(|| tracing::trace!("very chatty"));
        assert_eq!(ring.snapshot()[0].level, LogLevel::Debug);
    }

    #[test]
    fn test_panicking_debug_impl_is_contained() {
        struct Explodes;
        impl fmt::Debug for Explodes {
            fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
                panic!("explodes")
            }
        }

        let ring = capture(|| {
            tracing::info!(value = ?Explodes, "bad field");
            tracing::info!("still logging");
        });

        let entries = ring.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "still logging");
    }
}
