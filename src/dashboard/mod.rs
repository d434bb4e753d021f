// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Polling dashboard for one or more `/ops/logs` endpoints.
//!
//! Every watched backend keeps its own `(cursor, local log, paused)` record.
//! On each tick the dashboard asks every unpaused, idle backend for entries
//! newer than its cursor. Each reply is appended as it lands and moves that
//! backend's cursor to `next_since`. A failed fetch leaves the record alone;
//! the next tick is the retry.
//!
//! # Example
//!
//! ```rust,ignore
//! use opslog::dashboard::{watch, Dashboard, PollSettings, WatchOptions};
//!
//! let mut dashboard = Dashboard::new(PollSettings::default());
//! dashboard.sync_backends(&config.dashboard.targets);
//! watch(&mut dashboard, WatchOptions::default(), &mut std::io::stdout()).await?;
//! ```

mod poller;
pub mod render;
mod source;
mod state;

pub use poller::{Dashboard, PollOutcome, PollSettings, SourceFactory, DEFAULT_PAGE_LIMIT};
pub use source::{HttpLogSource, LogSource, SharedLogSource, DEFAULT_FETCH_TIMEOUT};
pub use state::{BackendState, LocalLogPolicy};

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

/// Bounds for the poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Entries rendered from a backend's local log per update.
pub const RENDER_TAIL: usize = 300;

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub interval: Duration,
    /// Stop after a single poll round.
    pub once: bool,
    /// Upper bound on lines printed per backend per round.
    pub tail: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            once: false,
            tail: RENDER_TAIL,
        }
    }
}

/// Clamp a poll interval into the supported range.
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Poll on a fixed interval and print new entries to `out` until Ctrl-C.
///
/// Each backend's entries are printed as soon as its own fetch lands.
pub async fn watch<W: Write>(
    dashboard: &mut Dashboard,
    options: WatchOptions,
    out: &mut W,
) -> io::Result<()> {
    let mut ticker = tokio::time::interval(clamp_interval(options.interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Last error printed per backend, so a down backend warns once per change.
    let mut reported: HashMap<String, String> = HashMap::new();
    let mut dispatched = false;

    loop {
        tokio::select! {
            _ = ticker.tick(), if !(options.once && dispatched) => {
                let outcomes = dashboard.dispatch();
                dispatched = true;
                print_outcomes(dashboard, &outcomes, options.tail, &mut reported, out)?;
            }
            Some(outcome) = dashboard.next_completed() => {
                print_outcomes(dashboard, std::slice::from_ref(&outcome), options.tail, &mut reported, out)?;
            }
            _ = &mut shutdown => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
        out.flush()?;

        if options.once && dispatched && dashboard.in_flight() == 0 {
            break;
        }
    }

    Ok(())
}

fn print_outcomes<W: Write>(
    dashboard: &Dashboard,
    outcomes: &[PollOutcome],
    tail: usize,
    reported: &mut HashMap<String, String>,
    out: &mut W,
) -> io::Result<()> {
    let prefixed = dashboard.names().count() > 1;

    for outcome in outcomes {
        match outcome {
            PollOutcome::Updated {
                backend,
                new_entries,
            } => {
                reported.remove(backend);
                let Some(state) = dashboard.backend(backend) else {
                    continue;
                };
                for entry in state.newest((*new_entries).min(tail)) {
                    let line = if prefixed {
                        render::render_entry_for(backend, entry)
                    } else {
                        render::render_entry(entry)
                    };
                    writeln!(out, "{}", line)?;
                }
            }
            PollOutcome::Failed { backend, error } => {
                if reported.get(backend) != Some(error) {
                    writeln!(out, "{}", render::render_warning(error))?;
                    reported.insert(backend.clone(), error.clone());
                }
            }
            PollOutcome::Skipped { .. } | PollOutcome::InFlight { .. } => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_interval() {
        assert_eq!(clamp_interval(Duration::from_millis(10)), MIN_POLL_INTERVAL);
        assert_eq!(clamp_interval(Duration::from_secs(60)), MAX_POLL_INTERVAL);
        assert_eq!(
            clamp_interval(Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_failures_reported_once_per_change() {
        colored::control::set_override(false);
        let dashboard = Dashboard::new(PollSettings::default());
        let mut reported = HashMap::new();
        let mut out = Vec::new();
        let failed = vec![PollOutcome::Failed {
            backend: "root".to_string(),
            error: "Fetch error from http://x: refused".to_string(),
        }];

        print_outcomes(&dashboard, &failed, 10, &mut reported, &mut out).unwrap();
        print_outcomes(&dashboard, &failed, 10, &mut reported, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("refused"));
    }

    #[tokio::test]
    async fn test_watch_once_against_unreachable_backend() {
        colored::control::set_override(false);
        let mut dashboard = Dashboard::new(PollSettings::default());
        let targets = [("root".to_string(), "http://127.0.0.1:9".to_string())]
            .into_iter()
            .collect();
        dashboard.sync_backends(&targets);

        let mut out = Vec::new();
        let options = WatchOptions {
            once: true,
            ..Default::default()
        };
        watch(&mut dashboard, options, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Fetch error from http://127.0.0.1:9"));
    }
}
