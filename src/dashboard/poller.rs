// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reconciliation of many independently polled backends.
//!
//! Each backend is an explicitly keyed [`BackendState`]. Every tick starts a
//! background fetch for each unpaused backend that is not already waiting on
//! one, and each result is applied as soon as it lands. A slow or failing
//! backend never touches or holds up another backend's state.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, instrument, warn};

use super::source::{HttpLogSource, SharedLogSource};
use super::state::{BackendState, LocalLogPolicy};
use crate::error::FetchError;
use crate::types::{LevelFilter, LogPage};

/// Page size requested on each fetch.
pub const DEFAULT_PAGE_LIMIT: usize = 300;

/// Builds a source for a backend URL.
pub type SourceFactory = Arc<dyn Fn(&str) -> Result<SharedLogSource, FetchError> + Send + Sync>;

/// Fetch settings shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub level: LevelFilter,
    pub limit: usize,
    pub policy: LocalLogPolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Only(crate::types::LogLevel::Info),
            limit: DEFAULT_PAGE_LIMIT,
            policy: LocalLogPolicy::default(),
        }
    }
}

/// Result of polling one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The fetch succeeded and added `new_entries` entries.
    Updated { backend: String, new_entries: usize },
    /// The fetch failed; the backend's state is unchanged.
    Failed { backend: String, error: String },
    /// The backend is paused and was not fetched.
    Skipped { backend: String },
    /// The previous fetch has not landed yet, so no new one was started.
    InFlight { backend: String },
}

impl PollOutcome {
    pub fn backend(&self) -> &str {
        match self {
            PollOutcome::Updated { backend, .. }
            | PollOutcome::Failed { backend, .. }
            | PollOutcome::Skipped { backend }
            | PollOutcome::InFlight { backend } => backend,
        }
    }
}

/// A finished fetch, tagged with the ticket it was dispatched under.
struct Fetched {
    backend: String,
    ticket: u64,
    result: Result<LogPage, FetchError>,
}

/// Polling state for every watched backend.
///
/// Fetches run as background tasks. A backend with a fetch still in flight is
/// not fetched again until that one lands, so a slow backend only delays
/// itself.
pub struct Dashboard {
    backends: BTreeMap<String, BackendState>,
    settings: PollSettings,
    factory: SourceFactory,
    fetches: JoinSet<Fetched>,
    /// Backend name to the ticket of its live fetch.
    pending: HashMap<String, u64>,
    next_ticket: u64,
    /// Outcomes collected while waiting on a manual refresh.
    ready: VecDeque<PollOutcome>,
}

impl Dashboard {
    /// Create a dashboard that reaches backends over HTTP.
    pub fn new(settings: PollSettings) -> Self {
        Self::with_factory(
            settings,
            Arc::new(|url: &str| {
                HttpLogSource::new(url).map(|source| Arc::new(source) as SharedLogSource)
            }),
        )
    }

    /// Create a dashboard with a custom source factory.
    pub fn with_factory(settings: PollSettings, factory: SourceFactory) -> Self {
        Self {
            backends: BTreeMap::new(),
            settings,
            factory,
            fetches: JoinSet::new(),
            pending: HashMap::new(),
            next_ticket: 0,
            ready: VecDeque::new(),
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Change the level filter. Cursors are kept.
    pub fn set_level(&mut self, level: LevelFilter) {
        self.settings.level = level;
    }

    /// Watched backend names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn backend(&self, name: &str) -> Option<&BackendState> {
        self.backends.get(name)
    }

    pub fn backend_mut(&mut self, name: &str) -> Option<&mut BackendState> {
        self.backends.get_mut(name)
    }

    /// Number of backends with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Align the watched set with `targets` (name to base URL).
    ///
    /// New names get a fresh record, names whose URL changed are reset, and
    /// names no longer present are dropped. Fetches in flight for a reset or
    /// dropped backend are discarded when they land.
    pub fn sync_backends(&mut self, targets: &BTreeMap<String, String>) {
        let wanted: HashSet<&str> = targets.keys().map(String::as_str).collect();
        let pending = &mut self.pending;
        self.backends.retain(|name, _| {
            let keep = wanted.contains(name.as_str());
            if !keep {
                debug!(backend = %name, "Dropping backend no longer configured");
                pending.remove(name);
            }
            keep
        });

        for (name, url) in targets {
            let unchanged = self
                .backends
                .get(name)
                .is_some_and(|state| state.url() == url);
            if unchanged {
                continue;
            }

            let state = match (self.factory)(url) {
                Ok(source) => BackendState::new(url.clone(), source),
                Err(err) => {
                    warn!(backend = %name, %url, error = %err, "Backend URL unusable");
                    BackendState::unreachable(url.clone(), err.to_string())
                }
            };
            self.pending.remove(name);
            self.backends.insert(name.clone(), state);
        }
    }

    /// Pause or resume a backend. Returns false if it is not watched.
    pub fn set_paused(&mut self, name: &str, paused: bool) -> bool {
        match self.backends.get_mut(name) {
            Some(state) => {
                state.set_paused(paused);
                true
            }
            None => false,
        }
    }

    /// Clear a backend's local log and reset its cursor. Returns false if it is not watched.
    pub fn clear(&mut self, name: &str) -> bool {
        match self.backends.get_mut(name) {
            Some(state) => {
                state.clear();
                // A page fetched against the old cursor must not land in the cleared log.
                self.pending.remove(name);
                true
            }
            None => false,
        }
    }

    /// One scheduled tick: start a fetch for every unpaused, idle backend.
    ///
    /// Returns immediately with the outcomes known without fetching (paused,
    /// busy, or unusable backends). Fetch results arrive through
    /// [`Dashboard::next_completed`].
    #[instrument(skip(self), fields(backends = self.backends.len()))]
    pub fn dispatch(&mut self) -> Vec<PollOutcome> {
        let names: Vec<String> = self.backends.keys().cloned().collect();
        let mut outcomes = Vec::new();

        for name in names {
            let Some(state) = self.backends.get(&name) else {
                continue;
            };
            if state.paused() {
                outcomes.push(PollOutcome::Skipped { backend: name });
            } else if self.pending.contains_key(&name) {
                outcomes.push(PollOutcome::InFlight { backend: name });
            } else if let Some(failed) = self.start_fetch(&name) {
                outcomes.push(failed);
            }
        }
        outcomes
    }

    /// Wait for the next fetch to land and apply it.
    ///
    /// Returns `None` once nothing is in flight.
    pub async fn next_completed(&mut self) -> Option<PollOutcome> {
        if let Some(outcome) = self.ready.pop_front() {
            return Some(outcome);
        }
        loop {
            let joined = self.fetches.join_next().await?;
            if let Some(outcome) = self.apply(joined) {
                return Some(outcome);
            }
        }
    }

    /// Dispatch, then wait for every fetch in flight. Outcomes are sorted by backend.
    pub async fn poll_round(&mut self) -> Vec<PollOutcome> {
        let mut outcomes = self.dispatch();
        outcomes.retain(|outcome| !matches!(outcome, PollOutcome::InFlight { .. }));
        while !self.pending.is_empty() || !self.ready.is_empty() {
            match self.next_completed().await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes.sort_by(|a, b| a.backend().cmp(b.backend()));
        outcomes
    }

    /// Manual refresh of one backend. Fetches even when paused or busy.
    pub async fn refresh(&mut self, name: &str) -> Option<PollOutcome> {
        if !self.backends.contains_key(name) {
            return None;
        }
        if let Some(failed) = self.start_fetch(name) {
            return Some(failed);
        }

        loop {
            let joined = self.fetches.join_next().await?;
            match self.apply(joined) {
                Some(outcome) if outcome.backend() == name => return Some(outcome),
                Some(outcome) => self.ready.push_back(outcome),
                None => {}
            }
        }
    }

    /// Spawn a fetch for `name`, replacing any fetch already in flight for it.
    /// Returns an outcome only when there is nothing to fetch from.
    fn start_fetch(&mut self, name: &str) -> Option<PollOutcome> {
        let state = self.backends.get(name)?;
        let Some(source) = state.source().cloned() else {
            let error = state
                .last_error()
                .unwrap_or("no source for backend")
                .to_string();
            return Some(PollOutcome::Failed {
                backend: name.to_string(),
                error,
            });
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.insert(name.to_string(), ticket);

        let settings = self.settings;
        let cursor = state.cursor();
        let backend = name.to_string();
        self.fetches.spawn(async move {
            // Run the fetch as its own task so a panicking source still reports back.
            let fetch = tokio::spawn(async move {
                source.fetch(cursor, settings.limit, settings.level).await
            });
            let result = match fetch.await {
                Ok(result) => result,
                Err(err) => Err(FetchError::Network(format!("fetch task failed: {}", err))),
            };
            Fetched {
                backend,
                ticket,
                result,
            }
        });
        None
    }

    /// Merge a landed fetch into its backend. Stale fetches yield `None`.
    fn apply(&mut self, joined: Result<Fetched, JoinError>) -> Option<PollOutcome> {
        let Fetched {
            backend,
            ticket,
            result,
        } = match joined {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(error = %err, "Fetch task failed");
                return None;
            }
        };

        if self.pending.get(&backend) != Some(&ticket) {
            debug!(backend = %backend, ticket, "Discarding stale fetch");
            return None;
        }
        self.pending.remove(&backend);
        let state = self.backends.get_mut(&backend)?;

        let outcome = match result {
            Ok(page) => {
                let new_entries = state.apply_page(page, self.settings.policy);
                PollOutcome::Updated {
                    backend,
                    new_entries,
                }
            }
            Err(err) => {
                let error = format!("Fetch error from {}: {}", state.url(), err);
                debug!(backend = %backend, retryable = err.is_retryable(), "{}", error);
                state.record_failure(error.clone());
                PollOutcome::Failed { backend, error }
            }
        };
        Some(outcome)
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("backends", &self.backends)
            .field("settings", &self.settings)
            .finish()
    }
}
