// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP exposure of the log ring buffer.
//!
//! The same `GET /ops/logs` endpoint can be mounted on two structurally
//! different hosts:
//!
//! - [`axum_host`] - declarative routing with `axum::Router` and the `Query`
//!   extractor
//! - [`hyper_host`] - a bare hyper 1.x connection loop over an explicit
//!   [`RouteTable`](hyper_host::RouteTable) populated with `add_route`
//!
//! Both hosts implement [`MountLogs`] and delegate to
//! [`crate::query::query`], so their responses are byte-identical. Which host
//! runs is decided once at startup through [`HttpBackend`].

pub mod axum_host;
pub mod hyper_host;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::error::ServeError;
use crate::query::{self, LogQuery, RawLogParams, LOGS_PATH};
use crate::telemetry::SharedRingBuffer;
use crate::types::LogPage;

pub use hyper_host::RouteTable;

/// Which HTTP host to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpBackend {
    #[default]
    Axum,
    Hyper,
}

impl HttpBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpBackend::Axum => "axum",
            HttpBackend::Hyper => "hyper",
        }
    }
}

impl fmt::Display for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "axum" | "router" => Ok(HttpBackend::Axum),
            "hyper" | "routes" => Ok(HttpBackend::Hyper),
            other => Err(format!("unknown HTTP backend: {}", other)),
        }
    }
}

/// A host that can expose a ring buffer at [`LOGS_PATH`].
pub trait MountLogs: Sized {
    /// Register `GET /ops/logs` backed by `buffer`.
    fn mount_logs(self, buffer: SharedRingBuffer) -> Self;
}

/// The shared request path: coerce parameters, snapshot, query.
pub(crate) fn handle_logs(buffer: &SharedRingBuffer, params: &RawLogParams) -> LogPage {
    let q = LogQuery::from_params(params);
    query::query_buffer(buffer, &q)
}

/// Bind a TCP listener.
pub async fn bind(addr: &str) -> Result<TcpListener, ServeError> {
    TcpListener::bind(addr).await.map_err(|source| ServeError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve the logs endpoint on `listener` with the chosen host until `shutdown` resolves.
pub async fn serve<F>(
    backend: HttpBackend,
    listener: TcpListener,
    buffer: SharedRingBuffer,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%backend, %addr, path = LOGS_PATH, "Serving log endpoint");

    match backend {
        HttpBackend::Axum => {
            let router = axum::Router::new().mount_logs(buffer);
            axum_host::serve(listener, router, shutdown).await
        }
        HttpBackend::Hyper => {
            let routes = RouteTable::new().mount_logs(buffer);
            hyper_host::serve(listener, routes, shutdown).await
        }
    }
}
