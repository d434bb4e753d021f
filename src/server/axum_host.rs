// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Router-style binding on `axum`.

use std::future::Future;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, RawQuery, State};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::debug;

use super::{handle_logs, MountLogs};
use crate::error::ServeError;
use crate::query::{RawLogParams, LOGS_PATH};
use crate::telemetry::SharedRingBuffer;
use crate::types::LogPage;

impl MountLogs for Router {
    fn mount_logs(self, buffer: SharedRingBuffer) -> Self {
        self.merge(
            Router::new()
                .route(LOGS_PATH, get(get_logs))
                .with_state(buffer),
        )
    }
}

/// Build a router exposing only the logs endpoint.
pub fn router(buffer: SharedRingBuffer) -> Router {
    Router::new().mount_logs(buffer)
}

async fn get_logs(
    State(buffer): State<SharedRingBuffer>,
    RawQuery(raw): RawQuery,
    params: Result<Query<RawLogParams>, QueryRejection>,
) -> Json<LogPage> {
    // The strict decoder rejects repeated keys; fall back to last-wins.
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => {
            debug!(%rejection, "Strict query decode failed, reparsing leniently");
            RawLogParams::from_query_string(raw.as_deref().unwrap_or(""))
        }
    };
    Json(handle_logs(&buffer, &params))
}

/// Run `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
