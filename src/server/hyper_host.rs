// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Add-route style binding on bare `hyper`.
//!
//! Routes are explicit objects registered with [`RouteTable::add_route`]; the
//! table is matched by exact path and then by method. Handlers are synchronous
//! and see the request head only, which is all a `GET` endpoint needs.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, warn};

use super::{handle_logs, MountLogs};
use crate::error::ServeError;
use crate::query::{RawLogParams, LOGS_PATH};
use crate::telemetry::SharedRingBuffer;

/// Response type produced by every handler.
pub type HttpResponse = Response<Full<Bytes>>;

/// A route handler. Receives the request head with the body stripped.
pub type Handler = Arc<dyn Fn(&Request<()>) -> HttpResponse + Send + Sync>;

/// One registered route.
#[derive(Clone)]
pub struct Route {
    path: String,
    methods: Vec<Method>,
    handler: Handler,
}

impl Route {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Explicit route registry dispatched by the hyper connection loop.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `path` and `methods`.
    ///
    /// When several routes match a request, the first registered wins.
    pub fn add_route<H>(&mut self, path: impl Into<String>, methods: &[Method], handler: H)
    where
        H: Fn(&Request<()>) -> HttpResponse + Send + Sync + 'static,
    {
        self.routes.push(Route {
            path: path.into(),
            methods: methods.to_vec(),
            handler: Arc::new(handler),
        });
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route a request: 404 for unknown paths, 405 for known paths with the wrong method.
    pub fn dispatch<B>(&self, request: Request<B>) -> HttpResponse {
        let (parts, _body) = request.into_parts();
        let request = Request::from_parts(parts, ());

        let mut allowed: Vec<&Method> = Vec::new();
        for route in self.routes.iter().filter(|r| r.path == request.uri().path()) {
            if route.methods.contains(request.method()) {
                return (route.handler)(&request);
            }
            allowed.extend(route.methods.iter());
        }

        if allowed.is_empty() {
            return text_response(StatusCode::NOT_FOUND, "Not Found");
        }

        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(ALLOW, value);
        }
        response
    }
}

impl MountLogs for RouteTable {
    fn mount_logs(mut self, buffer: SharedRingBuffer) -> Self {
        // hyper drops the body of HEAD responses on the wire.
        self.add_route(LOGS_PATH, &[Method::GET, Method::HEAD], move |request| {
            let params = RawLogParams::from_query_string(request.uri().query().unwrap_or(""));
            let page = handle_logs(&buffer, &params);
            match serde_json::to_vec(&page) {
                Ok(body) => json_response(StatusCode::OK, body),
                Err(err) => {
                    warn!(error = %err, "Failed to serialize log page");
                    text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                }
            }
        });
        self
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Accept HTTP/1 connections on `listener` and dispatch them through `routes`
/// until `shutdown` resolves. In-flight connections finish on their own tasks.
pub async fn serve<F>(listener: TcpListener, routes: RouteTable, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let routes = Arc::new(routes);
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
            _ = &mut shutdown => {
                debug!("Shutdown signal received, closing listener");
                return Ok(());
            }
        };

        let routes = Arc::clone(&routes);
        tokio::spawn(async move {
            let service = service_fn(move |request: Request<Incoming>| {
                let routes = Arc::clone(&routes);
                async move { Ok::<_, Infallible>(routes.dispatch(request)) }
            });

            if let Err(err) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, error = %err, "Connection ended with error");
            }
        });
    }
}
