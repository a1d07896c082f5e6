// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Router assembly and the blocking `serve` loop.
//!
//! TLS termination is intentionally not this crate's job: `behind_tls_proxy`
//! in `agor-config::GatewayConfig` documents the expected deployment —
//! a reverse proxy (nginx, Caddy, a cloud load balancer) in front of a plain
//! HTTP listener bound to loopback or a private interface. A prior
//! in-process `rcgen`/`rustls-pemfile` self-signed-certificate path added
//! nothing a reverse proxy doesn't already do better, so the dependency
//! is dropped rather than carried forward unused.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::{auth, http::security, rpc, state::AppState, ws};

/// 8 MiB: generous for a chat-style prompt or a board export blob, small
/// enough that a misbehaving client can't exhaust memory with one request.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/rpc", post(rpc::rpc_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::bearer_auth_mw));

    Router::new()
        .route("/login", post(auth::login_handler))
        .route("/ws", get(ws::ws_handler))
        .merge(authenticated)
        .layer(middleware::from_fn(security::csrf_guard))
        .layer(middleware::from_fn(security::security_headers))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Binds `bind_addr` and serves until the process receives a shutdown
/// signal. Blocks.
pub async fn serve(bind_addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
