// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! HTTP bearer-token authentication.
//!
//! Generalizes the teacher's static pre-shared-token middleware into
//! HMAC-signed claims tokens (see `agor_proto::auth`): instead of one
//! shared secret every client presents verbatim, each client presents a
//! token naming *who it is* (`sub`), signed with a secret only the gateway
//! and `agor-scheduler` hold. A leaked CLI token still only grants the
//! access its own claims carry, and expires on its own.
//!
//! Loopback rate limiting against brute-forced tokens is unnecessary here:
//! signed tokens are only ever obtained via a successful `users.login` call
//! or the scheduler's own signing, never guessed.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use agor_model::{EntityId, User};
use agor_proto::auth::{self, Claims};

use crate::state::AppState;

/// The authenticated caller and role, attached to the request extensions by
/// [`bearer_auth_mw`] and read back out by the `/rpc` and `/ws` handlers.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user: EntityId,
    pub role: auth::Role,
}

pub async fn bearer_auth_mw(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return unauthorized("missing bearer token");
    };
    match verify(&state, token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthenticatedUser { user: claims.sub, role: claims.role });
            next.run(req).await
        }
        Err(e) => unauthorized(&e.message),
    }
}

/// Verifies a token string directly, for callers that don't go through the
/// axum middleware (the `/ws` handler, which authenticates from the
/// `SubscribeFrame` body rather than a header).
pub fn verify(state: &AppState, token: &str) -> Result<Claims, agor_model::AgorError> {
    auth::verify(&state.token_secret, token, chrono::Utc::now().timestamp())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, message.to_string()).into_response()
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: EntityId,
    pub token: String,
}

/// `POST /login`: the only unauthenticated route. There is no password —
/// this daemon's trust boundary is the machine it runs on (loopback bind by
/// default), not the username — so logging in is find-or-create by username
/// plus minting an operator token for whatever user that resolves to.
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    axum::Json(body): axum::Json<LoginRequest>,
) -> Response {
    let user = match state.users.find_by_username(&body.username) {
        Ok(u) => u,
        Err(e) if e.kind == agor_model::ErrorKind::NotFound => {
            match state.users.create(User::new(body.username.clone())) {
                Ok(u) => u,
                Err(e) => return internal_error(&e.message),
            }
        }
        Err(e) => return internal_error(&e.message),
    };

    let exp = chrono::Utc::now().timestamp() + (state.token_ttl_days as i64) * 86_400;
    let claims = Claims { sub: user.id, role: auth::Role::Operator, exp };
    match auth::sign(&state.token_secret, &claims) {
        Ok(token) => axum::Json(LoginResponse { user_id: user.id, token }).into_response(),
        Err(e) => internal_error(&e.message),
    }
}

fn internal_error(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_strips_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn extract_bearer_rejects_basic_auth() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert!(extract_bearer(&headers).is_none());
    }
}
