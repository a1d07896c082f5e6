// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Wire protocol between RPC clients (CLI, UI, and the executor itself) and
//! the daemon's gateway.
//!
//! Generalizes a prior `sven-node::control::protocol` — a
//! single-agent `ControlCommand`/`ControlEvent` pair — into the uniform
//! CRUD+custom-verb surface it names, while keeping the same
//! transport story: **CBOR** for size-sensitive channels (the executor's
//! RPC link) and **JSON** for the HTTP/WebSocket surface browsers and the
//! CLI use.
//!
//! # Typical flow
//!
//! ```text
//! Client                                Gateway
//!    │── Request{service:"sessions",     │
//!    │   verb:"prompt", ...} ───────────►│  dispatches to the Service Layer
//!    │◄─ Response{result: task_id} ──────│
//!    │                                   │
//!    │── Subscribe{topics:[Session(s)]}─►│
//!    │◄─ Event{service:"tasks",          │
//!    │   verb:Created, payload} ─────────│  ... streamed until unsubscribe
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agor_model::EntityId;

pub mod auth;

// ── Requests ──────────────────────────────────────────────────────────────────

/// The authenticated principal injected into every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    pub user: EntityId,
    #[serde(default)]
    pub query: serde_json::Value,
}

/// One CRUD-or-custom-verb call. `service` names the entity service
/// (`"sessions"`, `"tasks"`, `"boards"`, ...); `verb` is either a standard
/// CRUD verb (`"find" | "get" | "create" | "patch" | "remove"`) or a
/// namespaced custom verb (`"prompt"`, `"fork"`, `"spawn"`, `"cancel"`,
/// `"to_yaml"`, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: Uuid,
    pub service: String,
    pub verb: String,
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub params: Params,
}

/// `{code, kind, message, details?}`
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {message}")]
pub struct RpcError {
    pub code: u32,
    pub kind: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<&agor_model::AgorError> for RpcError {
    fn from(e: &agor_model::AgorError) -> Self {
        let (code, kind) = match e.kind {
            agor_model::ErrorKind::NotFound => (404, "NotFound"),
            agor_model::ErrorKind::Conflict => (409, "Conflict"),
            agor_model::ErrorKind::Validation => (422, "Validation"),
            agor_model::ErrorKind::Auth => (401, "Auth"),
            agor_model::ErrorKind::Forbidden => (403, "Forbidden"),
            agor_model::ErrorKind::Transient => (503, "Transient"),
            agor_model::ErrorKind::Cancelled => (499, "Cancelled"),
            agor_model::ErrorKind::Orphaned => (500, "Orphaned"),
            agor_model::ErrorKind::Internal => (500, "Internal"),
        };
        RpcError {
            code,
            kind: kind.to_string(),
            message: e.message.clone(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Uuid,
    pub result: Result<serde_json::Value, RpcError>,
}

// ── Events ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventVerb {
    Created,
    Patched,
    Removed,
}

/// `{service, verb, payload}` emitted by the Event Bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub service: String,
    pub verb: EventVerb,
    pub payload: serde_json::Value,
}

/// Subscription scope. `Global` is the firehose every client can fall back
/// to; `Session`/`Board` are the per-scope topics boards need without
/// prescribing the exact scoping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Topic {
    Global,
    Session { id: EntityId },
    Board { id: EntityId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeFrame {
    pub topics: Vec<Topic>,
    pub token: String,
}

/// Server push unrelated to a specific client request: the cancellation
/// notification the executor subscribes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNotification {
    TaskCancel { task_id: EntityId },
}

// ── CBOR codec helpers ────────────────────────────────────────────────────────

pub fn encode_cbor<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| anyhow::anyhow!("CBOR encode: {e}"))?;
    Ok(buf)
}

pub fn decode_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    ciborium::from_reader(bytes).map_err(|e| anyhow::anyhow!("CBOR decode: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_request_cbor_round_trip() {
        let req = RpcRequest {
            id: Uuid::new_v4(),
            service: "sessions".into(),
            verb: "prompt".into(),
            entity_id: Some(EntityId::new()),
            data: serde_json::json!({"prompt": "hello"}),
            params: Params {
                user: EntityId::new(),
                query: serde_json::Value::Null,
            },
        };
        let bytes = encode_cbor(&req).unwrap();
        let back: RpcRequest = decode_cbor(&bytes).unwrap();
        assert_eq!(back.service, "sessions");
        assert_eq!(back.verb, "prompt");
    }

    #[test]
    fn event_json_round_trip() {
        let ev = Event {
            service: "tasks".into(),
            verb: EventVerb::Created,
            payload: serde_json::json!({"id": "abc"}),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verb, EventVerb::Created);
    }

    #[test]
    fn topic_serializes_with_tagged_scope() {
        let topic = Topic::Session { id: EntityId::new() };
        let json = serde_json::to_value(&topic).unwrap();
        assert_eq!(json["scope"], "session");
    }

    #[test]
    fn rpc_error_from_agor_error_maps_busy_to_conflict_409() {
        let err = agor_model::AgorError::busy(EntityId::new());
        let rpc: RpcError = (&err).into();
        assert_eq!(rpc.code, 409);
        assert_eq!(rpc.kind, "Conflict");
    }

    #[test]
    fn server_notification_round_trips_as_json() {
        let note = ServerNotification::TaskCancel { task_id: EntityId::new() };
        let json = serde_json::to_string(&note).unwrap();
        let back: ServerNotification = serde_json::from_str(&json).unwrap();
        matches!(back, ServerNotification::TaskCancel { .. });
    }
}
