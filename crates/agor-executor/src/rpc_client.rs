// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The executor's link back to the daemon: ordinary authenticated RPC calls
//! over the same wire shape (`agor-proto::RpcRequest`/`RpcResponse`) any
//! other client uses, CBOR-encoded by design's size-sensitive-channel note.
//! There is no special executor-to-daemon pipe.

use agor_model::{AgorError, EntityId, ErrorKind};
use agor_proto::{decode_cbor, encode_cbor, Params, RpcRequest, RpcResponse};
use serde_json::Value;
use uuid::Uuid;

pub struct RpcClient {
    http: reqwest::Client,
    daemon_url: String,
    token: String,
    user: EntityId,
}

impl RpcClient {
    pub fn new(daemon_url: String, token: String, user: EntityId) -> Self {
        Self {
            http: reqwest::Client::new(),
            daemon_url,
            token,
            user,
        }
    }

    pub async fn call(&self, service: &str, verb: &str, entity_id: Option<EntityId>, data: Value) -> Result<Value, AgorError> {
        let request = RpcRequest {
            id: Uuid::new_v4(),
            service: service.to_string(),
            verb: verb.to_string(),
            entity_id,
            data,
            params: Params { user: self.user, query: Value::Null },
        };
        let body = encode_cbor(&request).map_err(|e| AgorError::internal(format!("encoding rpc request: {e}")))?;

        let response = self
            .http
            .post(format!("{}/rpc", self.daemon_url))
            .bearer_auth(&self.token)
            .header("content-type", "application/cbor")
            .body(body)
            .send()
            .await
            .map_err(|e| AgorError::transient(format!("rpc call to daemon failed: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AgorError::auth("daemon rejected the session token"));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AgorError::transient(format!("reading rpc response: {e}")))?;
        let rpc_response: RpcResponse = decode_cbor(&bytes).map_err(|e| AgorError::internal(format!("decoding rpc response: {e}")))?;

        rpc_response.result.map_err(|rpc_err| AgorError::new(kind_from_str(&rpc_err.kind), rpc_err.message))
    }
}

fn kind_from_str(kind: &str) -> ErrorKind {
    match kind {
        "NotFound" => ErrorKind::NotFound,
        "Conflict" => ErrorKind::Conflict,
        "Validation" => ErrorKind::Validation,
        "Auth" => ErrorKind::Auth,
        "Forbidden" => ErrorKind::Forbidden,
        "Transient" => ErrorKind::Transient,
        "Cancelled" => ErrorKind::Cancelled,
        "Orphaned" => ErrorKind::Orphaned,
        _ => ErrorKind::Internal,
    }
}
