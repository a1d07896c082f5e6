// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `POST /rpc`: the single entry point into the Service Layer. Decodes a
//! `RpcRequest` (CBOR if `content-type: application/cbor`, JSON otherwise —
//! the executor always sends CBOR, the CLI and browser UI send JSON),
//! dispatches on `(service, verb)`, and re-encodes whatever the matched
//! service method returned into an `RpcResponse` in the same wire format
//! the request arrived in.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use agor_model::{AgorError, EntityId, ErrorKind, Message, McpServer, PermissionDecision, User, Worktree};
use agor_proto::{RpcError, RpcRequest, RpcResponse};
use agor_service::Principal;

use crate::auth::AuthenticatedUser;
use crate::state::AppState;

const CBOR_CONTENT_TYPE: &str = "application/cbor";

pub async fn rpc_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let is_cbor = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with(CBOR_CONTENT_TYPE))
        .unwrap_or(false);

    let request: RpcRequest = if is_cbor {
        match agor_proto::decode_cbor(&body) {
            Ok(r) => r,
            Err(e) => return bad_request(&e.to_string()),
        }
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => return bad_request(&e.to_string()),
        }
    };

    let principal = Principal::new(caller.user);
    let result = dispatch(&state, &principal, &request).await;
    let response = RpcResponse { id: request.id, result: result.map_err(|e| RpcError::from(&e)) };

    if is_cbor {
        match agor_proto::encode_cbor(&response) {
            Ok(bytes) => ([(axum::http::header::CONTENT_TYPE, CBOR_CONTENT_TYPE)], bytes).into_response(),
            Err(e) => internal_error(&e.to_string()),
        }
    } else {
        axum::Json(response).into_response()
    }
}

async fn dispatch(state: &AppState, principal: &Principal, req: &RpcRequest) -> Result<Value, AgorError> {
    let entity_id = || req.entity_id.ok_or_else(|| AgorError::validation("missing entity_id"));

    match (req.service.as_str(), req.verb.as_str()) {
        ("sessions", "get") => to_json(state.sessions.get(principal, entity_id()?)),
        ("sessions", "list") => to_json(state.sessions.list(principal)),
        ("sessions", "create") => {
            let session = param(&req.data)?;
            to_json(state.sessions.create(principal, session))
        }
        ("sessions", "prompt") => {
            let body: PromptBody = param(&req.data)?;
            to_json(state.sessions.prompt(principal, entity_id()?, body.prompt))
        }
        ("sessions", "fork") => {
            let body: ForkBody = param(&req.data)?;
            to_json(state.sessions.fork(principal, entity_id()?, body.fork_point_task))
        }
        ("sessions", "spawn") => {
            let body: ForkBody = param(&req.data)?;
            to_json(state.sessions.spawn(principal, entity_id()?, body.fork_point_task))
        }
        ("sessions", "cancel") => to_json(state.sessions.cancel(principal, entity_id()?)),
        ("sessions", "allow_tool") => {
            let body: ToolNameBody = param(&req.data)?;
            to_json(state.sessions.allow_tool(principal, entity_id()?, body.tool_name))
        }
        ("sessions", "set_vendor_resume_token") => {
            let body: TokenBody = param(&req.data)?;
            to_json(state.sessions.set_vendor_resume_token(principal, entity_id()?, body.token))
        }

        ("boards", "get") => to_json(state.boards.get(principal, entity_id()?)),
        ("boards", "list") => to_json(state.boards.list(principal)),
        ("boards", "create") => {
            let body: NameBody = param(&req.data)?;
            to_json(state.boards.create(principal, body.name))
        }
        ("boards", "upsert_object") => {
            let body: UpsertObjectBody = param(&req.data)?;
            to_json(state.boards.upsert_object(principal, entity_id()?, body.object))
        }
        ("boards", "remove_object") => {
            let body: ObjectIdBody = param(&req.data)?;
            to_json(state.boards.remove_object(principal, entity_id()?, body.object_id))
        }
        ("boards", "update_object_position") => {
            let body: PositionBody = param(&req.data)?;
            to_json(state.boards.update_object_position(principal, entity_id()?, body.object_id, body.x, body.y))
        }
        ("boards", "to_yaml") => to_json(state.boards.to_yaml(principal, entity_id()?)),
        ("boards", "from_yaml") => {
            let body: YamlBody = param(&req.data)?;
            to_json(state.boards.from_yaml(principal, &body.yaml))
        }
        ("boards", "to_blob") => to_json(state.boards.to_blob(principal, entity_id()?)),
        ("boards", "from_blob") => {
            let body: BlobBody = param(&req.data)?;
            to_json(state.boards.from_blob(principal, &body.blob))
        }
        ("boards", "clone") => to_json(state.boards.clone_board(principal, entity_id()?)),

        ("mcp_servers", "create") => {
            let server: McpServer = param(&req.data)?;
            to_json(state.mcp_servers.create(principal, server))
        }
        ("mcp_servers", "set_enabled") => {
            let body: EnabledBody = param(&req.data)?;
            to_json(state.mcp_servers.set_enabled(principal, entity_id()?, body.enabled))
        }
        ("mcp_servers", "assign_to_session") => {
            let body: AssignMcpBody = param(&req.data)?;
            to_json(state.mcp_servers.assign_to_session(principal, entity_id()?, body.mcp_server_id, body.enabled))
        }
        ("mcp_servers", "list_for_owner") => to_json(state.mcp_servers.list_for_owner(principal)),
        ("mcp_servers", "resolve") => {
            let body: ResolveMcpBody = param(&req.data)?;
            to_json(state.mcp_servers.resolve(principal, entity_id()?, &body.user_env))
        }

        ("permissions", "request") => {
            let body: PermissionRequestBody = param(&req.data)?;
            to_json(
                state
                    .permissions
                    .request(principal, body.task_id, entity_id()?, body.tool_name, body.input_preview)
                    .await,
            )
        }
        ("permissions", "decide") => {
            let decision: PermissionDecision = param(&req.data)?;
            to_json(state.permissions.decide(principal, entity_id()?, decision).await)
        }

        ("tasks", "get") => {
            let body: TaskIdBody = param(&req.data)?;
            to_json(state.tasks.get(principal, entity_id()?, body.task_id))
        }
        ("tasks", "list_for_session") => to_json(state.tasks.list_for_session(principal, entity_id()?)),

        ("users", "create") => {
            let user: User = param(&req.data)?;
            to_json(state.users.create(user))
        }
        ("users", "get") => to_json(state.users.get(entity_id()?)),
        ("users", "find_by_username") => {
            let body: UsernameBody = param(&req.data)?;
            to_json(state.users.find_by_username(&body.username))
        }
        ("users", "patch_env") => {
            let body: PatchEnvBody = param(&req.data)?;
            to_json(state.users.patch_env(entity_id()?, body.patch))
        }

        ("worktrees", "create") => {
            let worktree: Worktree = param(&req.data)?;
            to_json(state.worktrees.create(principal, worktree))
        }
        ("worktrees", "get") => to_json(state.worktrees.get(principal, entity_id()?)),
        ("worktrees", "assign_to_board") => {
            let body: BoardAssignBody = param(&req.data)?;
            to_json(state.worktrees.assign_to_board(principal, entity_id()?, body.board_id))
        }
        ("worktrees", "list_for_board") => to_json(state.worktrees.list_for_board(principal, entity_id()?)),
        ("worktrees", "remove") => to_json(state.worktrees.remove(principal, entity_id()?)),

        ("messages", "create") => {
            let draft: Message = param(&req.data)?;
            to_json(state.messages.create(principal, draft))
        }
        ("messages", "list_for_session") => to_json(state.messages.list_for_session(principal, entity_id()?)),
        ("messages", "list_for_task") => {
            let body: TaskIdBody = param(&req.data)?;
            to_json(state.messages.list_for_task(principal, entity_id()?, body.task_id))
        }
        ("messages", "attach_usage") => {
            let body: AttachUsageBody = param(&req.data)?;
            to_json(state.messages.attach_usage(principal, entity_id()?, body.task_id, body.model, body.input_tokens, body.output_tokens))
        }

        (service, verb) => Err(AgorError::new(ErrorKind::NotFound, format!("unknown service/verb: {service}.{verb}"))),
    }
}

fn param<T: DeserializeOwned>(data: &Value) -> Result<T, AgorError> {
    serde_json::from_value(data.clone())
        .map_err(|e| AgorError::with_source(ErrorKind::Validation, "decoding request payload", e))
}

fn to_json<T: serde::Serialize>(result: Result<T, AgorError>) -> Result<Value, AgorError> {
    result.and_then(|v| serde_json::to_value(v).map_err(|e| AgorError::with_source(ErrorKind::Internal, "encoding response", e)))
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

fn internal_error(message: &str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response()
}

// ── Request payload shapes ────────────────────────────────────────────────────
// One small struct per custom verb whose arguments don't already arrive as a
// full entity. CRUD verbs that operate on a whole entity (`sessions.create`,
// `users.create`, ...) deserialize `req.data` straight into the model type.

#[derive(serde::Deserialize)]
struct PromptBody {
    prompt: String,
}

#[derive(serde::Deserialize)]
struct ForkBody {
    fork_point_task: EntityId,
}

#[derive(serde::Deserialize)]
struct ToolNameBody {
    tool_name: String,
}

#[derive(serde::Deserialize)]
struct TokenBody {
    token: String,
}

#[derive(serde::Deserialize)]
struct NameBody {
    name: String,
}

#[derive(serde::Deserialize)]
struct UpsertObjectBody {
    object: agor_model::BoardObject,
}

#[derive(serde::Deserialize)]
struct ObjectIdBody {
    object_id: EntityId,
}

#[derive(serde::Deserialize)]
struct PositionBody {
    object_id: EntityId,
    x: f64,
    y: f64,
}

#[derive(serde::Deserialize)]
struct YamlBody {
    yaml: String,
}

#[derive(serde::Deserialize)]
struct BlobBody {
    blob: String,
}

#[derive(serde::Deserialize)]
struct EnabledBody {
    enabled: bool,
}

#[derive(serde::Deserialize)]
struct AssignMcpBody {
    mcp_server_id: EntityId,
    enabled: bool,
}

#[derive(serde::Deserialize)]
struct ResolveMcpBody {
    #[serde(default)]
    user_env: HashMap<String, String>,
}

#[derive(serde::Deserialize)]
struct PermissionRequestBody {
    task_id: EntityId,
    tool_name: String,
    input_preview: String,
}

#[derive(serde::Deserialize)]
struct TaskIdBody {
    task_id: EntityId,
}

#[derive(serde::Deserialize)]
struct UsernameBody {
    username: String,
}

#[derive(serde::Deserialize)]
struct PatchEnvBody {
    patch: HashMap<String, String>,
}

#[derive(serde::Deserialize)]
struct BoardAssignBody {
    board_id: Option<EntityId>,
}

#[derive(serde::Deserialize)]
struct AttachUsageBody {
    task_id: EntityId,
    model: String,
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_rejects_mismatched_shape() {
        let err = param::<PromptBody>(&serde_json::json!({"nope": 1})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn param_decodes_matching_shape() {
        let body: PromptBody = param(&serde_json::json!({"prompt": "hi"})).unwrap();
        assert_eq!(body.prompt, "hi");
    }
}
