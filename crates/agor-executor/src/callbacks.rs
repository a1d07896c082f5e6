// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Bridges a `VendorAdapter`'s callback surface into RPC calls against the
//! daemon. Every callback here is "fire and persist" except
//! `on_permission_request`, which blocks on the daemon's answer.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use agor_adapters::{AdapterCallbacks, UsageSummary};
use agor_model::{Block, EntityId, MessageContent, PermissionDecision, PermissionRequest, Role};

use crate::rpc_client::RpcClient;

/// One assistant Message is accumulated per run of text/tool-use deltas,
/// then flushed as a single `messages.create` call per turn boundary (a
/// tool-use block always closes out the text gathered before it, mirroring
/// how the vendor CLIs themselves interleave `text` and `tool_use` blocks
/// inside one `assistant` event).
pub struct RpcCallbacks<'a> {
    rpc: &'a RpcClient,
    session_id: EntityId,
    task_id: EntityId,
    pending_text: String,
    pending_blocks: Vec<Block>,
}

impl<'a> RpcCallbacks<'a> {
    pub fn new(rpc: &'a RpcClient, session_id: EntityId, task_id: EntityId) -> Self {
        Self {
            rpc,
            session_id,
            task_id,
            pending_text: String::new(),
            pending_blocks: Vec::new(),
        }
    }

    async fn flush(&mut self) {
        if !self.pending_text.is_empty() {
            self.pending_blocks.push(Block::Text { text: std::mem::take(&mut self.pending_text) });
        }
        if self.pending_blocks.is_empty() {
            return;
        }
        let blocks = std::mem::take(&mut self.pending_blocks);
        let data = json!({
            "session_id": self.session_id,
            "task_id": self.task_id,
            "role": Role::Assistant,
            "content": MessageContent::Blocks(blocks),
        });
        if let Err(err) = self.rpc.call("messages", "create", None, data).await {
            warn!(%err, "failed to persist assistant message");
        }
    }

    async fn append_tool_result(&mut self, tool_use_id: &str, content: &str, is_error: bool) {
        let data = json!({
            "session_id": self.session_id,
            "task_id": self.task_id,
            "role": Role::User,
            "content": MessageContent::Blocks(vec![Block::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content: content.to_string(),
                is_error,
            }]),
        });
        if let Err(err) = self.rpc.call("messages", "create", None, data).await {
            warn!(%err, "failed to persist tool result message");
        }
    }
}

#[async_trait]
impl<'a> AdapterCallbacks for RpcCallbacks<'a> {
    async fn on_text_delta(&mut self, text: &str) {
        self.pending_text.push_str(text);
    }

    async fn on_tool_use(&mut self, id: &str, name: &str, input: Value) {
        if !self.pending_text.is_empty() {
            self.pending_blocks.push(Block::Text { text: std::mem::take(&mut self.pending_text) });
        }
        self.pending_blocks.push(Block::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input,
        });
        self.flush().await;
    }

    async fn on_tool_result(&mut self, tool_use_id: &str, content: &str, is_error: bool) {
        self.append_tool_result(tool_use_id, content, is_error).await;
    }

    async fn on_permission_request(&mut self, request: PermissionRequest) -> PermissionDecision {
        let data = json!({
            "task_id": request.task_id,
            "session_id": request.session_id,
            "tool_name": request.tool_name,
            "input_preview": request.input_preview,
        });
        match self.rpc.call("permissions", "request", None, data).await {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|_| PermissionDecision::deny()),
            Err(err) => {
                warn!(%err, "permission request relay failed, defaulting to deny");
                PermissionDecision::deny()
            }
        }
    }

    async fn on_vendor_session_id(&mut self, id: &str) {
        let data = json!({ "agent_session_id": id });
        if let Err(err) = self.rpc.call("sessions", "set_vendor_resume_token", Some(self.session_id), data).await {
            warn!(%err, "failed to persist vendor resume token");
        }
    }

    async fn on_usage(&mut self, usage: UsageSummary) {
        self.flush().await;
        let data = json!({
            "session_id": self.session_id,
            "task_id": self.task_id,
            "model": usage.resolved_model,
            "input_tokens": usage.input_tokens,
            "output_tokens": usage.output_tokens,
        });
        if let Err(err) = self.rpc.call("messages", "attach_usage", None, data).await {
            warn!(%err, "failed to attach usage summary to final message");
        }
    }
}
