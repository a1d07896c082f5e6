// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Codex adapter: thread mode, where the thread id *is* the vendor resume
//! token, driven through `codex exec --json`'s `turn.started` / `item.*` /
//! `turn.completed` event stream.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use agor_model::{AgorError, Session, Task};

use crate::adapter::{AdapterCallbacks, Capabilities, ResolvedMcpServer, UsageSummary, VendorAdapter};
use crate::process::VendorProcess;

pub struct CodexAdapter {
    binary: String,
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self { binary: "codex".into() }
    }
}

#[async_trait]
impl VendorAdapter for CodexAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_streaming: true,
            supports_resume: true,
            supports_session_import: false,
            supports_permission_hooks: true,
            supports_mcp: true,
        }
    }

    async fn execute_task(
        &self,
        session: &Session,
        task: &Task,
        prompt: &str,
        // `codex exec` has no config-file flag for MCP servers yet; only
        // the claude adapter forwards the resolved list to its CLI today.
        _mcp_servers: &[ResolvedMcpServer],
        callbacks: &mut dyn AdapterCallbacks,
        cancel: &mut tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), AgorError> {
        let mut args = vec!["exec".to_string(), "--json".to_string()];
        if let Some(thread_id) = &session.vendor_resume_token {
            args.push("resume".into());
            args.push(thread_id.clone());
        }

        let mut proc = VendorProcess::spawn(&self.binary, &args, prompt).await?;
        let mut resolved_model = session.model.model.clone();
        let mut usage = (0u64, 0u64);

        loop {
            let line = tokio::select! {
                biased;
                _ = &mut *cancel => return proc.terminate().await,
                line = proc.next_line() => line?,
            };
            let Some(line) = line else { break };
            let event: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "unparseable codex json line, skipping");
                    continue;
                }
            };
            handle_event(&event, callbacks, &mut resolved_model, &mut usage, session, task).await?;
        }

        proc.wait().await?;
        callbacks
            .on_usage(UsageSummary {
                input_tokens: usage.0,
                output_tokens: usage.1,
                resolved_model,
            })
            .await;
        Ok(())
    }
}

async fn handle_event(
    event: &Value,
    callbacks: &mut dyn AdapterCallbacks,
    resolved_model: &mut String,
    usage: &mut (u64, u64),
    session: &Session,
    task: &Task,
) -> Result<(), AgorError> {
    match event.get("type").and_then(Value::as_str) {
        Some("thread.started") => {
            if let Some(id) = event.get("thread_id").and_then(Value::as_str) {
                callbacks.on_vendor_session_id(id).await;
            }
        }
        Some("turn.started") => {}
        Some("item.started") | Some("item.updated") | Some("item.completed") => {
            handle_item(event, callbacks, task, session).await;
        }
        Some("turn.completed") => {
            if let Some(n) = event.pointer("/usage/input_tokens").and_then(Value::as_u64) {
                usage.0 = n;
            }
            if let Some(n) = event.pointer("/usage/output_tokens").and_then(Value::as_u64) {
                usage.1 = n;
            }
            if let Some(model) = event.get("model").and_then(Value::as_str) {
                *resolved_model = model.to_string();
            }
        }
        Some("turn.failed") => {
            let message = event.pointer("/error/message").and_then(Value::as_str).unwrap_or("codex reported a turn failure");
            return Err(classify_codex_error(message));
        }
        Some("error") => {
            let message = event.get("message").and_then(Value::as_str).unwrap_or("codex reported an error");
            return Err(classify_codex_error(message));
        }
        _ => {}
    }
    Ok(())
}

/// `item.*` events carry a nested `item` object with its own `type`
/// (`agent_message`, `command_execution`, `mcp_tool_call`, ...).
async fn handle_item(event: &Value, callbacks: &mut dyn AdapterCallbacks, task: &Task, session: &Session) {
    let Some(item) = event.get("item") else { return };
    match item.get("type").and_then(Value::as_str) {
        Some("agent_message") => {
            if let Some(text) = item.get("text").and_then(Value::as_str) {
                callbacks.on_text_delta(text).await;
            }
        }
        Some("command_execution") | Some("mcp_tool_call") => {
            let id = item.get("id").and_then(Value::as_str).unwrap_or_default();
            let name = item
                .get("command")
                .and_then(Value::as_str)
                .or_else(|| item.get("tool").and_then(Value::as_str))
                .unwrap_or("shell");
            let status = item.get("status").and_then(Value::as_str).unwrap_or("in_progress");
            if status == "in_progress" {
                let input = item.get("arguments").cloned().unwrap_or(Value::Null);
                callbacks.on_tool_use(id, name, input).await;
            } else {
                let output = item.get("aggregated_output").and_then(Value::as_str).unwrap_or("");
                let is_error = item.get("exit_code").and_then(Value::as_i64).map(|c| c != 0).unwrap_or(false);
                callbacks.on_tool_result(id, output, is_error).await;
            }
        }
        Some("permission_request") => {
            let tool_name = item.get("tool").and_then(Value::as_str).unwrap_or_default();
            let input_preview = item.get("arguments").cloned().unwrap_or(Value::Null).to_string();
            let request = agor_model::PermissionRequest::new(task.id, session.id, tool_name, input_preview);
            let _ = callbacks.on_permission_request(request).await;
        }
        _ => {}
    }
}

fn classify_codex_error(message: &str) -> AgorError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("auth") || lower.contains("unauthorized") {
        AgorError::auth(message.to_string())
    } else if lower.contains("workdir") || lower.contains("working directory") {
        AgorError::validation(message.to_string())
    } else {
        AgorError::transient(message.to_string())
    }
}
