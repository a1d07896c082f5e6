// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Claude-family adapter: drives the local `claude` CLI in print mode with
//! streaming JSON output.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use agor_model::{AgorError, Session, Task};

use crate::adapter::{AdapterCallbacks, Capabilities, ResolvedMcpServer, UsageSummary, VendorAdapter};
use crate::process::VendorProcess;

pub struct ClaudeCodeAdapter {
    binary: String,
}

impl Default for ClaudeCodeAdapter {
    fn default() -> Self {
        Self { binary: "claude".into() }
    }
}

#[async_trait]
impl VendorAdapter for ClaudeCodeAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_streaming: true,
            supports_resume: true,
            supports_session_import: true,
            supports_permission_hooks: true,
            supports_mcp: true,
        }
    }

    async fn execute_task(
        &self,
        session: &Session,
        task: &Task,
        prompt: &str,
        mcp_servers: &[ResolvedMcpServer],
        callbacks: &mut dyn AdapterCallbacks,
        cancel: &mut tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), AgorError> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--input-format".to_string(),
            "text".to_string(),
            "--system-prompt-preset".to_string(),
            "claude_code".to_string(),
            "--model".to_string(),
            session.model.model.clone(),
        ];
        if let Some(resume) = &session.vendor_resume_token {
            args.push("--resume".into());
            args.push(resume.clone());
        }

        let mcp_config_file = if mcp_servers.is_empty() {
            None
        } else {
            Some(write_mcp_config(task, mcp_servers).await?)
        };
        if let Some(path) = &mcp_config_file {
            args.push("--mcp-config".into());
            args.push(path.display().to_string());
            args.push("--strict-mcp-config".into());
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
                    warn!(error = %e, "unparseable claude stream-json line, skipping");
                    continue;
                }
            };
            handle_event(&event, callbacks, &mut resolved_model, &mut usage, session, task).await?;
        }

        let result = proc.wait().await;
        if let Some(path) = &mcp_config_file {
            let _ = tokio::fs::remove_file(path).await;
        }
        result?;

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

/// `claude --mcp-config <path>` takes a JSON file shaped
/// `{"mcpServers": {name: {command, args, env} | {url, headers}}}`; written
/// fresh per task into the system temp dir and removed once the CLI exits.
async fn write_mcp_config(task: &Task, servers: &[ResolvedMcpServer]) -> Result<std::path::PathBuf, AgorError> {
    let mut entries = serde_json::Map::new();
    for server in servers {
        let entry = if let Some(url) = &server.url {
            let mut headers = serde_json::Map::new();
            if let Some(token) = &server.auth_token {
                headers.insert("Authorization".into(), json!(format!("Bearer {token}")));
            }
            json!({ "url": url, "headers": headers })
        } else {
            json!({
                "command": server.command.clone().unwrap_or_default(),
                "args": server.args,
                "env": server.env,
            })
        };
        entries.insert(server.name.clone(), entry);
    }

    let path = std::env::temp_dir().join(format!("agor-mcp-{}.json", task.id));
    let body = serde_json::to_vec(&json!({ "mcpServers": entries })).map_err(|e| AgorError::internal(format!("encoding mcp config: {e}")))?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| AgorError::internal(format!("writing mcp config: {e}")))?;
    Ok(path)
}

/// Translate one `stream-json` event into the common callback surface.
///
/// Claude's stream-json events use `type: "assistant" | "result" | ...`
/// with content blocks nested the same way the Messages API returns them,
/// so a `content_block` here carries the same `type` tag as
/// `agor_model::Block` minus the `tool_result` naming (`tool_use`/`text`).
async fn handle_event(
    event: &Value,
    callbacks: &mut dyn AdapterCallbacks,
    resolved_model: &mut String,
    usage: &mut (u64, u64),
    session: &Session,
    task: &Task,
) -> Result<(), AgorError> {
    match event.get("type").and_then(Value::as_str) {
        // `claude --permission-prompt-tool` hands a pending tool call back
        // through a `control_request` event when the tool isn't pre-approved;
        // the daemon's decision is piped back to the CLI over its stdin
        // control channel by the executor, not by this translator.
        Some("control_request") if event.get("subtype").and_then(Value::as_str) == Some("can_use_tool") => {
            let tool_name = event.get("tool_name").and_then(Value::as_str).unwrap_or_default();
            let input_preview = event.get("input").cloned().unwrap_or(Value::Null).to_string();
            let request = agor_model::PermissionRequest::new(task.id, session.id, tool_name, input_preview);
            let _decision = callbacks.on_permission_request(request).await;
        }
        Some("assistant") => {
            let Some(blocks) = event.pointer("/message/content").and_then(Value::as_array) else {
                return Ok(());
            };
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            callbacks.on_text_delta(text).await;
                        }
                    }
                    Some("tool_use") => {
                        let id = block.get("id").and_then(Value::as_str).unwrap_or_default();
                        let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                        let input = block.get("input").cloned().unwrap_or(Value::Null);
                        callbacks.on_tool_use(id, name, input).await;
                    }
                    _ => {}
                }
            }
            if let Some(model) = event.pointer("/message/model").and_then(Value::as_str) {
                *resolved_model = model.to_string();
            }
        }
        Some("user") => {
            let Some(blocks) = event.pointer("/message/content").and_then(Value::as_array) else {
                return Ok(());
            };
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("tool_result") {
                    let tool_use_id = block.get("tool_use_id").and_then(Value::as_str).unwrap_or_default();
                    let is_error = block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                    let content = block
                        .get("content")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| block.get("content").cloned().unwrap_or(Value::Null).to_string());
                    callbacks.on_tool_result(tool_use_id, &content, is_error).await;
                }
            }
        }
        Some("system") if event.get("subtype").and_then(Value::as_str) == Some("init") => {
            if let Some(id) = event.get("session_id").and_then(Value::as_str) {
                callbacks.on_vendor_session_id(id).await;
            }
        }
        Some("result") => {
            if let Some(n) = event.pointer("/usage/input_tokens").and_then(Value::as_u64) {
                usage.0 = n;
            }
            if let Some(n) = event.pointer("/usage/output_tokens").and_then(Value::as_u64) {
                usage.1 = n;
            }
            if event.get("is_error").and_then(Value::as_bool) == Some(true) {
                let message = event.get("result").and_then(Value::as_str).unwrap_or("claude CLI reported an error");
                return Err(classify_claude_error(message));
            }
        }
        _ => {}
    }
    Ok(())
}

fn classify_claude_error(message: &str) -> AgorError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("auth") || lower.contains("api key") {
        AgorError::auth(message.to_string())
    } else if lower.contains("cwd") || lower.contains("working directory") {
        AgorError::validation(message.to_string())
    } else {
        AgorError::transient(message.to_string())
    }
}
