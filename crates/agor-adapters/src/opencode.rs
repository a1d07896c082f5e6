// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! OpenCode adapter, following the same upcast pattern as `gemini.rs`
//!.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use agor_model::{AgorError, Session, Task};

use crate::adapter::{AdapterCallbacks, Capabilities, ResolvedMcpServer, UsageSummary, VendorAdapter};
use crate::process::VendorProcess;

pub struct OpencodeAdapter {
    binary: String,
}

impl Default for OpencodeAdapter {
    fn default() -> Self {
        Self { binary: "opencode".into() }
    }
}

#[async_trait]
impl VendorAdapter for OpencodeAdapter {
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
        _mcp_servers: &[ResolvedMcpServer],
        callbacks: &mut dyn AdapterCallbacks,
        cancel: &mut tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), AgorError> {
        let mut args = vec!["run".to_string(), "--print-logs".to_string(), "--format".to_string(), "json".to_string()];
        if let Some(session_id) = &session.vendor_resume_token {
            args.push("--session".into());
            args.push(session_id.clone());
        }

        let mut proc = VendorProcess::spawn(&self.binary, &args, prompt).await?;
        let resolved_model = session.model.model.clone();
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
                    warn!(error = %e, "unparseable opencode json line, skipping");
                    continue;
                }
            };
            match event.get("type").and_then(Value::as_str) {
                Some("session.created") => {
                    if let Some(id) = event.get("sessionID").and_then(Value::as_str) {
                        callbacks.on_vendor_session_id(id).await;
                    }
                }
                Some("message.part.updated") => {
                    let part = event.get("part").unwrap_or(&Value::Null);
                    match part.get("type").and_then(Value::as_str) {
                        Some("text") => {
                            if let Some(text) = part.get("text").and_then(Value::as_str) {
                                callbacks.on_text_delta(text).await;
                            }
                        }
                        Some("tool") => {
                            let id = part.get("callID").and_then(Value::as_str).unwrap_or_default();
                            let name = part.get("tool").and_then(Value::as_str).unwrap_or_default();
                            let status = part.pointer("/state/status").and_then(Value::as_str).unwrap_or("");
                            if status == "completed" || status == "error" {
                                let output = part.pointer("/state/output").and_then(Value::as_str).unwrap_or("");
                                callbacks.on_tool_result(id, output, status == "error").await;
                            } else {
                                let input = part.pointer("/state/input").cloned().unwrap_or(Value::Null);
                                callbacks.on_tool_use(id, name, input).await;
                            }
                        }
                        _ => {}
                    }
                }
                Some("permission.requested") => {
                    let tool_name = event.get("tool").and_then(Value::as_str).unwrap_or_default();
                    let input_preview = event.get("input").cloned().unwrap_or(Value::Null).to_string();
                    let request = agor_model::PermissionRequest::new(task.id, session.id, tool_name, input_preview);
                    let _ = callbacks.on_permission_request(request).await;
                }
                Some("session.error") => {
                    let message = event.pointer("/error/message").and_then(Value::as_str).unwrap_or("opencode reported an error");
                    return Err(classify_opencode_error(message));
                }
                Some("session.idle") => {
                    if let Some(n) = event.pointer("/tokens/input").and_then(Value::as_u64) {
                        usage.0 = n;
                    }
                    if let Some(n) = event.pointer("/tokens/output").and_then(Value::as_u64) {
                        usage.1 = n;
                    }
                }
                _ => {}
            }
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

fn classify_opencode_error(message: &str) -> AgorError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("auth") || lower.contains("api key") {
        AgorError::auth(message.to_string())
    } else if lower.contains("cwd") || lower.contains("directory") {
        AgorError::validation(message.to_string())
    } else {
        AgorError::transient(message.to_string())
    }
}
