// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Gemini adapter. The `gemini` CLI has no structured tool-call event
//! stream of its own — its JSONL output interleaves free text with
//! `functionCall`/`functionResponse` parts inside a single `content` event,
//! so this adapter does the upcast inline rather than delegating to a
//! shared item dispatcher the way `codex.rs` does.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use agor_model::{AgorError, Session, Task};

use crate::adapter::{AdapterCallbacks, Capabilities, ResolvedMcpServer, UsageSummary, VendorAdapter};
use crate::process::VendorProcess;

pub struct GeminiAdapter {
    binary: String,
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self { binary: "gemini".into() }
    }
}

#[async_trait]
impl VendorAdapter for GeminiAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_streaming: true,
            supports_resume: false,
            supports_session_import: false,
            supports_permission_hooks: false,
            supports_mcp: true,
        }
    }

    async fn execute_task(
        &self,
        session: &Session,
        _task: &Task,
        prompt: &str,
        _mcp_servers: &[ResolvedMcpServer],
        callbacks: &mut dyn AdapterCallbacks,
        cancel: &mut tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), AgorError> {
        let args = vec![
            "--output-format".to_string(),
            "json".to_string(),
            "--model".to_string(),
            session.model.model.clone(),
        ];

        let mut proc = VendorProcess::spawn(&self.binary, &args, prompt).await?;
        let resolved_model = session.model.model.clone();
        let mut usage = (0u64, 0u64);
        let mut tool_call_count = 0u32;

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
                    warn!(error = %e, "unparseable gemini json line, skipping");
                    continue;
                }
            };
            if let Some(error) = event.get("error") {
                let message = error.get("message").and_then(Value::as_str).unwrap_or("gemini reported an error");
                return Err(classify_gemini_error(message));
            }
            let Some(parts) = event.pointer("/candidates/0/content/parts").and_then(Value::as_array) else {
                continue;
            };
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    callbacks.on_text_delta(text).await;
                } else if let Some(call) = part.get("functionCall") {
                    let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
                    let args = call.get("args").cloned().unwrap_or(Value::Null);
                    tool_call_count += 1;
                    callbacks.on_tool_use(&tool_call_count.to_string(), name, args).await;
                } else if let Some(resp) = part.get("functionResponse") {
                    let content = resp.get("response").cloned().unwrap_or(Value::Null).to_string();
                    callbacks.on_tool_result(&tool_call_count.to_string(), &content, false).await;
                }
            }
            if let Some(n) = event.pointer("/usageMetadata/promptTokenCount").and_then(Value::as_u64) {
                usage.0 = n;
            }
            if let Some(n) = event.pointer("/usageMetadata/candidatesTokenCount").and_then(Value::as_u64) {
                usage.1 = n;
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

fn classify_gemini_error(message: &str) -> AgorError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("api key") || lower.contains("permission denied") || lower.contains("unauthenticated") {
        AgorError::auth(message.to_string())
    } else {
        AgorError::transient(message.to_string())
    }
}
