// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Vendor transcript import: parse a newline-delimited JSON
//! transcript exported by a vendor CLI into the daemon's `Message` model,
//! preserving `tool_use`/`tool_result` linkage.
//!
//! Parsing is stateless and pure — it does not touch `agor-store`. Import
//! is idempotent by construction one layer up: `agor-service::SessionService`
//! only invokes an importer when the session has no `vendor_resume_token`
//! yet, so replaying the same `session.load-claude`/`load-codex` CLI command
//! against an already-imported session is a no-op rather than duplicating
//! messages.

use serde_json::Value;

use agor_model::{AgorError, Block, EntityId, Message, MessageContent, Role};

/// Claude Code's own on-disk transcript format: one JSON object per line,
/// each shaped like a `stream-json` event (see `claude.rs`), persisted by
/// the CLI itself under `~/.claude/projects/<hash>/<session-id>.jsonl`.
pub fn import_claude_transcript(session_id: EntityId, ndjson: &str) -> Result<Vec<Message>, AgorError> {
    let mut messages = Vec::new();
    for (lineno, line) in ndjson.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: Value = serde_json::from_str(line)
            .map_err(|e| AgorError::validation(format!("claude transcript line {lineno}: {e}")))?;
        let role = match event.get("type").and_then(Value::as_str) {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            _ => continue,
        };
        let Some(blocks) = event.pointer("/message/content").and_then(Value::as_array) else {
            continue;
        };
        let content = blocks_from_claude(blocks);
        if matches!(&content, MessageContent::Blocks(b) if b.is_empty()) {
            continue;
        }
        messages.push(Message::draft(session_id, None, role, content));
    }
    Ok(messages)
}

fn blocks_from_claude(blocks: &[Value]) -> MessageContent {
    let mut out = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    out.push(Block::Text { text: text.to_string() });
                }
            }
            Some("tool_use") => {
                out.push(Block::ToolUse {
                    id: block.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                    name: block.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    input: block.get("input").cloned().unwrap_or(Value::Null),
                });
            }
            Some("tool_result") => {
                out.push(Block::ToolResult {
                    tool_use_id: block.get("tool_use_id").and_then(Value::as_str).unwrap_or_default().to_string(),
                    content: block
                        .get("content")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| block.get("content").cloned().unwrap_or(Value::Null).to_string()),
                    is_error: block.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                });
            }
            _ => {}
        }
    }
    MessageContent::Blocks(out)
}

/// Codex's `rollout-*.jsonl` transcript format: thread-scoped `item.*`
/// records plus the occasional free-standing user/assistant entry.
pub fn import_codex_transcript(session_id: EntityId, ndjson: &str) -> Result<Vec<Message>, AgorError> {
    let mut messages = Vec::new();
    for (lineno, line) in ndjson.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(line)
            .map_err(|e| AgorError::validation(format!("codex transcript line {lineno}: {e}")))?;
        let Some(item) = record.get("item").or(Some(&record)) else { continue };
        match item.get("type").and_then(Value::as_str) {
            Some("agent_message") => {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    messages.push(Message::draft(
                        session_id,
                        None,
                        Role::Assistant,
                        MessageContent::Blocks(vec![Block::Text { text: text.to_string() }]),
                    ));
                }
            }
            Some("user_message") => {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    messages.push(Message::draft(
                        session_id,
                        None,
                        Role::User,
                        MessageContent::Text(text.to_string()),
                    ));
                }
            }
            Some("command_execution") | Some("mcp_tool_call") => {
                let id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let name = item
                    .get("command")
                    .and_then(Value::as_str)
                    .or_else(|| item.get("tool").and_then(Value::as_str))
                    .unwrap_or("shell")
                    .to_string();
                let input = item.get("arguments").cloned().unwrap_or(Value::Null);
                messages.push(Message::draft(
                    session_id,
                    None,
                    Role::Assistant,
                    MessageContent::Blocks(vec![Block::ToolUse { id: id.clone(), name, input }]),
                ));
                if let Some(output) = item.get("aggregated_output").and_then(Value::as_str) {
                    let is_error = item.get("exit_code").and_then(Value::as_i64).map(|c| c != 0).unwrap_or(false);
                    messages.push(Message::draft(
                        session_id,
                        None,
                        Role::User,
                        MessageContent::Blocks(vec![Block::ToolResult {
                            tool_use_id: id,
                            content: output.to_string(),
                            is_error,
                        }]),
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_transcript_preserves_tool_use_and_result_linkage() {
        let ndjson = r#"
{"type":"user","message":{"content":[{"type":"text","text":"list files"}]}}
{"type":"assistant","message":{"content":[{"type":"tool_use","id":"call_1","name":"ls","input":{}}]}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"call_1","content":"a.txt"}]}}
"#;
        let messages = import_claude_transcript(EntityId::new(), ndjson).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content.tool_use_ids(), vec!["call_1"]);
        assert_eq!(messages[2].content.tool_result_refs(), vec!["call_1".to_string()]);
    }

    #[test]
    fn codex_transcript_pairs_command_execution_with_its_output() {
        let ndjson = r#"{"item":{"type":"command_execution","id":"cmd_1","command":"ls","aggregated_output":"a.txt","exit_code":0}}"#;
        let messages = import_codex_transcript(EntityId::new(), ndjson).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.tool_use_ids(), vec!["cmd_1"]);
        assert_eq!(messages[1].content.tool_result_refs(), vec!["cmd_1".to_string()]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let ndjson = "\n\n{\"type\":\"user\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"hi\"}]}}\n\n";
        let messages = import_claude_transcript(EntityId::new(), ndjson).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn malformed_line_is_a_validation_error() {
        let err = import_claude_transcript(EntityId::new(), "not json").unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Validation);
    }
}
