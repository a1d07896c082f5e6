// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::ids::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One content block inside a message.
///
/// Unknown block shapes deserialize into `Unknown(Value)` rather than
/// failing or discarding the payload, so a vendor adapter that emits a
/// block type this build doesn't know about yet still round-trips through
/// the store verbatim.
#[derive(Debug, Clone)]
pub enum Block {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
    Image { url: String },
    Unknown(Value),
}

/// The known-shape subset of `Block`, internally tagged on `type`. Used as
/// a probe: anything that fails to parse as `KnownBlock` is preserved
/// verbatim in `Block::Unknown` instead of erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    Image { url: String },
}

impl From<KnownBlock> for Block {
    fn from(known: KnownBlock) -> Self {
        match known {
            KnownBlock::Text { text } => Block::Text { text },
            KnownBlock::ToolUse { id, name, input } => Block::ToolUse { id, name, input },
            KnownBlock::ToolResult { tool_use_id, content, is_error } => Block::ToolResult { tool_use_id, content, is_error },
            KnownBlock::Image { url } => Block::Image { url },
        }
    }
}

impl Serialize for Block {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            // Already the original object (including its own "type" tag);
            // re-emit it untouched rather than re-deriving a shape for it.
            Block::Unknown(value) => value.serialize(serializer),
            Block::Text { text } => KnownBlock::Text { text: text.clone() }.serialize(serializer),
            Block::ToolUse { id, name, input } => KnownBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }
            .serialize(serializer),
            Block::ToolResult { tool_use_id, content, is_error } => KnownBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            }
            .serialize(serializer),
            Block::Image { url } => KnownBlock::Image { url: url.clone() }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(D::Error::custom("block must be a JSON object"));
        }
        match serde_json::from_value::<KnownBlock>(value.clone()) {
            Ok(known) => Ok(known.into()),
            Err(_) => Ok(Block::Unknown(value)),
        }
    }
}

/// The content union is `string | Block[]`, canonicalized to the
/// array form by the constructors below but still able to deserialize a bare
/// string (legacy vendor payloads, simple user prompts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Blocks(Vec<Block>),
    Text(String),
}

impl MessageContent {
    /// Canonical view used by everything downstream of ingestion: a bare
    /// string becomes a single-element `Text` block list.
    pub fn as_blocks(&self) -> Vec<Block> {
        match self {
            MessageContent::Blocks(b) => b.clone(),
            MessageContent::Text(t) => vec![Block::Text { text: t.clone() }],
        }
    }

    pub fn as_plain_text(&self) -> Option<String> {
        match self {
            MessageContent::Text(t) => Some(t.clone()),
            MessageContent::Blocks(blocks) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|b| match b {
                        Block::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.join(""))
                }
            }
        }
    }

    /// Tool-use ids present in this message's blocks, for invariant 7
    /// ("a tool_result references a tool_use previously emitted in the same
    /// session").
    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.as_blocks_ref()
            .iter()
            .filter_map(|b| match b {
                Block::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tool_result_refs(&self) -> Vec<String> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    Block::ToolResult { tool_use_id, .. } => Some(tool_use_id.clone()),
                    _ => None,
                })
                .collect(),
        }
    }

    fn as_blocks_ref(&self) -> Vec<&Block> {
        match self {
            MessageContent::Blocks(b) => b.iter().collect(),
            MessageContent::Text(_) => Vec::new(),
        }
    }
}

/// Summary counters kept alongside a message's content for cheap listing
/// without re-parsing blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolUseSummary {
    pub count: u32,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub model: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: EntityId,
    pub session_id: EntityId,
    /// Monotonically increasing, dense per-session (spec invariant 2).
    pub index: u64,
    pub task_id: Option<EntityId>,
    pub role: Role,
    pub content: MessageContent,
    #[serde(default)]
    pub tool_uses: ToolUseSummary,
    #[serde(default)]
    pub metadata: MessageMetadata,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Construct a draft; `index` is assigned by `Message::append` in the
    /// store, never by the caller.
    pub fn draft(session_id: EntityId, task_id: Option<EntityId>, role: Role, content: MessageContent) -> Self {
        let mut tool_uses = ToolUseSummary::default();
        if let MessageContent::Blocks(blocks) = &content {
            for b in blocks {
                if let Block::ToolUse { name, .. } = b {
                    tool_uses.count += 1;
                    tool_uses.names.push(name.clone());
                }
            }
        }
        Self {
            id: EntityId::new(),
            session_id,
            index: 0,
            task_id,
            role,
            content,
            tool_uses,
            metadata: MessageMetadata::default(),
            created_at: crate::ids::now(),
        }
    }

    pub fn user_text(session_id: EntityId, task_id: Option<EntityId>, text: impl Into<String>) -> Self {
        Self::draft(session_id, task_id, Role::User, MessageContent::Text(text.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_deserializes_as_text_variant() {
        let v: MessageContent = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(v.as_plain_text().as_deref(), Some("hello"));
    }

    #[test]
    fn block_array_deserializes_and_preserves_unknown_types() {
        let json = r#"[{"type":"text","text":"hi"},{"type":"future_block","foo":1}]"#;
        let v: MessageContent = serde_json::from_str(json).unwrap();
        let blocks = v.as_blocks();
        assert_eq!(blocks.len(), 2);
        match &blocks[1] {
            Block::Unknown(value) => {
                assert_eq!(value["type"], "future_block");
                assert_eq!(value["foo"], 1);
            }
            other => panic!("expected Block::Unknown, got {other:?}"),
        }
    }

    #[test]
    fn unknown_block_round_trips_its_full_payload() {
        let original = serde_json::json!({"type": "future_block", "foo": 1, "nested": {"bar": true}});
        let block: Block = serde_json::from_value(original.clone()).unwrap();
        let round_tripped = serde_json::to_value(&block).unwrap();
        assert_eq!(round_tripped, original);
    }

    #[test]
    fn tool_use_ids_collects_only_tool_use_blocks() {
        let content = MessageContent::Blocks(vec![
            Block::Text { text: "thinking".into() },
            Block::ToolUse {
                id: "call_1".into(),
                name: "shell".into(),
                input: serde_json::json!({}),
            },
        ]);
        assert_eq!(content.tool_use_ids(), vec!["call_1"]);
    }

    #[test]
    fn tool_result_refs_collects_tool_use_id_field() {
        let content = MessageContent::Blocks(vec![Block::ToolResult {
            tool_use_id: "call_1".into(),
            content: "ok".into(),
            is_error: false,
        }]);
        assert_eq!(content.tool_result_refs(), vec!["call_1".to_string()]);
    }

    #[test]
    fn draft_computes_tool_uses_summary() {
        let content = MessageContent::Blocks(vec![Block::ToolUse {
            id: "c1".into(),
            name: "grep".into(),
            input: serde_json::json!({"q": "x"}),
        }]);
        let msg = Message::draft(EntityId::new(), None, Role::Assistant, content);
        assert_eq!(msg.tool_uses.count, 1);
        assert_eq!(msg.tool_uses.names, vec!["grep".to_string()]);
    }

    #[test]
    fn round_trip_canonicalizes_but_preserves_text() {
        let content = MessageContent::Text("plain".into());
        let json = serde_json::to_string(&content).unwrap();
        let back: MessageContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_plain_text().as_deref(), Some("plain"));
    }
}
