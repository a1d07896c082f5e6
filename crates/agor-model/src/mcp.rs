// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    Stdio,
    Http,
    Sse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpScope {
    Global,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpSource {
    User,
    Project,
    System,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpAuth {
    pub token: Option<String>,
}

/// Templated string fields may contain `{{ user.env.X }}` placeholders
/// resolved at spawn time by the MCP Resolver. Storage keeps
/// the raw, unresolved template; resolution happens in `agor-mcp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub id: EntityId,
    pub name: String,
    pub transport: McpTransport,
    pub scope: McpScope,
    /// Only meaningful for `scope == Global`.
    pub owner: Option<EntityId>,
    pub enabled: bool,
    pub source: McpSource,
    // stdio
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    // http / sse
    pub url: Option<String>,
    #[serde(default)]
    pub auth: McpAuth,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Many-to-many edge for isolated mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMcpAssignment {
    pub session_id: EntityId,
    pub mcp_server_id: EntityId,
    pub enabled: bool,
    pub added_at: DateTime<Utc>,
}
