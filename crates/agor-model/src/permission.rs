// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Raised by a Vendor Tool Adapter when the SDK invokes a tool outside the
/// session's allow-list. Carries just enough for a client
/// to render a prompt without re-fetching the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: EntityId,
    pub task_id: EntityId,
    pub session_id: EntityId,
    pub tool_name: String,
    pub input_preview: String,
    pub created_at: DateTime<Utc>,
}

impl PermissionRequest {
    pub fn new(task_id: EntityId, session_id: EntityId, tool_name: impl Into<String>, input_preview: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            task_id,
            session_id,
            tool_name: tool_name.into(),
            input_preview: input_preview.into(),
            created_at: crate::ids::now(),
        }
    }
}

/// How far an `allow` decision extends past the one tool call that triggered
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    Once,
    Task,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allow: bool,
    pub scope: PermissionScope,
}

impl PermissionDecision {
    pub fn allow_once() -> Self {
        Self { allow: true, scope: PermissionScope::Once }
    }

    /// The arbiter's default outcome when no client answers before the
    /// timeout.
    pub fn deny() -> Self {
        Self { allow: false, scope: PermissionScope::Once }
    }

    /// `scope` beyond `once` only makes sense alongside `allow == true`; a
    /// denial is always scoped to the single request being decided.
    pub fn widens_allow_list(&self) -> bool {
        self.allow && self.scope != PermissionScope::Once
    }
}
