// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Supported agent SDK families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VendorFamily {
    ClaudeCode,
    Codex,
    Gemini,
    Opencode,
}

impl std::fmt::Display for VendorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VendorFamily::ClaudeCode => "claude-code",
            VendorFamily::Codex => "codex",
            VendorFamily::Gemini => "gemini",
            VendorFamily::Opencode => "opencode",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for VendorFamily {
    type Err = crate::AgorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude-code" => Ok(VendorFamily::ClaudeCode),
            "codex" => Ok(VendorFamily::Codex),
            "gemini" => Ok(VendorFamily::Gemini),
            "opencode" => Ok(VendorFamily::Opencode),
            other => Err(crate::AgorError::validation(format!("unknown vendor family: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// `alias` resolves a friendly name (e.g. "sonnet") through the vendor's own
/// catalog at spawn time; `exact` pins a specific model id verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMode {
    Alias,
    Exact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelector {
    pub mode: ModelMode,
    pub model: String,
}

/// Tool names the session is allowed to invoke without an interactive
/// permission prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionConfig {
    pub allowed_tools: Vec<String>,
}

impl PermissionConfig {
    pub fn allows(&self, tool_name: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool_name)
    }

    pub fn allow(&mut self, tool_name: impl Into<String>) {
        let name = tool_name.into();
        if !self.allows(&name) {
            self.allowed_tools.push(name);
        }
    }
}

/// Genealogy pointers. Forks are sibling edges, spawns are parent-child
/// edges: a fork clones lineage without adopting the source as a
/// parent, a spawn creates a true child.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Genealogy {
    pub forked_from: Option<EntityId>,
    pub fork_point_task: Option<EntityId>,
    pub parent_session: Option<EntityId>,
    pub spawn_point_task: Option<EntityId>,
    pub children: Vec<EntityId>,
}

/// Git ref/commit snapshot carried on the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitState {
    pub git_ref: Option<String>,
    pub base_commit: Option<String>,
    pub current_commit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: EntityId,
    pub owner: EntityId,
    pub vendor: VendorFamily,
    pub status: SessionStatus,
    /// Opaque string returned by the vendor SDK; never parsed (spec invariant 8).
    pub vendor_resume_token: Option<String>,
    pub worktree_id: EntityId,
    pub working_dir: String,
    #[serde(default)]
    pub git_state: GitState,
    #[serde(default)]
    pub genealogy: Genealogy,
    #[serde(default)]
    pub task_ids: Vec<EntityId>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub tool_use_count: u64,
    #[serde(default)]
    pub permissions: PermissionConfig,
    pub model: ModelSelector,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Construct a brand-new conversation (`sessions.create` / the non-fork,
    /// non-spawn path of the Service Layer).
    pub fn new(
        owner: EntityId,
        vendor: VendorFamily,
        worktree_id: EntityId,
        working_dir: impl Into<String>,
        model: ModelSelector,
    ) -> Self {
        let now = crate::ids::now();
        Self {
            id: EntityId::new(),
            owner,
            vendor,
            status: SessionStatus::Idle,
            vendor_resume_token: None,
            worktree_id,
            working_dir: working_dir.into(),
            git_state: GitState::default(),
            genealogy: Genealogy::default(),
            task_ids: Vec::new(),
            message_count: 0,
            tool_use_count: 0,
            permissions: PermissionConfig::default(),
            model,
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh sibling conversation: clones genealogy pointers but never the
    /// vendor resume token.
    pub fn fork(&self, fork_point_task: EntityId) -> Self {
        let mut s = Self::new(
            self.owner,
            self.vendor,
            self.worktree_id,
            self.working_dir.clone(),
            self.model.clone(),
        );
        s.permissions = self.permissions.clone();
        s.genealogy.forked_from = Some(self.id);
        s.genealogy.fork_point_task = Some(fork_point_task);
        s
    }

    /// A true child conversation, inheriting model/permission config.
    pub fn spawn_child(&self, spawn_point_task: EntityId) -> Self {
        let mut s = Self::new(
            self.owner,
            self.vendor,
            self.worktree_id,
            self.working_dir.clone(),
            self.model.clone(),
        );
        s.permissions = self.permissions.clone();
        s.genealogy.parent_session = Some(self.id);
        s.genealogy.spawn_point_task = Some(spawn_point_task);
        s
    }

    pub fn is_busy(&self) -> bool {
        self.status == SessionStatus::Running
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Session {
        Session::new(
            EntityId::new(),
            VendorFamily::ClaudeCode,
            EntityId::new(),
            "/tmp/wt",
            ModelSelector {
                mode: ModelMode::Alias,
                model: "sonnet".into(),
            },
        )
    }

    #[test]
    fn new_session_is_idle_with_no_resume_token() {
        let s = sample();
        assert_eq!(s.status, SessionStatus::Idle);
        assert!(s.vendor_resume_token.is_none());
        assert!(s.task_ids.is_empty());
    }

    #[test]
    fn fork_drops_resume_token_and_records_fork_point() {
        let mut parent = sample();
        parent.vendor_resume_token = Some("resume-abc".into());
        let task_id = EntityId::new();
        let child = parent.fork(task_id);
        assert!(child.vendor_resume_token.is_none());
        assert_eq!(child.genealogy.forked_from, Some(parent.id));
        assert_eq!(child.genealogy.fork_point_task, Some(task_id));
        assert!(child.genealogy.parent_session.is_none());
    }

    #[test]
    fn spawn_child_sets_parent_not_fork() {
        let parent = sample();
        let task_id = EntityId::new();
        let child = parent.spawn_child(task_id);
        assert_eq!(child.genealogy.parent_session, Some(parent.id));
        assert_eq!(child.genealogy.spawn_point_task, Some(task_id));
        assert!(child.genealogy.forked_from.is_none());
    }

    #[test]
    fn permission_config_allow_is_idempotent() {
        let mut p = PermissionConfig::default();
        p.allow("shell");
        p.allow("shell");
        assert_eq!(p.allowed_tools.len(), 1);
        assert!(p.allows("shell"));
        assert!(!p.allows("edit_file"));
    }

    #[test]
    fn is_busy_tracks_running_status_only() {
        let mut s = sample();
        assert!(!s.is_busy());
        s.status = SessionStatus::Running;
        assert!(s.is_busy());
        s.status = SessionStatus::Completed;
        assert!(!s.is_busy());
    }
}
