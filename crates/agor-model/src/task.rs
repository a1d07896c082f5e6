// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One user prompt and its induced message sequence within a session
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub session_id: EntityId,
    pub status: TaskStatus,
    pub description: String,
    pub prompt: String,
    /// Inclusive-inclusive `[start_index, end_index]` range into the
    /// session's message list; `end_index` is `None` until the task reaches
    /// a terminal status (spec invariant 3).
    pub start_index: u64,
    pub end_index: Option<u64>,
    pub tool_use_count: u64,
    /// Resolved at execution time, distinct from the session's configured
    /// model.
    pub resolved_model: Option<String>,
    pub start_sha: Option<String>,
    pub end_sha: Option<String>,
    /// Set only when `status == Failed`; one of the `ErrorKind` prefixes.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(session_id: EntityId, description: impl Into<String>, prompt: impl Into<String>, start_index: u64) -> Self {
        let now = crate::ids::now();
        Self {
            id: EntityId::new(),
            session_id,
            status: TaskStatus::Pending,
            description: description.into(),
            prompt: prompt.into(),
            start_index,
            end_index: None,
            tool_use_count: 0,
            resolved_model: None,
            start_sha: None,
            end_sha: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.updated_at = crate::ids::now();
    }

    pub fn mark_completed(&mut self, end_index: u64) {
        self.status = TaskStatus::Completed;
        self.end_index = Some(end_index);
        self.failure_reason = None;
        self.updated_at = crate::ids::now();
    }

    pub fn mark_failed(&mut self, end_index: u64, reason: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.end_index = Some(end_index);
        self.failure_reason = Some(reason.into());
        self.updated_at = crate::ids::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending_with_open_range() {
        let t = Task::new(EntityId::new(), "say hi", "say hi", 0);
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.start_index, 0);
        assert!(t.end_index.is_none());
        assert!(!t.is_terminal());
    }

    #[test]
    fn mark_failed_sets_reason_and_closes_range() {
        let mut t = Task::new(EntityId::new(), "d", "p", 3);
        t.mark_running();
        t.mark_failed(5, "cancelled");
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.end_index, Some(5));
        assert_eq!(t.failure_reason.as_deref(), Some("cancelled"));
        assert!(t.is_terminal());
    }

    #[test]
    fn mark_completed_clears_prior_failure_reason() {
        let mut t = Task::new(EntityId::new(), "d", "p", 0);
        t.failure_reason = Some("stale".into());
        t.mark_completed(4);
        assert!(t.failure_reason.is_none());
        assert_eq!(t.end_index, Some(4));
    }
}
