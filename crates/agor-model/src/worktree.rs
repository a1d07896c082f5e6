// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// A git working directory belonging to at most one board.
///
/// `agor-model` models only the durable record; the mechanics of creating or
/// removing the underlying worktree are an external collaborator
/// ("git worktree creation mechanics" is out of scope for this subsystem).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub id: EntityId,
    pub repo_id: EntityId,
    pub path: String,
    pub git_ref: String,
    pub board_id: Option<EntityId>,
    pub creator: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Worktree {
    pub fn new(repo_id: EntityId, path: impl Into<String>, git_ref: impl Into<String>, creator: EntityId) -> Self {
        let now = crate::ids::now();
        Self {
            id: EntityId::new(),
            repo_id,
            path: path.into(),
            git_ref: git_ref.into(),
            board_id: None,
            creator,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_worktree_has_no_board() {
        let wt = Worktree::new(EntityId::new(), "/repo/wt-1", "main", EntityId::new());
        assert!(wt.board_id.is_none());
    }
}
