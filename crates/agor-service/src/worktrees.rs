// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agor_model::{AgorError, EntityId, Worktree};
use agor_store::Store;

use crate::{require_owner, Principal};

/// `worktrees.create/assign/remove/list`. Creating the
/// underlying git worktree on disk is the caller's job (`agor-config`'s
/// shadow-tree layout) — this service only tracks the record.
pub struct WorktreeService {
    store: Arc<Store>,
}

impl WorktreeService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create(&self, principal: &Principal, worktree: Worktree) -> Result<Worktree, AgorError> {
        require_owner(principal, worktree.creator)?;
        self.store.create_worktree(&worktree)?;
        Ok(worktree)
    }

    pub fn get(&self, principal: &Principal, id: EntityId) -> Result<Worktree, AgorError> {
        let worktree = self.store.find_worktree(id)?;
        require_owner(principal, worktree.creator)?;
        Ok(worktree)
    }

    pub fn assign_to_board(&self, principal: &Principal, id: EntityId, board_id: Option<EntityId>) -> Result<Worktree, AgorError> {
        self.get(principal, id)?;
        self.store.assign_worktree_to_board(id, board_id)
    }

    pub fn list_for_board(&self, principal: &Principal, board_id: EntityId) -> Result<Vec<Worktree>, AgorError> {
        let worktrees = self.store.list_worktrees_for_board(board_id)?;
        if let Some(first) = worktrees.first() {
            require_owner(principal, first.creator)?;
        }
        Ok(worktrees)
    }

    pub fn remove(&self, principal: &Principal, id: EntityId) -> Result<(), AgorError> {
        self.get(principal, id)?;
        self.store.remove_worktree(id)
    }
}
