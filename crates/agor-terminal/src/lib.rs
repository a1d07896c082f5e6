// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Terminal Service (C8) contract: `create`/`patch`/`remove`/`find` plus
//! `data`/`exit` events, with no backing PTY implementation.
//!
//! A real implementation would, when given a `worktree_id` and `tmux` is on
//! `PATH`, multiplex sessions onto a per-user tmux session named
//! `agor-<user-prefix>` with one window per worktree; otherwise it would
//! spawn an ephemeral PTY directly. None of that is implemented here —
//! `NullTerminalService` below exists only so the daemon and its tests have
//! something to wire `dyn TerminalService` to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agor_model::{AgorError, EntityId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTerminalRequest {
    pub user_id: EntityId,
    pub worktree_id: Option<EntityId>,
    pub cwd: Option<String>,
    pub shell: Option<String>,
    pub rows: u16,
    pub cols: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchTerminalRequest {
    pub input: Option<Vec<u8>>,
    pub resize: Option<(u16, u16)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalHandle {
    pub id: EntityId,
    pub user_id: EntityId,
    pub worktree_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

/// Streamed out of a live terminal. `Data` carries raw PTY bytes (not
/// necessarily UTF-8 aligned at chunk boundaries); `Exit` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TerminalEvent {
    Data { terminal_id: EntityId, bytes: Vec<u8> },
    Exit { terminal_id: EntityId, code: Option<i32> },
}

#[async_trait]
pub trait TerminalService: Send + Sync {
    async fn create(&self, request: CreateTerminalRequest) -> Result<TerminalHandle, AgorError>;
    async fn patch(&self, id: EntityId, request: PatchTerminalRequest) -> Result<(), AgorError>;
    async fn remove(&self, id: EntityId) -> Result<(), AgorError>;
    async fn find(&self, id: EntityId) -> Result<TerminalHandle, AgorError>;
    async fn list(&self, user_id: EntityId) -> Result<Vec<TerminalHandle>, AgorError>;
}

/// Satisfies `TerminalService` without spawning anything; every mutating
/// call reports the terminal as not found, since none were ever created.
pub struct NullTerminalService;

#[async_trait]
impl TerminalService for NullTerminalService {
    async fn create(&self, _request: CreateTerminalRequest) -> Result<TerminalHandle, AgorError> {
        Err(AgorError::internal("terminal service has no backing implementation"))
    }

    async fn patch(&self, id: EntityId, _request: PatchTerminalRequest) -> Result<(), AgorError> {
        Err(AgorError::not_found(format!("terminal {id}")))
    }

    async fn remove(&self, id: EntityId) -> Result<(), AgorError> {
        Err(AgorError::not_found(format!("terminal {id}")))
    }

    async fn find(&self, id: EntityId) -> Result<TerminalHandle, AgorError> {
        Err(AgorError::not_found(format!("terminal {id}")))
    }

    async fn list(&self, _user_id: EntityId) -> Result<Vec<TerminalHandle>, AgorError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_service_reports_no_terminals_and_refuses_create() {
        let svc = NullTerminalService;
        let user_id = EntityId::new();
        assert!(svc.list(user_id).await.unwrap().is_empty());
        let err = svc
            .create(CreateTerminalRequest { user_id, worktree_id: None, cwd: None, shell: None, rows: 24, cols: 80 })
            .await
            .unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Internal);
    }
}
