// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Durable entity types shared by every crate in the workspace.
//!
//! `agor-model` has no I/O and no async runtime dependency: it is the single
//! place that defines what a Session, Task, Message, Worktree, Board,
//! MCPServer and User *are*, plus the invariants that the
//! entity store and service layer must uphold. Keeping this crate free of
//! storage/transport concerns lets `agor-store`, `agor-service`,
//! `agor-scheduler` and `agor-adapters` all depend on one shared vocabulary
//! without pulling in SQLite, axum, or tokio transitively.

mod board;
mod error;
mod ids;
mod invariants;
mod mcp;
mod message;
mod permission;
mod session;
mod task;
mod user;
mod worktree;

pub use board::{Board, BoardObject, ObjectKind};
pub use error::{AgorError, ErrorKind};
pub use ids::{now, EntityId};
pub use invariants::{
    message_indices_are_dense, ranges_are_non_overlapping, task_range_is_contiguous,
};
pub use mcp::{McpAuth, McpScope, McpServer, McpSource, McpTransport, SessionMcpAssignment};
pub use message::{Block, Message, MessageContent, Role};
pub use permission::{PermissionDecision, PermissionRequest, PermissionScope};
pub use session::{
    Genealogy, ModelMode, ModelSelector, PermissionConfig, Session, SessionStatus, VendorFamily,
};
pub use task::{Task, TaskStatus};
pub use user::User;
pub use worktree::Worktree;
