// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Service Layer (C3): CRUD-plus-custom-verb operations over the
//! entity store, each guarded by an ownership check on the authenticated
//! `Principal`.
//!
//! Generalizes a prior `sven-node::control::service::ControlService`
//! — one struct mediating between a transport and a single agent's state —
//! into per-entity service structs that mediate between the gateway/RPC
//! layer and `agor-store`, with the addition of a uniform ownership gate
//! every custom verb must pass through before it touches the store.

mod boards;
mod mcp_servers;
mod messages;
mod permissions;
mod principal;
mod sessions;
mod tasks;
mod users;
mod worktrees;

pub use boards::BoardService;
pub use mcp_servers::McpServerService;
pub use messages::MessageService;
pub use permissions::PermissionService;
pub use principal::Principal;
pub use sessions::{SessionService, TaskLauncher};
pub use tasks::TaskService;
pub use users::UserService;
pub use worktrees::WorktreeService;

use agor_model::{AgorError, ErrorKind};

/// Every request's `params.user` must match (or the caller must
/// be privileged over) the entity's owning user. For v1 there is no
/// privileged role yet — ownership is exact-match only; a future `admin`
/// flag on `User` would extend this check, not replace it.
pub(crate) fn require_owner(principal: &Principal, owner: agor_model::EntityId) -> Result<(), AgorError> {
    if principal.user == owner {
        Ok(())
    } else {
        Err(AgorError::new(
            ErrorKind::Forbidden,
            format!("user {} does not own this entity", principal.user),
        ))
    }
}
