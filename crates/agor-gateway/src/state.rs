// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::sync::Arc;

use agor_events::EventBus;
use agor_permission::Arbiter;
use agor_service::{
    BoardService, McpServerService, MessageService, PermissionService, SessionService, TaskLauncher,
    TaskService, UserService, WorktreeService,
};
use agor_store::Store;

/// Everything a request handler needs, assembled once at startup and shared
/// behind an `Arc` the way a prior `sven-node::control::service::AgentHandle`
/// shared its single agent — here generalized to one handle per entity
/// service instead of one agent.
pub struct AppState {
    pub store: Arc<Store>,
    pub events: Arc<EventBus>,
    pub token_secret: Arc<[u8]>,
    pub token_ttl_days: u64,
    pub sessions: SessionService,
    pub boards: BoardService,
    pub mcp_servers: McpServerService,
    pub permissions: PermissionService,
    pub tasks: TaskService,
    pub users: UserService,
    pub worktrees: WorktreeService,
    pub messages: MessageService,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        events: Arc<EventBus>,
        launcher: Arc<dyn TaskLauncher>,
        permission_timeout: std::time::Duration,
        allowed_env_keys: HashSet<String>,
        token_secret: Arc<[u8]>,
        token_ttl_days: u64,
    ) -> Arc<Self> {
        let arbiter = Arc::new(Arbiter::new(store.clone(), permission_timeout));
        Arc::new(Self {
            sessions: SessionService::new(store.clone(), launcher),
            boards: BoardService::new(store.clone()),
            mcp_servers: McpServerService::new(store.clone(), allowed_env_keys),
            permissions: PermissionService::new(store.clone(), arbiter),
            tasks: TaskService::new(store.clone()),
            users: UserService::new(store.clone()),
            worktrees: WorktreeService::new(store.clone()),
            messages: MessageService::new(store.clone()),
            store,
            events,
            token_secret,
            token_ttl_days,
        })
    }
}
