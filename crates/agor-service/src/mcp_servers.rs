// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::sync::Arc;

use agor_mcp::Resolution;
use agor_model::{AgorError, EntityId, McpServer};
use agor_store::Store;

use crate::{require_owner, Principal};

/// `mcp_servers.create/enable/disable/assign` plus the read-only
/// `resolve(session_id)` call the executor makes before invoking a vendor
/// adapter. `allowed_env_keys` is the
/// `AGOR_USER_ENV_KEYS` allow-list, loaded once at daemon startup.
pub struct McpServerService {
    store: Arc<Store>,
    allowed_env_keys: HashSet<String>,
}

impl McpServerService {
    pub fn new(store: Arc<Store>, allowed_env_keys: HashSet<String>) -> Self {
        Self { store, allowed_env_keys }
    }

    pub fn create(&self, principal: &Principal, server: McpServer) -> Result<McpServer, AgorError> {
        if let Some(owner) = server.owner {
            require_owner(principal, owner)?;
        }
        self.store.create_mcp_server(&server)?;
        Ok(server)
    }

    pub fn set_enabled(&self, principal: &Principal, id: EntityId, enabled: bool) -> Result<McpServer, AgorError> {
        let server = self.store.find_mcp_server(id)?;
        if let Some(owner) = server.owner {
            require_owner(principal, owner)?;
        }
        self.store.set_mcp_server_enabled(id, enabled)
    }

    pub fn assign_to_session(&self, principal: &Principal, session_id: EntityId, server_id: EntityId, enabled: bool) -> Result<(), AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        self.store.assign_mcp_server_to_session(session_id, server_id, enabled)
    }

    pub fn list_for_owner(&self, principal: &Principal) -> Result<Vec<McpServer>, AgorError> {
        self.store.list_global_mcp_servers_for_owner(principal.user)
    }

    /// Resolves the effective server list for a session, rendering
    /// templates against `user_env` (read from the owner's `User.env` by the
    /// caller and passed in so this service never touches secrets it didn't
    /// need to).
    pub fn resolve(
        &self,
        principal: &Principal,
        session_id: EntityId,
        user_env: &std::collections::HashMap<String, String>,
    ) -> Result<Resolution, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        agor_mcp::resolve(&self.store, &session, user_env, &self.allowed_env_keys)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{McpAuth, McpScope, McpSource, McpTransport, ModelMode, ModelSelector, Session, VendorFamily};

    use super::*;

    #[test]
    fn resolve_honors_the_owning_sessions_servers() {
        let store = Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap());
        let owner = EntityId::new();
        let session = Session::new(owner, VendorFamily::ClaudeCode, EntityId::new(), "/tmp/wt", ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() });
        store.create_session(&session).unwrap();
        let now = agor_model::now();
        let server = McpServer {
            id: EntityId::new(),
            name: "fs".into(),
            transport: McpTransport::Stdio,
            scope: McpScope::Global,
            owner: Some(owner),
            enabled: true,
            source: McpSource::User,
            command: Some("mcp-fs".into()),
            args: vec![],
            env: HashMap::new(),
            url: None,
            auth: McpAuth::default(),
            created_at: now,
            updated_at: now,
        };
        store.create_mcp_server(&server).unwrap();

        let service = McpServerService::new(store, HashSet::new());
        let principal = Principal::new(owner);
        let resolution = service.resolve(&principal, session.id, &HashMap::new()).unwrap();
        assert_eq!(resolution.servers.len(), 1);
    }
}
