// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, EntityId, McpScope, McpServer, SessionMcpAssignment};
use agor_proto::{Event, EventVerb, Topic};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_mcp_server(&self, server: &McpServer) -> Result<(), AgorError> {
        let data = encode(server)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO mcp_servers (id, scope, owner, enabled, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    server.id.to_string(),
                    scope_str(server.scope),
                    server.owner.map(|id| id.to_string()),
                    server.enabled as i64,
                    data,
                    server.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating mcp server", e))?;
            Ok(())
        })?;
        self.events().publish(
            &[Topic::Global],
            Event {
                service: "mcp_servers".into(),
                verb: EventVerb::Created,
                payload: serde_json::to_value(server).unwrap_or_default(),
            },
        );
        Ok(())
    }

    pub fn find_mcp_server(&self, id: EntityId) -> Result<McpServer, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM mcp_servers WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding mcp server", e))?;
            decode(&data)
        })
    }

    /// Servers visible to a given owner: their own global servers plus any
    /// `System`-sourced ones. Session-scoped
    /// servers are reached only through `SessionMcpAssignment`.
    pub fn list_global_mcp_servers_for_owner(&self, owner: EntityId) -> Result<Vec<McpServer>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM mcp_servers WHERE scope = 'global' AND (owner = ?1 OR owner IS NULL) AND enabled = 1")
                .map_err(|e| map_rusqlite_err("listing mcp servers", e))?;
            let rows = stmt
                .query_map([owner.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing mcp servers", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing mcp servers", e))?)?);
            }
            Ok(out)
        })
    }

    pub fn set_mcp_server_enabled(&self, id: EntityId, enabled: bool) -> Result<McpServer, AgorError> {
        let server = self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM mcp_servers WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding mcp server", e))?;
            let mut server: McpServer = decode(&data)?;
            server.enabled = enabled;
            server.updated_at = agor_model::now();
            let updated = encode(&server)?;
            conn.execute(
                "UPDATE mcp_servers SET enabled = ?1, data = ?2 WHERE id = ?3",
                rusqlite::params![enabled as i64, updated, id.to_string()],
            )
            .map_err(|e| map_rusqlite_err("updating mcp server", e))?;
            Ok(server)
        })?;
        self.events().publish(
            &[Topic::Global],
            Event {
                service: "mcp_servers".into(),
                verb: EventVerb::Patched,
                payload: serde_json::to_value(&server).unwrap_or_default(),
            },
        );
        Ok(server)
    }

    /// Isolated-mode assignment: attaches one server to one session (spec
    /// §3/§4.7). Upserting twice just flips `enabled`.
    pub fn assign_mcp_server_to_session(&self, session_id: EntityId, mcp_server_id: EntityId, enabled: bool) -> Result<(), AgorError> {
        let assignment = SessionMcpAssignment {
            session_id,
            mcp_server_id,
            enabled,
            added_at: agor_model::now(),
        };
        let data = encode(&assignment)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_mcp_assignments (session_id, mcp_server_id, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id, mcp_server_id) DO UPDATE SET data = excluded.data",
                rusqlite::params![session_id.to_string(), mcp_server_id.to_string(), data],
            )
            .map_err(|e| map_rusqlite_err("assigning mcp server", e))?;
            Ok(())
        })
    }

    pub fn list_mcp_assignments_for_session(&self, session_id: EntityId) -> Result<Vec<SessionMcpAssignment>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM session_mcp_assignments WHERE session_id = ?1")
                .map_err(|e| map_rusqlite_err("listing mcp assignments", e))?;
            let rows = stmt
                .query_map([session_id.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing mcp assignments", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing mcp assignments", e))?)?);
            }
            Ok(out)
        })
    }
}

fn scope_str(scope: McpScope) -> &'static str {
    match scope {
        McpScope::Global => "global",
        McpScope::Session => "session",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{McpAuth, McpSource, McpTransport};

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
    }

    fn server(owner: Option<EntityId>) -> McpServer {
        let now = agor_model::now();
        McpServer {
            id: EntityId::new(),
            name: "fs".into(),
            transport: McpTransport::Stdio,
            scope: McpScope::Global,
            owner,
            enabled: true,
            source: McpSource::User,
            command: Some("mcp-fs".into()),
            args: vec![],
            env: HashMap::new(),
            url: None,
            auth: McpAuth::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn owner_sees_their_own_and_ownerless_servers() {
        let store = store();
        let owner = EntityId::new();
        store.create_mcp_server(&server(Some(owner))).unwrap();
        store.create_mcp_server(&server(None)).unwrap();
        store.create_mcp_server(&server(Some(EntityId::new()))).unwrap();
        let visible = store.list_global_mcp_servers_for_owner(owner).unwrap();
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn disabling_a_server_excludes_it_from_listing() {
        let store = store();
        let owner = EntityId::new();
        let srv = server(Some(owner));
        store.create_mcp_server(&srv).unwrap();
        store.set_mcp_server_enabled(srv.id, false).unwrap();
        let visible = store.list_global_mcp_servers_for_owner(owner).unwrap();
        assert!(visible.is_empty());
    }

    #[test]
    fn assigning_twice_updates_rather_than_duplicates() {
        let store = store();
        let session_id = EntityId::new();
        let server_id = EntityId::new();
        store.assign_mcp_server_to_session(session_id, server_id, true).unwrap();
        store.assign_mcp_server_to_session(session_id, server_id, false).unwrap();
        let assignments = store.list_mcp_assignments_for_session(session_id).unwrap();
        assert_eq!(assignments.len(), 1);
        assert!(!assignments[0].enabled);
    }
}
