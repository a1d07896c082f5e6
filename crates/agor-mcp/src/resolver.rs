// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The MCP Resolver (C7): given a session, returns the ordered
//! list of MCP servers it should be started with, each already rendered
//! against the owner's allow-listed environment.

use std::collections::{HashMap, HashSet};

use agor_model::{AgorError, McpServer, McpTransport, Session};
use agor_store::Store;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::template::{render, Rendered};

/// Where a resolved server came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// The session has at least one enabled `SessionMcpAssignment`: only
    /// those servers are used, global inheritance is skipped entirely.
    Isolated,
    /// No session-scoped assignment exists: every enabled global server
    /// owned by the session's creator is inherited.
    Hierarchical,
}

/// One server after template rendering, ready to hand to a Vendor Tool
/// Adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedServer {
    /// Duplicated out of `server.name` at the top level so this struct's
    /// wire shape matches `agor_adapters::ResolvedMcpServer`, which the
    /// executor deserializes it into directly.
    pub name: String,
    pub server: McpServer,
    pub mode: Mode,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

/// A server omitted from the resolved list because a required templated
/// field failed to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Omitted {
    pub server_id: agor_model::EntityId,
    pub server_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub servers: Vec<ResolvedServer>,
    pub omitted: Vec<Omitted>,
}

/// Resolve the effective MCP server list for `session`, rendering templated
/// fields against `user_env` restricted to `allowed_keys` (the
/// `AGOR_USER_ENV_KEYS` allow-list).
pub fn resolve(
    store: &Store,
    session: &Session,
    user_env: &HashMap<String, String>,
    allowed_keys: &HashSet<String>,
) -> Result<Resolution, AgorError> {
    let assignments: Vec<_> = store
        .list_mcp_assignments_for_session(session.id)?
        .into_iter()
        .filter(|a| a.enabled)
        .collect();

    let (candidates, mode) = if !assignments.is_empty() {
        let mut servers = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            servers.push(store.find_mcp_server(assignment.mcp_server_id)?);
        }
        (servers, Mode::Isolated)
    } else {
        (store.list_global_mcp_servers_for_owner(session.owner)?, Mode::Hierarchical)
    };

    let mut resolution = Resolution::default();
    for server in candidates {
        if !server.enabled {
            continue;
        }
        match render_server(&server, mode, user_env, allowed_keys) {
            Ok(resolved) => resolution.servers.push(resolved),
            Err(reason) => {
                warn!(server = %server.name, %reason, "omitting mcp server: required template field failed to resolve");
                resolution.omitted.push(Omitted {
                    server_id: server.id,
                    server_name: server.name.clone(),
                    reason,
                });
            }
        }
    }
    Ok(resolution)
}

fn render_server(
    server: &McpServer,
    mode: Mode,
    user_env: &HashMap<String, String>,
    allowed_keys: &HashSet<String>,
) -> Result<ResolvedServer, String> {
    let mut env = HashMap::new();
    for (k, v) in &server.env {
        match render(v, user_env, allowed_keys) {
            Rendered::Ok(value) => {
                env.insert(k.clone(), value);
            }
            // A missing *optional* template just drops that one env entry
            //, it never invalidates the whole server.
            Rendered::Unresolved { missing_keys } => {
                warn!(server = %server.name, env_key = %k, missing = ?missing_keys, "dropping one mcp env entry, template unresolved");
            }
        }
    }

    let command = match &server.command {
        Some(c) => match render(c, user_env, allowed_keys) {
            Rendered::Ok(value) => Some(value),
            Rendered::Unresolved { missing_keys } => {
                return Err(format!("command template missing keys: {missing_keys:?}"));
            }
        },
        None => None,
    };

    let url = match &server.url {
        Some(u) => match render(u, user_env, allowed_keys) {
            Rendered::Ok(value) => Some(value),
            Rendered::Unresolved { missing_keys } => {
                return Err(format!("url template missing keys: {missing_keys:?}"));
            }
        },
        None => None,
    };

    if matches!(server.transport, McpTransport::Stdio) && command.is_none() {
        return Err("stdio transport requires a command".into());
    }
    if matches!(server.transport, McpTransport::Http | McpTransport::Sse) && url.is_none() {
        return Err("http/sse transport requires a url".into());
    }

    let auth_token = match &server.auth.token {
        Some(t) => match render(t, user_env, allowed_keys) {
            Rendered::Ok(value) => Some(value),
            Rendered::Unresolved { missing_keys } => {
                return Err(format!("auth.token template missing keys: {missing_keys:?}"));
            }
        },
        None => None,
    };

    Ok(ResolvedServer {
        name: server.name.clone(),
        server: server.clone(),
        mode,
        command,
        args: server.args.clone(),
        env,
        url,
        auth_token,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{EntityId, McpAuth, McpScope, McpSource, ModelMode, ModelSelector, VendorFamily};

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
    }

    fn session(store: &Store, owner: EntityId) -> Session {
        let s = Session::new(owner, VendorFamily::ClaudeCode, EntityId::new(), "/tmp/wt", ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() });
        store.create_session(&s).unwrap();
        s
    }

    fn stdio_server(owner: Option<EntityId>, command: &str) -> McpServer {
        let now = agor_model::now();
        McpServer {
            id: EntityId::new(),
            name: "fs".into(),
            transport: McpTransport::Stdio,
            scope: McpScope::Global,
            owner,
            enabled: true,
            source: McpSource::User,
            command: Some(command.into()),
            args: vec![],
            env: HashMap::new(),
            url: None,
            auth: McpAuth::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn hierarchical_mode_used_when_no_session_assignment_exists() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let server = stdio_server(Some(owner), "mcp-fs");
        store.create_mcp_server(&server).unwrap();

        let resolution = resolve(&store, &session, &HashMap::new(), &HashSet::new()).unwrap();
        assert_eq!(resolution.servers.len(), 1);
        assert_eq!(resolution.servers[0].mode, Mode::Hierarchical);
    }

    #[test]
    fn isolated_mode_overrides_global_inheritance() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let global = stdio_server(Some(owner), "mcp-global");
        store.create_mcp_server(&global).unwrap();
        let isolated = stdio_server(Some(owner), "mcp-isolated");
        store.create_mcp_server(&isolated).unwrap();
        store.assign_mcp_server_to_session(session.id, isolated.id, true).unwrap();

        let resolution = resolve(&store, &session, &HashMap::new(), &HashSet::new()).unwrap();
        assert_eq!(resolution.servers.len(), 1);
        assert_eq!(resolution.servers[0].server.id, isolated.id);
        assert_eq!(resolution.servers[0].mode, Mode::Isolated);
    }

    #[test]
    fn required_field_template_failure_omits_the_server_with_a_warning() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let server = stdio_server(Some(owner), "{{ user.env.MISSING }}");
        store.create_mcp_server(&server).unwrap();

        let resolution = resolve(&store, &session, &HashMap::new(), &HashSet::new()).unwrap();
        assert!(resolution.servers.is_empty());
        assert_eq!(resolution.omitted.len(), 1);
        assert_eq!(resolution.omitted[0].server_id, server.id);
    }

    #[test]
    fn optional_env_entry_template_failure_just_drops_that_entry() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let mut server = stdio_server(Some(owner), "mcp-fs");
        server.env.insert("TOKEN".into(), "{{ user.env.MISSING }}".into());
        store.create_mcp_server(&server).unwrap();

        let resolution = resolve(&store, &session, &HashMap::new(), &HashSet::new()).unwrap();
        assert_eq!(resolution.servers.len(), 1);
        assert!(resolution.servers[0].env.is_empty());
        assert!(resolution.omitted.is_empty());
    }
}
