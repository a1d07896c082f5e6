// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agor_model::{AgorError, PermissionDecision, PermissionRequest, Session, Task};

/// One MCP server already resolved and template-rendered by the daemon
///, handed to the adapter as a plain DTO so this crate never
/// needs `agor-mcp`'s store-backed resolver in its dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMcpServer {
    pub name: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub url: Option<String>,
    pub auth_token: Option<String>,
}

/// What an adapter can do, queried by the Service Layer before offering
/// resume/session-import affordances in a client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_streaming: bool,
    pub supports_resume: bool,
    pub supports_session_import: bool,
    pub supports_permission_hooks: bool,
    pub supports_mcp: bool,
}

/// Final usage summary emitted once per `execute_task` call.
#[derive(Debug, Clone)]
pub struct UsageSummary {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub resolved_model: String,
}

/// The common callback surface a `VendorAdapter` drives while running a
/// task. Implemented by the executor binary, which bridges each callback
/// into a `messages.create` / `sessions.patch` RPC call against the daemon
/// — the adapter itself never touches the store.
///
/// A trait rather than a struct of closures: the executor's implementation
/// carries its own RPC client state across calls, which a trait's `&mut
/// self` expresses more directly than threading captured state through
/// boxed `FnMut`s.
#[async_trait]
pub trait AdapterCallbacks: Send {
    /// Partial assistant text. The adapter decides whether to coalesce
    /// deltas into one Message or emit one per delta; this callback does
    /// not decide that on its own.
    async fn on_text_delta(&mut self, text: &str);

    /// A full tool-use block, atomic — never split across calls.
    async fn on_tool_use(&mut self, id: &str, name: &str, input: Value);

    /// A result tied to a prior `on_tool_use` id.
    async fn on_tool_result(&mut self, tool_use_id: &str, content: &str, is_error: bool);

    /// Synchronous from the adapter's point of view: blocks the vendor CLI
    /// subprocess's stdout pump until the Permission Arbiter (C9) returns a
    /// decision or times out.
    async fn on_permission_request(&mut self, request: PermissionRequest) -> PermissionDecision;

    /// Persisted to the Session on first emission only; later calls with a
    /// different id are a vendor protocol violation and are logged, not
    /// applied.
    async fn on_vendor_session_id(&mut self, id: &str);

    async fn on_usage(&mut self, usage: UsageSummary);
}

/// One per supported agent family. Implementations are thin
/// translators with no shared mutable state — `execute_task` owns its own
/// subprocess for the duration of the call and is safe to invoke
/// concurrently from different tasks against the same adapter instance.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Drive one task to completion (or cancellation). `cancel` resolves
    /// when the executor receives the daemon's abort signal; the adapter must reach an abort point and
    /// return `Err(AgorError::cancelled(..))` promptly rather than letting
    /// the vendor subprocess run to its own completion.
    async fn execute_task(
        &self,
        session: &Session,
        task: &Task,
        prompt: &str,
        mcp_servers: &[ResolvedMcpServer],
        callbacks: &mut dyn AdapterCallbacks,
        cancel: &mut tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), AgorError>;
}
