// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Per-task executor: a short-lived process spawned once per `Task` by
//! `agor-scheduler`, driving exactly one vendor SDK to completion and
//! relaying everything back to the daemon over RPC. Never touches
//! `agor-store` directly — every
//! fact this binary learns about the session comes from the daemon, and
//! every fact it produces goes back the same way.

mod callbacks;
mod rpc_client;

use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use agor_adapters::ResolvedMcpServer;
use agor_model::{EntityId, ErrorKind, Session, Task, VendorFamily};

use callbacks::RpcCallbacks;
use rpc_client::RpcClient;

/// Flag names fixed by the executor invocation contract: changing any of
/// these breaks `agor-scheduler::Inner::spawn_executor`.
#[derive(Parser, Debug)]
#[command(name = "agor-executor")]
struct Args {
    #[arg(long)]
    session_token: String,
    #[arg(long)]
    session_id: String,
    #[arg(long)]
    task_id: String,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    tool: String,
    #[arg(long, default_value = "default")]
    permission_mode: String,
    #[arg(long)]
    daemon_url: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "executor exiting with failure");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &agor_model::AgorError) -> u8 {
    match err.kind {
        ErrorKind::Auth => 3,
        ErrorKind::Validation => 2,
        _ => 1,
    }
}

async fn run(args: Args) -> Result<(), agor_model::AgorError> {
    let session_id =
        EntityId::parse(&args.session_id).map_err(|e| agor_model::AgorError::validation(format!("invalid --session-id: {e}")))?;
    let task_id = EntityId::parse(&args.task_id).map_err(|e| agor_model::AgorError::validation(format!("invalid --task-id: {e}")))?;
    let vendor = VendorFamily::from_str(&args.tool)?;
    tracing::info!(%task_id, %session_id, permission_mode = %args.permission_mode, "executor starting");

    // `params.user` on the wire is advisory context for logging, never
    // trusted for authorization — the gateway derives the real principal
    // by verifying `session_token` itself, so any identifier works here.
    let rpc = RpcClient::new(args.daemon_url.clone(), args.session_token.clone(), session_id);

    let session_value = rpc.call("sessions", "get", Some(session_id), json!({})).await?;
    let session: Session = serde_json::from_value(session_value).map_err(|e| agor_model::AgorError::internal(format!("decoding session: {e}")))?;

    let task_value = rpc.call("tasks", "get", Some(session_id), json!({"task_id": task_id})).await?;
    let task: Task = serde_json::from_value(task_value).map_err(|e| agor_model::AgorError::internal(format!("decoding task: {e}")))?;

    let user_env = allow_listed_env();
    let resolution_value = rpc
        .call("mcp_servers", "resolve", Some(session_id), json!({ "user_env": user_env }))
        .await?;
    let mcp_servers: Vec<ResolvedMcpServer> = resolution_value
        .get("servers")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| agor_model::AgorError::internal(format!("decoding resolved mcp servers: {e}")))?
        .unwrap_or_default();

    let adapter = agor_adapters::adapter_for(vendor);
    let mut callbacks = RpcCallbacks::new(&rpc, session_id, task_id);
    let (_cancel_tx, mut cancel_rx) = tokio::sync::oneshot::channel();

    adapter
        .execute_task(&session, &task, &args.prompt, &mcp_servers, &mut callbacks, &mut cancel_rx)
        .await
}

/// Reads `AGOR_USER_ENV_KEYS` (comma-separated) out of this process's own
/// environment and collects the named variables that are actually set —
/// per spec §4.5 step 3, templated MCP secrets are resolved "against the
/// executor's own environment," not the daemon's.
fn allow_listed_env() -> std::collections::HashMap<String, String> {
    let Ok(keys) = std::env::var("AGOR_USER_ENV_KEYS") else {
        return std::collections::HashMap::new();
    };
    keys.split(',')
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
        .collect()
}
