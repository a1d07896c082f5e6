// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Task Scheduler (C4): one `RunningExecution` per live `agor-executor`
//! subprocess, tracked in a `task_id -> Execution` map.
//!
//! Modeled directly on a prior `sven-node::control::service::ControlService`:
//! that struct keeps a `sessions: HashMap<Uuid, Session>` plus a cancel
//! channel per session and bridges a spawned task's completion back into
//! its own bookkeeping. `Scheduler` keeps the same shape but the thing it
//! spawns is a real OS process (`tokio::process::Command`) rather than an
//! in-process `Agent::submit_with_cancel` call, and "completion" updates
//! `agor-store` instead of an in-memory `HashMap` entry.
//!
//! `Scheduler` is a thin, `Clone`-able handle around an `Arc<Inner>` (the
//! same "handle wraps the shared state" shape as
//! `AgentHandle`), so `launch` can clone the handle into the spawned task
//! without any unsafe pointer reconstruction.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use agor_model::{AgorError, EntityId, ErrorKind, Session, Task};
use agor_proto::auth::{Claims, Role};
use agor_service::TaskLauncher;
use agor_store::Store;

/// Grace period between asking an executor to wind down and
/// force-killing it.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Executor session tokens are single-task-lifetime credentials, not the
/// multi-day operator tokens `agor-gateway` mints for the CLI — an hour
/// comfortably outlives any one task and limits what a leaked token buys.
pub const EXECUTOR_TOKEN_TTL: Duration = Duration::from_secs(3600);

struct Execution {
    cancel_tx: oneshot::Sender<()>,
}

struct Inner {
    store: Arc<Store>,
    executions: Mutex<HashMap<EntityId, Execution>>,
    executor_path: PathBuf,
    daemon_url: String,
    cancel_grace: Duration,
    token_secret: Arc<[u8]>,
}

#[derive(Clone)]
pub struct Scheduler(Arc<Inner>);

impl Scheduler {
    pub fn new(store: Arc<Store>, executor_path: PathBuf, daemon_url: String, token_secret: Arc<[u8]>) -> Self {
        Self::with_grace(store, executor_path, daemon_url, token_secret, DEFAULT_CANCEL_GRACE)
    }

    pub fn with_grace(
        store: Arc<Store>,
        executor_path: PathBuf,
        daemon_url: String,
        token_secret: Arc<[u8]>,
        cancel_grace: Duration,
    ) -> Self {
        Self(Arc::new(Inner {
            store,
            executions: Mutex::new(HashMap::new()),
            executor_path,
            daemon_url,
            cancel_grace,
            token_secret,
        }))
    }

    /// A session left `Running` across a daemon restart has no
    /// live executor behind it any more — fail its open task as `Orphaned`
    /// so the session becomes usable again instead of staying wedged.
    pub fn reconcile_orphans(&self) -> Result<usize, AgorError> {
        let stuck = self.0.store.list_running_sessions()?;
        let mut reconciled = 0;
        for session in stuck {
            let Some(task_id) = session.task_ids.last().copied() else {
                continue;
            };
            let task = self.0.store.find_task(task_id)?;
            if task.is_terminal() {
                continue;
            }
            warn!(%task_id, session_id = %session.id, "reconciling orphaned task on startup");
            self.0
                .store
                .mark_task_failed(task_id, task.start_index, ErrorKind::Orphaned.prefix())?;
            reconciled += 1;
        }
        Ok(reconciled)
    }
}

impl Inner {
    fn spawn_executor(&self, session: &Session, task: &Task) -> std::io::Result<tokio::process::Child> {
        let token = session_token_for(session, &self.token_secret).unwrap_or_else(|e| {
            error!(error = %e, "failed to mint executor session token");
            String::new()
        });
        Command::new(&self.executor_path)
            .arg("--session-token")
            .arg(token)
            .arg("--session-id")
            .arg(session.id.to_string())
            .arg("--task-id")
            .arg(task.id.to_string())
            .arg("--prompt")
            .arg(&task.prompt)
            .arg("--tool")
            .arg(session.vendor.to_string())
            .arg("--permission-mode")
            .arg("default")
            .arg("--daemon-url")
            .arg(&self.daemon_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }

    async fn run_to_completion(self: Arc<Self>, session: Session, task: Task, mut cancel_rx: oneshot::Receiver<()>) {
        let mut child = match self.spawn_executor(&session, &task) {
            Ok(child) => child,
            Err(e) => {
                error!(task_id = %task.id, error = %e, "failed to spawn executor");
                let _ = self.store.mark_task_failed(task.id, task.start_index, format!("spawn failed: {e}"));
                self.executions.lock().expect("executions lock poisoned").remove(&task.id);
                return;
            }
        };
        let _ = self.store.mark_task_running(task.id);

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = &mut cancel_rx => Outcome::Cancelled,
        };

        match outcome {
            Outcome::Exited(Ok(status)) if status.success() => {
                let messages = self.store.list_messages_for_task(task.id).unwrap_or_default();
                let end_index = messages.last().map(|m| m.index).unwrap_or(task.start_index);
                let _ = self.store.mark_task_completed(task.id, end_index);
                info!(task_id = %task.id, "task completed");
            }
            Outcome::Exited(Ok(status)) => {
                let _ = self
                    .store
                    .mark_task_failed(task.id, task.start_index, format!("executor exited with {status}"));
                warn!(task_id = %task.id, %status, "task failed");
            }
            Outcome::Exited(Err(e)) => {
                let _ = self.store.mark_task_failed(task.id, task.start_index, format!("wait failed: {e}"));
                error!(task_id = %task.id, error = %e, "failed to wait for executor");
            }
            Outcome::Cancelled => {
                self.terminate_gracefully(&mut child).await;
                let _ = self.store.mark_task_failed(task.id, task.start_index, ErrorKind::Cancelled.prefix());
                info!(task_id = %task.id, "task cancelled");
            }
        }

        self.executions.lock().expect("executions lock poisoned").remove(&task.id);
    }

    /// SIGTERM, wait up to `cancel_grace`, then SIGKILL.
    async fn terminate_gracefully(&self, child: &mut tokio::process::Child) {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
        }
        if tokio::time::timeout(self.cancel_grace, child.wait()).await.is_err() {
            warn!("executor did not exit within grace period, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Cancelled,
}

/// Mints the short-lived token the spawned executor presents back on every
/// RPC call. Signed with the same `AGOR_TOKEN_SECRET` `agor-gateway` verifies
/// against, scoped to the session's owner with the `Executor` role so the
/// gateway's ownership checks apply exactly as they would to the owner's own
/// requests.
fn session_token_for(session: &Session, token_secret: &[u8]) -> Result<String, AgorError> {
    let exp = chrono::Utc::now().timestamp() + EXECUTOR_TOKEN_TTL.as_secs() as i64;
    agor_proto::auth::sign(token_secret, &Claims { sub: session.owner, role: Role::Executor, exp })
}

impl TaskLauncher for Scheduler {
    fn launch(&self, session: Session, task: Task) {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.0
            .executions
            .lock()
            .expect("executions lock poisoned")
            .insert(task.id, Execution { cancel_tx });

        let inner = self.0.clone();
        tokio::spawn(inner.run_to_completion(session, task, cancel_rx));
    }

    fn cancel(&self, task_id: EntityId) {
        let mut executions = self.0.executions.lock().expect("executions lock poisoned");
        if let Some(execution) = executions.remove(&task_id) {
            let _ = execution.cancel_tx.send(());
        } else {
            warn!(%task_id, "cancel requested for a task with no running execution");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{ModelMode, ModelSelector, VendorFamily};

    use super::*;

    fn store() -> Arc<Store> {
        Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap())
    }

    fn test_secret() -> Arc<[u8]> {
        Arc::from(b"test-secret".as_slice())
    }

    fn session(store: &Store) -> Session {
        let s = Session::new(
            EntityId::new(),
            VendorFamily::ClaudeCode,
            EntityId::new(),
            "/tmp/wt",
            ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() },
        );
        store.create_session(&s).unwrap();
        s
    }

    #[test]
    fn reconcile_orphans_fails_running_sessions_with_open_tasks() {
        let store = store();
        let session = session(&store);
        let task = Task::new(session.id, "d", "p", 0);
        store.create_task(&task).unwrap();
        store.mark_session_running(session.id).unwrap();

        let scheduler = Scheduler::with_grace(store.clone(), PathBuf::from("/bin/true"), "http://localhost".into(), test_secret(), Duration::from_millis(10));
        let reconciled = scheduler.reconcile_orphans().unwrap();
        assert_eq!(reconciled, 1);
        let reloaded = store.find_task(task.id).unwrap();
        assert_eq!(reloaded.failure_reason.as_deref(), Some(ErrorKind::Orphaned.prefix()));
    }

    #[test]
    fn reconcile_orphans_skips_sessions_with_no_tasks() {
        let store = store();
        session(&store);
        let scheduler = Scheduler::new(store, PathBuf::from("/bin/true"), "http://localhost".into(), test_secret());
        assert_eq!(scheduler.reconcile_orphans().unwrap(), 0);
    }

    #[test]
    fn cancel_with_no_running_execution_is_a_no_op() {
        let store = store();
        let scheduler = Scheduler::new(store, PathBuf::from("/bin/true"), "http://localhost".into(), test_secret());
        scheduler.cancel(EntityId::new());
    }

    #[test]
    fn session_token_is_scoped_to_the_session_owner_as_executor() {
        let store = store();
        let session = session(&store);
        let token = session_token_for(&session, &test_secret()).unwrap();
        let claims = agor_proto::auth::verify(&test_secret(), &token, chrono::Utc::now().timestamp()).unwrap();
        assert_eq!(claims.sub, session.owner);
        assert_eq!(claims.role, Role::Executor);
    }
}
