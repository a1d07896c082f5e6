// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agor_model::{AgorError, EntityId, Message, Session, Task};
use agor_store::Store;

use crate::{require_owner, Principal};

/// Handed to the Service Layer by whatever owns task execution
/// (`agor-scheduler` in this workspace). Kept as a plain
/// synchronous trait so `agor-service` never needs to depend on tokio: the
/// scheduler's implementation just enqueues onto its own channel.
pub trait TaskLauncher: Send + Sync {
    fn launch(&self, session: Session, task: Task);
    fn cancel(&self, task_id: EntityId);
}

pub struct SessionService {
    store: Arc<Store>,
    launcher: Arc<dyn TaskLauncher>,
}

impl SessionService {
    pub fn new(store: Arc<Store>, launcher: Arc<dyn TaskLauncher>) -> Self {
        Self { store, launcher }
    }

    pub fn get(&self, principal: &Principal, id: EntityId) -> Result<Session, AgorError> {
        let session = self.store.find_session(id)?;
        require_owner(principal, session.owner)?;
        Ok(session)
    }

    pub fn list(&self, principal: &Principal) -> Result<Vec<Session>, AgorError> {
        self.store.list_sessions_for_owner(principal.user)
    }

    pub fn create(&self, principal: &Principal, session: Session) -> Result<Session, AgorError> {
        require_owner(principal, session.owner)?;
        self.store.create_session(&session)?;
        Ok(session)
    }

    /// `sessions.prompt`: appends the user's message,
    /// opens a new `Task` over it, and hands the pair to the launcher.
    /// Rejects with `Conflict` if the session is already running one
    /// (`Store::mark_session_running` is the single place that enforces
    /// this, so the check can't race a second `prompt` call).
    pub fn prompt(&self, principal: &Principal, session_id: EntityId, prompt: impl Into<String>) -> Result<Task, AgorError> {
        let session = self.get(principal, session_id)?;
        let prompt = prompt.into();
        let running = self.store.mark_session_running(session_id)?;

        let message = Message::user_text(session_id, None, prompt.clone());
        let saved_message = self.store.append_message(message)?;

        let task = Task::new(session_id, summarize(&prompt), prompt, saved_message.index);
        self.store.create_task(&task)?;

        self.launcher.launch(running, task.clone());
        Ok(task)
    }

    /// A fresh sibling conversation: drops the vendor resume
    /// token, keeps permissions and model.
    pub fn fork(&self, principal: &Principal, session_id: EntityId, fork_point_task: EntityId) -> Result<Session, AgorError> {
        let parent = self.get(principal, session_id)?;
        let child = parent.fork(fork_point_task);
        self.store.create_session(&child)?;
        Ok(child)
    }

    /// A true child conversation: inherits config but is a
    /// distinct entity in its own right, tracked under the parent's
    /// `genealogy.children`.
    pub fn spawn(&self, principal: &Principal, session_id: EntityId, spawn_point_task: EntityId) -> Result<Session, AgorError> {
        let parent = self.get(principal, session_id)?;
        let child = parent.spawn_child(spawn_point_task);
        self.store.create_session(&child)?;
        Ok(child)
    }

    /// `sessions.cancel`: tells the scheduler to tear down the running
    /// execution. The session/task transition to `Cancelled`/`Idle` is
    /// driven by the scheduler observing the executor exit, not by this
    /// call directly.
    pub fn cancel(&self, principal: &Principal, session_id: EntityId) -> Result<(), AgorError> {
        let session = self.get(principal, session_id)?;
        if !session.is_busy() {
            return Err(AgorError::new(
                agor_model::ErrorKind::Conflict,
                format!("session {session_id} has no running task to cancel"),
            ));
        }
        let Some(task_id) = session.task_ids.last().copied() else {
            return Err(AgorError::internal("busy session has no tasks"));
        };
        self.launcher.cancel(task_id);
        Ok(())
    }

    pub fn allow_tool(&self, principal: &Principal, session_id: EntityId, tool_name: impl Into<String>) -> Result<Session, AgorError> {
        self.get(principal, session_id)?;
        self.store.allow_session_tool(session_id, tool_name.into())
    }

    /// `sessions.patch(agent_session_id=…)`: the executor
    /// persists the vendor's opaque resume token the first time the adapter
    /// emits one. Called with the executor's own session token, whose
    /// principal is the session's owner (minted at spawn time), so the
    /// ordinary ownership check still applies.
    pub fn set_vendor_resume_token(&self, principal: &Principal, session_id: EntityId, token: impl Into<String>) -> Result<Session, AgorError> {
        self.get(principal, session_id)?;
        self.store.set_session_vendor_resume_token(session_id, Some(token.into()))
    }
}

fn summarize(prompt: &str) -> String {
    const MAX: usize = 80;
    let mut chars = prompt.chars();
    let truncated: String = chars.by_ref().take(MAX).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use agor_events::EventBus;
    use agor_model::{ModelMode, ModelSelector, VendorFamily};

    use super::*;

    struct RecordingLauncher {
        launched: Mutex<Vec<EntityId>>,
        cancelled: Mutex<Vec<EntityId>>,
    }

    impl RecordingLauncher {
        fn new() -> Self {
            Self { launched: Mutex::new(Vec::new()), cancelled: Mutex::new(Vec::new()) }
        }
    }

    impl TaskLauncher for RecordingLauncher {
        fn launch(&self, _session: Session, task: Task) {
            self.launched.lock().unwrap().push(task.id);
        }
        fn cancel(&self, task_id: EntityId) {
            self.cancelled.lock().unwrap().push(task_id);
        }
    }

    fn service() -> (SessionService, Principal, Arc<RecordingLauncher>) {
        let store = Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap());
        let launcher = Arc::new(RecordingLauncher::new());
        let service = SessionService::new(store, launcher.clone());
        (service, Principal::new(EntityId::new()), launcher)
    }

    fn new_session(owner: EntityId) -> Session {
        Session::new(
            owner,
            VendorFamily::ClaudeCode,
            EntityId::new(),
            "/tmp/wt",
            ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() },
        )
    }

    #[test]
    fn prompt_creates_a_task_and_launches_it() {
        let (service, principal, launcher) = service();
        let session = service.create(&principal, new_session(principal.user)).unwrap();
        let task = service.prompt(&principal, session.id, "hello").unwrap();
        assert_eq!(launcher.launched.lock().unwrap().as_slice(), &[task.id]);
    }

    #[test]
    fn non_owner_cannot_prompt() {
        let (service, principal, _launcher) = service();
        let other_owner = EntityId::new();
        let session_store_only = new_session(other_owner);
        // bypass the service's create() so the store has a session this
        // principal doesn't own
        service_store(&service).create_session(&session_store_only).unwrap();
        let err = service.prompt(&principal, session_store_only.id, "hi").unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Forbidden);
    }

    #[test]
    fn cancel_without_a_running_task_is_conflict() {
        let (service, principal, _launcher) = service();
        let session = service.create(&principal, new_session(principal.user)).unwrap();
        let err = service.cancel(&principal, session.id).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Conflict);
    }

    #[test]
    fn fork_drops_resume_token() {
        let (service, principal, _launcher) = service();
        let mut session = new_session(principal.user);
        session.vendor_resume_token = Some("tok".into());
        let session = service.create(&principal, session).unwrap();
        let task_id = EntityId::new();
        let forked = service.fork(&principal, session.id, task_id).unwrap();
        assert!(forked.vendor_resume_token.is_none());
        assert_eq!(forked.genealogy.forked_from, Some(session.id));
    }

    // test-only helper exposing the store a SessionService wraps, to set up
    // fixtures that don't go through ownership-checked entry points.
    fn service_store(service: &SessionService) -> &Store {
        &service.store
    }

    #[test]
    fn summarize_truncates_on_a_char_boundary_not_a_byte_offset() {
        // 80 'é' (2 bytes each) straddle byte offset 80 mid-character; a
        // byte-index slice there would panic.
        let prompt: String = std::iter::repeat('é').take(90).collect();
        let summary = summarize(&prompt);
        assert_eq!(summary.chars().count(), 81);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn summarize_leaves_short_prompts_untouched() {
        assert_eq!(summarize("hi"), "hi");
    }
}
