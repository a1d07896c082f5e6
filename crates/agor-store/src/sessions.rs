// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, EntityId, Session, SessionStatus};
use agor_proto::{Event, EventVerb, Topic};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_session(&self, session: &Session) -> Result<(), AgorError> {
        let data = encode(session)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, owner, status, worktree_id, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    session.id.to_string(),
                    session.owner.to_string(),
                    status_str(session.status),
                    session.worktree_id.to_string(),
                    data,
                    session.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating session", e))?;
            Ok(())
        })?;
        self.publish(session.id, EventVerb::Created, session);
        // Invariant: "∀ session with parent_session, that parent's
        // genealogy.children includes this session id". A spawn
        // is the only path that sets parent_session; a fork leaves the
        // parent's children untouched.
        if let Some(parent_id) = session.genealogy.parent_session {
            let child_id = session.id;
            let parent = self.mutate_session(parent_id, |p| {
                if !p.genealogy.children.contains(&child_id) {
                    p.genealogy.children.push(child_id);
                }
            })?;
            self.publish(parent_id, EventVerb::Patched, &parent);
        }
        Ok(())
    }

    pub fn find_session(&self, id: EntityId) -> Result<Session, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM sessions WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding session", e))?;
            decode(&data)
        })
    }

    /// Cross-owner query used only by the scheduler's startup orphan
    /// reconciliation — nothing user-facing should ever list
    /// every session regardless of ownership.
    pub fn list_running_sessions(&self) -> Result<Vec<Session>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM sessions WHERE status = 'running'")
                .map_err(|e| map_rusqlite_err("listing running sessions", e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing running sessions", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing running sessions", e))?)?);
            }
            Ok(out)
        })
    }

    pub fn list_sessions_for_owner(&self, owner: EntityId) -> Result<Vec<Session>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM sessions WHERE owner = ?1 ORDER BY created_at ASC")
                .map_err(|e| map_rusqlite_err("listing sessions", e))?;
            let rows = stmt
                .query_map([owner.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing sessions", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing sessions", e))?)?);
            }
            Ok(out)
        })
    }

    fn mutate_session(&self, id: EntityId, f: impl FnOnce(&mut Session)) -> Result<Session, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM sessions WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding session", e))?;
            let mut session: Session = decode(&data)?;
            f(&mut session);
            session.updated_at = agor_model::now();
            let updated = encode(&session)?;
            conn.execute(
                "UPDATE sessions SET status = ?1, data = ?2 WHERE id = ?3",
                rusqlite::params![status_str(session.status), updated, id.to_string()],
            )
            .map_err(|e| map_rusqlite_err("updating session", e))?;
            Ok(session)
        })
    }

    /// Transitions a session into `Running`, rejecting the call if it is
    /// already busy (spec invariant: "at most one running task per
    /// session" / `AgorError::busy`).
    pub fn mark_session_running(&self, id: EntityId) -> Result<Session, AgorError> {
        let current = self.find_session(id)?;
        if current.is_busy() {
            return Err(AgorError::busy(id));
        }
        let session = self.mutate_session(id, |s| s.status = SessionStatus::Running)?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    pub fn mark_session_idle(&self, id: EntityId) -> Result<Session, AgorError> {
        let session = self.mutate_session(id, |s| s.status = SessionStatus::Idle)?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    pub fn mark_session_failed(&self, id: EntityId) -> Result<Session, AgorError> {
        let session = self.mutate_session(id, |s| s.status = SessionStatus::Failed)?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    /// Idempotent: setting the same token twice is a no-op patch, not an
    /// error.
    pub fn set_session_vendor_resume_token(&self, id: EntityId, token: Option<String>) -> Result<Session, AgorError> {
        let session = self.mutate_session(id, |s| s.vendor_resume_token = token)?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    pub fn append_session_task(&self, id: EntityId, task_id: EntityId) -> Result<Session, AgorError> {
        let session = self.mutate_session(id, |s| s.task_ids.push(task_id))?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    pub fn record_session_message(&self, id: EntityId, tool_use_delta: u64) -> Result<Session, AgorError> {
        let session = self.mutate_session(id, |s| {
            s.message_count += 1;
            s.tool_use_count += tool_use_delta;
        })?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    pub fn allow_session_tool(&self, id: EntityId, tool_name: String) -> Result<Session, AgorError> {
        let session = self.mutate_session(id, |s| s.permissions.allow(tool_name))?;
        self.publish(id, EventVerb::Patched, &session);
        Ok(session)
    }

    fn publish(&self, id: EntityId, verb: EventVerb, session: &Session) {
        self.events().publish(
            &[Topic::Session { id }],
            Event {
                service: "sessions".into(),
                verb,
                payload: serde_json::to_value(session).unwrap_or_default(),
            },
        );
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Idle => "idle",
        SessionStatus::Running => "running",
        SessionStatus::Completed => "completed",
        SessionStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{ModelMode, ModelSelector, VendorFamily};

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
    }

    fn sample() -> Session {
        Session::new(
            EntityId::new(),
            VendorFamily::ClaudeCode,
            EntityId::new(),
            "/tmp/wt",
            ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() },
        )
    }

    #[test]
    fn create_then_find_round_trips() {
        let store = store();
        let session = sample();
        store.create_session(&session).unwrap();
        let found = store.find_session(session.id).unwrap();
        assert_eq!(found.status, SessionStatus::Idle);
    }

    #[test]
    fn marking_running_twice_is_busy_conflict() {
        let store = store();
        let session = sample();
        store.create_session(&session).unwrap();
        store.mark_session_running(session.id).unwrap();
        let err = store.mark_session_running(session.id).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Conflict);
    }

    #[test]
    fn set_resume_token_is_idempotent() {
        let store = store();
        let session = sample();
        store.create_session(&session).unwrap();
        store.set_session_vendor_resume_token(session.id, Some("tok-1".into())).unwrap();
        let again = store.set_session_vendor_resume_token(session.id, Some("tok-1".into())).unwrap();
        assert_eq!(again.vendor_resume_token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn record_message_increments_counters() {
        let store = store();
        let session = sample();
        store.create_session(&session).unwrap();
        let updated = store.record_session_message(session.id, 2).unwrap();
        assert_eq!(updated.message_count, 1);
        assert_eq!(updated.tool_use_count, 2);
    }

    #[test]
    fn spawning_a_child_registers_it_on_the_parents_genealogy() {
        let store = store();
        let parent = sample();
        store.create_session(&parent).unwrap();
        let task_id = EntityId::new();
        let child = parent.spawn_child(task_id);
        store.create_session(&child).unwrap();
        let reloaded_parent = store.find_session(parent.id).unwrap();
        assert_eq!(reloaded_parent.genealogy.children, vec![child.id]);
    }

    #[test]
    fn forking_does_not_touch_the_parents_genealogy() {
        let store = store();
        let parent = sample();
        store.create_session(&parent).unwrap();
        let task_id = EntityId::new();
        let child = parent.fork(task_id);
        store.create_session(&child).unwrap();
        let reloaded_parent = store.find_session(parent.id).unwrap();
        assert!(reloaded_parent.genealogy.children.is_empty());
    }
}
