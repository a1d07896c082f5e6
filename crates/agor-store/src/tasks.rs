// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, EntityId, Task, TaskStatus};
use agor_proto::{Event, EventVerb, Topic};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_task(&self, task: &Task) -> Result<(), AgorError> {
        let data = encode(task)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, session_id, status, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    task.id.to_string(),
                    task.session_id.to_string(),
                    status_str(task.status),
                    data,
                    task.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating task", e))?;
            Ok(())
        })?;
        self.append_session_task(task.session_id, task.id)?;
        self.publish(task.session_id, EventVerb::Created, task);
        Ok(())
    }

    pub fn find_task(&self, id: EntityId) -> Result<Task, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM tasks WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding task", e))?;
            decode(&data)
        })
    }

    pub fn list_tasks_for_session(&self, session_id: EntityId) -> Result<Vec<Task>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM tasks WHERE session_id = ?1 ORDER BY created_at ASC")
                .map_err(|e| map_rusqlite_err("listing tasks", e))?;
            let rows = stmt
                .query_map([session_id.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing tasks", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing tasks", e))?)?);
            }
            Ok(out)
        })
    }

    fn mutate_task(&self, id: EntityId, f: impl FnOnce(&mut Task)) -> Result<Task, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM tasks WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding task", e))?;
            let mut task: Task = decode(&data)?;
            f(&mut task);
            let updated = encode(&task)?;
            conn.execute(
                "UPDATE tasks SET status = ?1, data = ?2 WHERE id = ?3",
                rusqlite::params![status_str(task.status), updated, id.to_string()],
            )
            .map_err(|e| map_rusqlite_err("updating task", e))?;
            Ok(task)
        })
    }

    pub fn mark_task_running(&self, id: EntityId) -> Result<Task, AgorError> {
        let task = self.mutate_task(id, |t| t.mark_running())?;
        self.publish(task.session_id, EventVerb::Patched, &task);
        Ok(task)
    }

    /// Closes the task's message range and flips its session back to
    /// `Idle` in one call, since a task completing is the only thing that
    /// ends a session's busy period. `tool_use_count` and `resolved_model`
    /// are derived from the task's own messages here rather than threaded
    /// in by the caller, so the Task row (spec §4.5 step 6) reflects the
    /// same usage data `messages.attach_usage` already recorded on the
    /// last Message.
    pub fn mark_task_completed(&self, id: EntityId, end_index: u64) -> Result<Task, AgorError> {
        let messages = self.list_messages_for_task(id)?;
        let tool_use_count: u64 = messages.iter().map(|m| u64::from(m.tool_uses.count)).sum();
        let resolved_model = messages.iter().max_by_key(|m| m.index).and_then(|m| m.metadata.model.clone());
        let task = self.mutate_task(id, |t| {
            t.mark_completed(end_index);
            t.tool_use_count = tool_use_count;
            t.resolved_model = resolved_model.clone();
        })?;
        self.mark_session_idle(task.session_id)?;
        self.publish(task.session_id, EventVerb::Patched, &task);
        Ok(task)
    }

    pub fn mark_task_failed(&self, id: EntityId, end_index: u64, reason: impl Into<String>) -> Result<Task, AgorError> {
        let task = self.mutate_task(id, |t| t.mark_failed(end_index, reason))?;
        self.mark_session_idle(task.session_id)?;
        self.publish(task.session_id, EventVerb::Patched, &task);
        Ok(task)
    }

    fn publish(&self, session_id: EntityId, verb: EventVerb, task: &Task) {
        self.events().publish(
            &[Topic::Session { id: session_id }],
            Event {
                service: "tasks".into(),
                verb,
                payload: serde_json::to_value(task).unwrap_or_default(),
            },
        );
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{ModelMode, ModelSelector, Session, VendorFamily};

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
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
    fn creating_a_task_appends_it_to_the_session() {
        let store = store();
        let session = session(&store);
        let task = Task::new(session.id, "say hi", "say hi", 0);
        store.create_task(&task).unwrap();
        let reloaded = store.find_session(session.id).unwrap();
        assert_eq!(reloaded.task_ids, vec![task.id]);
    }

    #[test]
    fn completing_a_task_returns_its_session_to_idle() {
        let store = store();
        let session = session(&store);
        let task = Task::new(session.id, "say hi", "say hi", 0);
        store.create_task(&task).unwrap();
        store.mark_session_running(session.id).unwrap();
        store.mark_task_completed(task.id, 3).unwrap();
        let reloaded = store.find_session(session.id).unwrap();
        assert_eq!(reloaded.status, agor_model::SessionStatus::Idle);
    }

    #[test]
    fn completing_a_task_captures_tool_use_count_and_resolved_model() {
        use agor_model::{Message, MessageContent, MessageMetadata, Role};

        let store = store();
        let session = session(&store);
        let task = Task::new(session.id, "say hi", "say hi", 0);
        store.create_task(&task).unwrap();

        let mut with_tool = Message::draft(
            session.id,
            Some(task.id),
            Role::Assistant,
            MessageContent::Blocks(vec![agor_model::Block::ToolUse {
                id: "call_1".into(),
                name: "shell".into(),
                input: serde_json::json!({}),
            }]),
        );
        with_tool.metadata = MessageMetadata { model: Some("claude-sonnet-4".into()), input_tokens: 10, output_tokens: 20 };
        store.append_message(with_tool).unwrap();

        let completed = store.mark_task_completed(task.id, 1).unwrap();
        assert_eq!(completed.tool_use_count, 1);
        assert_eq!(completed.resolved_model.as_deref(), Some("claude-sonnet-4"));
    }
}
