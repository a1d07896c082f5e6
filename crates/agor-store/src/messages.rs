// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, EntityId, Message, MessageMetadata};
use agor_proto::{Event, EventVerb, Topic};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    /// Assigns the next dense index for `draft.session_id` and inserts the
    /// message inside one transaction. The
    /// connection-wide lock held by `with_conn` is what actually prevents
    /// two concurrent appenders from racing on the same index; the SQLite
    /// `UNIQUE(session_id, idx)` constraint is the backstop if that
    /// invariant is ever violated by a future caller that bypasses the
    /// lock (e.g. a second process pointed at the same file).
    pub fn append_message(&self, mut draft: Message) -> Result<Message, AgorError> {
        let saved = self.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| map_rusqlite_err("starting message append", e))?;
            let next_index: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(idx), -1) + 1 FROM messages WHERE session_id = ?1",
                    [draft.session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("allocating message index", e))?;
            draft.index = next_index as u64;
            let data = encode(&draft)?;
            tx.execute(
                "INSERT INTO messages (id, session_id, idx, task_id, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    draft.id.to_string(),
                    draft.session_id.to_string(),
                    draft.index as i64,
                    draft.task_id.map(|id| id.to_string()),
                    data,
                    draft.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("inserting message", e))?;
            tx.commit().map_err(|e| map_rusqlite_err("committing message append", e))?;
            Ok(draft)
        })?;

        let tool_use_delta = saved.tool_uses.count as u64;
        self.record_session_message(saved.session_id, tool_use_delta)?;
        self.events().publish(
            &[Topic::Session { id: saved.session_id }],
            Event {
                service: "messages".into(),
                verb: EventVerb::Created,
                payload: serde_json::to_value(&saved).unwrap_or_default(),
            },
        );
        Ok(saved)
    }

    pub fn set_message_metadata(&self, id: EntityId, metadata: MessageMetadata) -> Result<Message, AgorError> {
        let updated = self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM messages WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding message", e))?;
            let mut message: Message = decode(&data)?;
            message.metadata = metadata;
            let encoded = encode(&message)?;
            conn.execute("UPDATE messages SET data = ?1 WHERE id = ?2", rusqlite::params![encoded, id.to_string()])
                .map_err(|e| map_rusqlite_err("updating message metadata", e))?;
            Ok(message)
        })?;
        self.events().publish(
            &[Topic::Session { id: updated.session_id }],
            Event {
                service: "messages".into(),
                verb: EventVerb::Patched,
                payload: serde_json::to_value(&updated).unwrap_or_default(),
            },
        );
        Ok(updated)
    }

    pub fn find_message(&self, id: EntityId) -> Result<Message, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM messages WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding message", e))?;
            decode(&data)
        })
    }

    pub fn list_messages_for_session(&self, session_id: EntityId) -> Result<Vec<Message>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM messages WHERE session_id = ?1 ORDER BY idx ASC")
                .map_err(|e| map_rusqlite_err("listing messages", e))?;
            let rows = stmt
                .query_map([session_id.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing messages", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing messages", e))?)?);
            }
            Ok(out)
        })
    }

    pub fn list_messages_for_task(&self, task_id: EntityId) -> Result<Vec<Message>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM messages WHERE task_id = ?1 ORDER BY idx ASC")
                .map_err(|e| map_rusqlite_err("listing messages for task", e))?;
            let rows = stmt
                .query_map([task_id.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing messages for task", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing messages for task", e))?)?);
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{MessageContent, ModelMode, ModelSelector, Role, Session, VendorFamily};

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
    }

    fn session(store: &Store) -> EntityId {
        let s = Session::new(
            EntityId::new(),
            VendorFamily::ClaudeCode,
            EntityId::new(),
            "/tmp/wt",
            ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() },
        );
        store.create_session(&s).unwrap();
        s.id
    }

    #[test]
    fn appended_messages_get_dense_monotonic_indices() {
        let store = store();
        let session_id = session(&store);
        let first = store
            .append_message(Message::user_text(session_id, None, "hi"))
            .unwrap();
        let second = store
            .append_message(Message::draft(session_id, None, Role::Assistant, MessageContent::Text("hello".into())))
            .unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
    }

    #[test]
    fn appending_updates_session_message_count() {
        let store = store();
        let session_id = session(&store);
        store.append_message(Message::user_text(session_id, None, "hi")).unwrap();
        let updated = store.find_session(session_id).unwrap();
        assert_eq!(updated.message_count, 1);
    }

    #[test]
    fn set_message_metadata_overwrites_without_touching_content() {
        let store = store();
        let session_id = session(&store);
        let saved = store.append_message(Message::user_text(session_id, None, "hi")).unwrap();
        let metadata = agor_model::MessageMetadata {
            model: Some("claude-sonnet-4".into()),
            input_tokens: 10,
            output_tokens: 20,
        };
        let updated = store.set_message_metadata(saved.id, metadata).unwrap();
        assert_eq!(updated.metadata.model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(updated.content.as_plain_text().as_deref(), Some("hi"));
    }

    #[test]
    fn messages_list_in_index_order() {
        let store = store();
        let session_id = session(&store);
        for i in 0..3 {
            store
                .append_message(Message::user_text(session_id, None, format!("msg {i}")))
                .unwrap();
        }
        let listed = store.list_messages_for_session(session_id).unwrap();
        let indices: Vec<u64> = listed.iter().map(|m| m.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
