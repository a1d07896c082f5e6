// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Durable side of the Permission Arbiter (C9): the
//! `permission_request` entity is written to the store so it fans out over
//! the event bus exactly like any other mutation, even though the thing
//! actually blocking on a decision (`agor-permission::Arbiter`) lives
//! entirely in the gateway process's memory.

use agor_model::{AgorError, EntityId, PermissionRequest};
use agor_proto::{Event, EventVerb, Topic};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_permission_request(&self, request: &PermissionRequest) -> Result<(), AgorError> {
        let data = encode(request)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO permission_requests (id, task_id, session_id, decided, data, created_at) VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                rusqlite::params![
                    request.id.to_string(),
                    request.task_id.to_string(),
                    request.session_id.to_string(),
                    data,
                    request.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating permission request", e))?;
            Ok(())
        })?;
        self.events().publish(
            &[Topic::Session { id: request.session_id }],
            Event {
                service: "permission_requests".into(),
                verb: EventVerb::Created,
                payload: serde_json::to_value(request).unwrap_or_default(),
            },
        );
        Ok(())
    }

    pub fn find_permission_request(&self, id: EntityId) -> Result<PermissionRequest, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row("SELECT data FROM permission_requests WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .map_err(|e| map_rusqlite_err("finding permission request", e))?;
            decode(&data)
        })
    }

    /// `permissions.decide` must apply at most once. Returns `Conflict` if
    /// the row was already marked decided.
    pub fn mark_permission_request_decided(&self, id: EntityId) -> Result<(), AgorError> {
        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE permission_requests SET decided = 1 WHERE id = ?1 AND decided = 0",
                    [id.to_string()],
                )
                .map_err(|e| map_rusqlite_err("deciding permission request", e))?;
            if updated == 0 {
                return Err(AgorError::conflict(format!("permission request {id} was already decided")));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
    }

    #[test]
    fn create_then_find_round_trips() {
        let store = store();
        let req = PermissionRequest::new(EntityId::new(), EntityId::new(), "shell", "rm -rf /tmp/x");
        store.create_permission_request(&req).unwrap();
        let found = store.find_permission_request(req.id).unwrap();
        assert_eq!(found.tool_name, "shell");
    }

    #[test]
    fn deciding_twice_is_rejected() {
        let store = store();
        let req = PermissionRequest::new(EntityId::new(), EntityId::new(), "shell", "ls");
        store.create_permission_request(&req).unwrap();
        store.mark_permission_request_decided(req.id).unwrap();
        let err = store.mark_permission_request_decided(req.id).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Conflict);
    }
}
