// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agor_model::{AgorError, EntityId, Task};
use agor_store::Store;

use crate::{require_owner, Principal};

/// Read-only view onto Tasks for clients.
/// Terminal-state transitions (`completed`/`failed`) are the Scheduler's
/// exclusive responsibility — this service never writes.
pub struct TaskService {
    store: Arc<Store>,
}

impl TaskService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, principal: &Principal, session_id: EntityId, task_id: EntityId) -> Result<Task, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        let task = self.store.find_task(task_id)?;
        if task.session_id != session_id {
            return Err(AgorError::not_found(format!("task {task_id} not in session {session_id}")));
        }
        Ok(task)
    }

    pub fn list_for_session(&self, principal: &Principal, session_id: EntityId) -> Result<Vec<Task>, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        self.store.list_tasks_for_session(session_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{Message, ModelMode, ModelSelector, Session, VendorFamily};

    use super::*;

    #[test]
    fn list_is_scoped_to_the_owning_session() {
        let store = Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap());
        let owner = EntityId::new();
        let session = Session::new(owner, VendorFamily::ClaudeCode, EntityId::new(), "/tmp/wt", ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() });
        store.create_session(&session).unwrap();
        let message = store.append_message(Message::user_text(session.id, None, "hi")).unwrap();
        let task = Task::new(session.id, "desc", "hi", message.index);
        store.create_task(&task).unwrap();

        let service = TaskService::new(store);
        let principal = Principal::new(owner);
        assert_eq!(service.list_for_session(&principal, session.id).unwrap().len(), 1);

        let intruder = Principal::new(EntityId::new());
        assert!(service.list_for_session(&intruder, session.id).is_err());
    }
}
