// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agor_model::{AgorError, EntityId, Message, MessageMetadata};
use agor_store::Store;

use crate::{require_owner, Principal};

/// `messages.create`: the only write path an executor
/// uses to stream a session's output back through the daemon. One call per
/// block/delta the adapter hands the executor — never buffered.
pub struct MessageService {
    store: Arc<Store>,
}

impl MessageService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// `append_message` already bumps the session's `message_count`/
    /// `tool_use_count` inside the same transaction, so this is a thin
    /// ownership-checked wrapper, not a second writer.
    pub fn create(&self, principal: &Principal, draft: Message) -> Result<Message, AgorError> {
        let session = self.store.find_session(draft.session_id)?;
        require_owner(principal, session.owner)?;
        self.store.append_message(draft)
    }

    pub fn list_for_session(&self, principal: &Principal, session_id: EntityId) -> Result<Vec<Message>, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        self.store.list_messages_for_session(session_id)
    }

    pub fn list_for_task(&self, principal: &Principal, session_id: EntityId, task_id: EntityId) -> Result<Vec<Message>, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        self.store.list_messages_for_task(task_id)
    }

    /// `messages.attach_usage`: the executor's final
    /// callback records resolved model and token counts on the last
    /// Message of the task rather than patching Task directly — Task's
    /// terminal transition stays the Scheduler's exclusive write.
    pub fn attach_usage(
        &self,
        principal: &Principal,
        session_id: EntityId,
        task_id: EntityId,
        model: impl Into<String>,
        input_tokens: u32,
        output_tokens: u32,
    ) -> Result<Option<Message>, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        let messages = self.store.list_messages_for_task(task_id)?;
        let Some(last) = messages.into_iter().max_by_key(|m| m.index) else {
            return Ok(None);
        };
        let metadata = MessageMetadata {
            model: Some(model.into()),
            input_tokens,
            output_tokens,
        };
        self.store.set_message_metadata(last.id, metadata).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::{ModelMode, ModelSelector, Role, Session, VendorFamily};

    use super::*;

    fn service_with_session() -> (MessageService, Principal, Session) {
        let store = Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap());
        let owner = EntityId::new();
        let session = Session::new(owner, VendorFamily::ClaudeCode, EntityId::new(), "/tmp/wt", ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() });
        store.create_session(&session).unwrap();
        (MessageService::new(store), Principal::new(owner), session)
    }

    #[test]
    fn creating_a_message_bumps_session_message_count() {
        let (service, principal, session) = service_with_session();
        let draft = Message::user_text(session.id, None, "hi");
        service.create(&principal, draft).unwrap();
        let reloaded = service.list_for_session(&principal, session.id).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn non_owner_cannot_append_a_message() {
        let (service, _principal, session) = service_with_session();
        let intruder = Principal::new(EntityId::new());
        let draft = Message::draft(session.id, None, Role::Assistant, agor_model::MessageContent::Text("x".into()));
        let err = service.create(&intruder, draft).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Forbidden);
    }
}
