// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Permission Arbiter (C9): brokers a synchronous tool-use approval
//! between a blocked Vendor Tool Adapter callback and whichever of the
//! principal's clients answers first.
//!
//! Generalizes a prior `ControlService`
//! `pending_approvals: HashMap<String, oneshot::Sender<ApprovalDecision>>`
//! (`sven-node/src/control/service.rs`) from one in-memory session map into
//! a store-backed entity with a timeout-to-deny default and scope-widening
//! on allow.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::warn;

use agor_model::{AgorError, EntityId, PermissionDecision, PermissionRequest};
use agor_store::Store;

/// No less than 30s by design; this is the default when the caller doesn't
/// override it from configuration.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Arbiter {
    store: Arc<Store>,
    timeout: Duration,
    pending: Mutex<HashMap<EntityId, oneshot::Sender<PermissionDecision>>>,
}

impl Arbiter {
    pub fn new(store: Arc<Store>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_timeout(store: Arc<Store>) -> Self {
        Self::new(store, DEFAULT_TIMEOUT)
    }

    /// Snapshot of request ids currently awaiting a `decide` call. Exists for
    /// tests and introspection; ordinary callers learn the request id from
    /// wherever they submitted the request, not from this list.
    pub async fn pending_request_ids(&self) -> Vec<EntityId> {
        self.pending.lock().await.keys().copied().collect()
    }

    /// Called from a Vendor Tool Adapter's `on_permission_request` callback.
    /// Blocks until a client decides or the timeout elapses, whichever comes
    /// first, then (if the decision widens the allow-list) updates the
    /// session before returning.
    pub async fn request(
        &self,
        task_id: EntityId,
        session_id: EntityId,
        tool_name: impl Into<String>,
        input_preview: impl Into<String>,
    ) -> Result<PermissionDecision, AgorError> {
        let tool_name = tool_name.into();
        let req = PermissionRequest::new(task_id, session_id, tool_name.clone(), input_preview);
        self.store.create_permission_request(&req)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(req.id, tx);

        let decision = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(decision)) => decision,
            // Sender half dropped without a decision (arbiter being torn
            // down mid-request): default-deny, same as a timeout.
            Ok(Err(_)) => PermissionDecision::deny(),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&req.id);
                if let Err(err) = self.store.mark_permission_request_decided(req.id) {
                    warn!(request_id = %req.id, %err, "permission request timed out but could not be marked decided, a racing decide() may have already claimed it");
                }
                PermissionDecision::deny()
            }
        };

        if decision.widens_allow_list() {
            self.store.allow_session_tool(session_id, tool_name)?;
        }

        Ok(decision)
    }

    /// The `permissions.decide` verb: the first caller to
    /// reach a still-pending request wins, every later one is rejected.
    pub async fn decide(&self, request_id: EntityId, decision: PermissionDecision) -> Result<(), AgorError> {
        let tx = self.pending.lock().await.remove(&request_id);
        let tx = tx.ok_or_else(|| AgorError::not_found(format!("no pending permission request {request_id}")))?;
        self.store.mark_permission_request_decided(request_id)?;
        // The receiving `request()` call may already have timed out and
        // dropped `rx` in the tiny window between the two lock acquisitions
        // above; a dropped-receiver send error is not actionable here.
        let _ = tx.send(decision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use agor_events::EventBus;
    use agor_model::{ModelMode, ModelSelector, PermissionScope, VendorFamily};

    use super::*;

    fn store() -> Arc<Store> {
        Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap())
    }

    fn session(store: &Store, owner: EntityId) -> agor_model::Session {
        let s = agor_model::Session::new(owner, VendorFamily::ClaudeCode, EntityId::new(), "/tmp/wt", ModelSelector { mode: ModelMode::Alias, model: "sonnet".into() });
        store.create_session(&s).unwrap();
        s
    }

    #[tokio::test]
    async fn a_session_scoped_allow_widens_the_sessions_allow_list() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let arbiter = Arc::new(Arbiter::new(store.clone(), Duration::from_secs(5)));
        let task_id = EntityId::new();

        let arbiter_clone = arbiter.clone();
        let requester = tokio::spawn(async move {
            arbiter_clone.request(task_id, session.id, "shell", "rm file").await
        });

        // Give the requester a moment to register before deciding.
        tokio::task::yield_now().await;
        let pending_id = find_only_pending(&arbiter).await;
        arbiter
            .decide(pending_id, PermissionDecision { allow: true, scope: PermissionScope::Session })
            .await
            .unwrap();

        let decision = requester.await.unwrap().unwrap();
        assert!(decision.allow);
        let reloaded = store.find_session(session.id).unwrap();
        assert!(reloaded.permissions.allows("shell"));
    }

    #[tokio::test]
    async fn no_decision_before_the_timeout_defaults_to_deny() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let arbiter = Arbiter::new(store.clone(), Duration::from_millis(20));

        let decision = arbiter.request(EntityId::new(), session.id, "shell", "ls").await.unwrap();
        assert!(!decision.allow);
    }

    #[tokio::test]
    async fn deciding_an_unknown_request_is_rejected() {
        let store = store();
        let arbiter = Arbiter::new(store, Duration::from_secs(5));
        let err = arbiter
            .decide(EntityId::new(), PermissionDecision::allow_once())
            .await
            .unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deciding_twice_rejects_the_second_caller() {
        let store = store();
        let owner = EntityId::new();
        let session = session(&store, owner);
        let arbiter = Arc::new(Arbiter::new(store.clone(), Duration::from_secs(5)));
        let task_id = EntityId::new();

        let arbiter_clone = arbiter.clone();
        let requester = tokio::spawn(async move {
            arbiter_clone.request(task_id, session.id, "shell", "ls").await
        });
        tokio::task::yield_now().await;
        let pending_id = find_only_pending(&arbiter).await;

        arbiter.decide(pending_id, PermissionDecision::allow_once()).await.unwrap();
        let second = arbiter.decide(pending_id, PermissionDecision::deny()).await;
        assert!(second.is_err());
        requester.await.unwrap().unwrap();
    }

    async fn find_only_pending(arbiter: &Arbiter) -> EntityId {
        let pending = arbiter.pending.lock().await;
        *pending.keys().next().expect("a pending request should be registered")
    }
}
