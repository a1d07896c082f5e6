// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agor_model::{AgorError, EntityId, PermissionDecision};
use agor_permission::Arbiter;
use agor_store::Store;

use crate::{require_owner, Principal};

/// `permissions.decide`: any of the principal's own
/// clients may answer a pending request, so the ownership check here is
/// against the request's session owner, not against the request itself.
pub struct PermissionService {
    store: Arc<Store>,
    arbiter: Arc<Arbiter>,
}

impl PermissionService {
    pub fn new(store: Arc<Store>, arbiter: Arc<Arbiter>) -> Self {
        Self { store, arbiter }
    }

    /// The executor's `permissions.request` call: raised by a blocked Vendor
    /// Tool Adapter callback, relayed here over the same RPC link every
    /// other caller uses. Blocks for up to the arbiter's timeout.
    pub async fn request(
        &self,
        principal: &Principal,
        task_id: EntityId,
        session_id: EntityId,
        tool_name: impl Into<String>,
        input_preview: impl Into<String>,
    ) -> Result<PermissionDecision, AgorError> {
        let session = self.store.find_session(session_id)?;
        require_owner(principal, session.owner)?;
        self.arbiter.request(task_id, session_id, tool_name, input_preview).await
    }

    pub async fn decide(&self, principal: &Principal, request_id: EntityId, decision: PermissionDecision) -> Result<(), AgorError> {
        let request = self.store.find_permission_request(request_id)?;
        let session = self.store.find_session(request.session_id)?;
        require_owner(principal, session.owner)?;
        self.arbiter.decide(request_id, decision).await
    }
}
