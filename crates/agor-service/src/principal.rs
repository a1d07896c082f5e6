// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::EntityId;

/// The authenticated caller, injected into every request as `params.user`
///. The gateway resolves this from the bearer token before
/// calling into the service layer; nothing below this point trusts a
/// caller-supplied user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user: EntityId,
}

impl Principal {
    pub fn new(user: EntityId) -> Self {
        Self { user }
    }
}
