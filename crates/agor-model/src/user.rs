// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Identity used for ownership, token scoping, and per-user env-var secret
/// storage. The `env` map backs the `{{ user.env.X }}` templates
/// the MCP Resolver renders, restricted at render time to the
/// `AGOR_USER_ENV_KEYS` allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            username: username.into(),
            env: HashMap::new(),
            created_at: crate::ids::now(),
        }
    }
}
