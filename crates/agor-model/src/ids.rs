// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque entity identifier.
///
/// A simpler id scheme mints plain `Uuid::new_v4` ids (`sven-core::Session::new`)
/// and never relies on id ordering; agor entities need time-ordering for
/// pagination and genealogy display, so every entity additionally carries its
/// own `created_at` timestamp column rather than encoding order into the id
/// itself (no `uuid` v7 feature is pinned in the workspace dependency table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Current UTC time. Centralized so tests can be written against a fixed
/// clock later without hunting down every `Utc::now()` call site.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
