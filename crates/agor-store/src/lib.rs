// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! The Entity Store (C1): the single source of truth for every durable
//! entity, backed by SQLite.
//!
//! Grounded on a single struct
//! owning one `rusqlite::Connection`, opened once and reused for the life
//! of the process. One writer per database connection keeps writes
//! serialized through the RDBMS rather than the application; `Store` gets
//! the same effect more simply by holding the connection behind a `Mutex`
//! that every repository method locks for the duration of its
//! (synchronous, short-lived) transaction. Callers that need this off the
//! async executor's thread (the gateway, the scheduler) wrap a call in
//! `tokio::task::spawn_blocking`.
//!
//! Every mutating method commits its SQLite transaction *before* the
//! corresponding event reaches the `EventBus`, never the other way around.

mod boards;
mod error;
mod mcp;
mod messages;
mod permissions;
mod schema;
mod sessions;
mod tasks;
mod users;
mod worktrees;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use agor_events::EventBus;
use agor_model::AgorError;

pub use error::{map_json_err, map_rusqlite_err};

pub struct Store {
    conn: Mutex<Connection>,
    events: Arc<EventBus>,
}

impl Store {
    pub fn open(path: &Path, events: Arc<EventBus>) -> Result<Self, AgorError> {
        let conn = Connection::open(path).map_err(|e| map_rusqlite_err("opening database", e))?;
        Self::from_connection(conn, events)
    }

    pub fn open_in_memory(events: Arc<EventBus>) -> Result<Self, AgorError> {
        let conn =
            Connection::open_in_memory().map_err(|e| map_rusqlite_err("opening database", e))?;
        Self::from_connection(conn, events)
    }

    fn from_connection(conn: Connection, events: Arc<EventBus>) -> Result<Self, AgorError> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            events,
        })
    }

    /// Locks the connection for the duration of `f`. `f` itself should be a
    /// single statement or a `conn.transaction()` block; it must not await.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T, AgorError>) -> Result<T, AgorError> {
        let conn = self.conn.lock().expect("store connection lock poisoned");
        f(&conn)
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, AgorError> {
    serde_json::from_str(data).map_err(|e| map_json_err("decoding entity", e))
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<String, AgorError> {
    serde_json::to_string(value).map_err(|e| map_json_err("encoding entity", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_runs_schema_once() {
        let store = Store::open_in_memory(Arc::new(EventBus::new())).unwrap();
        // Re-initializing against the same connection must be a no-op, not
        // an error (PRAGMA user_version already at CURRENT_SCHEMA_VERSION).
        store
            .with_conn(|conn| schema::init_schema(conn))
            .unwrap();
    }
}
