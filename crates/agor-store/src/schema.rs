// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Schema management, grounded on
//! `agtrace-index::schema::init_schema` (same `PRAGMA user_version` gate,
//! same `execute_batch` table block).
//!
//! Unlike `agtrace-index` — whose database is a disposable index rebuilt
//! from provider log files on every mismatch — agor's database *is* the
//! durable record. A version bump here must be a real migration, not a
//! `DROP TABLE`; `CURRENT_SCHEMA_VERSION` is 1 and there is nothing to
//! migrate from yet.
//!
//! Every entity table stores its row as a `data TEXT` JSON blob (the
//! `agor-model` struct, serialized verbatim) alongside the handful of
//! scalar columns each repository module needs to filter or order by
//! without deserializing every row.

use rusqlite::Connection;

use crate::error::map_rusqlite_err;

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), agor_model::AgorError> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| map_rusqlite_err("reading schema version", e))?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(agor_model::AgorError::internal(format!(
            "database schema version {version} is newer than this build supports ({CURRENT_SCHEMA_VERSION})"
        )));
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id         TEXT PRIMARY KEY,
            username   TEXT NOT NULL UNIQUE,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS worktrees (
            id         TEXT PRIMARY KEY,
            repo_id    TEXT NOT NULL,
            board_id   TEXT,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_worktrees_board ON worktrees(board_id);

        CREATE TABLE IF NOT EXISTS boards (
            id         TEXT PRIMARY KEY,
            creator    TEXT NOT NULL,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            owner       TEXT NOT NULL,
            status      TEXT NOT NULL,
            worktree_id TEXT NOT NULL,
            data        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner);
        CREATE INDEX IF NOT EXISTS idx_sessions_worktree ON sessions(worktree_id);

        CREATE TABLE IF NOT EXISTS tasks (
            id         TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            status     TEXT NOT NULL,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_session ON tasks(session_id);

        CREATE TABLE IF NOT EXISTS messages (
            id         TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            idx        INTEGER NOT NULL,
            task_id    TEXT,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (session_id) REFERENCES sessions(id),
            UNIQUE (session_id, idx)
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session_idx ON messages(session_id, idx);
        CREATE INDEX IF NOT EXISTS idx_messages_task ON messages(task_id);

        CREATE TABLE IF NOT EXISTS mcp_servers (
            id         TEXT PRIMARY KEY,
            scope      TEXT NOT NULL,
            owner      TEXT,
            enabled    INTEGER NOT NULL,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS session_mcp_assignments (
            session_id    TEXT NOT NULL,
            mcp_server_id TEXT NOT NULL,
            data          TEXT NOT NULL,
            PRIMARY KEY (session_id, mcp_server_id)
        );

        CREATE TABLE IF NOT EXISTS permission_requests (
            id         TEXT PRIMARY KEY,
            task_id    TEXT NOT NULL,
            session_id TEXT NOT NULL,
            decided    INTEGER NOT NULL DEFAULT 0,
            data       TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_permission_requests_task ON permission_requests(task_id);
        "#,
    )
    .map_err(|e| map_rusqlite_err("creating schema", e))?;

    conn.execute(&format!("PRAGMA user_version = {CURRENT_SCHEMA_VERSION}"), [])
        .map_err(|e| map_rusqlite_err("stamping schema version", e))?;
    Ok(())
}
