// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, EntityId, User};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_user(&self, user: &User) -> Result<(), AgorError> {
        let data = encode(user)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, data, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    user.id.to_string(),
                    user.username,
                    data,
                    user.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating user", e))?;
            Ok(())
        })
    }

    pub fn find_user(&self, id: EntityId) -> Result<User, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM users WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding user", e))?;
            decode(&data)
        })
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<User, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM users WHERE username = ?1",
                    [username],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding user by username", e))?;
            decode(&data)
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM users ORDER BY created_at ASC")
                .map_err(|e| map_rusqlite_err("listing users", e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing users", e))?;
            let mut out = Vec::new();
            for row in rows {
                let data = row.map_err(|e| map_rusqlite_err("listing users", e))?;
                out.push(decode(&data)?);
            }
            Ok(out)
        })
    }

    /// Merges `patch` into the user's `env` map and
    /// persists the result.
    pub fn patch_user_env(&self, id: EntityId, patch: std::collections::HashMap<String, String>) -> Result<User, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM users WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding user", e))?;
            let mut user: User = decode(&data)?;
            user.env.extend(patch);
            let updated = encode(&user)?;
            conn.execute(
                "UPDATE users SET data = ?1 WHERE id = ?2",
                rusqlite::params![updated, id.to_string()],
            )
            .map_err(|e| map_rusqlite_err("patching user", e))?;
            Ok(user)
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
        let user = User::new("ada");
        store.create_user(&user).unwrap();
        let found = store.find_user(user.id).unwrap();
        assert_eq!(found.username, "ada");
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let store = store();
        store.create_user(&User::new("ada")).unwrap();
        let err = store.create_user(&User::new("ada")).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Conflict);
    }

    #[test]
    fn find_missing_user_is_not_found() {
        let store = store();
        let err = store.find_user(EntityId::new()).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::NotFound);
    }

    #[test]
    fn patch_env_merges_rather_than_replaces() {
        let store = store();
        let mut user = User::new("ada");
        user.env.insert("A".into(), "1".into());
        store.create_user(&user).unwrap();

        let mut patch = std::collections::HashMap::new();
        patch.insert("B".into(), "2".into());
        let updated = store.patch_user_env(user.id, patch).unwrap();
        assert_eq!(updated.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(updated.env.get("B").map(String::as_str), Some("2"));
    }
}
