// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, EntityId, Worktree};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_worktree(&self, wt: &Worktree) -> Result<(), AgorError> {
        let data = encode(wt)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO worktrees (id, repo_id, board_id, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    wt.id.to_string(),
                    wt.repo_id.to_string(),
                    wt.board_id.map(|id| id.to_string()),
                    data,
                    wt.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating worktree", e))?;
            Ok(())
        })
    }

    pub fn find_worktree(&self, id: EntityId) -> Result<Worktree, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM worktrees WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding worktree", e))?;
            decode(&data)
        })
    }

    pub fn list_worktrees_for_board(&self, board_id: EntityId) -> Result<Vec<Worktree>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM worktrees WHERE board_id = ?1 ORDER BY created_at ASC")
                .map_err(|e| map_rusqlite_err("listing worktrees", e))?;
            let rows = stmt
                .query_map([board_id.to_string()], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing worktrees", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing worktrees", e))?)?);
            }
            Ok(out)
        })
    }

    pub fn assign_worktree_to_board(&self, id: EntityId, board_id: Option<EntityId>) -> Result<Worktree, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM worktrees WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding worktree", e))?;
            let mut wt: Worktree = decode(&data)?;
            wt.board_id = board_id;
            wt.updated_at = agor_model::now();
            let updated = encode(&wt)?;
            conn.execute(
                "UPDATE worktrees SET board_id = ?1, data = ?2 WHERE id = ?3",
                rusqlite::params![board_id.map(|id| id.to_string()), updated, id.to_string()],
            )
            .map_err(|e| map_rusqlite_err("assigning worktree", e))?;
            Ok(wt)
        })
    }

    pub fn remove_worktree(&self, id: EntityId) -> Result<(), AgorError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM worktrees WHERE id = ?1", [id.to_string()])
                .map_err(|e| map_rusqlite_err("removing worktree", e))?;
            if changed == 0 {
                return Err(AgorError::not_found(format!("worktree {id}")));
            }
            Ok(())
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
        let wt = Worktree::new(EntityId::new(), "/repo/wt-1", "main", EntityId::new());
        store.create_worktree(&wt).unwrap();
        let found = store.find_worktree(wt.id).unwrap();
        assert_eq!(found.path, "/repo/wt-1");
        assert!(found.board_id.is_none());
    }

    #[test]
    fn assigning_to_a_board_is_visible_in_list() {
        let store = store();
        let wt = Worktree::new(EntityId::new(), "/repo/wt-1", "main", EntityId::new());
        store.create_worktree(&wt).unwrap();
        let board_id = EntityId::new();
        store.assign_worktree_to_board(wt.id, Some(board_id)).unwrap();
        let listed = store.list_worktrees_for_board(board_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, wt.id);
    }

    #[test]
    fn remove_missing_worktree_is_not_found() {
        let store = store();
        let err = store.remove_worktree(EntityId::new()).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::NotFound);
    }
}
