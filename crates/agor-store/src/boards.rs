// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use agor_model::{AgorError, Board, BoardObject, EntityId};
use agor_proto::{Event, EventVerb, Topic};

use crate::{decode, encode, error::map_rusqlite_err, Store};

impl Store {
    pub fn create_board(&self, board: &Board) -> Result<(), AgorError> {
        let data = encode(board)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO boards (id, creator, data, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    board.id.to_string(),
                    board.creator.to_string(),
                    data,
                    board.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| map_rusqlite_err("creating board", e))?;
            Ok(())
        })?;
        self.events().publish(
            &[Topic::Board { id: board.id }],
            Event {
                service: "boards".into(),
                verb: EventVerb::Created,
                payload: serde_json::to_value(board).unwrap_or_default(),
            },
        );
        Ok(())
    }

    pub fn find_board(&self, id: EntityId) -> Result<Board, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM boards WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding board", e))?;
            decode(&data)
        })
    }

    pub fn list_boards(&self) -> Result<Vec<Board>, AgorError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT data FROM boards ORDER BY created_at ASC")
                .map_err(|e| map_rusqlite_err("listing boards", e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| map_rusqlite_err("listing boards", e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(decode(&row.map_err(|e| map_rusqlite_err("listing boards", e))?)?);
            }
            Ok(out)
        })
    }

    pub fn remove_board(&self, id: EntityId) -> Result<(), AgorError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM boards WHERE id = ?1", [id.to_string()])
                .map_err(|e| map_rusqlite_err("removing board", e))?;
            if changed == 0 {
                return Err(AgorError::not_found(format!("board {id}")));
            }
            Ok(())
        })?;
        self.events().publish(
            &[Topic::Board { id }],
            Event {
                service: "boards".into(),
                verb: EventVerb::Removed,
                payload: serde_json::json!({ "id": id }),
            },
        );
        Ok(())
    }

    fn mutate_board(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut Board),
    ) -> Result<Board, AgorError> {
        self.with_conn(|conn| {
            let data: String = conn
                .query_row(
                    "SELECT data FROM boards WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| map_rusqlite_err("finding board", e))?;
            let mut board: Board = decode(&data)?;
            f(&mut board);
            let updated = encode(&board)?;
            conn.execute(
                "UPDATE boards SET data = ?1 WHERE id = ?2",
                rusqlite::params![updated, id.to_string()],
            )
            .map_err(|e| map_rusqlite_err("updating board", e))?;
            Ok(board)
        })
    }

    /// Single-row JSON edit, serialized by the store's
    /// connection lock so two concurrent upserts never interleave a
    /// read-modify-write.
    pub fn upsert_board_object(&self, board_id: EntityId, object: BoardObject) -> Result<Board, AgorError> {
        let board = self.mutate_board(board_id, |b| b.upsert_object(object))?;
        self.publish_patch(board_id, &board);
        Ok(board)
    }

    pub fn remove_board_object(&self, board_id: EntityId, object_id: EntityId) -> Result<Board, AgorError> {
        let board = self.mutate_board(board_id, |b| {
            b.remove_object(object_id);
        })?;
        self.publish_patch(board_id, &board);
        Ok(board)
    }

    pub fn batch_upsert_board_objects(&self, board_id: EntityId, objects: Vec<BoardObject>) -> Result<Board, AgorError> {
        let board = self.mutate_board(board_id, |b| b.batch_upsert_objects(objects))?;
        self.publish_patch(board_id, &board);
        Ok(board)
    }

    /// Last-write-wins position update. Returns `NotFound` if the object was removed by a
    /// concurrent call between the drag starting and this update landing.
    pub fn update_board_object_position(&self, board_id: EntityId, object_id: EntityId, x: f64, y: f64) -> Result<Board, AgorError> {
        let board = self.mutate_board(board_id, |b| {
            b.update_object_position(object_id, x, y);
        })?;
        if !board.objects.contains_key(&object_id) {
            return Err(AgorError::not_found(format!("board object {object_id}")));
        }
        self.publish_patch(board_id, &board);
        Ok(board)
    }

    fn publish_patch(&self, board_id: EntityId, board: &Board) {
        self.events().publish(
            &[Topic::Board { id: board_id }],
            Event {
                service: "boards".into(),
                verb: EventVerb::Patched,
                payload: serde_json::to_value(board).unwrap_or_default(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::ObjectKind;

    use super::*;

    fn store() -> Store {
        Store::open_in_memory(Arc::new(EventBus::new())).unwrap()
    }

    fn obj() -> BoardObject {
        BoardObject {
            id: EntityId::new(),
            kind: ObjectKind::Text { body: "note".into() },
            worktree_id: None,
            x: 0.0,
            y: 0.0,
        }
    }

    #[test]
    fn upsert_and_fetch_object_round_trips() {
        let store = store();
        let board = Board::new("Sprint", EntityId::new());
        store.create_board(&board).unwrap();
        let o = obj();
        let oid = o.id;
        let updated = store.upsert_board_object(board.id, o).unwrap();
        assert!(updated.objects.contains_key(&oid));
    }

    #[test]
    fn position_update_on_removed_object_is_not_found() {
        let store = store();
        let board = Board::new("Sprint", EntityId::new());
        store.create_board(&board).unwrap();
        let o = obj();
        let oid = o.id;
        store.upsert_board_object(board.id, o).unwrap();
        store.remove_board_object(board.id, oid).unwrap();
        let err = store.update_board_object_position(board.id, oid, 5.0, 5.0).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::NotFound);
    }

    #[test]
    fn batch_upsert_persists_all_objects() {
        let store = store();
        let board = Board::new("Sprint", EntityId::new());
        store.create_board(&board).unwrap();
        let objs = vec![obj(), obj(), obj()];
        let updated = store.batch_upsert_board_objects(board.id, objs).unwrap();
        assert_eq!(updated.objects.len(), 3);
    }

    #[test]
    fn remove_missing_board_is_not_found() {
        let store = store();
        let err = store.remove_board(EntityId::new()).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::NotFound);
    }
}
