// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use agor_model::{AgorError, Board, BoardObject, EntityId, ErrorKind};
use agor_store::Store;
use base64::Engine;

use crate::{require_owner, Principal};

pub struct BoardService {
    store: Arc<Store>,
}

impl BoardService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn get(&self, principal: &Principal, id: EntityId) -> Result<Board, AgorError> {
        let board = self.store.find_board(id)?;
        require_owner(principal, board.creator)?;
        Ok(board)
    }

    pub fn list(&self, _principal: &Principal) -> Result<Vec<Board>, AgorError> {
        self.store.list_boards()
    }

    pub fn create(&self, principal: &Principal, name: impl Into<String>) -> Result<Board, AgorError> {
        let board = Board::new(name, principal.user);
        self.store.create_board(&board)?;
        Ok(board)
    }

    pub fn upsert_object(&self, principal: &Principal, board_id: EntityId, object: BoardObject) -> Result<Board, AgorError> {
        self.get(principal, board_id)?;
        self.store.upsert_board_object(board_id, object)
    }

    pub fn remove_object(&self, principal: &Principal, board_id: EntityId, object_id: EntityId) -> Result<Board, AgorError> {
        self.get(principal, board_id)?;
        self.store.remove_board_object(board_id, object_id)
    }

    pub fn update_object_position(&self, principal: &Principal, board_id: EntityId, object_id: EntityId, x: f64, y: f64) -> Result<Board, AgorError> {
        self.get(principal, board_id)?;
        self.store.update_board_object_position(board_id, object_id, x, y)
    }

    /// `boards.to_yaml`: a
    /// human-readable snapshot suitable for checking into a repo or
    /// sharing outside the daemon.
    pub fn to_yaml(&self, principal: &Principal, board_id: EntityId) -> Result<String, AgorError> {
        let board = self.get(principal, board_id)?;
        serde_yaml::to_string(&board)
            .map_err(|e| AgorError::with_source(ErrorKind::Internal, "serializing board to YAML", e))
    }

    /// `boards.from_yaml`: replaces the id-bearing fields with freshly
    /// minted ids owned by the importing principal — a YAML import must
    /// never let the caller choose another user's entity id.
    pub fn from_yaml(&self, principal: &Principal, yaml: &str) -> Result<Board, AgorError> {
        let mut board: Board = serde_yaml::from_str(yaml)
            .map_err(|e| AgorError::with_source(ErrorKind::Validation, "parsing board YAML", e))?;
        board.id = EntityId::new();
        board.creator = principal.user;
        board.created_at = agor_model::now();
        board.updated_at = board.created_at;
        self.store.create_board(&board)?;
        Ok(board)
    }

    /// `boards.to_blob`/`boards.from_blob`: the same snapshot, base64-
    /// encoded for transports that prefer an opaque string over embedded
    /// YAML (e.g. pasting into a chat message).
    pub fn to_blob(&self, principal: &Principal, board_id: EntityId) -> Result<String, AgorError> {
        let yaml = self.to_yaml(principal, board_id)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(yaml))
    }

    pub fn from_blob(&self, principal: &Principal, blob: &str) -> Result<Board, AgorError> {
        let yaml = base64::engine::general_purpose::STANDARD
            .decode(blob)
            .map_err(|e| AgorError::with_source(ErrorKind::Validation, "decoding board blob", e))?;
        let yaml = String::from_utf8(yaml)
            .map_err(|e| AgorError::with_source(ErrorKind::Validation, "board blob is not UTF-8 YAML", e))?;
        self.from_yaml(principal, &yaml)
    }

    /// `boards.clone`: a same-process shortcut for `from_yaml(to_yaml(...))`
    /// that skips the text round trip.
    pub fn clone_board(&self, principal: &Principal, board_id: EntityId) -> Result<Board, AgorError> {
        let source = self.get(principal, board_id)?;
        let mut cloned = source.clone();
        cloned.id = EntityId::new();
        cloned.creator = principal.user;
        cloned.created_at = agor_model::now();
        cloned.updated_at = cloned.created_at;
        self.store.create_board(&cloned)?;
        Ok(cloned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;
    use agor_model::ObjectKind;

    use super::*;

    fn service() -> (BoardService, Principal) {
        let store = Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap());
        (BoardService::new(store), Principal::new(EntityId::new()))
    }

    #[test]
    fn yaml_round_trip_preserves_objects_under_a_new_id() {
        let (service, principal) = service();
        let board = service.create(&principal, "Sprint").unwrap();
        service
            .upsert_object(
                &principal,
                board.id,
                BoardObject { id: EntityId::new(), kind: ObjectKind::Text { body: "n".into() }, worktree_id: None, x: 1.0, y: 2.0 },
            )
            .unwrap();
        let yaml = service.to_yaml(&principal, board.id).unwrap();
        let imported = service.from_yaml(&principal, &yaml).unwrap();
        assert_ne!(imported.id, board.id);
        assert_eq!(imported.objects.len(), 1);
    }

    #[test]
    fn blob_round_trip_matches_yaml_round_trip() {
        let (service, principal) = service();
        let board = service.create(&principal, "Sprint").unwrap();
        let blob = service.to_blob(&principal, board.id).unwrap();
        let imported = service.from_blob(&principal, &blob).unwrap();
        assert_eq!(imported.name, "Sprint");
        assert_ne!(imported.id, board.id);
    }

    #[test]
    fn clone_board_is_owned_by_the_cloning_principal() {
        let (service, principal) = service();
        let board = service.create(&principal, "Sprint").unwrap();
        let cloned = service.clone_board(&principal, board.id).unwrap();
        assert_ne!(cloned.id, board.id);
        assert_eq!(cloned.creator, principal.user);
    }

    #[test]
    fn non_owner_cannot_read_a_board() {
        let (service, _owner) = service();
        let intruder = Principal::new(EntityId::new());
        let board = service.create(&Principal::new(EntityId::new()), "Private").unwrap();
        let err = service.get(&intruder, board.id).unwrap_err();
        assert_eq!(err.kind, agor_model::ErrorKind::Forbidden);
    }
}
