// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// What a `BoardObject` points at. Only `Worktree` objects reference a
/// live entity; `Zone` objects are purely canvas furniture with an optional
/// prompt trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Text { body: String },
    Zone {
        label: String,
        #[serde(default)]
        trigger: Option<String>,
    },
}

/// Positioned reference from a board to exactly one worktree.
/// `worktree_id` is `None` for furniture objects (`Text`, `Zone` without a
/// worktree dropped in yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardObject {
    pub id: EntityId,
    pub kind: ObjectKind,
    pub worktree_id: Option<EntityId>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    pub id: EntityId,
    pub name: String,
    pub slug: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub creator: EntityId,
    #[serde(default)]
    pub objects: HashMap<EntityId, BoardObject>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(name: impl Into<String>, creator: EntityId) -> Self {
        let now = crate::ids::now();
        Self {
            id: EntityId::new(),
            name: name.into(),
            slug: None,
            icon: None,
            color: None,
            creator,
            objects: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Single-row JSON edit that avoids client-side read-modify-write races
    ///: the caller supplies the full desired object, and this
    /// just replaces whatever was at that id.
    pub fn upsert_object(&mut self, object: BoardObject) {
        self.objects.insert(object.id, object);
        self.updated_at = crate::ids::now();
    }

    pub fn remove_object(&mut self, id: EntityId) -> Option<BoardObject> {
        let removed = self.objects.remove(&id);
        if removed.is_some() {
            self.updated_at = crate::ids::now();
        }
        removed
    }

    pub fn batch_upsert_objects(&mut self, objects: Vec<BoardObject>) {
        for o in objects {
            self.objects.insert(o.id, o);
        }
        self.updated_at = crate::ids::now();
    }

    /// Last-write-wins position update.
    pub fn update_object_position(&mut self, id: EntityId, x: f64, y: f64) -> bool {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.x = x;
            obj.y = y;
            self.updated_at = crate::ids::now();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(x: f64, y: f64) -> BoardObject {
        BoardObject {
            id: EntityId::new(),
            kind: ObjectKind::Text { body: "note".into() },
            worktree_id: None,
            x,
            y,
        }
    }

    #[test]
    fn upsert_then_remove_round_trips() {
        let mut b = Board::new("Sprint", EntityId::new());
        let o = obj(1.0, 2.0);
        let id = o.id;
        b.upsert_object(o);
        assert_eq!(b.objects.len(), 1);
        let removed = b.remove_object(id);
        assert!(removed.is_some());
        assert!(b.objects.is_empty());
    }

    #[test]
    fn update_position_is_last_write_wins() {
        let mut b = Board::new("Sprint", EntityId::new());
        let o = obj(0.0, 0.0);
        let id = o.id;
        b.upsert_object(o);
        assert!(b.update_object_position(id, 10.0, 20.0));
        let stored = &b.objects[&id];
        assert_eq!((stored.x, stored.y), (10.0, 20.0));
    }

    #[test]
    fn update_position_on_missing_object_returns_false() {
        let mut b = Board::new("Sprint", EntityId::new());
        assert!(!b.update_object_position(EntityId::new(), 1.0, 1.0));
    }

    #[test]
    fn batch_upsert_inserts_all() {
        let mut b = Board::new("Sprint", EntityId::new());
        let objs = vec![obj(0.0, 0.0), obj(1.0, 1.0), obj(2.0, 2.0)];
        b.batch_upsert_objects(objs);
        assert_eq!(b.objects.len(), 3);
    }
}
