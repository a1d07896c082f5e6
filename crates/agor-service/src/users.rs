// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use agor_model::{AgorError, EntityId, User};
use agor_store::Store;

/// `users.create/get/whoami/patchEnv`. No ownership gate
/// beyond "a user can only patch their own env" — there is no cross-user
/// visibility of `env` in the CLI surface, but the login handshake does need
/// to look a user up by username before a `Principal` even exists.
pub struct UserService {
    store: Arc<Store>,
}

impl UserService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create(&self, user: User) -> Result<User, AgorError> {
        self.store.create_user(&user)?;
        Ok(user)
    }

    pub fn get(&self, id: EntityId) -> Result<User, AgorError> {
        self.store.find_user(id)
    }

    pub fn find_by_username(&self, username: &str) -> Result<User, AgorError> {
        self.store.find_user_by_username(username)
    }

    pub fn patch_env(&self, id: EntityId, patch: HashMap<String, String>) -> Result<User, AgorError> {
        self.store.patch_user_env(id, patch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agor_events::EventBus;

    use super::*;

    #[test]
    fn round_trips_by_username() {
        let store = Arc::new(Store::open_in_memory(Arc::new(EventBus::new())).unwrap());
        let service = UserService::new(store);
        let user = service.create(User::new("ada")).unwrap();
        let found = service.find_by_username("ada").unwrap();
        assert_eq!(found.id, user.id);
    }
}
