//! In-process storage for tests and database-less runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{hash_password, validate_credentials, verify_password, CharacterState, Gang, Persistence, SavedItem};
use crate::error::AuthError;

#[derive(Default)]
struct Tables {
    /// Lower-cased username -> (user id, password hash)
    users: HashMap<String, (i64, String)>,
    characters: HashMap<i64, CharacterState>,
    inventories: HashMap<i64, Vec<SavedItem>>,
    gangs: HashMap<i64, Gang>,
    next_user_id: i64,
    next_gang_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn load_character(&self, user_id: i64) -> Option<CharacterState> {
        self.tables.lock().characters.get(&user_id).cloned()
    }

    async fn save_character(&self, state: CharacterState) {
        self.tables.lock().characters.insert(state.user_id, state);
    }

    async fn load_inventory(&self, user_id: i64) -> Vec<SavedItem> {
        self.tables.lock().inventories.get(&user_id).cloned().unwrap_or_default()
    }

    async fn save_inventory(&self, user_id: i64, items: Vec<SavedItem>) {
        self.tables.lock().inventories.insert(user_id, items);
    }

    async fn load_gang(&self, id: i64) -> Option<Gang> {
        self.tables.lock().gangs.get(&id).cloned()
    }

    async fn save_gang(&self, mut gang: Gang) -> Option<i64> {
        let mut tables = self.tables.lock();
        if gang.id == 0 {
            tables.next_gang_id += 1;
            gang.id = tables.next_gang_id;
        }
        let id = gang.id;
        tables.gangs.insert(id, gang);
        Some(id)
    }

    async fn register(&self, username: &str, password: &str, hometown: &str) -> Result<i64, AuthError> {
        validate_credentials(username, password)?;
        let key = username.to_lowercase();
        if self.tables.lock().users.contains_key(&key) {
            return Err(AuthError::UsernameTaken);
        }
        let hash = hash_password(password)?;

        let mut tables = self.tables.lock();
        if tables.users.contains_key(&key) {
            return Err(AuthError::UsernameTaken);
        }
        tables.next_user_id += 1;
        let user_id = tables.next_user_id;
        tables.users.insert(key, (user_id, hash));
        tables.characters.insert(
            user_id,
            CharacterState::new_player(user_id, username.to_string(), hometown.to_string()),
        );
        Ok(user_id)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<i64, AuthError> {
        let (user_id, hash) = self
            .tables
            .lock()
            .users
            .get(&username.to_lowercase())
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &hash)?;
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_authenticate() {
        let store = MemoryStore::new();
        let id = store.register("Alice", "secret1", "TV").await.unwrap();
        assert_eq!(store.authenticate("alice", "secret1").await, Ok(id));
        assert_eq!(store.authenticate("alice", "wrong!!").await, Err(AuthError::InvalidCredentials));
        assert_eq!(store.register("ALICE", "secret2", "TV").await, Err(AuthError::UsernameTaken));

        let character = store.load_character(id).await.unwrap();
        assert_eq!(character.name, "Alice");
        assert_eq!(character.hometown, "TV");
    }

    #[tokio::test]
    async fn gangs_insert_then_update() {
        let store = MemoryStore::new();
        let gang = Gang { id: 0, name: "Night Owls".into(), tag: "NO".into(), leader_id: 1 };
        let id = store.save_gang(gang.clone()).await.unwrap();
        assert_ne!(id, 0);
        let renamed = Gang { id, tag: "OWL".into(), ..gang };
        assert_eq!(store.save_gang(renamed).await, Some(id));
        assert_eq!(store.load_gang(id).await.unwrap().tag, "OWL");
    }
}
