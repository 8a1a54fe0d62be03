//! Redis cache operations for hot character data.

use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};

use super::{CharacterState, SavedItem};
use crate::error::PersistenceError;

/// Cache key prefixes
const CHARACTER_STATE_PREFIX: &str = "swi:char:";
const CHARACTER_INVENTORY_PREFIX: &str = "swi:inv:";

/// TTL for cached data (1 hour)
const CACHE_TTL_SECONDS: u64 = 3600;

/// Redis cache wrapper
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
}

impl Cache {
    /// Connect to Redis
    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    async fn put<T: Serialize + ?Sized>(&self, key: String, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, json, CACHE_TTL_SECONDS).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, key: String) -> Result<Option<T>, PersistenceError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(&key).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn save_character(&self, state: &CharacterState) -> Result<(), PersistenceError> {
        self.put(format!("{}{}", CHARACTER_STATE_PREFIX, state.user_id), state).await
    }

    pub async fn load_character(&self, user_id: i64) -> Result<Option<CharacterState>, PersistenceError> {
        self.get(format!("{}{}", CHARACTER_STATE_PREFIX, user_id)).await
    }

    pub async fn save_inventory(&self, user_id: i64, items: &[SavedItem]) -> Result<(), PersistenceError> {
        self.put(format!("{}{}", CHARACTER_INVENTORY_PREFIX, user_id), items).await
    }

    pub async fn load_inventory(&self, user_id: i64) -> Result<Option<Vec<SavedItem>>, PersistenceError> {
        self.get(format!("{}{}", CHARACTER_INVENTORY_PREFIX, user_id)).await
    }
}
