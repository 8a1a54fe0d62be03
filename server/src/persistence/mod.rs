//! Persistence layer for the game server.
//!
//! The world talks to storage through the [`Persistence`] capability. In
//! production that is a [`PersistenceHandle`]: all database and cache work
//! happens in one background task, so the world never blocks on I/O beyond
//! awaiting a reply. [`MemoryStore`] backs tests and database-less runs.

mod cache;
mod database;
mod memory;

pub use cache::Cache;
pub use database::Database;
pub use memory::MemoryStore;

use std::future::Future;
use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use swi_shared::settings::{
    PLAYER_MAX_HEALTH, PLAYER_START_BANK, PLAYER_START_CASH, PLAYER_START_REPUTATION,
    PLAYER_START_SKILL_ACC,
};
use swi_shared::Coordinates;

use crate::error::{AuthError, PersistenceError};

/// Attempts per save before giving up
const SAVE_ATTEMPTS: u32 = 3;
const SAVE_BACKOFF: Duration = Duration::from_millis(250);

// =============================================================================
// Records
// =============================================================================

/// A position inside a city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub coords: Coordinates,
}

/// Persisted form of a player character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterState {
    pub user_id: i64,
    pub name: String,
    pub reputation: i64,
    pub health: i32,
    pub npc_kills: u32,
    pub player_kills: u32,
    pub cash: u32,
    pub bank: u32,
    pub hometown: String,
    pub skill_acc: f32,
    pub gang_id: Option<i64>,
    pub admin: bool,
    /// Last known position, `None` before the first login
    pub last_location: Option<Location>,
}

impl CharacterState {
    /// A freshly registered character
    pub fn new_player(user_id: i64, name: String, hometown: String) -> Self {
        Self {
            user_id,
            name,
            reputation: PLAYER_START_REPUTATION,
            health: PLAYER_MAX_HEALTH,
            npc_kills: 0,
            player_kills: 0,
            cash: PLAYER_START_CASH,
            bank: PLAYER_START_BANK,
            hometown,
            skill_acc: PLAYER_START_SKILL_ACC,
            gang_id: None,
            admin: false,
            last_location: None,
        }
    }
}

/// One occupied inventory slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedItem {
    pub id: Uuid,
    pub template: String,
    pub condition: f32,
    pub amount: i32,
    pub equipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gang {
    /// 0 until first saved
    pub id: i64,
    pub name: String,
    pub tag: String,
    pub leader_id: i64,
}

// =============================================================================
// Capability
// =============================================================================

/// Storage as seen by the world. Failed loads read as "no data"; failed
/// saves are retried and logged, never surfaced to gameplay.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn load_character(&self, user_id: i64) -> Option<CharacterState>;

    async fn save_character(&self, state: CharacterState);

    async fn load_inventory(&self, user_id: i64) -> Vec<SavedItem>;

    async fn save_inventory(&self, user_id: i64, items: Vec<SavedItem>);

    async fn load_gang(&self, id: i64) -> Option<Gang>;

    /// Inserts when `gang.id` is 0, updates otherwise. Returns the id.
    async fn save_gang(&self, gang: Gang) -> Option<i64>;

    /// Creates an account and its character. Returns the user id.
    async fn register(&self, username: &str, password: &str, hometown: &str) -> Result<i64, AuthError>;

    async fn authenticate(&self, username: &str, password: &str) -> Result<i64, AuthError>;
}

// =============================================================================
// Credentials
// =============================================================================

pub fn validate_credentials(username: &str, password: &str) -> Result<(), AuthError> {
    if username.len() < 3 || username.len() > 20 || !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::InvalidUsername);
    }
    if password.len() < 6 {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AuthError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AuthError::InvalidCredentials)
}

// =============================================================================
// Background task
// =============================================================================

/// Commands sent to the persistence background task
enum PersistenceCommand {
    LoadCharacter {
        user_id: i64,
        response: oneshot::Sender<Option<CharacterState>>,
    },
    SaveCharacter(CharacterState),
    LoadInventory {
        user_id: i64,
        response: oneshot::Sender<Vec<SavedItem>>,
    },
    SaveInventory {
        user_id: i64,
        items: Vec<SavedItem>,
    },
    LoadGang {
        id: i64,
        response: oneshot::Sender<Option<Gang>>,
    },
    SaveGang {
        gang: Gang,
        response: oneshot::Sender<Option<i64>>,
    },
    Register {
        username: String,
        password: String,
        hometown: String,
        response: oneshot::Sender<Result<i64, AuthError>>,
    },
    Authenticate {
        username: String,
        password: String,
        response: oneshot::Sender<Result<i64, AuthError>>,
    },
}

/// Handle for sending commands to the persistence task
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<PersistenceCommand>,
}

impl PersistenceHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PersistenceCommand,
    ) -> Result<T, PersistenceError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| PersistenceError::Closed)?;
        rx.await.map_err(|_| PersistenceError::Closed)
    }

    async fn submit(&self, command: PersistenceCommand) {
        if self.sender.send(command).await.is_err() {
            error!("Persistence task is gone, dropping save");
        }
    }
}

#[async_trait]
impl Persistence for PersistenceHandle {
    async fn load_character(&self, user_id: i64) -> Option<CharacterState> {
        self.request(|response| PersistenceCommand::LoadCharacter { user_id, response })
            .await
            .ok()
            .flatten()
    }

    async fn save_character(&self, state: CharacterState) {
        self.submit(PersistenceCommand::SaveCharacter(state)).await
    }

    async fn load_inventory(&self, user_id: i64) -> Vec<SavedItem> {
        self.request(|response| PersistenceCommand::LoadInventory { user_id, response })
            .await
            .unwrap_or_default()
    }

    async fn save_inventory(&self, user_id: i64, items: Vec<SavedItem>) {
        self.submit(PersistenceCommand::SaveInventory { user_id, items }).await
    }

    async fn load_gang(&self, id: i64) -> Option<Gang> {
        self.request(|response| PersistenceCommand::LoadGang { id, response })
            .await
            .ok()
            .flatten()
    }

    async fn save_gang(&self, gang: Gang) -> Option<i64> {
        self.request(|response| PersistenceCommand::SaveGang { gang, response })
            .await
            .ok()
            .flatten()
    }

    async fn register(&self, username: &str, password: &str, hometown: &str) -> Result<i64, AuthError> {
        validate_credentials(username, password)?;
        let (username, password, hometown) = (username.to_string(), password.to_string(), hometown.to_string());
        self.request(|response| PersistenceCommand::Register {
            username,
            password,
            hometown,
            response,
        })
        .await
        .map_err(AuthError::from)?
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<i64, AuthError> {
        let (username, password) = (username.to_string(), password.to_string());
        self.request(|response| PersistenceCommand::Authenticate {
            username,
            password,
            response,
        })
        .await
        .map_err(AuthError::from)?
    }
}

/// Connects to PostgreSQL and Redis and spawns the background task
pub async fn init(database_url: &str, redis_url: &str) -> Result<PersistenceHandle, PersistenceError> {
    let db = Database::connect(database_url).await?;
    db.migrate().await?;
    info!("Connected to PostgreSQL");

    let cache = Cache::connect(redis_url).await?;
    info!("Connected to Redis");

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(persistence_task(db, cache, rx));
    info!("Persistence background task started");

    Ok(PersistenceHandle { sender: tx })
}

/// Runs `op` up to [`SAVE_ATTEMPTS`] times with doubling backoff
async fn with_retries<F, Fut>(what: &str, mut op: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), PersistenceError>>,
{
    let mut delay = SAVE_BACKOFF;
    for attempt in 1..=SAVE_ATTEMPTS {
        match op().await {
            Ok(()) => return,
            Err(e) if attempt < SAVE_ATTEMPTS => {
                warn!("{} failed (attempt {}/{}): {}", what, attempt, SAVE_ATTEMPTS, e);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => error!("{} failed after {} attempts: {}", what, SAVE_ATTEMPTS, e),
        }
    }
}

async fn persistence_task(db: Database, cache: Cache, mut rx: mpsc::Receiver<PersistenceCommand>) {
    info!("Persistence task running");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            PersistenceCommand::LoadCharacter { user_id, response } => {
                let cached = match cache.load_character(user_id).await {
                    Ok(state) => state,
                    Err(e) => {
                        warn!("Cache read for character {} failed: {}", user_id, e);
                        None
                    }
                };
                let result = match cached {
                    Some(state) => Some(state),
                    None => match db.load_character(user_id).await {
                        Ok(Some(state)) => {
                            if let Err(e) = cache.save_character(&state).await {
                                warn!("Failed to warm cache for character {}: {}", user_id, e);
                            }
                            Some(state)
                        }
                        Ok(None) => None,
                        Err(e) => {
                            error!("Failed to load character {}: {}", user_id, e);
                            None
                        }
                    },
                };
                let _ = response.send(result);
            }

            PersistenceCommand::SaveCharacter(state) => {
                if let Err(e) = cache.save_character(&state).await {
                    warn!("Failed to cache character {}: {}", state.user_id, e);
                }
                let what = format!("Saving character {}", state.user_id);
                with_retries(&what, || db.save_character(&state)).await;
            }

            PersistenceCommand::LoadInventory { user_id, response } => {
                let cached = cache.load_inventory(user_id).await.unwrap_or_else(|e| {
                    warn!("Cache read for inventory {} failed: {}", user_id, e);
                    None
                });
                let items = match cached {
                    Some(items) => items,
                    None => match db.load_inventory(user_id).await {
                        Ok(items) => {
                            if let Err(e) = cache.save_inventory(user_id, &items).await {
                                warn!("Failed to warm cache for inventory {}: {}", user_id, e);
                            }
                            items
                        }
                        Err(e) => {
                            error!("Failed to load inventory {}: {}", user_id, e);
                            Vec::new()
                        }
                    },
                };
                let _ = response.send(items);
            }

            PersistenceCommand::SaveInventory { user_id, items } => {
                if let Err(e) = cache.save_inventory(user_id, &items).await {
                    warn!("Failed to cache inventory {}: {}", user_id, e);
                }
                let what = format!("Saving inventory {}", user_id);
                with_retries(&what, || db.save_inventory(user_id, &items)).await;
            }

            PersistenceCommand::LoadGang { id, response } => {
                let gang = db.load_gang(id).await.unwrap_or_else(|e| {
                    error!("Failed to load gang {}: {}", id, e);
                    None
                });
                let _ = response.send(gang);
            }

            PersistenceCommand::SaveGang { gang, response } => {
                let id = match db.save_gang(&gang).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        error!("Failed to save gang '{}': {}", gang.name, e);
                        None
                    }
                };
                let _ = response.send(id);
            }

            PersistenceCommand::Register {
                username,
                password,
                hometown,
                response,
            } => {
                let _ = response.send(db.register(&username, &password, &hometown).await);
            }

            PersistenceCommand::Authenticate {
                username,
                password,
                response,
            } => {
                let _ = response.send(db.authenticate(&username, &password).await);
            }
        }
    }

    info!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_validated() {
        assert_eq!(validate_credentials("ab", "secret1"), Err(AuthError::InvalidUsername));
        assert_eq!(validate_credentials("bad name", "secret1"), Err(AuthError::InvalidUsername));
        assert_eq!(validate_credentials("alice", "short"), Err(AuthError::PasswordTooShort));
        assert!(validate_credentials("alice", "secret1").is_ok());
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash).is_ok());
        assert_eq!(verify_password("hunter23", &hash), Err(AuthError::InvalidCredentials));
    }

    #[test]
    fn new_players_start_with_the_configured_stats() {
        let state = CharacterState::new_player(3, "Alice".into(), "TY".into());
        assert_eq!(state.cash, 100);
        assert_eq!(state.bank, 500);
        assert_eq!(state.health, 100);
        assert_eq!(state.skill_acc, 20.0);
        assert!(state.last_location.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn saves_are_retried_then_given_up() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let calls = AtomicU32::new(0);
        with_retries("test save", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PersistenceError::Closed) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), SAVE_ATTEMPTS);
    }
}
