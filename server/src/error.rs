//! Error types.
//!
//! `GameError` is what a player sees: its `Display` text is sent back as the
//! rejection message. The others stay inside the server.

use thiserror::Error;

/// A rejected request. Nothing was mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("{0}")]
    Rejected(String),

    #[error("You are not logged in.")]
    NotLoggedIn,

    #[error("This command requires admin privileges")]
    NotAdmin,

    #[error("Unknown command, try /help")]
    UnknownCommand,

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("That target is not at the same location as you")]
    NotSameLocation,

    #[error("You are on the move, try again in a moment.")]
    InTransit,

    #[error("You can't go that way.")]
    OutOfBounds,

    #[error("You can't leave, you are being held up by {0}.")]
    HeldUp(String),

    #[error("You do not have enough cash on you")]
    InsufficientCash,

    #[error("You don't have that much money in your bank account.")]
    InsufficientBank,

    #[error("no more inventory space left")]
    InventoryFull,

    #[error("You don't have that item.")]
    NoSuchItem,

    #[error("There is no one here by that name.")]
    NoSuchTarget,

    #[error("There is no {0} here.")]
    NoSuchBuilding(&'static str),

    #[error("{0} is already playing.")]
    AlreadyOnline(String),
}

impl GameError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Invalid static configuration. Fatal at startup or NPC spawn.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown item template '{item}' referenced by {owner}")]
    UnknownItem { owner: String, item: String },

    #[error("{owner} equips '{item}', which is not equippable")]
    NotEquippable { owner: String, item: String },

    #[error("{0} has no weapon for its only attack")]
    MissingWeapon(String),

    #[error("{0} carries a gun without ammunition")]
    MissingAmmo(String),

    #[error("no NPC template for {0}")]
    UnknownNpc(String),

    #[error("city {city} has no {building} building")]
    MissingBuilding { city: String, building: &'static str },

    #[error("city {0} has no places")]
    EmptyRegion(String),

    #[error("no city templates configured")]
    NoCities,
}

/// Storage failure inside the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("persistence task is gone")]
    Closed,
}

/// Login and registration failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Username must be 3-20 alphanumeric characters")]
    InvalidUsername,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("Unknown city '{0}'")]
    UnknownCity(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<PersistenceError> for AuthError {
    fn from(e: PersistenceError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
