//! PostgreSQL database operations.

use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

use swi_shared::Coordinates;

use super::{hash_password, validate_credentials, verify_password, CharacterState, Gang, Location, SavedItem};
use crate::error::{AuthError, PersistenceError};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_login TIMESTAMPTZ
    )",
    "CREATE TABLE IF NOT EXISTS gangs (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        tag TEXT NOT NULL,
        leader_id BIGINT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS characters (
        user_id BIGINT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        reputation BIGINT NOT NULL,
        health INT NOT NULL,
        npc_kills BIGINT NOT NULL DEFAULT 0,
        player_kills BIGINT NOT NULL DEFAULT 0,
        cash BIGINT NOT NULL,
        bank BIGINT NOT NULL,
        hometown TEXT NOT NULL,
        skill_acc REAL NOT NULL,
        gang_id BIGINT REFERENCES gangs(id) ON DELETE SET NULL,
        admin BOOLEAN NOT NULL DEFAULT FALSE,
        location_city TEXT,
        location_north INT,
        location_east INT
    )",
    "CREATE TABLE IF NOT EXISTS inventory_items (
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        slot INT NOT NULL,
        item_id TEXT NOT NULL,
        template TEXT NOT NULL,
        condition REAL NOT NULL,
        amount INT NOT NULL,
        equipped BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (user_id, slot)
    )",
];

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database
    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
        Ok(Self { pool })
    }

    /// Creates missing tables
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Registers an account and creates its character in one transaction
    pub async fn register(&self, username: &str, password: &str, hometown: &str) -> Result<i64, AuthError> {
        validate_credentials(username, password)?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        if exists {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = hash_password(password)?;

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let user_id: i64 = sqlx::query_scalar("INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id")
            .bind(username)
            .bind(&password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;

        let state = CharacterState::new_player(user_id, username.to_string(), hometown.to_string());
        insert_character(&mut tx, &state).await.map_err(storage)?;
        tx.commit().await.map_err(storage)?;

        Ok(user_id)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<i64, AuthError> {
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or(AuthError::InvalidCredentials)?;

        let user_id: i64 = row.get("id");
        let stored_hash: String = row.get("password_hash");
        verify_password(password, &stored_hash)?;

        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(user_id)
    }

    // =========================================================================
    // Character Operations
    // =========================================================================

    pub async fn load_character(&self, user_id: i64) -> Result<Option<CharacterState>, PersistenceError> {
        let row = sqlx::query(
            "SELECT name, reputation, health, npc_kills, player_kills, cash, bank, hometown,
                    skill_acc, gang_id, admin, location_city, location_north, location_east
             FROM characters WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let city: Option<String> = r.get("location_city");
            let north: Option<i32> = r.get("location_north");
            let east: Option<i32> = r.get("location_east");
            let last_location = match (city, north, east) {
                (Some(city), Some(north), Some(east)) if north >= 0 && east >= 0 => Some(Location {
                    city,
                    coords: Coordinates::new(north as u32, east as u32),
                }),
                _ => None,
            };
            CharacterState {
                user_id,
                name: r.get("name"),
                reputation: r.get("reputation"),
                health: r.get("health"),
                npc_kills: r.get::<i64, _>("npc_kills").max(0) as u32,
                player_kills: r.get::<i64, _>("player_kills").max(0) as u32,
                cash: r.get::<i64, _>("cash").max(0) as u32,
                bank: r.get::<i64, _>("bank").max(0) as u32,
                hometown: r.get("hometown"),
                skill_acc: r.get("skill_acc"),
                gang_id: r.get("gang_id"),
                admin: r.get("admin"),
                last_location,
            }
        }))
    }

    pub async fn save_character(&self, state: &CharacterState) -> Result<(), PersistenceError> {
        let (city, north, east) = match &state.last_location {
            Some(l) => (Some(l.city.clone()), Some(l.coords.north as i32), Some(l.coords.east as i32)),
            None => (None, None, None),
        };
        sqlx::query(
            "UPDATE characters SET
                name = $2, reputation = $3, health = $4, npc_kills = $5, player_kills = $6,
                cash = $7, bank = $8, hometown = $9, skill_acc = $10, gang_id = $11,
                location_city = $12, location_north = $13, location_east = $14
             WHERE user_id = $1",
        )
        .bind(state.user_id)
        .bind(&state.name)
        .bind(state.reputation)
        .bind(state.health)
        .bind(state.npc_kills as i64)
        .bind(state.player_kills as i64)
        .bind(state.cash as i64)
        .bind(state.bank as i64)
        .bind(&state.hometown)
        .bind(state.skill_acc)
        .bind(state.gang_id)
        .bind(city)
        .bind(north)
        .bind(east)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Inventory Operations
    // =========================================================================

    pub async fn load_inventory(&self, user_id: i64) -> Result<Vec<SavedItem>, PersistenceError> {
        let rows = sqlx::query(
            "SELECT item_id, template, condition, amount, equipped
             FROM inventory_items WHERE user_id = $1 ORDER BY slot",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|r| {
                let id: String = r.get("item_id");
                Some(SavedItem {
                    id: Uuid::parse_str(&id).ok()?,
                    template: r.get("template"),
                    condition: r.get("condition"),
                    amount: r.get("amount"),
                    equipped: r.get("equipped"),
                })
            })
            .collect())
    }

    /// Replaces all slots
    pub async fn save_inventory(&self, user_id: i64, items: &[SavedItem]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inventory_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for (slot, item) in items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO inventory_items (user_id, slot, item_id, template, condition, amount, equipped)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user_id)
            .bind(slot as i32)
            .bind(item.id.to_string())
            .bind(&item.template)
            .bind(item.condition)
            .bind(item.amount)
            .bind(item.equipped)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Gang Operations
    // =========================================================================

    pub async fn load_gang(&self, id: i64) -> Result<Option<Gang>, PersistenceError> {
        let row = sqlx::query("SELECT id, name, tag, leader_id FROM gangs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Gang {
            id: r.get("id"),
            name: r.get("name"),
            tag: r.get("tag"),
            leader_id: r.get("leader_id"),
        }))
    }

    pub async fn save_gang(&self, gang: &Gang) -> Result<i64, PersistenceError> {
        if gang.id == 0 {
            let id = sqlx::query_scalar("INSERT INTO gangs (name, tag, leader_id) VALUES ($1, $2, $3) RETURNING id")
                .bind(&gang.name)
                .bind(&gang.tag)
                .bind(gang.leader_id)
                .fetch_one(&self.pool)
                .await?;
            return Ok(id);
        }
        sqlx::query("UPDATE gangs SET name = $2, tag = $3, leader_id = $4 WHERE id = $1")
            .bind(gang.id)
            .bind(&gang.name)
            .bind(&gang.tag)
            .bind(gang.leader_id)
            .execute(&self.pool)
            .await?;
        Ok(gang.id)
    }
}

async fn insert_character(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    state: &CharacterState,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO characters (user_id, name, reputation, health, cash, bank, hometown, skill_acc)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(state.user_id)
    .bind(&state.name)
    .bind(state.reputation)
    .bind(state.health)
    .bind(state.cash as i64)
    .bind(state.bank as i64)
    .bind(&state.hometown)
    .bind(state.skill_acc)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn storage(e: sqlx::Error) -> AuthError {
    AuthError::Storage(e.to_string())
}
