//! Game tuning constants shared between client and server.

/// Default TCP port for the game server
pub const DEFAULT_PORT: u16 = 7777;

// =============================================================================
// Timers
// =============================================================================

pub const AUTO_SAVE_MINUTES: u64 = 5;
pub const COMBAT_LOGGING_SECS: u64 = 10;
pub const TRAVEL_COST_CHANGE_MINUTES: u64 = 60;
pub const DRUG_RESTOCK_DELAY_SECS: u64 = 60 * 20;
pub const NPC_RESPAWN_DELAY_SECS: u64 = 60 * 15;
pub const NPC_MOVE_MIN_DELAY_SECS: u64 = 30;
pub const NPC_MOVE_MAX_DELAY_SECS: u64 = 120;
pub const NPC_ATTACK_DELAY_MS: u64 = 2250;
pub const NPC_TRADE_PRUNE_SECS: u64 = 30;
pub const CITY_DEMAND_UPDATE_MIN_MINS: u64 = 45;
pub const CITY_DEMAND_UPDATE_MAX_MINS: u64 = 90;
pub const AUTO_ATTACK_POLL_MS: u64 = 500;

/// Minimum delay between two attacks from the same player
pub const PLAYER_ATTACK_DELAY_MS: u64 = 2200;
/// Minimum delay between two moves from the same player
pub const PLAYER_MOVE_DELAY_MS: u64 = 150;

// =============================================================================
// Player
// =============================================================================

pub const PLAYER_MAX_HEALTH: i32 = 100;
pub const PLAYER_MAX_INVENTORY: usize = 30;

pub const PLAYER_START_CASH: u32 = 100;
pub const PLAYER_START_BANK: u32 = 500;
pub const PLAYER_START_REPUTATION: i64 = 0;
pub const PLAYER_START_SKILL_ACC: f32 = 20.0;

/// Cash and health a player is left with after being killed
pub const PLAYER_RESPAWN_CASH: u32 = 50;
pub const PLAYER_RESPAWN_HEALTH: i32 = 50;
/// Fraction of trained skill kept after death
pub const DEATH_SKILL_DECAY: f32 = 0.96;

// =============================================================================
// Economy
// =============================================================================

pub const HEAL_COST_PER_POINT: u32 = 30;
pub const DRINK_COST: u32 = 100;
pub const DRINK_REP_GAIN: i64 = 5;
pub const DRINK_HEALTH_COST: i32 = 5;
pub const SMART_PHONE_COST: u32 = 25;
pub const DRUG_USE_REP_GAIN: i64 = 1;
pub const DRUG_USE_HEALTH_COST: i32 = 9;

/// Markup an addict pays on top of the street price
pub const DRUG_PROFIT_MARGIN: f32 = 1.2;
pub const DRUG_REP_INCREASE: i64 = 3;
/// Share of the price a shop pays when buying from a player
pub const ITEM_SELL_PRICE_LOSS: f32 = 0.65;

// =============================================================================
// Combat
// =============================================================================

pub const PUNCH_DAMAGE: i32 = 2;
/// Base wear applied to a weapon per use
pub const WEAPON_BASE_WEAR: f32 = 0.005;
