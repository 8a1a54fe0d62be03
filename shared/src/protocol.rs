//! Events pushed from the server to sessions.
//!
//! Every event is a data-only payload. The transport frames each one with
//! `bincode` behind a big-endian `u32` length prefix.

use serde::{Deserialize, Serialize};

use crate::cities::{Coordinates, Direction};
use crate::items::ItemType;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Enums
// =============================================================================

/// Outcome flag carried by generic responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResponseStatus {
    Normal = 0,
    Success = 1,
    Warning = 2,
    Failure = 3,
}

/// Chat channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChatType {
    Local = 0,
    Global = 1,
    Private = 2,
}

impl ChatType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Local),
            1 => Some(Self::Global),
            2 => Some(Self::Private),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Whether a mover entered or left the observer's Place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MoveEventType {
    Arrive = 0,
    Leave = 1,
}

// =============================================================================
// Frames
// =============================================================================

/// An item as seen by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFrame {
    pub id: String,
    pub template: String,
    pub name: String,
    pub item_type: ItemType,
    pub condition: f32,
    pub amount: i32,
    pub price: u32,
    pub equipped: bool,
}

/// A player as seen by other players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerFrame {
    pub id: u64,
    pub name: String,
    pub rank: String,
    pub gang_tag: Option<String>,
}

/// A non-player character as seen by players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcFrame {
    pub id: u64,
    pub name: String,
    pub kind: String,
    pub health: i32,
}

/// A building in a Place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingFrame {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
}

/// Everything visible at one Place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFrame {
    pub city: String,
    pub city_code: String,
    pub coords: Coordinates,
    pub players: Vec<PlayerFrame>,
    pub npcs: Vec<NpcFrame>,
    pub items: Vec<ItemFrame>,
    pub buildings: Vec<BuildingFrame>,
}

/// A player's own stats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsFrame {
    pub name: String,
    pub health: i32,
    pub cash: u32,
    pub bank: u32,
    pub reputation: i64,
    pub rank: String,
    pub rep_to_next_rank: i64,
    pub skill_acc: f32,
    pub npc_kills: u32,
    pub player_kills: u32,
    pub hometown: String,
    pub gang_tag: Option<String>,
}

/// One line of a shop's stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItemFrame {
    pub index: usize,
    pub item: ItemFrame,
    /// -1 when unlimited
    pub quantity: i32,
    pub min_rep: i64,
}

// =============================================================================
// Server -> Client Events
// =============================================================================

/// Events sent from server to sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    /// Free-form narration or a rejection
    Generic {
        status: ResponseStatus,
        messages: Vec<String>,
    },

    Chat {
        chat_type: ChatType,
        sender: String,
        message: String,
    },

    /// Full view of the receiver's current Place
    LocationSnapshot(LocationFrame),

    InventorySnapshot {
        slots: Vec<Option<ItemFrame>>,
    },

    StatsSnapshot(StatsFrame),

    PlayerMove {
        move_type: MoveEventType,
        player: PlayerFrame,
        /// Side of the Place the mover came from or left through
        direction: Option<Direction>,
    },

    NpcMove {
        move_type: MoveEventType,
        npc: NpcFrame,
        direction: Option<Direction>,
    },

    /// An item appeared on or left the ground of the receiver's Place
    GroundItem {
        move_type: MoveEventType,
        item: ItemFrame,
    },

    MerchantInventory {
        npc_id: u64,
        npc_name: String,
        slots: Vec<Option<ItemFrame>>,
    },

    MerchantMessage {
        npc_id: u64,
        message: String,
    },

    ShopInventory {
        building_id: u64,
        name: String,
        stock: Vec<ShopItemFrame>,
    },

    NewsFlash {
        message: String,
    },

    PlayerList {
        players: Vec<PlayerFrame>,
    },
}

impl ServerEvent {
    pub fn generic(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self::Generic {
            status,
            messages: vec![message.into()],
        }
    }

    pub fn normal(message: impl Into<String>) -> Self {
        Self::generic(ResponseStatus::Normal, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::generic(ResponseStatus::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::generic(ResponseStatus::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::generic(ResponseStatus::Failure, message)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Length-prefixed frame ready for the wire
    pub fn to_frame(&self) -> Result<Vec<u8>, bincode::Error> {
        let body = self.serialize()?;
        let mut frame = Vec::with_capacity(body.len() + 4);
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_carries_big_endian_length() {
        let event = ServerEvent::success("You drink a beer.");
        let frame = event.to_frame().unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        assert_eq!(ServerEvent::deserialize(&frame[4..]).unwrap(), event);
    }
}
