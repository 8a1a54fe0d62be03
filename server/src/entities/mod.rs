//! The unified living-entity model shared by players and NPCs.
//!
//! Each entity guards its mutable state and its inventory with two separate
//! locks. Anything that holds more than one lock follows a single order:
//! state locks before inventory locks, and within each group ascending
//! `EntityId`. The helpers in this module are the only places that take
//! more than one lock at a time.

pub mod inventory;
pub mod item;
pub mod npc;
pub mod player;
pub mod skills;
pub mod targeting;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::time::Instant;

use swi_shared::{rank_for, NpcFrame, NpcKind, PlayerFrame, ServerEvent};

use crate::session::Session;
use crate::world::place::PlaceHandle;

pub use inventory::{EquipSlot, Inventory};
pub use item::Item;
pub use npc::NpcData;
pub use player::PlayerData;
pub use skills::{RandomRoller, Roller};

/// Stable runtime identity. Also the global lock order.
pub type EntityId = u64;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_entity_id() -> EntityId {
    NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed)
}

/// Fixed role of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Npc(NpcKind),
}

/// Mutable part of an entity, behind its state lock
pub struct EntityState {
    pub health: i32,
    pub cash: u32,
    pub reputation: i64,
    pub skill_acc: f32,
    /// Place that currently owns this entity, `None` while in transit
    pub location: Option<PlaceHandle>,
    pub current_target: Option<Arc<Entity>>,
    pub targeted_by: HashMap<EntityId, Arc<Entity>>,
    /// Open drug trades, symmetric like targeting
    pub trading_with: HashMap<EntityId, Arc<Entity>>,
    /// Set exactly once by the blow that kills, cleared on respawn
    pub dead: bool,
    pub last_attack: Option<Instant>,
    pub last_move: Option<Instant>,
    pub player: Option<PlayerData>,
    pub npc: Option<NpcData>,
}

impl EntityState {
    pub fn new(health: i32, cash: u32, reputation: i64, skill_acc: f32) -> Self {
        Self {
            health,
            cash,
            reputation,
            skill_acc,
            location: None,
            current_target: None,
            targeted_by: HashMap::new(),
            trading_with: HashMap::new(),
            dead: false,
            last_attack: None,
            last_move: None,
            player: None,
            npc: None,
        }
    }

    pub fn target_id(&self) -> Option<EntityId> {
        self.current_target.as_ref().map(|t| t.id)
    }

    pub fn in_combat(&self) -> bool {
        self.current_target.is_some() || !self.targeted_by.is_empty()
    }
}

/// A player or NPC
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub role: Role,
    session: Option<Arc<dyn Session>>,
    state: Mutex<EntityState>,
    inventory: Mutex<Inventory>,
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

impl Entity {
    pub fn new(
        name: String,
        role: Role,
        session: Option<Arc<dyn Session>>,
        state: EntityState,
        inventory: Inventory,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: next_entity_id(),
            name,
            role,
            session,
            state: Mutex::new(state),
            inventory: Mutex::new(inventory),
        })
    }

    pub fn is_player(&self) -> bool {
        self.role == Role::Player
    }

    pub fn npc_kind(&self) -> Option<NpcKind> {
        match self.role {
            Role::Npc(kind) => Some(kind),
            Role::Player => None,
        }
    }

    pub fn session_id(&self) -> Option<uuid::Uuid> {
        self.session.as_ref().map(|s| s.id())
    }

    /// Delivers to the entity's session. NPCs accept and ignore everything.
    pub fn send(&self, event: ServerEvent) -> bool {
        match &self.session {
            Some(session) => session.deliver(event),
            None => true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().map(|s| s.is_connected()).unwrap_or(true)
    }

    /// Takes this entity's state lock. Never hold it across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, EntityState> {
        self.state.lock()
    }

    /// Takes this entity's inventory lock
    pub fn inventory(&self) -> MutexGuard<'_, Inventory> {
        self.inventory.lock()
    }

    pub fn location(&self) -> Option<PlaceHandle> {
        self.lock().location.clone()
    }

    pub fn is_dead(&self) -> bool {
        self.lock().dead
    }

    // =========================================================================
    // Frames
    // =========================================================================

    pub fn player_frame_from(&self, state: &EntityState) -> PlayerFrame {
        PlayerFrame {
            id: self.id,
            name: self.name.clone(),
            rank: rank_for(state.reputation).name.to_string(),
            gang_tag: state
                .player
                .as_ref()
                .and_then(|p| p.gang.as_ref().map(|g| g.tag.clone())),
        }
    }

    pub fn npc_frame_from(&self, state: &EntityState) -> NpcFrame {
        NpcFrame {
            id: self.id,
            name: self.name.clone(),
            kind: self.npc_kind().map(|k| k.name()).unwrap_or("").to_string(),
            health: state.health,
        }
    }

    pub fn player_frame(&self) -> PlayerFrame {
        let state = self.lock();
        self.player_frame_from(&state)
    }

    pub fn npc_frame(&self) -> NpcFrame {
        let state = self.lock();
        self.npc_frame_from(&state)
    }
}

// =============================================================================
// Ordered locking
// =============================================================================

/// Locks two distinct entities' states in id order and returns the guards
/// in argument order.
pub fn lock_pair<'a>(
    a: &'a Entity,
    b: &'a Entity,
) -> (MutexGuard<'a, EntityState>, MutexGuard<'a, EntityState>) {
    debug_assert_ne!(a.id, b.id, "lock_pair on a single entity");
    if a.id < b.id {
        let ga = a.lock();
        let gb = b.lock();
        (ga, gb)
    } else {
        let gb = b.lock();
        let ga = a.lock();
        (ga, gb)
    }
}

/// Same as [`lock_pair`] for inventories. Take state locks first.
pub fn lock_inventory_pair<'a>(
    a: &'a Entity,
    b: &'a Entity,
) -> (MutexGuard<'a, Inventory>, MutexGuard<'a, Inventory>) {
    debug_assert_ne!(a.id, b.id, "lock_inventory_pair on a single entity");
    if a.id < b.id {
        let ga = a.inventory();
        let gb = b.inventory();
        (ga, gb)
    } else {
        let gb = b.inventory();
        let ga = a.inventory();
        (ga, gb)
    }
}

/// State locks over any number of entities, taken in ascending id order
pub struct LockSet<'a> {
    guards: Vec<(EntityId, MutexGuard<'a, EntityState>)>,
}

impl<'a> LockSet<'a> {
    pub fn lock(entities: &[&'a Entity]) -> Self {
        let mut sorted: Vec<&'a Entity> = entities.to_vec();
        sorted.sort_by_key(|e| e.id);
        sorted.dedup_by_key(|e| e.id);
        Self {
            guards: sorted.into_iter().map(|e| (e.id, e.lock())).collect(),
        }
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityState> {
        self.guards
            .iter_mut()
            .find(|(gid, _)| *gid == id)
            .map(|(_, g)| &mut **g)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::tests::RecordingSession;

    /// A bare player entity with a recording session
    pub fn test_player(name: &str) -> (Arc<Entity>, Arc<RecordingSession>) {
        let session = Arc::new(RecordingSession::new());
        let mut state = EntityState::new(100, 100, 0, 20.0);
        state.player = Some(PlayerData::new(1, "TV".into()));
        let entity = Entity::new(
            name.into(),
            Role::Player,
            Some(session.clone() as Arc<dyn Session>),
            state,
            Inventory::default(),
        );
        (entity, session)
    }

    /// A bare NPC entity
    pub fn test_npc(name: &str, kind: NpcKind) -> Arc<Entity> {
        let mut state = EntityState::new(100, 50, 0, 50.0);
        state.npc = Some(NpcData::new("TV".into(), 50, 100));
        Entity::new(name.into(), Role::Npc(kind), None, state, Inventory::default())
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        assert!(b.id > a.id);
    }

    #[test]
    fn lock_pair_returns_guards_in_argument_order() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        {
            let (mut gb, ga) = lock_pair(&b, &a);
            gb.cash = 7;
            assert_eq!(ga.cash, 100);
        }
        assert_eq!(b.lock().cash, 7);
    }

    #[test]
    fn lock_set_dedups() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        let mut set = LockSet::lock(&[&b, &a, &b]);
        set.get_mut(a.id).unwrap().health = 1;
        assert_eq!(set.get_mut(a.id).unwrap().health, 1);
        assert!(set.get_mut(b.id).is_some());
    }

    #[test]
    fn npc_send_is_a_no_op() {
        let npc = test_npc("Bob", NpcKind::Homeless);
        assert!(npc.send(ServerEvent::normal("hello")));
        assert!(npc.is_connected());
    }
}
