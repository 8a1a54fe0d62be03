//! The Place actor: owns one map cell's occupants and ground items.
//!
//! All mutation of a Place's sets happens inside its own task. Callers only
//! hold a [`PlaceHandle`] and post to one of its mailboxes. Mailboxes are
//! unbounded so one Place never waits on another.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot, watch};

use swi_shared::{
    BuildingType, Coordinates, Direction, ItemFrame, LocationFrame, MoveEventType, ServerEvent,
};

use super::building::Building;
use super::region::RegionLink;
use super::supervised;
use crate::entities::player::{send_inventory, send_stats};
use crate::entities::{targeting, Entity, EntityId, Item};
use crate::error::GameError;
use crate::persistence::Location;
use crate::templates::Templates;

// =============================================================================
// Messages
// =============================================================================

/// An entity entering a Place
pub struct Arrival {
    pub entity: Arc<Entity>,
    /// Place the entity comes from. `None` on login or spawn.
    pub origin: Option<PlaceHandle>,
    /// Direction of travel, for adjacent moves
    pub direction: Option<Direction>,
    /// Set when the mover is escaping combat
    pub fled: bool,
}

impl Arrival {
    pub fn new(entity: Arc<Entity>, origin: Option<PlaceHandle>) -> Self {
        Self {
            entity,
            origin,
            direction: None,
            fled: false,
        }
    }

    pub fn step(entity: Arc<Entity>, origin: PlaceHandle, direction: Direction) -> Self {
        Self {
            entity,
            origin: Some(origin),
            direction: Some(direction),
            fled: false,
        }
    }
}

struct Departure {
    entity: Arc<Entity>,
    direction: Option<Direction>,
}

struct DroppedItem {
    item: Item,
    by: Option<Arc<Entity>>,
}

struct PickupRequest {
    /// Short id, full id or name prefix
    query: String,
    requester: Arc<Entity>,
}

struct Broadcast {
    event: ServerEvent,
    exclude: Vec<EntityId>,
}

/// Read-only view of a Place at one instant
#[derive(Debug, Default)]
pub struct PlaceSnapshot {
    pub players: Vec<Arc<Entity>>,
    pub npcs: Vec<Arc<Entity>>,
    pub items: Vec<ItemFrame>,
}

impl PlaceSnapshot {
    /// Finds a player or NPC other than `skip` by case-insensitive name prefix.
    /// Players win ties.
    pub fn find_by_name(&self, prefix: &str, skip: EntityId) -> Option<Arc<Entity>> {
        let prefix = prefix.to_lowercase();
        self.players
            .iter()
            .chain(self.npcs.iter())
            .find(|e| e.id != skip && e.name.to_lowercase().starts_with(&prefix))
            .cloned()
    }

    /// Everything a client needs to draw `place` as seen in this snapshot
    pub fn location_event(&self, place: &PlaceHandle) -> ServerEvent {
        let region = place.region();
        ServerEvent::LocationSnapshot(LocationFrame {
            city: region.name.to_string(),
            city_code: region.code.to_string(),
            coords: place.coords(),
            players: self.players.iter().map(|p| p.player_frame()).collect(),
            npcs: self.npcs.iter().map(|n| n.npc_frame()).collect(),
            items: self.items.clone(),
            buildings: place.buildings().iter().map(|b| b.frame()).collect(),
        })
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.players.iter().chain(self.npcs.iter()).any(|e| e.id == id)
    }
}

// =============================================================================
// Handle
// =============================================================================

struct Mailboxes {
    arrive: mpsc::UnboundedSender<Arrival>,
    npc_arrive: mpsc::UnboundedSender<Arrival>,
    depart: mpsc::UnboundedSender<Departure>,
    item_dropped: mpsc::UnboundedSender<DroppedItem>,
    pickup: mpsc::UnboundedSender<PickupRequest>,
    broadcast: mpsc::UnboundedSender<Broadcast>,
    respawn: mpsc::UnboundedSender<Arrival>,
    query: mpsc::UnboundedSender<oneshot::Sender<PlaceSnapshot>>,
}

struct Receivers {
    arrive: mpsc::UnboundedReceiver<Arrival>,
    npc_arrive: mpsc::UnboundedReceiver<Arrival>,
    depart: mpsc::UnboundedReceiver<Departure>,
    item_dropped: mpsc::UnboundedReceiver<DroppedItem>,
    pickup: mpsc::UnboundedReceiver<PickupRequest>,
    broadcast: mpsc::UnboundedReceiver<Broadcast>,
    respawn: mpsc::UnboundedReceiver<Arrival>,
    query: mpsc::UnboundedReceiver<oneshot::Sender<PlaceSnapshot>>,
}

struct PlaceLink {
    region: RegionLink,
    coords: Coordinates,
    buildings: Vec<Arc<Building>>,
    mailboxes: Mailboxes,
}

/// Cheap, cloneable address of a Place
#[derive(Clone)]
pub struct PlaceHandle {
    inner: Arc<PlaceLink>,
}

impl std::fmt::Debug for PlaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Place({} {})", self.inner.region.code, self.inner.coords)
    }
}

impl PlaceHandle {
    /// Creates the Place and spawns its actor task
    pub fn spawn(
        region: RegionLink,
        coords: Coordinates,
        buildings: Vec<Arc<Building>>,
        templates: Arc<Templates>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (arrive, arrive_rx) = mpsc::unbounded_channel();
        let (npc_arrive, npc_arrive_rx) = mpsc::unbounded_channel();
        let (depart, depart_rx) = mpsc::unbounded_channel();
        let (item_dropped, item_dropped_rx) = mpsc::unbounded_channel();
        let (pickup, pickup_rx) = mpsc::unbounded_channel();
        let (broadcast, broadcast_rx) = mpsc::unbounded_channel();
        let (respawn, respawn_rx) = mpsc::unbounded_channel();
        let (query, query_rx) = mpsc::unbounded_channel();

        let handle = Self {
            inner: Arc::new(PlaceLink {
                region,
                coords,
                buildings,
                mailboxes: Mailboxes {
                    arrive,
                    npc_arrive,
                    depart,
                    item_dropped,
                    pickup,
                    broadcast,
                    respawn,
                    query,
                },
            }),
        };

        let place = Place {
            handle: handle.clone(),
            templates,
            players: BTreeMap::new(),
            npcs: BTreeMap::new(),
            ground: Vec::new(),
        };
        let receivers = Receivers {
            arrive: arrive_rx,
            npc_arrive: npc_arrive_rx,
            depart: depart_rx,
            item_dropped: item_dropped_rx,
            pickup: pickup_rx,
            broadcast: broadcast_rx,
            respawn: respawn_rx,
            query: query_rx,
        };
        tokio::spawn(place.run(receivers, shutdown));
        handle
    }

    pub fn coords(&self) -> Coordinates {
        self.inner.coords
    }

    pub fn region(&self) -> &RegionLink {
        &self.inner.region
    }

    pub fn region_code(&self) -> &str {
        &self.inner.region.code
    }

    pub fn same_as(&self, other: &PlaceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn location(&self) -> Location {
        Location {
            city: self.region_code().to_string(),
            coords: self.coords(),
        }
    }

    pub fn buildings(&self) -> &[Arc<Building>] {
        &self.inner.buildings
    }

    pub fn building(&self, building_type: BuildingType) -> Option<&Arc<Building>> {
        self.inner
            .buildings
            .iter()
            .find(|b| b.building_type == building_type)
    }

    // Mailboxes. A closed mailbox only happens during shutdown, so sends are
    // fire and forget.

    pub fn arrive(&self, arrival: Arrival) {
        let _ = self.inner.mailboxes.arrive.send(arrival);
    }

    pub fn npc_arrive(&self, arrival: Arrival) {
        let _ = self.inner.mailboxes.npc_arrive.send(arrival);
    }

    /// Removes a player or NPC. Ignored if the entity already points at
    /// this Place again.
    pub fn depart(&self, entity: Arc<Entity>, direction: Option<Direction>) {
        let _ = self.inner.mailboxes.depart.send(Departure { entity, direction });
    }

    pub fn item_dropped(&self, item: Item, by: Option<Arc<Entity>>) {
        let _ = self.inner.mailboxes.item_dropped.send(DroppedItem { item, by });
    }

    pub fn pickup(&self, query: impl Into<String>, requester: Arc<Entity>) {
        let _ = self.inner.mailboxes.pickup.send(PickupRequest {
            query: query.into(),
            requester,
        });
    }

    pub fn broadcast(&self, event: ServerEvent, exclude: &[EntityId]) {
        let _ = self.inner.mailboxes.broadcast.send(Broadcast {
            event,
            exclude: exclude.to_vec(),
        });
    }

    /// Brings a dead player back at this Place
    pub fn respawn_arrival(&self, entity: Arc<Entity>, origin: Option<PlaceHandle>) {
        let _ = self.inner.mailboxes.respawn.send(Arrival::new(entity, origin));
    }

    pub async fn snapshot(&self) -> PlaceSnapshot {
        let (tx, rx) = oneshot::channel();
        if self.inner.mailboxes.query.send(tx).is_err() {
            return PlaceSnapshot::default();
        }
        rx.await.unwrap_or_default()
    }
}

// =============================================================================
// Actor
// =============================================================================

struct Place {
    handle: PlaceHandle,
    templates: Arc<Templates>,
    players: BTreeMap<EntityId, Arc<Entity>>,
    npcs: BTreeMap<EntityId, Arc<Entity>>,
    ground: Vec<Item>,
}

impl Place {
    async fn run(mut self, mut rx: Receivers, mut shutdown: watch::Receiver<bool>) {
        let label = format!("place {:?}", self.handle);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(msg) = rx.depart.recv() => {
                    supervised(&label, "depart", async { self.on_depart(msg) }).await
                }
                Some(msg) = rx.arrive.recv() => {
                    supervised(&label, "arrive", async { self.on_arrive(msg) }).await
                }
                Some(msg) = rx.npc_arrive.recv() => {
                    supervised(&label, "npc_arrive", async { self.on_npc_arrive(msg) }).await
                }
                Some(msg) = rx.respawn.recv() => {
                    supervised(&label, "respawn", async { self.on_respawn(msg) }).await
                }
                Some(msg) = rx.item_dropped.recv() => {
                    supervised(&label, "item_dropped", async { self.on_item_dropped(msg) }).await
                }
                Some(msg) = rx.pickup.recv() => {
                    supervised(&label, "pickup", async { self.on_pickup(msg) }).await
                }
                Some(msg) = rx.broadcast.recv() => {
                    supervised(&label, "broadcast", async { self.on_broadcast(msg) }).await
                }
                Some(reply) = rx.query.recv() => {
                    let _ = reply.send(self.snapshot());
                }
                else => break,
            }
        }
        debug!("{} stopped", label);
    }

    fn is_here(&self, entity: &Entity) -> bool {
        entity
            .location()
            .map(|l| l.same_as(&self.handle))
            .unwrap_or(false)
    }

    /// Moves the region roster and tells the origin to let go
    fn leave_origin(&self, entity: &Arc<Entity>, origin: Option<&PlaceHandle>, direction: Option<Direction>) {
        match origin {
            Some(origin) if origin.same_as(&self.handle) => {}
            Some(origin) => {
                origin.depart(entity.clone(), direction);
                if entity.is_player() && origin.region_code() != self.handle.region_code() {
                    origin.region().leave(entity.clone());
                    self.handle.region().join(entity.clone());
                }
            }
            None => {
                if entity.is_player() {
                    self.handle.region().join(entity.clone());
                }
            }
        }
    }

    /// A player who logged out while in transit: let go of the origin and
    /// its roster instead of landing here
    fn drop_arrival(&mut self, entity: &Arc<Entity>, origin: Option<&PlaceHandle>, direction: Option<Direction>) {
        self.players.remove(&entity.id);
        if let Some(origin) = origin {
            if !origin.same_as(&self.handle) {
                origin.depart(entity.clone(), direction);
            }
            origin.region().leave(entity.clone());
        }
        debug!("{} logged out before reaching {:?}", entity.name, self.handle);
    }

    fn settle(&self, entity: &Entity) {
        let mut state = entity.lock();
        state.location = Some(self.handle.clone());
        if let Some(player) = state.player.as_mut() {
            player.last_location = Some(self.handle.location());
        }
    }

    fn on_arrive(&mut self, arrival: Arrival) {
        let Arrival {
            entity,
            origin,
            direction,
            fled,
        } = arrival;

        if entity.is_player() && !entity.is_connected() {
            self.drop_arrival(&entity, origin.as_ref(), direction);
            return;
        }
        self.leave_origin(&entity, origin.as_ref(), direction);

        if fled {
            for hunter in targeting::clear_all(&entity) {
                hunter.send(ServerEvent::warning(format!("{} got away.", entity.name)));
            }
            entity.send(ServerEvent::success("You got away!"));
            info!(target: "combat", "{} fled to {} {}", entity.name, self.handle.region_code(), self.handle.coords());
        }

        self.settle(&entity);
        self.players.insert(entity.id, entity.clone());

        let event = ServerEvent::PlayerMove {
            move_type: MoveEventType::Arrive,
            player: entity.player_frame(),
            direction: direction.map(|d| d.opposite()),
        };
        self.broadcast_event(event, &[entity.id]);
        entity.send(self.location_event());
    }

    fn on_npc_arrive(&mut self, arrival: Arrival) {
        let Arrival {
            entity,
            origin,
            direction,
            ..
        } = arrival;

        self.leave_origin(&entity, origin.as_ref(), direction);
        self.settle(&entity);
        self.npcs.insert(entity.id, entity.clone());

        let event = ServerEvent::NpcMove {
            move_type: MoveEventType::Arrive,
            npc: entity.npc_frame(),
            direction: direction.map(|d| d.opposite()),
        };
        self.broadcast_event(event, &[]);
    }

    fn on_respawn(&mut self, arrival: Arrival) {
        let entity = arrival.entity.clone();
        entity.lock().dead = false;
        if !entity.is_connected() {
            // Logged out while dead, the saved state already has the respawn stats
            return;
        }
        self.on_arrive(arrival);
        entity.send(ServerEvent::normal(
            "You wake up in a hospital bed, patched up but lighter in the pocket.",
        ));
        send_stats(&entity);
        send_inventory(&entity, &self.templates);
    }

    fn on_depart(&mut self, departure: Departure) {
        let Departure { entity, direction } = departure;
        if self.is_here(&entity) {
            // Came back before this message was processed
            return;
        }

        if self.players.remove(&entity.id).is_some() {
            let event = ServerEvent::PlayerMove {
                move_type: MoveEventType::Leave,
                player: entity.player_frame(),
                direction,
            };
            self.broadcast_event(event, &[]);
        } else if self.npcs.remove(&entity.id).is_some() {
            let event = ServerEvent::NpcMove {
                move_type: MoveEventType::Leave,
                npc: entity.npc_frame(),
                direction,
            };
            self.broadcast_event(event, &[]);
        }
    }

    fn on_item_dropped(&mut self, dropped: DroppedItem) {
        let frame = dropped.item.frame(&self.templates, false);
        let exclude: Vec<EntityId> = dropped.by.iter().map(|e| e.id).collect();
        self.ground.push(dropped.item);
        self.broadcast_event(
            ServerEvent::GroundItem {
                move_type: MoveEventType::Arrive,
                item: frame,
            },
            &exclude,
        );
    }

    fn find_ground_item(&self, query: &str) -> Option<usize> {
        if let Some(index) = self.ground.iter().position(|i| i.matches_id(query)) {
            return Some(index);
        }
        let query = query.to_lowercase();
        self.ground.iter().position(|i| {
            self.templates
                .item_name(&i.template)
                .to_lowercase()
                .starts_with(&query)
        })
    }

    fn on_pickup(&mut self, request: PickupRequest) {
        let PickupRequest { query, requester } = request;

        if !self.players.contains_key(&requester.id) {
            requester.send(ServerEvent::failure(GameError::NotSameLocation.to_string()));
            return;
        }
        let Some(index) = self.find_ground_item(&query) else {
            requester.send(ServerEvent::failure("That item is no longer here."));
            return;
        };

        let item = self.ground.remove(index);
        let frame = item.frame(&self.templates, false);
        let result = requester.inventory().add(item);
        match result {
            Ok(_) => {
                info!(
                    target: "items",
                    "{} picked up {} at {} {}",
                    requester.name,
                    frame.template,
                    self.handle.region_code(),
                    self.handle.coords()
                );
                requester.send(ServerEvent::success(format!("You picked up {}.", frame.name)));
                send_inventory(&requester, &self.templates);
                self.broadcast_event(
                    ServerEvent::GroundItem {
                        move_type: MoveEventType::Leave,
                        item: frame,
                    },
                    &[requester.id],
                );
            }
            Err(item) => {
                self.ground.insert(index, item);
                requester.send(ServerEvent::failure(GameError::InventoryFull.to_string()));
            }
        }
    }

    fn on_broadcast(&mut self, broadcast: Broadcast) {
        self.broadcast_event(broadcast.event, &broadcast.exclude);
    }

    /// Delivers to every player here. A disconnected session is dropped from
    /// the Place; a full queue only loses this event.
    fn broadcast_event(&mut self, event: ServerEvent, exclude: &[EntityId]) {
        let mut dropped = Vec::new();
        for (id, player) in &self.players {
            if exclude.contains(id) {
                continue;
            }
            if !player.send(event.clone()) && !player.is_connected() {
                dropped.push(*id);
            }
        }
        for id in dropped {
            if let Some(player) = self.players.remove(&id) {
                debug!("Dropping unresponsive session of {} from {:?}", player.name, self.handle);
            }
        }
    }

    fn snapshot(&self) -> PlaceSnapshot {
        PlaceSnapshot {
            players: self.players.values().cloned().collect(),
            npcs: self.npcs.values().cloned().collect(),
            items: self
                .ground
                .iter()
                .map(|i| i.frame(&self.templates, false))
                .collect(),
        }
    }

    fn location_event(&self) -> ServerEvent {
        self.snapshot().location_event(&self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::{test_npc, test_player};
    use crate::templates::tests::small_world;
    use swi_shared::NpcKind;
    use tokio::task::yield_now;

    struct Fixture {
        a: PlaceHandle,
        b: PlaceHandle,
        templates: Arc<Templates>,
        _shutdown: watch::Sender<bool>,
    }

    fn fixture() -> Fixture {
        let (shutdown_tx, shutdown) = watch::channel(false);
        let templates = Arc::new(small_world());
        let (region, _rx) = RegionLink::detached("TV", "Testville");
        let a = PlaceHandle::spawn(region.clone(), Coordinates::new(1, 1), Vec::new(), templates.clone(), shutdown.clone());
        let b = PlaceHandle::spawn(region, Coordinates::new(2, 1), Vec::new(), templates.clone(), shutdown);
        Fixture {
            a,
            b,
            templates,
            _shutdown: shutdown_tx,
        }
    }

    async fn settle() {
        for _ in 0..20 {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn arrive_moves_between_places() {
        let f = fixture();
        let (alice, _) = test_player("Alice");
        let (bob, bob_session) = test_player("Bob");

        f.a.arrive(Arrival::new(alice.clone(), None));
        f.b.arrive(Arrival::new(bob.clone(), None));
        settle().await;
        assert!(f.a.snapshot().await.contains(alice.id));

        alice.lock().location = None;
        f.b.arrive(Arrival::step(alice.clone(), f.a.clone(), Direction::North));
        settle().await;

        assert!(!f.a.snapshot().await.contains(alice.id));
        assert!(f.b.snapshot().await.contains(alice.id));
        assert!(alice.location().unwrap().same_as(&f.b));

        let saw_arrival = bob_session.events.lock().iter().any(|e| {
            matches!(e, ServerEvent::PlayerMove { move_type: MoveEventType::Arrive, player, direction: Some(Direction::South) } if player.id == alice.id)
        });
        assert!(saw_arrival);
    }

    #[tokio::test]
    async fn stale_depart_is_ignored() {
        let f = fixture();
        let (alice, _) = test_player("Alice");
        f.a.arrive(Arrival::new(alice.clone(), None));
        settle().await;
        // Alice is back at A before the departure from an earlier move lands
        f.a.depart(alice.clone(), Some(Direction::North));
        settle().await;
        assert!(f.a.snapshot().await.contains(alice.id));
    }

    #[tokio::test]
    async fn pickup_moves_item_into_inventory() {
        let f = fixture();
        let (alice, session) = test_player("Alice");
        f.a.arrive(Arrival::new(alice.clone(), None));
        let weed = Item::new(f.templates.item("weed").unwrap());
        let short = weed.short_id();
        f.a.item_dropped(weed, None);
        settle().await;

        f.a.pickup(short.clone(), alice.clone());
        settle().await;
        assert_eq!(alice.inventory().count(), 1);
        assert!(f.a.snapshot().await.items.is_empty());

        f.a.pickup(short, alice.clone());
        settle().await;
        assert!(session.saw("no longer here"));
        assert_eq!(alice.inventory().count(), 1);
    }

    #[tokio::test]
    async fn pickup_with_full_inventory_leaves_item_on_ground() {
        let f = fixture();
        let (alice, session) = test_player("Alice");
        {
            let mut inv = alice.inventory();
            while !inv.is_full() {
                let _ = inv.add(Item::new(f.templates.item("pcp").unwrap()));
            }
        }
        f.a.arrive(Arrival::new(alice.clone(), None));
        f.a.item_dropped(Item::new(f.templates.item("goldchain").unwrap()), None);
        settle().await;

        f.a.pickup("gold", alice.clone());
        settle().await;
        assert!(session.saw("no more inventory space left"));
        assert_eq!(f.a.snapshot().await.items.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_drops_disconnected_sessions() {
        let f = fixture();
        let (alice, alice_session) = test_player("Alice");
        let (bob, _) = test_player("Bob");
        f.a.arrive(Arrival::new(alice.clone(), None));
        f.a.arrive(Arrival::new(bob.clone(), None));
        settle().await;

        alice_session.connected.store(false, std::sync::atomic::Ordering::SeqCst);
        f.a.broadcast(ServerEvent::normal("A siren wails."), &[]);
        settle().await;

        let snapshot = f.a.snapshot().await;
        assert!(!snapshot.contains(alice.id));
        assert!(snapshot.contains(bob.id));
    }

    #[tokio::test]
    async fn a_full_queue_keeps_a_connected_player_in_place() {
        use crate::entities::{EntityState, Inventory, PlayerData, Role};
        use crate::session::{ChannelSession, Session};

        let f = fixture();
        let (session, _events) = ChannelSession::new();
        let session = Arc::new(session);
        let mut state = EntityState::new(100, 100, 0, 20.0);
        state.player = Some(PlayerData::new(1, "TV".into()));
        let alice = Entity::new(
            "Alice".into(),
            Role::Player,
            Some(session.clone() as Arc<dyn Session>),
            state,
            Inventory::default(),
        );
        f.a.arrive(Arrival::new(alice.clone(), None));
        settle().await;

        while session.deliver(ServerEvent::normal("backlog")) {}
        f.a.broadcast(ServerEvent::normal("A siren wails."), &[]);
        settle().await;

        assert!(session.is_connected());
        assert!(f.a.snapshot().await.contains(alice.id));
        assert!(alice.location().is_some_and(|l| l.same_as(&f.a)));
    }

    #[tokio::test]
    async fn npcs_are_found_by_name_prefix() {
        let f = fixture();
        let npc = test_npc("Maverick", NpcKind::Tourist);
        f.a.npc_arrive(Arrival::new(npc.clone(), None));
        settle().await;
        let snapshot = f.a.snapshot().await;
        assert_eq!(snapshot.find_by_name("mav", 0).map(|e| e.id), Some(npc.id));
        assert!(snapshot.find_by_name("zed", 0).is_none());
    }
}
