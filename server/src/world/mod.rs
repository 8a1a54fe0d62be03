//! The world coordinator: owns every Region, the global roster and the
//! world-wide timers (autosave, restock), and drives login and logout.

pub mod building;
pub mod place;
pub mod region;

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use swi_shared::{BuildingType, ItemType, NpcKind, PlayerFrame, ServerEvent};

use crate::behavior;
use crate::config::Timings;
use crate::economy::trade;
use crate::entities::npc::build_npc;
use crate::entities::player::{build_player, character_state, saved_inventory, send_inventory, send_stats};
use crate::entities::{targeting, Entity, EntityId, Item, Roller};
use crate::error::{ConfigError, GameError};
use crate::persistence::{Location, Persistence};
use crate::session::Session;
use crate::templates::Templates;

use place::{Arrival, PlaceHandle};
use region::RegionHandle;

const RESTOCK_NEWS: &str =
    "<NEWS FLASH> Word on the street says that new shipments of illegal drugs has hit all major cities.";

const LOGIN_TIPS: &str = "Tip: type /help to see what you can do here.";

// =============================================================================
// Supervision
// =============================================================================

/// Runs one unit of actor work. A panic inside it is logged and swallowed so
/// the owning loop keeps serving its mailboxes.
pub(crate) async fn supervised<F>(owner: &str, what: &str, fut: F)
where
    F: Future<Output = ()>,
{
    if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
        error!("{} recovered from a fault in {}: {}", owner, what, panic_message(&panic));
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Handle
// =============================================================================

enum WorldCommand {
    Join {
        entity: Arc<Entity>,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Leave(EntityId),
    Broadcast(ServerEvent),
    FindPlayer {
        name: String,
        reply: oneshot::Sender<Option<Arc<Entity>>>,
    },
    Players(oneshot::Sender<Vec<Arc<Entity>>>),
}

struct WorldInner {
    templates: Arc<Templates>,
    timings: Timings,
    roller: Arc<dyn Roller>,
    persistence: Arc<dyn Persistence>,
    regions: Vec<RegionHandle>,
    commands: mpsc::UnboundedSender<WorldCommand>,
    shutdown: watch::Sender<bool>,
}

/// Cloneable handle to the running world
#[derive(Clone)]
pub struct World {
    inner: Arc<WorldInner>,
}

impl World {
    /// Builds every Region, spawns the initial NPCs and starts the world timers.
    /// Must be called from inside a tokio runtime.
    pub fn start(
        templates: Arc<Templates>,
        timings: Timings,
        roller: Arc<dyn Roller>,
        persistence: Arc<dyn Persistence>,
    ) -> Result<World, ConfigError> {
        let (shutdown, shutdown_rx) = watch::channel(false);

        let regions = templates
            .cities()
            .iter()
            .map(|city| {
                RegionHandle::spawn(
                    city,
                    templates.clone(),
                    roller.clone(),
                    timings.clone(),
                    shutdown_rx.clone(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let world = World {
            inner: Arc::new(WorldInner {
                templates: templates.clone(),
                timings,
                roller,
                persistence,
                regions,
                commands,
                shutdown,
            }),
        };

        tokio::spawn(Roster::default().run(commands_rx, shutdown_rx));

        let mut spawned = 0;
        for (city, region) in templates.cities().iter().zip(world.regions()) {
            for (kind, count) in &city.npc_spawns {
                for _ in 0..*count {
                    world.spawn_npc(region, *kind)?;
                    spawned += 1;
                }
            }
        }
        info!("World started: {} regions, {} NPCs", world.regions().len(), spawned);

        world.spawn_timers();
        Ok(world)
    }

    pub fn templates(&self) -> &Arc<Templates> {
        &self.inner.templates
    }

    pub fn timings(&self) -> &Timings {
        &self.inner.timings
    }

    pub fn roller(&self) -> &dyn Roller {
        self.inner.roller.as_ref()
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.inner.persistence
    }

    pub fn regions(&self) -> &[RegionHandle] {
        &self.inner.regions
    }

    /// Looks a region up by its city code, ignoring case
    pub fn region(&self, code: &str) -> Option<&RegionHandle> {
        self.inner
            .regions
            .iter()
            .find(|r| r.code().eq_ignore_ascii_case(code))
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Stops every actor and timer
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    // =========================================================================
    // Roster
    // =========================================================================

    /// Adds a player to the global roster. Fails if someone with the same
    /// name is already online.
    pub async fn join_roster(&self, entity: Arc<Entity>) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        let closed = || GameError::rejected("The world is shutting down.");
        if self.inner.commands.send(WorldCommand::Join { entity, reply }).is_err() {
            return Err(closed());
        }
        rx.await.unwrap_or_else(|_| Err(closed()))
    }

    pub fn leave_roster(&self, id: EntityId) {
        let _ = self.inner.commands.send(WorldCommand::Leave(id));
    }

    /// Delivers an event to every online player
    pub fn broadcast_global(&self, event: ServerEvent) {
        let _ = self.inner.commands.send(WorldCommand::Broadcast(event));
    }

    /// Online player by exact name, ignoring case
    pub async fn find_player(&self, name: &str) -> Option<Arc<Entity>> {
        let (reply, rx) = oneshot::channel();
        let command = WorldCommand::FindPlayer {
            name: name.to_string(),
            reply,
        };
        if self.inner.commands.send(command).is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn players(&self) -> Vec<Arc<Entity>> {
        let (reply, rx) = oneshot::channel();
        if self.inner.commands.send(WorldCommand::Players(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    // =========================================================================
    // Login / logout
    // =========================================================================

    /// Loads a character and puts it into the world
    pub async fn login(&self, user_id: i64, session: Arc<dyn Session>) -> Result<Arc<Entity>, GameError> {
        let persistence = self.persistence();
        let character = persistence
            .load_character(user_id)
            .await
            .ok_or_else(|| GameError::rejected("No character found for this account"))?;
        let saved = persistence.load_inventory(user_id).await;
        let gang = match character.gang_id {
            Some(id) => persistence.load_gang(id).await,
            None => None,
        };

        let last_location = character.last_location.clone();
        let entity = build_player(character, saved, gang, session, self.templates());
        let place = self
            .start_place(&entity, last_location.as_ref())
            .ok_or_else(|| GameError::rejected("There is nowhere to put you right now."))?;

        self.join_roster(entity.clone()).await?;
        place.arrive(Arrival::new(entity.clone(), None));

        send_stats(&entity);
        send_inventory(&entity, self.templates());
        entity.send(ServerEvent::normal(LOGIN_TIPS));
        behavior::auto_attack::spawn(self.clone(), entity.clone());

        info!("{} entered the world at {:?}", entity.name, place);
        Ok(entity)
    }

    /// Last known Place, else the home city's airport, else the first Place of the first region
    fn start_place(&self, entity: &Entity, last: Option<&Location>) -> Option<PlaceHandle> {
        if let Some(place) = last.and_then(|l| self.region(&l.city)?.place(l.coords).cloned()) {
            return Some(place);
        }
        let hometown = entity
            .lock()
            .player
            .as_ref()
            .map(|p| p.hometown.clone())
            .unwrap_or_default();
        if let Some(place) = self
            .region(&hometown)
            .and_then(|r| r.building_place(BuildingType::Airport).cloned())
        {
            return Some(place);
        }
        self.regions().first()?.places().first().cloned()
    }

    /// Takes a player out of the world. A player who is being hunted stays
    /// in place for the combat-logging grace period first.
    pub async fn logout(&self, entity: Arc<Entity>) {
        let hunted = !entity.lock().targeted_by.is_empty();
        if hunted {
            info!(target: "combat", "{} disconnected while in combat, combat logging", entity.name);
            self.save_player(&entity).await;
            tokio::time::sleep(self.timings().combat_logging).await;
        }

        for hunter in targeting::clear_all(&entity) {
            hunter.send(ServerEvent::normal(format!("{} is gone.", entity.name)));
        }
        trade::close_all(&entity);

        let location = entity.lock().location.take();
        if let Some(place) = location {
            place.depart(entity.clone(), None);
            place.region().leave(entity.clone());
        }
        self.leave_roster(entity.id);
        self.save_player(&entity).await;
        info!("{} left the world", entity.name);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub async fn save_player(&self, entity: &Entity) {
        let Some(state) = character_state(entity) else {
            return;
        };
        let user_id = state.user_id;
        let items = saved_inventory(entity);
        self.persistence().save_character(state).await;
        self.persistence().save_inventory(user_id, items).await;
    }

    pub async fn save_all(&self) {
        let players = self.players().await;
        for player in &players {
            self.save_player(player).await;
        }
        info!("Saved {} players", players.len());
    }

    // =========================================================================
    // NPCs and economy
    // =========================================================================

    /// Creates an NPC of `kind` at a random Place of `region` and starts its behaviour
    pub fn spawn_npc(&self, region: &RegionHandle, kind: NpcKind) -> Result<Arc<Entity>, ConfigError> {
        let template = self.templates().npc(kind)?;
        let npc = build_npc(self.templates(), template, region.code(), self.roller())?;
        let coords = region.random_coords(self.roller());
        let place = region
            .place(coords)
            .ok_or_else(|| ConfigError::EmptyRegion(region.code().to_string()))?;

        region.register_npc(npc.clone());
        place.npc_arrive(Arrival::new(npc.clone(), None));
        behavior::spawn(self.clone(), npc.clone());
        debug!("Spawned {} ({}) in {} at {}", npc.name, kind.name(), region.code(), coords);
        Ok(npc)
    }

    /// Refills dealers, empties addicts, re-rolls demand and announces it
    pub async fn restock(&self) {
        let drugs = self.templates().drugs();
        for region in self.regions() {
            if !drugs.is_empty() {
                for dealer in region.npcs(Some(NpcKind::DrugDealer)).await {
                    let mut inventory = dealer.inventory();
                    for index in 0..inventory.capacity() {
                        if inventory.get(index).is_some() {
                            continue;
                        }
                        let drug = &drugs[self.roller().below(drugs.len())];
                        let Some(template) = self.templates().item(drug) else {
                            continue;
                        };
                        let condition = self.roller().range(1, 100) as f32 / 100.0;
                        let _ = inventory.put(index, Item::new(template).with_condition(condition));
                    }
                }
                for addict in region.npcs(Some(NpcKind::DrugAddict)).await {
                    let mut inventory = addict.inventory();
                    let stock: Vec<usize> = inventory
                        .items()
                        .filter(|(_, item)| {
                            self.templates()
                                .item(&item.template)
                                .is_some_and(|t| t.item_type == ItemType::Drug)
                        })
                        .map(|(index, _)| index)
                        .collect();
                    for index in stock {
                        inventory.take(index);
                    }
                }
            }
            region.reroll_demand();
        }
        self.broadcast_global(ServerEvent::NewsFlash {
            message: RESTOCK_NEWS.to_string(),
        });
        info!("Drug merchants restocked");
    }

    fn spawn_timers(&self) {
        let world = self.clone();
        let mut shutdown = self.shutdown_receiver();
        tokio::spawn(async move {
            let period = world.timings().autosave;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        supervised("world", "autosave", world.save_all()).await;
                    }
                }
            }
            debug!("autosave stopped");
        });

        let world = self.clone();
        let mut shutdown = self.shutdown_receiver();
        tokio::spawn(async move {
            let mut ticker = interval(world.timings().restock);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        supervised("world", "restock", world.restock()).await;
                    }
                }
            }
            debug!("restock stopped");
        });
    }
}

// =============================================================================
// Actor
// =============================================================================

#[derive(Default)]
struct Roster {
    players: BTreeMap<EntityId, Arc<Entity>>,
}

impl Roster {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorldCommand>, mut shutdown: watch::Receiver<bool>) {
        info!("world roster started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(command) = rx.recv() => {
                    supervised("world", "command", async { self.on_command(command) }).await
                }
                else => break,
            }
        }
        info!("world roster stopped");
    }

    fn on_command(&mut self, command: WorldCommand) {
        match command {
            WorldCommand::Join { entity, reply } => {
                let taken = self
                    .players
                    .values()
                    .any(|p| p.name.eq_ignore_ascii_case(&entity.name));
                if taken {
                    let _ = reply.send(Err(GameError::AlreadyOnline(entity.name.clone())));
                    return;
                }
                self.players.insert(entity.id, entity);
                let _ = reply.send(Ok(()));
                self.broadcast(self.player_list());
            }
            WorldCommand::Leave(id) => {
                if self.players.remove(&id).is_some() {
                    self.broadcast(self.player_list());
                }
            }
            WorldCommand::Broadcast(event) => self.broadcast(event),
            WorldCommand::FindPlayer { name, reply } => {
                let found = self
                    .players
                    .values()
                    .find(|p| p.name.eq_ignore_ascii_case(&name))
                    .cloned();
                let _ = reply.send(found);
            }
            WorldCommand::Players(reply) => {
                let _ = reply.send(self.players.values().cloned().collect());
            }
        }
    }

    fn player_list(&self) -> ServerEvent {
        let players: Vec<PlayerFrame> = self.players.values().map(|p| p.player_frame()).collect();
        ServerEvent::PlayerList { players }
    }

    /// A player whose delivery fails is only dropped once its session is gone;
    /// a full queue alone does not log anyone out.
    fn broadcast(&mut self, event: ServerEvent) {
        let mut gone = Vec::new();
        for (id, player) in &self.players {
            if !player.send(event.clone()) && !player.is_connected() {
                gone.push(*id);
            }
        }
        for id in gone {
            if let Some(player) = self.players.remove(&id) {
                warn!("Dropping disconnected session of {} from the world roster", player.name);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::entities::skills::ScriptedRoller;
    use crate::entities::tests::test_player;
    use crate::persistence::{CharacterState, MemoryStore};
    use crate::session::tests::RecordingSession;
    use crate::templates::tests::small_world;
    use std::sync::atomic::Ordering;
    use swi_shared::Coordinates;

    /// A world over the small test map, with every roll fixed to `roll`
    pub fn test_world(roll: f64) -> (World, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let world = World::start(
            Arc::new(small_world()),
            Timings::default(),
            Arc::new(ScriptedRoller::always(roll)),
            store.clone(),
        )
        .unwrap();
        (world, store)
    }

    pub async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    /// Places `entity` at `coords` of the first test region and waits for it to land
    pub async fn put_at(world: &World, entity: &Arc<Entity>, coords: Coordinates) -> PlaceHandle {
        let place = world.regions()[0].place(coords).unwrap().clone();
        if entity.is_player() {
            place.arrive(Arrival::new(entity.clone(), None));
        } else {
            place.npc_arrive(Arrival::new(entity.clone(), None));
        }
        settle().await;
        place
    }

    #[tokio::test]
    async fn supervised_swallows_panics() {
        supervised("test", "boom", async {
            panic!("boom");
        })
        .await;
        let mut ran = false;
        supervised("test", "fine", async { ran = true }).await;
        assert!(ran);
    }

    #[tokio::test(start_paused = true)]
    async fn roster_rejects_duplicate_names() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (again, _) = test_player("alice");
        world.join_roster(alice.clone()).await.unwrap();
        assert_eq!(
            world.join_roster(again).await,
            Err(GameError::AlreadyOnline("alice".into()))
        );
        assert_eq!(world.find_player("ALICE").await.map(|p| p.id), Some(alice.id));

        world.leave_roster(alice.id);
        assert!(world.find_player("alice").await.is_none());
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn global_broadcast_drops_disconnected_players() {
        let (world, _) = test_world(0.0);
        let (alice, alice_session) = test_player("Alice");
        let (bob, bob_session) = test_player("Bob");
        world.join_roster(alice.clone()).await.unwrap();
        world.join_roster(bob.clone()).await.unwrap();

        bob_session.connected.store(false, Ordering::SeqCst);
        world.broadcast_global(ServerEvent::NewsFlash { message: "Extra!".into() });
        let players = world.players().await;
        assert_eq!(players.len(), 1);
        assert!(alice_session
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, ServerEvent::NewsFlash { message } if message == "Extra!")));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn login_places_new_character_at_hometown_airport() {
        let (world, store) = test_world(0.0);
        let user_id = store.register("Alice", "secret1", "TV").await.unwrap();
        let session = Arc::new(RecordingSession::new());

        let alice = world.login(user_id, session.clone()).await.unwrap();
        settle().await;
        let place = alice.location().unwrap();
        assert_eq!(place.region_code(), "TV");
        assert_eq!(place.coords(), Coordinates::new(4, 4));
        assert!(session
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, ServerEvent::StatsSnapshot(_))));

        let twice = world.login(user_id, Arc::new(RecordingSession::new())).await;
        assert!(matches!(twice, Err(GameError::AlreadyOnline(_))));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn logout_saves_and_leaves_the_place() {
        let (world, store) = test_world(0.0);
        let user_id = store.register("Alice", "secret1", "TV").await.unwrap();
        let session = Arc::new(RecordingSession::new());
        let alice = world.login(user_id, session).await.unwrap();
        settle().await;
        let place = alice.location().unwrap();

        alice.lock().cash = 777;
        world.logout(alice.clone()).await;
        settle().await;

        assert!(!place.snapshot().await.contains(alice.id));
        assert!(world.players().await.is_empty());
        let saved: CharacterState = store.load_character(user_id).await.unwrap();
        assert_eq!(saved.cash, 777);
        assert_eq!(saved.last_location, Some(place.location()));
        world.shutdown();
    }

    #[tokio::test]
    async fn hanging_up_mid_step_leaves_no_trace() {
        let (world, store) = test_world(0.0);
        let user_id = store.register("Alice", "secret1", "TV").await.unwrap();
        let session = Arc::new(RecordingSession::new());
        let alice = world.login(user_id, session.clone()).await.unwrap();
        settle().await;
        let region = world.region("TV").unwrap().clone();
        let origin = alice.location().unwrap();
        let destination = region
            .places()
            .iter()
            .find(|p| !p.same_as(&origin))
            .unwrap()
            .clone();

        // The step is on its way when the connection drops
        alice.lock().location = None;
        destination.arrive(Arrival::new(alice.clone(), Some(origin.clone())));
        session.connected.store(false, Ordering::SeqCst);
        world.logout(alice.clone()).await;
        settle().await;

        assert!(alice.location().is_none());
        assert!(!destination.snapshot().await.contains(alice.id));
        assert!(!origin.snapshot().await.contains(alice.id));
        assert!(region.roster().await.is_empty());
        assert!(world.players().await.is_empty());
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn hunted_player_lingers_for_the_grace_period() {
        let (world, store) = test_world(0.0);
        let user_id = store.register("Alice", "secret1", "TV").await.unwrap();
        let alice = world.login(user_id, Arc::new(RecordingSession::new())).await.unwrap();
        let (bob, bob_session) = test_player("Bob");
        settle().await;
        let place = alice.location().unwrap();
        place.arrive(Arrival::new(bob.clone(), None));
        settle().await;
        targeting::aim(&bob, &alice).unwrap();

        let started = Instant::now();
        world.logout(alice.clone()).await;
        assert!(started.elapsed() >= world.timings().combat_logging);
        assert!(bob.lock().current_target.is_none());
        assert!(bob_session.saw("Alice is gone."));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn restock_fills_dealers_and_empties_addicts() {
        let (world, _) = test_world(0.0);
        let region = world.regions()[0].clone();
        let dealer = world.spawn_npc(&region, NpcKind::DrugDealer).unwrap();
        let addict = world.spawn_npc(&region, NpcKind::DrugAddict).unwrap();
        let weed = world.templates().item("weed").unwrap();
        let _ = addict.inventory().add(Item::new(weed));
        settle().await;

        world.restock().await;

        let dealer_inv = dealer.inventory();
        assert!(dealer_inv.is_full());
        assert!(dealer_inv
            .items()
            .all(|(_, i)| i.condition >= 0.01 && i.condition <= 1.0));
        assert!(!addict.inventory().has_template("weed"));
        assert_eq!(addict.inventory().count(), 3);
        world.shutdown();
    }
}
