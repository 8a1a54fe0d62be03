//! Region (city) coordinator: the grid of Places, the roster of present
//! players, the NPC registry and the city-wide economy timers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Duration, Instant};

use swi_shared::{BuildingType, CityTemplate, Coordinates, ItemType, NpcKind, ServerEvent};

use super::building::Building;
use super::place::PlaceHandle;
use super::supervised;
use crate::config::Timings;
use crate::entities::{Entity, EntityId, Roller};
use crate::error::ConfigError;
use crate::templates::Templates;

const INFORMANT_MESSAGE: &str =
    "Informant: \"(Phone) Yo, the demand for different dope has changed. If you need any directions just call me\"";

// =============================================================================
// Link
// =============================================================================

/// Roster updates share one mailbox so they apply in send order
pub enum RosterChange {
    Join(Arc<Entity>),
    Leave(Arc<Entity>),
}

/// The roster mailbox of a Region, as seen by its Places
#[derive(Clone)]
pub struct RegionLink {
    pub code: Arc<str>,
    pub name: Arc<str>,
    roster_tx: mpsc::UnboundedSender<RosterChange>,
}

impl RegionLink {
    pub fn join(&self, entity: Arc<Entity>) {
        let _ = self.roster_tx.send(RosterChange::Join(entity));
    }

    /// Removes a player from the roster unless it is back in this region by
    /// the time the message is processed
    pub fn leave(&self, entity: Arc<Entity>) {
        let _ = self.roster_tx.send(RosterChange::Leave(entity));
    }

    /// A link whose roster is not served by a Region actor
    #[cfg(test)]
    pub fn detached(code: &str, name: &str) -> (Self, mpsc::UnboundedReceiver<RosterChange>) {
        let (roster_tx, roster_rx) = mpsc::unbounded_channel();
        let link = Self {
            code: code.into(),
            name: name.into(),
            roster_tx,
        };
        (link, roster_rx)
    }
}

// =============================================================================
// Handle
// =============================================================================

enum RegionCommand {
    RegisterNpc(Arc<Entity>),
    RemoveNpc(EntityId),
    Roster(oneshot::Sender<Vec<Arc<Entity>>>),
    Npcs {
        kind: Option<NpcKind>,
        reply: oneshot::Sender<Vec<Arc<Entity>>>,
    },
    RerollDemand,
}

struct RegionShared {
    link: RegionLink,
    width: u32,
    height: u32,
    places: Vec<PlaceHandle>,
    travel_cost: watch::Receiver<u32>,
    demand: watch::Receiver<HashMap<String, f32>>,
    commands: mpsc::UnboundedSender<RegionCommand>,
}

/// Cloneable address of a Region
#[derive(Clone)]
pub struct RegionHandle {
    inner: Arc<RegionShared>,
}

impl std::fmt::Debug for RegionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Region({})", self.inner.link.code)
    }
}

impl RegionHandle {
    /// Builds every Place of the city and spawns the Region actor
    pub fn spawn(
        city: &CityTemplate,
        templates: Arc<Templates>,
        roller: Arc<dyn Roller>,
        timings: Timings,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, ConfigError> {
        let (roster_tx, roster_rx) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let link = RegionLink {
            code: city.code.as_str().into(),
            name: city.name.as_str().into(),
            roster_tx,
        };

        let mut places = Vec::with_capacity(((city.height + 1) * (city.width + 1)) as usize);
        for north in 0..=city.height {
            for east in 0..=city.width {
                let coords = Coordinates::new(north, east);
                let mut buildings = Vec::new();
                for location in city.buildings.iter().filter(|b| b.coords == coords) {
                    let template = templates.building(location.building).ok_or(
                        ConfigError::MissingBuilding {
                            city: city.code.clone(),
                            building: location.building.name(),
                        },
                    )?;
                    buildings.push(Arc::new(Building::from_template(template, &templates)));
                }
                places.push(PlaceHandle::spawn(
                    link.clone(),
                    coords,
                    buildings,
                    templates.clone(),
                    shutdown.clone(),
                ));
            }
        }

        let initial_cost = roll_travel_cost(city, roller.as_ref());
        let (travel_cost_tx, travel_cost) = watch::channel(initial_cost);
        let flat: HashMap<String, f32> = templates.drugs().iter().map(|d| (d.clone(), 1.0)).collect();
        let (demand_tx, demand) = watch::channel(flat);

        let handle = Self {
            inner: Arc::new(RegionShared {
                link,
                width: city.width,
                height: city.height,
                places,
                travel_cost,
                demand,
                commands,
            }),
        };

        let region = Region {
            city: city.clone(),
            templates,
            roller,
            timings,
            roster: BTreeMap::new(),
            npcs: BTreeMap::new(),
            travel_cost: travel_cost_tx,
            demand: demand_tx,
        };
        tokio::spawn(region.run(roster_rx, commands_rx, shutdown));
        Ok(handle)
    }

    pub fn link(&self) -> &RegionLink {
        &self.inner.link
    }

    pub fn code(&self) -> &str {
        &self.inner.link.code
    }

    pub fn name(&self) -> &str {
        &self.inner.link.name
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn place(&self, coords: Coordinates) -> Option<&PlaceHandle> {
        if coords.north > self.inner.height || coords.east > self.inner.width {
            return None;
        }
        let index = (coords.north * (self.inner.width + 1) + coords.east) as usize;
        self.inner.places.get(index)
    }

    pub fn places(&self) -> &[PlaceHandle] {
        &self.inner.places
    }

    /// First Place carrying a building of this type
    pub fn building_place(&self, building_type: BuildingType) -> Option<&PlaceHandle> {
        self.inner
            .places
            .iter()
            .find(|p| p.building(building_type).is_some())
    }

    /// Uniformly random in-bounds coordinates
    pub fn random_coords(&self, roller: &dyn Roller) -> Coordinates {
        Coordinates::new(
            roller.range(0, self.inner.height as u64) as u32,
            roller.range(0, self.inner.width as u64) as u32,
        )
    }

    pub fn travel_cost(&self) -> u32 {
        *self.inner.travel_cost.borrow()
    }

    /// Current price multiplier of a drug, 1.0 when unknown
    pub fn demand(&self, drug: &str) -> f32 {
        self.inner.demand.borrow().get(drug).copied().unwrap_or(1.0)
    }

    pub fn register_npc(&self, npc: Arc<Entity>) {
        let _ = self.inner.commands.send(RegionCommand::RegisterNpc(npc));
    }

    pub fn remove_npc(&self, id: EntityId) {
        let _ = self.inner.commands.send(RegionCommand::RemoveNpc(id));
    }

    pub fn reroll_demand(&self) {
        let _ = self.inner.commands.send(RegionCommand::RerollDemand);
    }

    /// Players currently inside the region
    pub async fn roster(&self) -> Vec<Arc<Entity>> {
        let (reply, rx) = oneshot::channel();
        if self.inner.commands.send(RegionCommand::Roster(reply)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Live NPCs, optionally of one kind
    pub async fn npcs(&self, kind: Option<NpcKind>) -> Vec<Arc<Entity>> {
        let (reply, rx) = oneshot::channel();
        if self
            .inner
            .commands
            .send(RegionCommand::Npcs { kind, reply })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

fn roll_travel_cost(city: &CityTemplate, roller: &dyn Roller) -> u32 {
    roller.range(city.travel_cost_min as u64, city.travel_cost_max as u64) as u32
}

/// One demand multiplier: |v| for negative draws of N(0,1)/3, otherwise v + 1
pub fn demand_factor(roller: &dyn Roller) -> f32 {
    let v = (roller.standard_normal() / 3.0) as f32;
    if v < 0.0 {
        -v
    } else {
        v + 1.0
    }
}

// =============================================================================
// Actor
// =============================================================================

struct Region {
    city: CityTemplate,
    templates: Arc<Templates>,
    roller: Arc<dyn Roller>,
    timings: Timings,
    roster: BTreeMap<EntityId, Arc<Entity>>,
    npcs: BTreeMap<EntityId, Arc<Entity>>,
    travel_cost: watch::Sender<u32>,
    demand: watch::Sender<HashMap<String, f32>>,
}

impl Region {
    async fn run(
        mut self,
        mut roster_rx: mpsc::UnboundedReceiver<RosterChange>,
        mut commands_rx: mpsc::UnboundedReceiver<RegionCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let label = format!("region {}", self.city.code);
        info!("{} started ({}x{})", label, self.city.width + 1, self.city.height + 1);

        let mut next_travel = Instant::now() + self.timings.travel_reroll;
        let mut next_drift = Instant::now() + self.drift_delay();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(change) = roster_rx.recv() => match change {
                    RosterChange::Join(entity) => {
                        self.roster.insert(entity.id, entity);
                    }
                    RosterChange::Leave(entity) => {
                        supervised(&label, "leave", async { self.on_leave(entity) }).await
                    }
                },
                Some(command) = commands_rx.recv() => {
                    supervised(&label, "command", async { self.on_command(command) }).await
                }
                _ = sleep_until(next_travel) => {
                    let cost = roll_travel_cost(&self.city, self.roller.as_ref());
                    self.travel_cost.send_replace(cost);
                    debug!("{} travel cost is now {}", label, cost);
                    next_travel = Instant::now() + self.timings.travel_reroll;
                }
                _ = sleep_until(next_drift) => {
                    supervised(&label, "demand", async {
                        self.reroll_demand();
                        self.notify_informants();
                    }).await;
                    next_drift = Instant::now() + self.drift_delay();
                }
                else => break,
            }
        }
        info!("{} stopped", label);
    }

    fn drift_delay(&self) -> Duration {
        let min = self.timings.demand_min.as_millis() as u64;
        let max = self.timings.demand_max.as_millis() as u64;
        Duration::from_millis(self.roller.range(min, max))
    }

    fn on_leave(&mut self, entity: Arc<Entity>) {
        let back_here = entity
            .location()
            .map(|l| l.region_code() == self.city.code)
            .unwrap_or(false);
        if !back_here {
            self.roster.remove(&entity.id);
        }
    }

    fn on_command(&mut self, command: RegionCommand) {
        match command {
            RegionCommand::RegisterNpc(npc) => {
                self.npcs.insert(npc.id, npc);
            }
            RegionCommand::RemoveNpc(id) => {
                self.npcs.remove(&id);
            }
            RegionCommand::Roster(reply) => {
                let _ = reply.send(self.roster.values().cloned().collect());
            }
            RegionCommand::Npcs { kind, reply } => {
                let npcs = self
                    .npcs
                    .values()
                    .filter(|n| kind.is_none() || n.npc_kind() == kind)
                    .cloned()
                    .collect();
                let _ = reply.send(npcs);
            }
            RegionCommand::RerollDemand => self.reroll_demand(),
        }
    }

    fn reroll_demand(&mut self) {
        let demand: HashMap<String, f32> = self
            .templates
            .drugs()
            .iter()
            .map(|drug| (drug.clone(), demand_factor(self.roller.as_ref())))
            .collect();
        self.demand.send_replace(demand);
    }

    fn notify_informants(&mut self) {
        let mut gone = Vec::new();
        for (id, player) in &self.roster {
            let has_phone = player.inventory().items().any(|(_, item)| {
                self.templates
                    .item(&item.template)
                    .map(|t| t.item_type == ItemType::SmartPhone)
                    .unwrap_or(false)
            });
            if has_phone && !player.send(ServerEvent::normal(INFORMANT_MESSAGE)) && !player.is_connected() {
                gone.push(*id);
            }
        }
        for id in gone {
            self.roster.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::skills::ScriptedRoller;
    use crate::entities::tests::test_player;
    use crate::entities::Item;
    use crate::templates::tests::small_world;
    use crate::world::place::Arrival;

    fn spawn_region(roller: Arc<dyn Roller>, timings: Timings) -> (RegionHandle, watch::Sender<bool>) {
        let templates = Arc::new(small_world());
        let (tx, rx) = watch::channel(false);
        let city = templates.cities()[0].clone();
        let region = RegionHandle::spawn(&city, templates, roller, timings, rx).unwrap();
        (region, tx)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn demand_factor_folds_negative_draws() {
        assert!((demand_factor(&ScriptedRoller::always(-0.9)) - 0.3).abs() < 1e-6);
        assert!((demand_factor(&ScriptedRoller::always(0.3)) - 1.1).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn grid_is_inclusive_of_both_bounds() {
        let (region, _shutdown) = spawn_region(Arc::new(ScriptedRoller::always(0.0)), Timings::default());
        assert_eq!(region.places().len(), 25);
        assert!(region.place(Coordinates::new(4, 4)).is_some());
        assert!(region.place(Coordinates::new(5, 0)).is_none());
        let airport = region.building_place(BuildingType::Airport).unwrap();
        assert_eq!(airport.coords(), Coordinates::new(4, 4));
        assert_eq!(region.travel_cost(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn roster_follows_join_and_leave() {
        let (region, _shutdown) = spawn_region(Arc::new(ScriptedRoller::always(0.0)), Timings::default());
        let (alice, _) = test_player("Alice");
        let place = region.place(Coordinates::new(1, 1)).unwrap().clone();

        place.arrive(Arrival::new(alice.clone(), None));
        settle().await;
        assert_eq!(region.roster().await.len(), 1);

        // A leave for a player who is still here is ignored
        region.link().leave(alice.clone());
        settle().await;
        assert_eq!(region.roster().await.len(), 1);

        alice.lock().location = None;
        region.link().leave(alice.clone());
        settle().await;
        assert!(region.roster().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn a_stale_leave_never_overtakes_a_later_join() {
        let (region, _shutdown) = spawn_region(Arc::new(ScriptedRoller::always(0.0)), Timings::default());
        let (alice, _) = test_player("Alice");

        // In transit between two Places of the same region
        alice.lock().location = None;
        for _ in 0..20 {
            region.link().leave(alice.clone());
            region.link().join(alice.clone());
        }
        settle().await;
        assert_eq!(region.roster().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn demand_drift_notifies_phone_carriers() {
        let templates = small_world();
        let timings = Timings {
            demand_min: Duration::from_secs(60),
            demand_max: Duration::from_secs(60),
            ..Timings::default()
        };
        let roller = Arc::new(ScriptedRoller::always(60_000.0));
        let (region, _shutdown) = spawn_region(roller.clone(), timings);
        let (alice, alice_session) = test_player("Alice");
        let (bob, bob_session) = test_player("Bob");
        let _ = alice.inventory().add(Item::new(templates.item("smartphone").unwrap()));
        region.link().join(alice.clone());
        region.link().join(bob.clone());
        settle().await;

        // Drift draws come from the normal distribution from here on
        roller.push(0.6);
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;

        assert!(alice_session.saw("demand for different dope has changed"));
        assert!(!bob_session.saw("demand"));
        assert!(region.demand("weed") > 1.0);
    }
}
