//! NPC behaviour: wandering, hunting hostile players and pruning stale
//! trades. Each NPC gets one task that multiplexes the three timers and ends
//! with the NPC's death or the world's shutdown.

pub mod auto_attack;

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use swi_shared::Direction;

use crate::combat::{resolve, AttackKind, CombatAction, Outcome};
use crate::economy::trade;
use crate::entities::{targeting, Entity, EquipSlot};
use crate::world::place::Arrival;
use crate::world::{supervised, World};

/// Starts the behaviour task of a freshly spawned NPC
pub fn spawn(world: World, npc: Arc<Entity>) {
    tokio::spawn(run(world, npc));
}

async fn run(world: World, npc: Arc<Entity>) {
    let label = format!("npc {} ({})", npc.name, npc.id);
    let mut shutdown = world.shutdown_receiver();
    let timings = world.timings().clone();

    let mut next_move = Instant::now() + wander_delay(&world);
    let mut attack_tick = interval(timings.npc_attack);
    attack_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut prune_tick = interval(timings.npc_trade_prune);
    prune_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if npc.is_dead() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep_until(next_move) => {
                supervised(&label, "wander", async { wander(&world, &npc) }).await;
                next_move = Instant::now() + wander_delay(&world);
            }
            _ = attack_tick.tick() => {
                supervised(&label, "attack", hunt(&world, &npc)).await;
            }
            _ = prune_tick.tick() => {
                supervised(&label, "prune", async { trade::prune(&npc) }).await;
            }
        }
    }
    debug!("{} stopped", label);
}

/// Uniform in [min, max)
fn wander_delay(world: &World) -> Duration {
    let timings = world.timings();
    let min = timings.npc_move_min.as_millis() as u64;
    let max = timings.npc_move_max.as_millis() as u64;
    Duration::from_millis(world.roller().range(min, max.saturating_sub(1).max(min)))
}

/// Steps to a random neighbouring Place, turning around at the city edge.
/// Busy NPCs stay put.
fn wander(world: &World, npc: &Arc<Entity>) {
    let (origin, destination, direction) = {
        let mut state = npc.lock();
        if state.dead || state.in_combat() || !state.trading_with.is_empty() {
            return;
        }
        let Some(origin) = state.location.clone() else {
            return;
        };
        let Some(region) = world.region(origin.region_code()) else {
            return;
        };
        let direction = Direction::ALL[world.roller().below(Direction::ALL.len())];
        let here = origin.coords();
        let (height, width) = (region.height(), region.width());
        let Some((direction, coords)) = here
            .step(direction, height, width)
            .map(|c| (direction, c))
            .or_else(|| {
                let back = direction.opposite();
                here.step(back, height, width).map(|c| (back, c))
            })
        else {
            return;
        };
        let Some(destination) = region.place(coords).cloned() else {
            return;
        };
        state.location = None;
        (origin, destination, direction)
    };
    destination.npc_arrive(Arrival::step(npc.clone(), origin, direction));
}

/// The attack an NPC's equipment allows, best first
fn attack_kind(npc: &Entity) -> AttackKind {
    let inventory = npc.inventory();
    if inventory.equipped(EquipSlot::Gun).is_some() && inventory.equipped(EquipSlot::Ammo).is_some() {
        AttackKind::Shoot
    } else if inventory.equipped(EquipSlot::Melee).is_some() {
        AttackKind::Strike
    } else {
        AttackKind::Punch
    }
}

/// One attack tick: keep hitting the current target, or take aim on a
/// hostile player standing here
async fn hunt(world: &World, npc: &Arc<Entity>) {
    let (place, target, hostiles) = {
        let state = npc.lock();
        let hostiles = state
            .npc
            .as_ref()
            .map(|n| n.hostiles.clone())
            .unwrap_or_default();
        (state.location.clone(), state.current_target.clone(), hostiles)
    };
    let Some(place) = place else {
        return;
    };

    if let Some(target) = target {
        let here = target.location().is_some_and(|l| l.same_as(&place));
        if !here || target.is_dead() {
            targeting::clear_target(npc);
            return;
        }
        let outcome = resolve(world, CombatAction::attack(npc.clone(), attack_kind(npc)));
        if let Outcome::Rejected(e) = outcome {
            debug!(target: "combat", "{} could not attack {}: {}", npc.name, target.name, e);
        }
        return;
    }

    if hostiles.is_empty() {
        return;
    }
    let snapshot = place.snapshot().await;
    let prey = snapshot.players.into_iter().find(|p| {
        !p.is_dead() && p.session_id().is_some_and(|id| hostiles.contains(&id))
    });
    if let Some(prey) = prey {
        resolve(
            world,
            CombatAction::Aim {
                attacker: npc.clone(),
                target: prey,
            },
        );
    }
}
