//! Death, loot and respawn.

use std::sync::Arc;

use log::{error, info, warn};

use swi_shared::settings::{DEATH_SKILL_DECAY, PLAYER_RESPAWN_CASH, PLAYER_RESPAWN_HEALTH};
use swi_shared::{BuildingType, ServerEvent};

use crate::economy::trade;
use crate::entities::player::{send_inventory, send_stats};
use crate::entities::{lock_pair, targeting, Entity};
use crate::world::place::PlaceHandle;
use crate::world::{supervised, World};

/// Runs the death of `victim` in the background. Called once, by the blow
/// that flipped the victim's `dead` flag.
pub fn spawn_death(world: World, victim: Arc<Entity>, killer: Arc<Entity>) {
    tokio::spawn(async move {
        supervised("combat", "death", die(world, victim, killer)).await;
    });
}

async fn die(world: World, victim: Arc<Entity>, killer: Arc<Entity>) {
    targeting::clear_all(&victim);
    trade::close_all(&victim);

    let Some(place) = victim.location().or_else(|| killer.location()) else {
        warn!(target: "combat", "{} died nowhere, nothing to drop", victim.name);
        return;
    };

    let (items, loot) = {
        let (mut v, mut k) = lock_pair(&victim, &killer);
        let items = victim.inventory().drain();
        let loot = if victim.is_player() {
            let cash = v.cash;
            k.cash = k.cash.saturating_add(cash);
            v.cash = PLAYER_RESPAWN_CASH;
            v.health = PLAYER_RESPAWN_HEALTH;
            v.skill_acc *= DEATH_SKILL_DECAY;
            if let Some(player) = k.player.as_mut() {
                player.player_kills += 1;
            }
            cash
        } else {
            let (cash, rep) = v
                .npc
                .as_ref()
                .map(|n| (n.reward_cash, n.reward_rep))
                .unwrap_or_default();
            k.cash = k.cash.saturating_add(cash);
            k.reputation += rep;
            if let Some(player) = k.player.as_mut() {
                player.npc_kills += 1;
            }
            v.location = None;
            cash
        };
        (items, loot)
    };

    let dropped = items.len();
    for item in items {
        place.item_dropped(item, None);
    }
    info!(
        target: "combat",
        "{} killed {} at {:?}, {} items dropped, ${} taken",
        killer.name,
        victim.name,
        place,
        dropped,
        loot
    );

    let templates = world.templates();
    send_stats(&killer);
    if victim.is_player() {
        killer.send(ServerEvent::success(format!(
            "You put {} in their place, and all of their items drop to the ground. They had ${} on them, which is now yours.",
            victim.name, loot
        )));
        place.broadcast(
            ServerEvent::normal(format!(
                "You just witnessed {} put {} in their place, they lie bleeding out on the ground. All of {}'s items drop on the ground.",
                killer.name, victim.name, victim.name
            )),
            &[killer.id, victim.id],
        );
        victim.send(ServerEvent::failure(format!(
            "{} put you in your place. Everything you carried is on the ground now.",
            killer.name
        )));
        send_inventory(&victim, templates);
        respawn_player(&world, &victim, place).await;
    } else {
        killer.send(ServerEvent::success(format!(
            "{} drops dead, and all of their items drop on the ground.",
            victim.name
        )));
        place.broadcast(
            ServerEvent::normal(format!(
                "You just witnessed {} murder {} in cold blood. All of {}'s items drop on the ground.",
                killer.name, victim.name, victim.name
            )),
            &[killer.id],
        );
        remove_npc(&world, &victim, place).await;
    }
}

/// Sends a dead player to a hospital: home city first, then the city they
/// died in, then where they fell.
async fn respawn_player(world: &World, victim: &Arc<Entity>, place: PlaceHandle) {
    let hometown = victim
        .lock()
        .player
        .as_ref()
        .map(|p| p.hometown.clone())
        .unwrap_or_default();
    let hospital = world
        .region(&hometown)
        .and_then(|r| r.building_place(BuildingType::Hospital))
        .or_else(|| {
            world
                .region(place.region_code())
                .and_then(|r| r.building_place(BuildingType::Hospital))
        })
        .cloned()
        .unwrap_or_else(|| place.clone());

    if let Some(player) = victim.lock().player.as_mut() {
        player.last_location = Some(hospital.location());
    }
    world.save_player(victim).await;
    hospital.respawn_arrival(victim.clone(), Some(place));
}

/// Takes a dead NPC off the map and brings one of its kind back later
async fn remove_npc(world: &World, victim: &Arc<Entity>, place: PlaceHandle) {
    place.depart(victim.clone(), None);
    let home = victim.lock().npc.as_ref().map(|n| n.region.clone());
    let Some(region) = home
        .as_deref()
        .and_then(|code| world.region(code))
        .or_else(|| world.region(place.region_code()))
        .cloned()
    else {
        return;
    };
    region.remove_npc(victim.id);

    let Some(kind) = victim.npc_kind() else {
        return;
    };
    let mut shutdown = world.shutdown_receiver();
    tokio::select! {
        _ = shutdown.changed() => return,
        _ = tokio::time::sleep(world.timings().npc_respawn) => {}
    }
    match world.spawn_npc(&region, kind) {
        Ok(npc) => info!("{} took the place of {} in {}", npc.name, victim.name, region.code()),
        Err(e) => error!("Failed to respawn a {} in {}: {}", kind.name(), region.code(), e),
    }
}
