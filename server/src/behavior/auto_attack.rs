//! Per-player auto-attack loop.

use std::sync::Arc;

use log::debug;
use tokio::time::{interval, Instant, MissedTickBehavior};

use swi_shared::ServerEvent;

use crate::combat::{resolve, AttackKind, CombatAction, Outcome};
use crate::entities::Entity;
use crate::world::{supervised, World};

/// Starts the loop for a player who just entered the world. It ends when the
/// session goes away.
pub fn spawn(world: World, player: Arc<Entity>) {
    tokio::spawn(run(world, player));
}

async fn run(world: World, player: Arc<Entity>) {
    let label = format!("auto attack {}", player.name);
    let mut shutdown = world.shutdown_receiver();
    let mut poll = interval(world.timings().auto_attack_poll);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = poll.tick() => {
                if !player.is_connected() {
                    break;
                }
                supervised(&label, "tick", async { tick(&world, &player) }).await;
            }
        }
    }
    debug!("{} stopped", label);
}

/// The attack to replay, if auto-attack is on and everything lines up
fn ready(world: &World, player: &Entity) -> Option<AttackKind> {
    let state = player.lock();
    let data = state.player.as_ref()?;
    if !data.auto_attack || state.dead || state.location.is_none() || state.current_target.is_none() {
        return None;
    }
    let cooled = state
        .last_attack
        .map_or(true, |at| Instant::now() >= at + world.timings().attack_cooldown);
    cooled.then_some(data.last_attack_kind)
}

fn tick(world: &World, player: &Arc<Entity>) {
    let Some(kind) = ready(world, player) else {
        return;
    };
    if let Outcome::Rejected(e) = resolve(world, CombatAction::attack(player.clone(), kind)) {
        if let Some(data) = player.lock().player.as_mut() {
            data.auto_attack = false;
        }
        player.send(ServerEvent::warning(format!("Auto attack disabled: {}", e)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::targeting;
    use crate::entities::tests::{test_npc, test_player};
    use crate::world::tests::{put_at, settle, test_world};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use swi_shared::{Coordinates, NpcKind};

    fn enable(player: &Entity, kind: AttackKind) {
        if let Some(data) = player.lock().player.as_mut() {
            data.auto_attack = true;
            data.last_attack_kind = kind;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn replays_the_last_attack_once_per_cooldown() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let target = test_npc("Rick", NpcKind::Tourist);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &target, Coordinates::new(1, 1)).await;
        targeting::aim(&alice, &target).unwrap();
        enable(&alice, AttackKind::Punch);

        spawn(world.clone(), alice.clone());
        settle().await;
        assert_eq!(target.lock().health, 98);

        // Polls inside the cooldown do nothing
        tokio::time::sleep(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(target.lock().health, 98);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        settle().await;
        assert_eq!(target.lock().health, 96);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn a_rejected_attack_switches_it_off() {
        let (world, _) = test_world(0.0);
        let (alice, session) = test_player("Alice");
        let target = test_npc("Rick", NpcKind::Tourist);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &target, Coordinates::new(1, 1)).await;
        targeting::aim(&alice, &target).unwrap();
        enable(&alice, AttackKind::Shoot);

        spawn(world.clone(), alice.clone());
        settle().await;
        assert!(session.saw("Auto attack disabled: You don't have a gun equipped"));
        assert!(!alice.lock().player.as_ref().unwrap().auto_attack);
        assert_eq!(target.lock().health, 100);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_with_the_session() {
        let (world, _) = test_world(0.0);
        let (alice, session) = test_player("Alice");
        let target = test_npc("Rick", NpcKind::Tourist);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &target, Coordinates::new(1, 1)).await;
        targeting::aim(&alice, &target).unwrap();

        session.connected.store(false, Ordering::SeqCst);
        enable(&alice, AttackKind::Punch);
        spawn(world.clone(), alice.clone());
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(target.lock().health, 100);
        world.shutdown();
    }
}
