use std::sync::Arc;

use log::info;

use swi_shared::{Direction, ServerEvent};

use super::{CommandResult, Handled};
use crate::combat::{resolve, AttackKind, CombatAction, Outcome};
use crate::entities::{targeting, Entity};
use crate::error::GameError;
use crate::world::World;

/// Outcomes narrate themselves; only rejections come back to the caller
fn settle(outcome: Outcome) -> Handled {
    match outcome {
        Outcome::Rejected(e) => Err(e),
        _ => Ok(CommandResult::silent()),
    }
}

/// Takes aim on someone here whose name starts with `name`
pub(super) async fn aim(world: &World, player: &Arc<Entity>, name: &str) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    let target = place
        .snapshot()
        .await
        .find_by_name(name, player.id)
        .ok_or(GameError::NoSuchTarget)?;

    settle(resolve(
        world,
        CombatAction::Aim {
            attacker: player.clone(),
            target,
        },
    ))
}

pub(super) fn unaim(player: &Arc<Entity>) -> Handled {
    let target = targeting::clear_target(player)
        .ok_or_else(|| GameError::rejected("You are not aiming at anyone."))?;
    target.send(ServerEvent::normal(format!("{} stops taking aim at you.", player.name)));
    info!(target: "combat", "{} stops aiming at {}", player.name, target.name);
    Ok(CommandResult::info(format!("You stop taking aim at {}", target.name)))
}

pub(super) fn attack(world: &World, player: &Arc<Entity>, kind: AttackKind) -> Handled {
    settle(resolve(world, CombatAction::attack(player.clone(), kind)))
}

pub(super) fn toggle_auto_attack(player: &Entity) -> Handled {
    let enabled = {
        let mut state = player.lock();
        let data = state.player.as_mut().ok_or(GameError::NotLoggedIn)?;
        data.auto_attack = !data.auto_attack;
        data.auto_attack
    };
    Ok(CommandResult::info(if enabled {
        "Auto attack enabled. Your last attack repeats while you have a target."
    } else {
        "Auto attack disabled."
    }))
}

pub(super) fn flee(world: &World, player: &Arc<Entity>, input: &str) -> Handled {
    let direction = Direction::parse(input).ok_or(GameError::Usage("/flee <direction>"))?;
    settle(resolve(
        world,
        CombatAction::Flee {
            entity: player.clone(),
            direction,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::{test_npc, test_player};
    use crate::world::tests::{put_at, settle as settle_tasks, test_world};
    use swi_shared::{Coordinates, NpcKind};

    #[tokio::test(start_paused = true)]
    async fn aim_picks_by_name_prefix_and_skips_yourself() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (alan, alan_session) = test_player("Alan");
        let tourist = test_npc("Rick", NpcKind::Tourist);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &alan, Coordinates::new(1, 1)).await;
        put_at(&world, &tourist, Coordinates::new(1, 1)).await;

        aim(&world, &alice, "AL").await.unwrap();
        assert_eq!(alice.lock().target_id(), Some(alan.id));
        assert!(alan_session.saw("Alice takes aim on you."));

        aim(&world, &alice, "ri").await.unwrap();
        assert_eq!(alice.lock().target_id(), Some(tourist.id));
        assert!(alan.lock().targeted_by.is_empty());

        assert_eq!(aim(&world, &alice, "bob").await, Err(GameError::NoSuchTarget));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn unaim_tells_the_target() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (bob, bob_session) = test_player("Bob");
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &bob, Coordinates::new(1, 1)).await;

        assert!(unaim(&alice).is_err());
        aim(&world, &alice, "bob").await.unwrap();
        assert_eq!(
            unaim(&alice),
            Ok(CommandResult::info("You stop taking aim at Bob"))
        );
        assert!(bob_session.saw("Alice stops taking aim at you."));
        assert!(bob.lock().targeted_by.is_empty());
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn attacks_report_only_rejections() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let tourist = test_npc("Rick", NpcKind::Tourist);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &tourist, Coordinates::new(1, 1)).await;
        aim(&world, &alice, "rick").await.unwrap();

        assert_eq!(
            attack(&world, &alice, AttackKind::Shoot),
            Err(GameError::rejected("You don't have a gun equipped"))
        );
        assert_eq!(attack(&world, &alice, AttackKind::Punch), Ok(CommandResult::silent()));
        settle_tasks().await;
        assert_eq!(tourist.lock().health, 98);
        world.shutdown();
    }

    #[test]
    fn auto_attack_toggles() {
        let (alice, _) = test_player("Alice");
        toggle_auto_attack(&alice).unwrap();
        assert!(alice.lock().player.as_ref().unwrap().auto_attack);
        assert_eq!(toggle_auto_attack(&alice), Ok(CommandResult::info("Auto attack disabled.")));
        assert!(!alice.lock().player.as_ref().unwrap().auto_attack);
    }

    #[tokio::test(start_paused = true)]
    async fn fleeing_needs_a_hunter() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        assert_eq!(
            flee(&world, &alice, "north"),
            Err(GameError::rejected("There is nothing to flee from."))
        );
        assert_eq!(flee(&world, &alice, "nowhere"), Err(GameError::Usage("/flee <direction>")));
        world.shutdown();
    }
}
