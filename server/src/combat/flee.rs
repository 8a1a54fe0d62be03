use std::sync::Arc;

use log::info;

use swi_shared::{Direction, ServerEvent};

use super::Outcome;
use crate::entities::player::send_inventory;
use crate::entities::Entity;
use crate::error::GameError;
use crate::world::place::Arrival;
use crate::world::World;

/// Escapes to an adjacent Place, dropping one to three random items on the
/// way. Hunters lose their lock once the destination takes the entity in.
pub(super) fn flee(world: &World, entity: &Arc<Entity>, direction: Direction) -> Outcome {
    let (origin, hunted, dead) = {
        let state = entity.lock();
        (state.location.clone(), !state.targeted_by.is_empty(), state.dead)
    };
    if dead {
        return Outcome::Rejected(GameError::rejected("You are in no shape to run."));
    }
    let Some(origin) = origin else {
        return Outcome::Rejected(GameError::InTransit);
    };
    if !hunted {
        return Outcome::Rejected(GameError::rejected("There is nothing to flee from."));
    }
    let Some(region) = world.region(origin.region_code()) else {
        return Outcome::Rejected(GameError::OutOfBounds);
    };
    let Some(coords) = origin.coords().step(direction, region.height(), region.width()) else {
        return Outcome::Rejected(GameError::OutOfBounds);
    };
    let Some(destination) = region.place(coords).cloned() else {
        return Outcome::Rejected(GameError::OutOfBounds);
    };

    let roller = world.roller();
    let dropped = {
        let mut inventory = entity.inventory();
        let mut slots = inventory.occupied_slots();
        let count = (roller.range(1, 3) as usize).min(slots.len());
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let slot = slots.swap_remove(roller.below(slots.len()));
            if let Some(item) = inventory.take(slot) {
                items.push(item);
            }
        }
        items
    };

    let templates = world.templates();
    if !dropped.is_empty() {
        let names: Vec<String> = dropped.iter().map(|i| templates.item_name(&i.template)).collect();
        entity.send(ServerEvent::warning(format!(
            "In the rush you drop {}.",
            names.join(", ")
        )));
    }
    for item in dropped {
        info!(target: "items", "{} dropped {} fleeing {:?}", entity.name, item.template, origin);
        origin.item_dropped(item, Some(entity.clone()));
    }

    entity.lock().location = None;
    send_inventory(entity, templates);
    let arrival = Arrival {
        entity: entity.clone(),
        origin: Some(origin),
        direction: Some(direction),
        fled: true,
    };
    if entity.is_player() {
        destination.arrive(arrival);
    } else {
        destination.npc_arrive(arrival);
    }
    Outcome::Fled(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::{resolve, CombatAction};
    use crate::entities::targeting;
    use crate::entities::tests::test_player;
    use crate::entities::Item;
    use crate::world::tests::{put_at, settle, test_world};
    use swi_shared::Coordinates;

    #[tokio::test(start_paused = true)]
    async fn fleeing_drops_loot_and_breaks_every_lock() {
        let (world, _) = test_world(0.0);
        let (alice, alice_s) = test_player("Alice");
        let (bob, bob_s) = test_player("Bob");
        for id in ["weed", "coke", "crowbar"] {
            let item = Item::new(world.templates().item(id).unwrap());
            alice.inventory().add(item).unwrap();
        }
        let origin = put_at(&world, &alice, Coordinates::new(1, 1)).await;
        put_at(&world, &bob, Coordinates::new(1, 1)).await;
        targeting::aim(&bob, &alice).unwrap();

        let outcome = resolve(
            &world,
            CombatAction::Flee {
                entity: alice.clone(),
                direction: Direction::North,
            },
        );
        assert_eq!(outcome, Outcome::Fled(Coordinates::new(2, 1)));
        settle().await;

        let here = alice.location().unwrap();
        assert_eq!(here.coords(), Coordinates::new(2, 1));
        assert!(!origin.snapshot().await.contains(alice.id));
        assert!(bob.lock().current_target.is_none());
        assert!(alice.lock().targeted_by.is_empty());
        assert!(bob_s.saw("Alice got away."));
        assert!(alice_s.saw("You got away!"));

        let ground = origin.snapshot().await.items.len();
        assert_eq!(ground, 1);
        assert_eq!(alice.inventory().count() + ground, 3);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_to_flee_from() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        let outcome = resolve(
            &world,
            CombatAction::Flee {
                entity: alice.clone(),
                direction: Direction::North,
            },
        );
        assert_eq!(
            outcome,
            Outcome::Rejected(GameError::rejected("There is nothing to flee from."))
        );
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn cannot_flee_off_the_map() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (bob, _) = test_player("Bob");
        put_at(&world, &alice, Coordinates::new(0, 0)).await;
        put_at(&world, &bob, Coordinates::new(0, 0)).await;
        targeting::aim(&bob, &alice).unwrap();

        let outcome = resolve(
            &world,
            CombatAction::Flee {
                entity: alice.clone(),
                direction: Direction::South,
            },
        );
        assert_eq!(outcome, Outcome::Rejected(GameError::OutOfBounds));
        assert!(alice.location().is_some());
        world.shutdown();
    }
}
