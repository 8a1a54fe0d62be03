use std::sync::Arc;

use tokio::time::Instant;

use swi_shared::Direction;

use super::{CommandResult, Handled};
use crate::entities::{targeting, Entity};
use crate::error::GameError;
use crate::world::place::Arrival;
use crate::world::World;

/// Walks one Place in `input`'s direction
pub(super) fn step(world: &World, player: &Arc<Entity>, input: &str) -> Handled {
    let direction = Direction::parse(input).ok_or(GameError::Usage("/move <direction>"))?;
    if let Some(hunter) = targeting::held_up_by(player) {
        return Err(GameError::HeldUp(hunter));
    }

    let (origin, destination) = {
        let mut state = player.lock();
        if state.dead {
            return Err(GameError::rejected("You are in no shape to walk."));
        }
        let origin = state.location.clone().ok_or(GameError::InTransit)?;
        let now = Instant::now();
        if state
            .last_move
            .is_some_and(|at| now < at + world.timings().move_cooldown)
        {
            return Err(GameError::InTransit);
        }
        let region = world.region(origin.region_code()).ok_or(GameError::OutOfBounds)?;
        let coords = origin
            .coords()
            .step(direction, region.height(), region.width())
            .ok_or(GameError::OutOfBounds)?;
        let destination = region.place(coords).cloned().ok_or(GameError::OutOfBounds)?;
        state.last_move = Some(now);
        state.location = None;
        (origin, destination)
    };

    destination.arrive(Arrival::step(player.clone(), origin, direction));
    Ok(CommandResult::silent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::{test_npc, test_player};
    use crate::world::tests::{put_at, settle, test_world};
    use std::time::Duration;
    use swi_shared::{Coordinates, NpcKind};

    #[tokio::test(start_paused = true)]
    async fn walking_moves_between_places() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let origin = put_at(&world, &alice, Coordinates::new(1, 1)).await;

        step(&world, &alice, "east").unwrap();
        settle().await;
        let here = alice.location().unwrap();
        assert_eq!(here.coords(), Coordinates::new(1, 2));
        assert!(here.snapshot().await.contains(alice.id));
        assert!(!origin.snapshot().await.contains(alice.id));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn the_city_edge_stops_you() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(0, 0)).await;

        assert_eq!(step(&world, &alice, "south"), Err(GameError::OutOfBounds));
        assert_eq!(step(&world, &alice, "left"), Err(GameError::OutOfBounds));
        assert_eq!(alice.location().unwrap().coords(), Coordinates::new(0, 0));
        assert_eq!(step(&world, &alice, "sideways"), Err(GameError::Usage("/move <direction>")));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn moves_are_rate_limited() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(2, 2)).await;

        step(&world, &alice, "e").unwrap();
        settle().await;
        let after_first = alice.location().unwrap().coords();
        assert_eq!(step(&world, &alice, "a"), Err(GameError::InTransit));
        assert_eq!(alice.location().unwrap().coords(), after_first);

        tokio::time::sleep(Duration::from_millis(150)).await;
        step(&world, &alice, "a").unwrap();
        settle().await;
        assert_eq!(alice.location().unwrap().coords(), Coordinates::new(2, 2));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn a_gun_in_your_face_keeps_you_still() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let thug = test_npc("Tony", NpcKind::Bouncer);
        put_at(&world, &alice, Coordinates::new(2, 2)).await;
        put_at(&world, &thug, Coordinates::new(2, 2)).await;
        targeting::aim(&thug, &alice).unwrap();

        assert_eq!(step(&world, &alice, "n"), Err(GameError::HeldUp("Tony".into())));
        assert_eq!(alice.location().unwrap().coords(), Coordinates::new(2, 2));
        world.shutdown();
    }
}
