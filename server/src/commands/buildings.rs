use std::sync::Arc;

use super::{CommandResult, Handled};
use crate::economy::{bank, services, shop};
use crate::entities::Entity;
use crate::error::GameError;
use crate::world::World;

/// The buildings in this Place and what can be done in them
pub(super) fn here(player: &Entity) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    let mut lines = vec![format!("{} {}", place.region().name, place.coords())];
    if place.buildings().is_empty() {
        lines.push("There is nothing here but the street.".to_string());
    }
    for building in place.buildings() {
        lines.push(format!("{} [{}]: {}", building.name, building.id, building.description));
        if !building.commands.is_empty() {
            lines.push(format!("  {}", building.commands.join(", ")));
        }
    }
    Ok(CommandResult::lines(lines))
}

pub(super) fn shop(world: &World, player: &Entity, name: Option<&str>) -> Handled {
    shop::show(world, player, name)?;
    Ok(CommandResult::silent())
}

pub(super) fn shop_buy(world: &World, player: &Entity, building_id: u64, index: usize) -> Handled {
    let name = shop::buy(world, player, building_id, index)?;
    Ok(CommandResult::success(format!("You buy the {}.", name)))
}

pub(super) fn shop_sell(world: &World, player: &Entity, building_id: u64, slot: usize) -> Handled {
    let price = shop::sell(world, player, building_id, slot)?;
    Ok(CommandResult::success(format!("You sell it for ${}.", price)))
}

pub(super) fn deposit(player: &Entity, amount: u32) -> Handled {
    bank::deposit(player, amount).map(CommandResult::success)
}

pub(super) fn withdraw(player: &Entity, amount: u32) -> Handled {
    bank::withdraw(player, amount).map(CommandResult::success)
}

pub(super) async fn transfer(world: &World, player: &Entity, to: &str, amount: u32) -> Handled {
    bank::transfer(world, player, to, amount).await.map(CommandResult::success)
}

pub(super) fn heal(player: &Entity, points: u32) -> Handled {
    services::heal(player, points).map(CommandResult::success)
}

pub(super) fn drink(player: &Entity, rounds: u32) -> Handled {
    services::drink(player, rounds).map(CommandResult::success)
}

pub(super) fn destinations(world: &World) -> Handled {
    let mut lines = vec!["Flights leave for:".to_string()];
    lines.extend(services::destinations(world).into_iter().map(|d| format!("  {}", d)));
    Ok(CommandResult::lines(lines))
}

pub(super) fn travel(world: &World, player: &Arc<Entity>, code: &str) -> Handled {
    services::travel(world, player, code).map(CommandResult::success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_and_execute;
    use crate::entities::tests::test_player;
    use crate::world::tests::{put_at, test_world};
    use swi_shared::Coordinates;

    #[tokio::test(start_paused = true)]
    async fn here_lists_the_buildings() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(2, 2)).await;
        let result = here(&alice).unwrap();
        assert_eq!(result.messages[0], "Testville N2-E2");
        assert!(result.messages.len() >= 2);
        assert_ne!(result.messages[1], "There is nothing here but the street.");

        put_at(&world, &alice, Coordinates::new(3, 3)).await;
        let result = here(&alice).unwrap();
        assert_eq!(result.messages[1], "There is nothing here but the street.");
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn building_commands_go_through_the_dispatcher() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        alice.lock().health = 90;
        put_at(&world, &alice, Coordinates::new(0, 0)).await;

        let result = parse_and_execute(&world, &alice, "/heal 2").await;
        assert_eq!(result, CommandResult::success("You pay the doctor 60 to patch you up."));
        let result = parse_and_execute(&world, &alice, "/deposit 10").await;
        assert_eq!(result, CommandResult::error("There is no Bank here."));

        let result = parse_and_execute(&world, &alice, "/travel").await;
        assert!(result.messages.iter().any(|l| l.contains("Elsewhere (EW): $300")));
        world.shutdown();
    }
}
