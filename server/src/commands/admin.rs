use log::info;

use super::{CommandResult, Handled};
use crate::entities::Entity;
use crate::error::GameError;
use crate::world::World;

pub(super) async fn save(world: &World, player: &Entity) -> Handled {
    info!("{} asked for a save", player.name);
    world.save_all().await;
    Ok(CommandResult::success("Every online player has been saved."))
}

pub(super) async fn restock(world: &World, player: &Entity) -> Handled {
    info!("{} asked for a restock", player.name);
    world.restock().await;
    Ok(CommandResult::success("Dealers restocked and addicts emptied."))
}

/// Re-rolls drug demand in the admin's current city
pub(super) fn demand(world: &World, player: &Entity) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    let region = world
        .region(place.region_code())
        .ok_or(GameError::InTransit)?;
    region.reroll_demand();
    info!("{} re-rolled drug demand in {}", player.name, region.code());
    Ok(CommandResult::success(format!("Drug demand in {} has been updated.", region.name())))
}

#[cfg(test)]
mod tests {
    use crate::commands::{parse_and_execute, CommandResult};
    use crate::entities::tests::test_player;
    use crate::world::tests::{put_at, test_world};
    use swi_shared::Coordinates;

    #[tokio::test(start_paused = true)]
    async fn admin_commands_need_the_flag() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(1, 1)).await;

        for line in ["/save", "/restock", "/demand"] {
            let result = parse_and_execute(&world, &alice, line).await;
            assert_eq!(result, CommandResult::error("This command requires admin privileges"));
        }

        alice.lock().player.as_mut().unwrap().admin = true;
        let result = parse_and_execute(&world, &alice, "/save").await;
        assert_eq!(result, CommandResult::success("Every online player has been saved."));
        let result = parse_and_execute(&world, &alice, "/restock").await;
        assert_eq!(result, CommandResult::success("Dealers restocked and addicts emptied."));
        let result = parse_and_execute(&world, &alice, "/demand").await;
        assert_eq!(result, CommandResult::success("Drug demand in Testville has been updated."));
        world.shutdown();
    }
}
