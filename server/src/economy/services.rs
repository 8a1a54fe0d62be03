//! Paid services: the hospital, the bar and the airport.

use std::sync::Arc;

use log::info;

use swi_shared::settings::{
    DRINK_COST, DRINK_HEALTH_COST, DRINK_REP_GAIN, HEAL_COST_PER_POINT, PLAYER_MAX_HEALTH,
};
use swi_shared::BuildingType;

use super::building_here;
use crate::entities::player::send_stats;
use crate::entities::{targeting, Entity};
use crate::error::GameError;
use crate::world::place::Arrival;
use crate::world::World;

/// Buys up to `points` of health, capped at full health
pub fn heal(player: &Entity, points: u32) -> Result<String, GameError> {
    building_here(player, BuildingType::Hospital)?;
    let cost = {
        let mut state = player.lock();
        if state.health >= PLAYER_MAX_HEALTH {
            return Err(GameError::rejected(
                "You do not need any patching up, you are at full health",
            ));
        }
        let missing = (PLAYER_MAX_HEALTH - state.health) as u32;
        let points = points.min(missing);
        let cost = points * HEAL_COST_PER_POINT;
        if state.cash < cost {
            return Err(GameError::rejected(format!(
                "You do not have enough money. Costs {} per point to heal",
                HEAL_COST_PER_POINT
            )));
        }
        state.cash -= cost;
        state.health += points as i32;
        cost
    };
    info!(target: "transactions", "{} paid ${} for healing", player.name, cost);
    send_stats(player);
    Ok(format!("You pay the doctor {} to patch you up.", cost))
}

/// Trades cash and health for reputation, `rounds` at a time
pub fn drink(player: &Entity, rounds: u32) -> Result<String, GameError> {
    building_here(player, BuildingType::Bar)?;
    let cost = rounds.saturating_mul(DRINK_COST);
    let health_cost = (rounds as i32).saturating_mul(DRINK_HEALTH_COST);
    let rep_gain = rounds as i64 * DRINK_REP_GAIN;
    {
        let mut state = player.lock();
        if state.cash < cost {
            return Err(GameError::rejected("You do not have enough money on you"));
        }
        if state.health <= health_cost {
            return Err(GameError::rejected("Don't be stupid, that will kill you."));
        }
        state.cash -= cost;
        state.health -= health_cost;
        state.reputation += rep_gain;
    }
    info!(target: "transactions", "{} spent ${} at the bar", player.name, cost);
    send_stats(player);
    Ok(format!(
        "You spend {} on buying drinks and paying for strippers, your reputation increased by {}",
        cost, rep_gain
    ))
}

/// Flight destinations with their current fares
pub fn destinations(world: &World) -> Vec<String> {
    world
        .regions()
        .iter()
        .map(|r| format!("{} ({}): ${}", r.name(), r.code(), r.travel_cost()))
        .collect()
}

/// Flies to the airport of another city
pub fn travel(world: &World, player: &Arc<Entity>, code: &str) -> Result<String, GameError> {
    let (origin, _) = building_here(player, BuildingType::Airport)?;
    if let Some(hunter) = targeting::held_up_by(player) {
        return Err(GameError::HeldUp(hunter));
    }
    let region = world
        .region(code)
        .ok_or_else(|| GameError::rejected("Invalid destination. Try: /travel"))?;
    let airport = region
        .building_place(BuildingType::Airport)
        .cloned()
        .ok_or_else(|| GameError::rejected("Invalid destination. Try: /travel"))?;
    let fare = region.travel_cost();
    {
        let mut state = player.lock();
        if state.location.as_ref().map(|l| l.same_as(&origin)) != Some(true) {
            return Err(GameError::InTransit);
        }
        if state.cash < fare {
            return Err(GameError::InsufficientCash);
        }
        state.cash -= fare;
        state.location = None;
    }
    info!(target: "transactions", "{} paid ${} to fly to {}", player.name, fare, region.code());
    send_stats(player);
    airport.arrive(Arrival::new(player.clone(), Some(origin)));
    Ok("You fly off to your destination".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::test_player;
    use crate::world::tests::{put_at, settle, test_world};
    use swi_shared::Coordinates;

    #[tokio::test(start_paused = true)]
    async fn healing_is_capped_at_full_health() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(0, 0)).await;

        assert!(heal(&alice, 5).is_err());
        {
            let mut state = alice.lock();
            state.health = 90;
            state.cash = 1000;
        }
        assert_eq!(heal(&alice, 50).unwrap(), "You pay the doctor 300 to patch you up.");
        let state = alice.lock();
        assert_eq!((state.health, state.cash), (100, 700));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn healing_costs_thirty_per_point() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        alice.lock().health = 50;
        put_at(&world, &alice, Coordinates::new(0, 0)).await;
        assert_eq!(
            heal(&alice, 4),
            Err(GameError::rejected("You do not have enough money. Costs 30 per point to heal"))
        );
        heal(&alice, 3).unwrap();
        assert_eq!(alice.lock().health, 53);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn travel_charges_the_fare_and_lands_at_the_airport() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        alice.lock().cash = 500;
        let origin = put_at(&world, &alice, Coordinates::new(4, 4)).await;

        assert_eq!(
            travel(&world, &alice, "nowhere"),
            Err(GameError::rejected("Invalid destination. Try: /travel"))
        );
        travel(&world, &alice, "ew").unwrap();
        settle().await;

        let here = alice.location().unwrap();
        assert_eq!(here.region_code(), "EW");
        assert_eq!(here.coords(), Coordinates::new(4, 4));
        assert_eq!(alice.lock().cash, 200);
        assert!(!origin.snapshot().await.contains(alice.id));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn travel_needs_the_fare() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(4, 4)).await;
        assert_eq!(
            travel(&world, &alice, "EW"),
            Err(GameError::InsufficientCash)
        );
        assert!(alice.location().is_some());
        world.shutdown();
    }
}
