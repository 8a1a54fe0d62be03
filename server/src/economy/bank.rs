//! The city bank. Money only goes in away from home.

use log::info;

use swi_shared::{BuildingType, ServerEvent};

use super::building_here;
use crate::entities::player::send_stats;
use crate::entities::{lock_pair, Entity};
use crate::error::GameError;
use crate::world::World;

fn away_from_home(entity: &Entity, action: &str) -> Result<(), GameError> {
    let (place, _) = building_here(entity, BuildingType::Bank)?;
    let home = entity
        .lock()
        .player
        .as_ref()
        .is_some_and(|p| p.hometown.eq_ignore_ascii_case(place.region_code()));
    if home {
        return Err(GameError::rejected(format!(
            "You can only use the bank to {} money when you are not in your home city.",
            action
        )));
    }
    Ok(())
}

pub fn deposit(player: &Entity, amount: u32) -> Result<String, GameError> {
    away_from_home(player, "deposit")?;
    {
        let mut state = player.lock();
        if state.cash < amount {
            return Err(GameError::rejected(format!("You do not have {} on you", amount)));
        }
        let Some(account) = state.player.as_mut() else {
            return Err(GameError::NotLoggedIn);
        };
        account.bank = account.bank.saturating_add(amount);
        state.cash -= amount;
    }
    info!(target: "transactions", "{} deposited ${}", player.name, amount);
    send_stats(player);
    Ok(format!("You deposit ${} in your bank account.", amount))
}

pub fn withdraw(player: &Entity, amount: u32) -> Result<String, GameError> {
    building_here(player, BuildingType::Bank)?;
    {
        let mut state = player.lock();
        let Some(account) = state.player.as_mut() else {
            return Err(GameError::NotLoggedIn);
        };
        if account.bank < amount {
            return Err(GameError::rejected(format!("You do not have ${} in the bank", amount)));
        }
        account.bank -= amount;
        state.cash = state.cash.saturating_add(amount);
    }
    info!(target: "transactions", "{} withdrew ${}", player.name, amount);
    send_stats(player);
    Ok(format!("You withdraw ${} from your account.", amount))
}

/// Moves money between two bank accounts. The recipient is any online
/// player, wherever they are.
pub async fn transfer(world: &World, from: &Entity, to: &str, amount: u32) -> Result<String, GameError> {
    away_from_home(from, "transfer")?;
    let recipient = world
        .find_player(to)
        .await
        .filter(|p| p.id != from.id)
        .ok_or_else(|| GameError::rejected("We cannot find anyone going by that name."))?;

    {
        let (mut sender, mut receiver) = lock_pair(from, &recipient);
        let (Some(source), Some(target)) = (sender.player.as_mut(), receiver.player.as_mut()) else {
            return Err(GameError::NotLoggedIn);
        };
        if source.bank < amount {
            return Err(GameError::InsufficientBank);
        }
        source.bank -= amount;
        target.bank = target.bank.saturating_add(amount);
    }

    info!(target: "transactions", "{} transferred ${} to {}", from.name, amount, recipient.name);
    recipient.send(ServerEvent::success(format!(
        "{} just transferred you ${}",
        from.name, amount
    )));
    send_stats(from);
    send_stats(&recipient);
    Ok(format!("You just transferred ${} to {}", amount, recipient.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::test_player;
    use crate::world::tests::{put_at, test_world};
    use swi_shared::Coordinates;

    fn bank(entity: &Entity) -> u32 {
        entity.lock().player.as_ref().map(|p| p.bank).unwrap_or_default()
    }

    /// (cash, bank), read under one lock
    fn balances(entity: &Entity) -> (u32, u32) {
        let state = entity.lock();
        (state.cash, state.player.as_ref().map(|p| p.bank).unwrap_or_default())
    }

    fn set_bank(entity: &Entity, amount: u32) {
        if let Some(p) = entity.lock().player.as_mut() {
            p.bank = amount;
        }
    }

    fn from_elsewhere(entity: &Entity) {
        if let Some(p) = entity.lock().player.as_mut() {
            p.hometown = "EW".into();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_moves_bank_money_away_from_home() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (bob, bob_session) = test_player("Bob");
        from_elsewhere(&alice);
        set_bank(&alice, 1000);
        set_bank(&bob, 0);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        world.join_roster(bob.clone()).await.unwrap();

        let line = transfer(&world, &alice, "bob", 400).await.unwrap();
        assert_eq!(line, "You just transferred $400 to Bob");
        assert_eq!(bank(&alice), 600);
        assert_eq!(bank(&bob), 400);
        assert!(bob_session.saw("Alice just transferred you $400"));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_is_refused_in_the_home_city() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (bob, _) = test_player("Bob");
        set_bank(&alice, 1000);
        set_bank(&bob, 0);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        world.join_roster(bob.clone()).await.unwrap();

        assert!(transfer(&world, &alice, "bob", 400).await.is_err());
        assert_eq!(bank(&alice), 1000);
        assert_eq!(bank(&bob), 0);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn transfer_needs_funds_and_a_recipient() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let (bob, _) = test_player("Bob");
        from_elsewhere(&alice);
        set_bank(&alice, 100);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;
        world.join_roster(bob.clone()).await.unwrap();

        assert_eq!(
            transfer(&world, &alice, "carol", 10).await,
            Err(GameError::rejected("We cannot find anyone going by that name."))
        );
        assert_eq!(
            transfer(&world, &alice, "bob", 101).await,
            Err(GameError::InsufficientBank)
        );
        assert_eq!(bank(&alice), 100);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn deposit_and_withdraw() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        set_bank(&alice, 0);
        put_at(&world, &alice, Coordinates::new(1, 1)).await;

        assert!(deposit(&alice, 50).is_err());
        from_elsewhere(&alice);
        assert_eq!(
            deposit(&alice, 500),
            Err(GameError::rejected("You do not have 500 on you"))
        );
        deposit(&alice, 60).unwrap();
        assert_eq!(balances(&alice), (40, 60));

        assert_eq!(
            withdraw(&alice, 61),
            Err(GameError::rejected("You do not have $61 in the bank"))
        );
        withdraw(&alice, 60).unwrap();
        assert_eq!(balances(&alice), (100, 0));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn the_bank_is_only_at_the_bank() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        put_at(&world, &alice, Coordinates::new(3, 3)).await;
        assert_eq!(withdraw(&alice, 1), Err(GameError::NoSuchBuilding("Bank")));
        world.shutdown();
    }
}
