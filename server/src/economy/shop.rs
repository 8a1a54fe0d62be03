//! Arms dealers and pawn shops.
//!
//! A shop's stock and buy quotas live behind the building's own mutex. It is
//! always taken before any entity lock.

use std::sync::Arc;

use log::info;

use swi_shared::buildings::UNLIMITED;
use swi_shared::{ServerEvent, ShopItemFrame};

use super::buyback_price;
use crate::entities::player::{send_inventory, send_stats};
use crate::entities::{Entity, Item};
use crate::error::GameError;
use crate::templates::Templates;
use crate::world::building::{Building, ShopState};
use crate::world::World;

fn shops_here(entity: &Entity) -> Result<Vec<Arc<Building>>, GameError> {
    let place = entity.location().ok_or(GameError::InTransit)?;
    Ok(place
        .buildings()
        .iter()
        .filter(|b| b.shop.is_some())
        .cloned()
        .collect())
}

fn shop_by_id(entity: &Entity, building_id: u64) -> Result<Arc<Building>, GameError> {
    shops_here(entity)?
        .into_iter()
        .find(|b| b.id == building_id)
        .ok_or_else(|| GameError::rejected("There is no shop here by that id."))
}

fn stock_frames(shop: &ShopState, templates: &Templates) -> Vec<ShopItemFrame> {
    shop.stock
        .iter()
        .enumerate()
        .filter_map(|(index, line)| {
            let template = templates.item(&line.template)?;
            Some(ShopItemFrame {
                index,
                item: Item::new(template).frame(templates, false),
                quantity: line.quantity,
                min_rep: template.min_rep,
            })
        })
        .collect()
}

fn stock_event(building: &Building, shop: &ShopState, templates: &Templates) -> ServerEvent {
    ServerEvent::ShopInventory {
        building_id: building.id,
        name: building.name.clone(),
        stock: stock_frames(shop, templates),
    }
}

/// Sends the stock of a shop in this Place, picked by name prefix or the first one
pub fn show(world: &World, player: &Entity, name: Option<&str>) -> Result<(), GameError> {
    let shops = shops_here(player)?;
    let building = match name.map(str::to_lowercase) {
        Some(prefix) => shops
            .iter()
            .find(|b| b.name.to_lowercase().starts_with(&prefix)),
        None => shops.first(),
    }
    .ok_or_else(|| GameError::rejected("There is no shop here."))?;

    if let Some(shop) = &building.shop {
        let event = stock_event(building, &shop.lock(), world.templates());
        player.send(event);
    }
    Ok(())
}

/// Buys one unit of stock line `index`. Returns the item name.
pub fn buy(world: &World, player: &Entity, building_id: u64, index: usize) -> Result<String, GameError> {
    let building = shop_by_id(player, building_id)?;
    let Some(shop) = &building.shop else {
        return Err(GameError::rejected("There is no shop here."));
    };
    let templates = world.templates();

    let mut shop = shop.lock();
    let line = shop
        .stock
        .get(index)
        .ok_or_else(|| GameError::rejected("I don't sell that."))?;
    let template = templates
        .item(&line.template)
        .ok_or_else(|| GameError::rejected("I don't sell that."))?;
    if line.quantity == 0 {
        return Err(GameError::rejected("I have none of those left, pick something else."));
    }
    let item = Item::new(template);
    let price = item.price(template);

    {
        let mut state = player.lock();
        let mut inventory = player.inventory();
        if state.reputation < template.min_rep {
            return Err(GameError::rejected(
                "I don't know you well enough to sell you that. Come back when your name is more known.",
            ));
        }
        if state.cash < price {
            return Err(GameError::rejected(
                "You do not have enough money on you, come back when you have cash.",
            ));
        }
        if inventory.add(item).is_err() {
            return Err(GameError::rejected("You don't have enough room to buy that."));
        }
        state.cash -= price;
    }
    if let Some(line) = shop.stock.get_mut(index) {
        if line.quantity != UNLIMITED {
            line.quantity -= 1;
        }
    }

    info!(target: "transactions", "{} bought {} at {} for ${}", player.name, template.id, building.name, price);
    player.send(stock_event(&building, &shop, templates));
    drop(shop);
    send_stats(player);
    send_inventory(player, templates);
    Ok(template.name.clone())
}

/// Sells the item in the player's `slot` to the shop. Returns the price paid.
pub fn sell(world: &World, player: &Entity, building_id: u64, slot: usize) -> Result<u32, GameError> {
    let building = shop_by_id(player, building_id)?;
    let Some(shop) = &building.shop else {
        return Err(GameError::rejected("There is no shop here."));
    };
    let templates = world.templates();

    let mut shop = shop.lock();
    let (name, price, item_type) = {
        let mut state = player.lock();
        let mut inventory = player.inventory();
        let item = inventory.get(slot).ok_or(GameError::NoSuchItem)?;
        let template = templates.item(&item.template).ok_or(GameError::NoSuchItem)?;
        let quota = shop
            .buys
            .get(&template.item_type)
            .copied()
            .ok_or_else(|| GameError::rejected("I am not interested in that.."))?;
        if quota == 0 {
            return Err(GameError::rejected(
                "I am not looking to buy more of that type of item.",
            ));
        }
        let price = buyback_price(item.price(template));
        let name = template.name.clone();
        let item_type = template.item_type;
        inventory.take(slot);
        state.cash = state.cash.saturating_add(price);
        (name, price, item_type)
    };
    if let Some(quota) = shop.buys.get_mut(&item_type) {
        if *quota != UNLIMITED {
            *quota -= 1;
        }
    }
    drop(shop);

    info!(target: "transactions", "{} sold {} to {} for ${}", player.name, name, building.name, price);
    send_stats(player);
    send_inventory(player, templates);
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::test_player;
    use crate::world::building::StockLine;
    use crate::world::tests::{put_at, test_world};
    use swi_shared::{BuildingType, Coordinates, ItemType};

    async fn at_arms(world: &World, player: &Arc<Entity>) -> Arc<Building> {
        let place = put_at(world, player, Coordinates::new(2, 2)).await;
        place.building(BuildingType::Arms).cloned().unwrap()
    }

    fn line(building: &Building, template: &str) -> usize {
        building
            .shop
            .as_ref()
            .unwrap()
            .lock()
            .stock
            .iter()
            .position(|l| l.template == template)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn buying_charges_the_base_price() {
        let (world, _) = test_world(0.0);
        let (alice, session) = test_player("Alice");
        alice.lock().cash = 1000;
        let arms = at_arms(&world, &alice).await;

        let index = line(&arms, "glock22");
        let reputation_needed = world.templates().item("glock22").unwrap().min_rep;
        alice.lock().reputation = reputation_needed;
        assert_eq!(buy(&world, &alice, arms.id, index).unwrap(), "Glock 22");
        assert_eq!(alice.lock().cash, 500);
        assert!(alice.inventory().has_template("glock22"));
        assert!(session
            .events
            .lock()
            .iter()
            .any(|e| matches!(e, ServerEvent::ShopInventory { building_id, .. } if *building_id == arms.id)));
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn buying_needs_reputation_cash_and_room() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let arms = at_arms(&world, &alice).await;
        let index = line(&arms, "glock22");

        assert_eq!(
            buy(&world, &alice, arms.id, index),
            Err(GameError::rejected(
                "I don't know you well enough to sell you that. Come back when your name is more known."
            ))
        );
        alice.lock().reputation = 1_000_000;
        assert_eq!(
            buy(&world, &alice, arms.id, index),
            Err(GameError::rejected(
                "You do not have enough money on you, come back when you have cash."
            ))
        );
        alice.lock().cash = 10_000;
        let weed = world.templates().item("weed").unwrap();
        while !alice.inventory().is_full() {
            alice.inventory().add(Item::new(weed)).unwrap();
        }
        assert_eq!(
            buy(&world, &alice, arms.id, index),
            Err(GameError::rejected("You don't have enough room to buy that."))
        );
        assert_eq!(alice.lock().cash, 10_000);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn finite_stock_runs_out() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        alice.lock().cash = 10_000;
        alice.lock().reputation = 1_000_000;
        let arms = at_arms(&world, &alice).await;
        let index = {
            let mut shop = arms.shop.as_ref().unwrap().lock();
            shop.stock.push(StockLine {
                template: "crowbar".into(),
                quantity: 1,
            });
            shop.stock.len() - 1
        };

        buy(&world, &alice, arms.id, index).unwrap();
        assert_eq!(
            buy(&world, &alice, arms.id, index),
            Err(GameError::rejected("I have none of those left, pick something else."))
        );
        assert_eq!(alice.lock().cash, 10_000 - 700);
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn selling_pays_sixty_five_percent_for_wanted_types() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let arms = at_arms(&world, &alice).await;
        let crowbar = alice
            .inventory()
            .add(Item::new(world.templates().item("crowbar").unwrap()))
            .unwrap();
        let weed = alice
            .inventory()
            .add(Item::new(world.templates().item("weed").unwrap()))
            .unwrap();
        alice.inventory().equip(crowbar, world.templates()).unwrap();

        assert_eq!(
            sell(&world, &alice, arms.id, weed),
            Err(GameError::rejected("I am not interested in that.."))
        );
        assert_eq!(sell(&world, &alice, arms.id, crowbar), Ok(455));
        assert_eq!(alice.lock().cash, 555);
        let inventory = alice.inventory();
        assert!(!inventory.has_template("crowbar"));
        assert!(inventory.equipped(crate::entities::EquipSlot::Melee).is_none());
        assert!(inventory.equipment_consistent());
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_buy_quota_is_refused() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let arms = at_arms(&world, &alice).await;
        arms.shop.as_ref().unwrap().lock().buys.insert(ItemType::Melee, 1);
        let crowbar = world.templates().item("crowbar").unwrap();
        let first = alice.inventory().add(Item::new(crowbar)).unwrap();
        let second = alice.inventory().add(Item::new(crowbar)).unwrap();

        sell(&world, &alice, arms.id, first).unwrap();
        assert_eq!(
            sell(&world, &alice, arms.id, second),
            Err(GameError::rejected("I am not looking to buy more of that type of item."))
        );
        world.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn shops_only_answer_where_they_stand() {
        let (world, _) = test_world(0.0);
        let (alice, _) = test_player("Alice");
        let arms = at_arms(&world, &alice).await;
        put_at(&world, &alice, Coordinates::new(3, 3)).await;
        assert!(buy(&world, &alice, arms.id, 0).is_err());
        assert_eq!(
            show(&world, &alice, None),
            Err(GameError::rejected("There is no shop here."))
        );
        world.shutdown();
    }
}
