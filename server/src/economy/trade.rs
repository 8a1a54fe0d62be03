//! The drug trade with NPC merchants.
//!
//! Opening a trade links player and merchant through the symmetric
//! `trading_with` relation, written under both state locks the same way as
//! targeting. Dealers sell from their own stock; addicts buy from the
//! player's drugs.

use std::sync::Arc;

use log::info;

use swi_shared::settings::DRUG_REP_INCREASE;
use swi_shared::{ItemType, NpcKind, ServerEvent};

use super::{addict_price, dealer_price};
use crate::entities::{lock_inventory_pair, lock_pair, Entity, EntityId, Item};
use crate::error::GameError;
use crate::world::place::PlaceHandle;
use crate::world::World;

/// Finds a merchant of `kind` in `place`, preferring a name prefix match
async fn find_merchant(place: &PlaceHandle, kind: NpcKind, name: Option<&str>) -> Option<Arc<Entity>> {
    let snapshot = place.snapshot().await;
    let mut merchants = snapshot
        .npcs
        .into_iter()
        .filter(|n| n.npc_kind() == Some(kind) && !n.is_dead());
    match name.map(str::to_lowercase) {
        Some(prefix) => {
            let all: Vec<Arc<Entity>> = merchants.collect();
            all.iter()
                .find(|n| n.name.to_lowercase().starts_with(&prefix))
                .or_else(|| all.first())
                .cloned()
        }
        None => merchants.next(),
    }
}

/// Whether `merchant` deals with `player`. Hostile merchants ignore the
/// player without a word.
fn willing(player: &Entity, merchant: &Entity) -> Result<bool, GameError> {
    let state = merchant.lock();
    if state.dead {
        return Err(GameError::NoSuchTarget);
    }
    let hostile = match (player.session_id(), state.npc.as_ref()) {
        (Some(session), Some(npc)) => npc.hostiles.contains(&session),
        _ => false,
    };
    if hostile {
        return Ok(false);
    }
    if state.in_combat() {
        return Err(GameError::rejected(format!(
            "{} is in a fight and ignores you.",
            merchant.name
        )));
    }
    Ok(true)
}

fn link(player: &Arc<Entity>, merchant: &Arc<Entity>) {
    let (mut p, mut m) = lock_pair(player, merchant);
    p.trading_with.insert(merchant.id, merchant.clone());
    m.trading_with.insert(player.id, player.clone());
}

/// Ends the trade between two entities, on both sides
pub fn end(a: &Entity, b: &Entity) {
    let (mut sa, mut sb) = lock_pair(a, b);
    sa.trading_with.remove(&b.id);
    sb.trading_with.remove(&a.id);
}

/// Dissolves every trade `entity` takes part in. Returns how many closed.
pub fn close_all(entity: &Entity) -> usize {
    let partners: Vec<Arc<Entity>> = entity.lock().trading_with.values().cloned().collect();
    for partner in &partners {
        end(entity, partner);
    }
    partners.len()
}

/// Drops trades with partners who are no longer in the merchant's Place
pub fn prune(merchant: &Entity) {
    let here = merchant.location();
    let partners: Vec<Arc<Entity>> = merchant.lock().trading_with.values().cloned().collect();
    for partner in partners {
        let together = match (&here, partner.location()) {
            (Some(a), Some(b)) => a.same_as(&b),
            _ => false,
        };
        if !together || !partner.is_connected() {
            end(merchant, &partner);
        }
    }
}

/// An open trade partner of `player` by entity id
fn partner(player: &Entity, npc_id: EntityId, kind: NpcKind) -> Result<Arc<Entity>, GameError> {
    player
        .lock()
        .trading_with
        .get(&npc_id)
        .filter(|m| m.npc_kind() == Some(kind))
        .cloned()
        .ok_or_else(|| GameError::rejected("There is no one here to trade with."))
}

/// Both in the same Place. A partner who wandered off loses the trade.
fn co_located(player: &Entity, merchant: &Entity) -> Result<PlaceHandle, GameError> {
    match (player.location(), merchant.location()) {
        (Some(a), Some(b)) if a.same_as(&b) => Ok(a),
        _ => {
            end(player, merchant);
            Err(GameError::NotSameLocation)
        }
    }
}

fn demand(world: &World, place: &PlaceHandle, drug: &str) -> f32 {
    world
        .region(place.region_code())
        .map(|r| r.demand(drug))
        .unwrap_or(1.0)
}

/// Drug price as offered in this Place, `None` for anything that is not a drug
fn offer(world: &World, place: &PlaceHandle, kind: NpcKind, item: &Item) -> Option<u32> {
    let template = world.templates().item(&item.template)?;
    if template.item_type != ItemType::Drug {
        return None;
    }
    let demand = demand(world, place, &item.template);
    Some(match kind {
        NpcKind::DrugAddict => addict_price(item.price(template), demand),
        _ => dealer_price(item.price(template), demand),
    })
}

/// Priced view of the goods on the table: the dealer's stock, or the
/// player's drugs for an addict
fn snapshot(world: &World, place: &PlaceHandle, player: &Entity, merchant: &Entity) -> ServerEvent {
    let kind = merchant.npc_kind().unwrap_or(NpcKind::DrugDealer);
    let goods = match kind {
        NpcKind::DrugAddict => player.inventory(),
        _ => merchant.inventory(),
    };
    let slots = (0..goods.capacity())
        .map(|index| {
            let item = goods.get(index)?;
            let price = offer(world, place, kind, item)?;
            let mut frame = item.frame(world.templates(), false);
            frame.price = price;
            Some(frame)
        })
        .collect();
    ServerEvent::MerchantInventory {
        npc_id: merchant.id,
        npc_name: merchant.name.clone(),
        slots,
    }
}

/// Opens a trade with a dealer or addict here and shows what is on offer
pub async fn open(
    world: &World,
    player: &Arc<Entity>,
    kind: NpcKind,
    name: Option<&str>,
) -> Result<(), GameError> {
    let place = player.location().ok_or(GameError::InTransit)?;
    let merchant = find_merchant(&place, kind, name).await.ok_or_else(|| {
        GameError::rejected(match kind {
            NpcKind::DrugAddict => "There are no druggies by that name.",
            _ => "There are no drug dealers here going by that name.",
        })
    })?;
    if !willing(player, &merchant)? {
        return Ok(());
    }
    link(player, &merchant);
    player.send(snapshot(world, &place, player, &merchant));
    Ok(())
}

/// Buys the drug in `slot` of a dealer's stock. Returns the item name.
pub fn purchase(world: &World, player: &Arc<Entity>, npc_id: EntityId, slot: usize) -> Result<String, GameError> {
    let dealer = partner(player, npc_id, NpcKind::DrugDealer)?;
    let place = co_located(player, &dealer)?;
    if !willing(player, &dealer)? {
        return Err(GameError::rejected(format!("{} ignores you.", dealer.name)));
    }

    let (name, price) = {
        let mut state = player.lock();
        let (mut own, mut stock) = lock_inventory_pair(player, &dealer);
        if own.is_full() {
            return Err(GameError::rejected("There is no room left in your inventory."));
        }
        let item = stock
            .get(slot)
            .ok_or_else(|| GameError::rejected("That is no longer for sale."))?;
        let price = offer(world, &place, NpcKind::DrugDealer, item)
            .ok_or_else(|| GameError::rejected("That is not for sale."))?;
        if state.cash < price {
            return Err(GameError::rejected("You do not have enough cash for that."));
        }
        let Some(item) = stock.take(slot) else {
            return Err(GameError::rejected("That is no longer for sale."));
        };
        let name = world.templates().item_name(&item.template);
        if let Err(item) = own.add(item) {
            let _ = stock.put(slot, item);
            return Err(GameError::InventoryFull);
        }
        state.cash -= price;
        (name, price)
    };

    info!(target: "transactions", "{} bought {} from {} for ${}", player.name, name, dealer.name, price);
    player.send(ServerEvent::MerchantMessage {
        npc_id: dealer.id,
        message: format!("Here is your {}, anything else?", name),
    });
    player.send(snapshot(world, &place, player, &dealer));
    Ok(name)
}

/// Sells the drug in the player's `slot` to an addict. Returns the price paid.
pub fn sell_drug(world: &World, player: &Arc<Entity>, npc_id: EntityId, slot: usize) -> Result<u32, GameError> {
    let addict = partner(player, npc_id, NpcKind::DrugAddict)?;
    let place = co_located(player, &addict)?;
    if !willing(player, &addict)? {
        return Err(GameError::rejected(format!("{} ignores you.", addict.name)));
    }

    let (name, price) = {
        let mut state = player.lock();
        let (mut own, mut stash) = lock_inventory_pair(player, &addict);
        let item = own.get(slot).ok_or(GameError::NoSuchItem)?;
        let price = offer(world, &place, NpcKind::DrugAddict, item)
            .ok_or_else(|| GameError::rejected("I am not interested in that.."))?;
        if stash.is_full() {
            return Err(GameError::rejected(
                "I got what I need, go sell your shit to someone else.",
            ));
        }
        let Some(item) = own.take(slot) else {
            return Err(GameError::NoSuchItem);
        };
        let name = world.templates().item_name(&item.template);
        if let Err(item) = stash.add(item) {
            let _ = own.put(slot, item);
            return Err(GameError::rejected("I got what I need, go sell your shit to someone else."));
        }
        state.cash = state.cash.saturating_add(price);
        state.reputation += DRUG_REP_INCREASE;
        (name, price)
    };

    info!(target: "transactions", "{} sold {} to {} for ${}", player.name, name, addict.name, price);
    player.send(ServerEvent::MerchantMessage {
        npc_id: addict.id,
        message: format!("Here's ${} for the {}", price, name),
    });
    player.send(snapshot(world, &place, player, &addict));
    Ok(price)
}
