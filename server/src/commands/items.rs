use std::sync::Arc;

use log::info;

use swi_shared::settings::{DRUG_USE_HEALTH_COST, DRUG_USE_REP_GAIN, SMART_PHONE_COST};
use swi_shared::{NpcKind, UseEffect};

use super::{CommandResult, Handled};
use crate::entities::{Entity, Inventory};
use crate::error::GameError;
use crate::templates::Templates;
use crate::world::World;

/// Slot of the item `input` names: its id, else the first item whose name
/// starts with it
fn find_item(inventory: &Inventory, templates: &Templates, input: &str) -> Option<usize> {
    if let Some(index) = inventory.find(input) {
        return Some(index);
    }
    let prefix = input.to_lowercase();
    inventory
        .items()
        .find(|(_, item)| templates.item_name(&item.template).to_lowercase().starts_with(&prefix))
        .map(|(index, _)| index)
}

fn slot_of(world: &World, player: &Entity, input: &str) -> Result<usize, GameError> {
    find_item(&player.inventory(), world.templates(), input).ok_or(GameError::NoSuchItem)
}

/// The Place answers the pickup itself
pub(super) fn pickup(player: &Arc<Entity>, query: &str) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    place.pickup(query, player.clone());
    Ok(CommandResult::silent())
}

pub(super) fn drop_item(world: &World, player: &Arc<Entity>, input: &str) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    let item = {
        let mut inventory = player.inventory();
        let index = find_item(&inventory, world.templates(), input).ok_or(GameError::NoSuchItem)?;
        inventory.take(index).ok_or(GameError::NoSuchItem)?
    };
    let name = world.templates().item_name(&item.template);
    info!(
        target: "items",
        "{} dropped {} ({}) at {} {}",
        player.name,
        item.template,
        item.short_id(),
        place.region_code(),
        place.coords()
    );
    place.item_dropped(item, Some(player.clone()));
    Ok(CommandResult::info(format!("You drop the {}.", name)).with_inventory_update())
}

pub(super) fn equip(world: &World, player: &Entity, input: &str) -> Handled {
    let templates = world.templates();
    let name = {
        let mut inventory = player.inventory();
        let index = find_item(&inventory, templates, input).ok_or(GameError::NoSuchItem)?;
        inventory.equip(index, templates)?;
        inventory
            .get(index)
            .map(|item| templates.item_name(&item.template))
            .unwrap_or_default()
    };
    Ok(CommandResult::info(format!("You equip the {}.", name)).with_inventory_update())
}

pub(super) fn unequip(world: &World, player: &Entity, input: &str) -> Handled {
    let templates = world.templates();
    let name = {
        let mut inventory = player.inventory();
        let index = find_item(&inventory, templates, input).ok_or(GameError::NoSuchItem)?;
        inventory.unequip(index)?;
        inventory
            .get(index)
            .map(|item| templates.item_name(&item.template))
            .unwrap_or_default()
    };
    Ok(CommandResult::info(format!("You unequip the {}.", name)).with_inventory_update())
}

pub(super) fn info(world: &World, player: &Entity, input: &str) -> Handled {
    let inventory = player.inventory();
    let index = find_item(&inventory, world.templates(), input).ok_or(GameError::NoSuchItem)?;
    let item = inventory.get(index).ok_or(GameError::NoSuchItem)?;
    let template = world.templates().item(&item.template).ok_or(GameError::NoSuchItem)?;
    Ok(CommandResult::lines(item.describe(template)))
}

pub(super) async fn use_item(world: &World, player: &Entity, input: &str) -> Handled {
    let index = slot_of(world, player, input)?;
    let (template_id, name) = {
        let inventory = player.inventory();
        let item = inventory.get(index).ok_or(GameError::NoSuchItem)?;
        (item.template.clone(), world.templates().item_name(&item.template))
    };
    let effect = world
        .templates()
        .item(&template_id)
        .and_then(|t| t.use_effect)
        .ok_or_else(|| GameError::rejected(format!("You can't use the {}.", name)))?;

    match effect {
        UseEffect::UseDrug => use_drug(player, index, &template_id, &name),
        UseEffect::SmartPhone => call_informant(world, player).await,
    }
}

/// Costs health, earns reputation and consumes one unit
fn use_drug(player: &Entity, index: usize, template_id: &str, name: &str) -> Handled {
    {
        let mut state = player.lock();
        if state.health <= DRUG_USE_HEALTH_COST {
            return Err(GameError::rejected("Using this would kill you.."));
        }
        let mut inventory = player.inventory();
        let item = inventory
            .get_mut(index)
            .filter(|i| i.template == template_id)
            .ok_or(GameError::NoSuchItem)?;
        item.amount -= 1;
        if item.amount <= 0 {
            inventory.take(index);
        }
        state.health -= DRUG_USE_HEALTH_COST;
        state.reputation += DRUG_USE_REP_GAIN;
    }
    info!(target: "items", "{} used {}", player.name, template_id);
    Ok(CommandResult::info(format!(
        "You use the {}. It didn't do your health any favours. (-{} Health, +{} Rep)",
        name, DRUG_USE_HEALTH_COST, DRUG_USE_REP_GAIN
    ))
    .with_stats_update()
    .with_inventory_update())
}

/// Pays the informant and lists where the region's dealers and addicts were last seen
async fn call_informant(world: &World, player: &Entity) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    let region = world.region(place.region_code()).ok_or(GameError::InTransit)?;
    {
        let mut state = player.lock();
        let account = state.player.as_mut().ok_or(GameError::NotLoggedIn)?;
        if account.bank < SMART_PHONE_COST {
            return Err(GameError::rejected(format!(
                "This information does not come for free, you don't have the ${} it costs in your bank.",
                SMART_PHONE_COST
            )));
        }
        account.bank -= SMART_PHONE_COST;
    }
    info!(target: "transactions", "{} paid ${} to the informant", player.name, SMART_PHONE_COST);

    let mut lines = vec![format!(
        "Informant: \"(Phone) Your ${} was received. Alright, here is what I know..\"",
        SMART_PHONE_COST
    )];
    for kind in [NpcKind::DrugDealer, NpcKind::DrugAddict] {
        for npc in region.npcs(Some(kind)).await {
            if let Some(seen) = npc.location() {
                lines.push(format!("{} the {}: {}", npc.name, kind.name(), seen.coords()));
            }
        }
    }
    Ok(CommandResult::lines(lines).with_stats_update())
}
