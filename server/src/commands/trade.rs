use std::sync::Arc;

use swi_shared::NpcKind;

use super::{CommandResult, Handled};
use crate::economy::trade;
use crate::entities::{Entity, EntityId};
use crate::error::GameError;
use crate::world::World;

/// Opens a trade with a dealer (`/buy`) or an addict (`/sell`)
pub(super) async fn browse(world: &World, player: &Arc<Entity>, kind: NpcKind, name: Option<&str>) -> Handled {
    trade::open(world, player, kind, name).await?;
    Ok(CommandResult::silent())
}

pub(super) fn purchase(world: &World, player: &Arc<Entity>, npc_id: EntityId, slot: usize) -> Handled {
    trade::purchase(world, player, npc_id, slot)?;
    Ok(CommandResult::silent().with_stats_update().with_inventory_update())
}

pub(super) fn sell_drug(world: &World, player: &Arc<Entity>, npc_id: EntityId, slot: usize) -> Handled {
    trade::sell_drug(world, player, npc_id, slot)?;
    Ok(CommandResult::silent().with_stats_update().with_inventory_update())
}

pub(super) fn close(player: &Entity) -> Handled {
    match trade::close_all(player) {
        0 => Err(GameError::rejected("You are not trading with anyone.")),
        _ => Ok(CommandResult::info("You walk away from the deal.")),
    }
}
