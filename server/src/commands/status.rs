use swi_shared::settings::PUNCH_DAMAGE;
use swi_shared::{ItemType, NpcKind, NpcTemplate};

use super::{CommandResult, Handled};
use crate::entities::Entity;
use crate::error::GameError;
use crate::templates::Templates;

/// Sends the whole game frame again: the Place, stats and inventory
pub(super) async fn refresh(player: &Entity) -> Handled {
    let place = player.location().ok_or(GameError::InTransit)?;
    let frame = place.snapshot().await.location_event(&place);
    player.send(frame);
    Ok(CommandResult::silent().with_stats_update().with_inventory_update())
}

/// Stat table of every NPC kind, open to everyone
pub fn npc_table(templates: &Templates) -> CommandResult {
    let mut lines = vec![format!(
        "{:<18} {:>6} {:>8} {:>6} {:>13} {:>13}",
        "Name", "Health", "Accuracy", "Damage", "Armor (Range)", "Armor (Melee)"
    )];
    for kind in NpcKind::ALL {
        let Ok(template) = templates.npc(kind) else {
            continue;
        };
        let (range, melee) = armor(templates, template);
        lines.push(format!(
            "{:<18} {:>6} {:>8.2} {:>6} {:>13} {:>13}",
            kind.name(),
            template.health,
            template.skill_acc,
            damage(templates, template),
            range,
            melee
        ));
    }
    CommandResult::lines(lines)
}

fn equipped(templates: &Templates, template: &NpcTemplate, item_type: ItemType) -> Option<u32> {
    template
        .equipment
        .iter()
        .filter_map(|id| templates.item(id))
        .find(|item| item.item_type == item_type)
        .map(|item| item.damage)
}

/// Fists, or the gun plus its ammo, with a melee weapon taking precedence
fn damage(templates: &Templates, template: &NpcTemplate) -> i32 {
    if let Some(melee) = equipped(templates, template, ItemType::Melee) {
        return melee as i32;
    }
    match equipped(templates, template, ItemType::Gun) {
        Some(gun) => (gun + equipped(templates, template, ItemType::Ammo).unwrap_or(0)) as i32,
        None => PUNCH_DAMAGE,
    }
}

fn armor(templates: &Templates, template: &NpcTemplate) -> (u32, u32) {
    template
        .equipment
        .iter()
        .filter_map(|id| templates.item(id))
        .find(|item| item.item_type == ItemType::Armor)
        .map(|item| (item.armor_guns, item.armor_melee))
        .unwrap_or((0, 0))
}
