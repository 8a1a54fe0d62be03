//! NPC-only state and spawning from templates.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use swi_shared::{Gender, NpcTemplate, FEMALE_NAMES, MALE_NAMES};

use super::{Entity, EntityState, Inventory, Item, Role, Roller};
use crate::error::ConfigError;
use crate::templates::Templates;

/// Fields only NPCs carry
#[derive(Debug, Clone)]
pub struct NpcData {
    /// Region code the NPC lives in
    pub region: String,
    /// Sessions this NPC will attack on sight
    pub hostiles: HashSet<Uuid>,
    pub reward_cash: u32,
    pub reward_rep: i64,
    pub gender: Gender,
}

impl NpcData {
    pub fn new(region: String, reward_cash: u32, reward_rep: i64) -> Self {
        Self {
            region,
            hostiles: HashSet::new(),
            reward_cash,
            reward_rep,
            gender: Gender::Male,
        }
    }
}

/// Builds a fresh NPC. Equipment is created and equipped; a template whose
/// equipment cannot back its attack is refused.
pub fn build_npc(
    templates: &Templates,
    template: &NpcTemplate,
    region: &str,
    roller: &dyn Roller,
) -> Result<Arc<Entity>, ConfigError> {
    templates.validate_npc(template)?;

    let gender = template.gender.unwrap_or(if roller.below(2) == 0 {
        Gender::Male
    } else {
        Gender::Female
    });
    let names = match gender {
        Gender::Male => MALE_NAMES,
        Gender::Female => FEMALE_NAMES,
    };
    let name = names[roller.below(names.len())].to_string();

    let mut inventory = Inventory::default();
    for id in &template.equipment {
        let item_template = templates.item(id).ok_or_else(|| ConfigError::UnknownItem {
            owner: template.kind.name().to_string(),
            item: id.clone(),
        })?;
        let index = inventory
            .add(Item::new(item_template))
            .map_err(|_| ConfigError::MissingWeapon(template.kind.name().to_string()))?;
        inventory
            .equip(index, templates)
            .map_err(|_| ConfigError::NotEquippable {
                owner: template.kind.name().to_string(),
                item: id.clone(),
            })?;
    }
    for id in &template.inventory {
        if let Some(item_template) = templates.item(id) {
            // A full inventory just means the NPC carries less loot
            let _ = inventory.add(Item::new(item_template));
        }
    }

    let mut state = EntityState::new(template.health, template.cash, 0, template.skill_acc);
    let mut data = NpcData::new(region.to_string(), template.cash, template.reputation);
    data.gender = gender;
    state.npc = Some(data);

    Ok(Entity::new(name, Role::Npc(template.kind), None, state, inventory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::skills::ScriptedRoller;
    use crate::entities::EquipSlot;
    use swi_shared::NpcKind;

    #[test]
    fn equipment_is_equipped_at_spawn() {
        let templates = Templates::builtin().unwrap();
        let roller = ScriptedRoller::always(0.0);
        let template = templates.npc(NpcKind::StreetGangMember).unwrap();
        let npc = build_npc(&templates, template, "BJ", &roller).unwrap();

        let inv = npc.inventory();
        assert_eq!(inv.equipped(EquipSlot::Gun).unwrap().template, "mac-10");
        assert_eq!(inv.equipped(EquipSlot::Ammo).unwrap().template, "sdammo");
        assert_eq!(inv.equipped(EquipSlot::Armor).unwrap().template, "ii_armor");
        assert_eq!(inv.count(), 3 + 6);
    }

    #[test]
    fn dealer_is_always_male() {
        let templates = Templates::builtin().unwrap();
        let roller = ScriptedRoller::always(1.0);
        let template = templates.npc(NpcKind::DrugDealer).unwrap();
        let npc = build_npc(&templates, template, "BJ", &roller).unwrap();
        assert!(MALE_NAMES.contains(&npc.name.as_str()));
        assert_eq!(npc.lock().npc.as_ref().unwrap().gender, Gender::Male);
    }

    #[test]
    fn gun_without_ammo_is_refused() {
        let templates = Templates::builtin().unwrap();
        let roller = ScriptedRoller::always(0.0);
        let mut template = templates.npc(NpcKind::PoliceOfficer).unwrap().clone();
        template.equipment.retain(|id| id != "sdammo");
        assert!(build_npc(&templates, &template, "BJ", &roller).is_err());
    }
}
