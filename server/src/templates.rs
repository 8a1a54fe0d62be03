//! Immutable template tables, validated once at startup.

use std::collections::HashMap;

use swi_shared::{
    get_building_templates, get_city_templates, get_item_templates, get_npc_templates,
    BuildingTemplate, BuildingType, CityTemplate, ItemTemplate, ItemType, NpcKind, NpcTemplate,
};

use crate::error::ConfigError;

/// All static content. Shared by `Arc`, never mutated after construction.
#[derive(Debug)]
pub struct Templates {
    items: HashMap<String, ItemTemplate>,
    npcs: HashMap<NpcKind, NpcTemplate>,
    cities: Vec<CityTemplate>,
    buildings: HashMap<BuildingType, BuildingTemplate>,
    /// Drug template ids, sorted so random picks are reproducible under a scripted roller
    drugs: Vec<String>,
}

impl Templates {
    /// The built-in tables
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(
            get_item_templates(),
            get_npc_templates(),
            get_city_templates(),
            get_building_templates(),
        )
    }

    pub fn new(
        items: Vec<ItemTemplate>,
        npcs: Vec<NpcTemplate>,
        cities: Vec<CityTemplate>,
        buildings: Vec<BuildingTemplate>,
    ) -> Result<Self, ConfigError> {
        let items: HashMap<String, ItemTemplate> =
            items.into_iter().map(|t| (t.id.clone(), t)).collect();
        let mut drugs: Vec<String> = items
            .values()
            .filter(|t| t.item_type == ItemType::Drug)
            .map(|t| t.id.clone())
            .collect();
        drugs.sort();

        let templates = Self {
            items,
            npcs: npcs.into_iter().map(|t| (t.kind, t)).collect(),
            cities,
            buildings: buildings.into_iter().map(|t| (t.building_type, t)).collect(),
            drugs,
        };
        templates.validate()?;
        Ok(templates)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cities.is_empty() {
            return Err(ConfigError::NoCities);
        }
        for npc in self.npcs.values() {
            self.validate_npc(npc)?;
        }
        for city in &self.cities {
            for (building, label) in [(BuildingType::Hospital, "hospital"), (BuildingType::Airport, "airport")] {
                if !city.buildings.iter().any(|b| b.building == building) {
                    return Err(ConfigError::MissingBuilding {
                        city: city.name.clone(),
                        building: label,
                    });
                }
            }
            for (kind, _) in &city.npc_spawns {
                if !self.npcs.contains_key(kind) {
                    return Err(ConfigError::UnknownNpc(kind.name().to_string()));
                }
            }
        }
        for building in self.buildings.values() {
            if let Some(shop) = &building.shop {
                for (item, _) in &shop.stock {
                    if !self.items.contains_key(item) {
                        return Err(ConfigError::UnknownItem {
                            owner: building.name.clone(),
                            item: item.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks that an NPC can carry out the attack its equipment implies
    pub fn validate_npc(&self, npc: &NpcTemplate) -> Result<(), ConfigError> {
        let owner = npc.kind.name().to_string();
        let mut has_gun = false;
        let mut has_ammo = false;

        for id in &npc.equipment {
            let item = self.items.get(id).ok_or_else(|| ConfigError::UnknownItem {
                owner: owner.clone(),
                item: id.clone(),
            })?;
            match item.item_type {
                ItemType::Gun => has_gun = true,
                ItemType::Ammo => has_ammo = true,
                ItemType::Melee | ItemType::Armor => {}
                _ => {
                    return Err(ConfigError::NotEquippable {
                        owner,
                        item: id.clone(),
                    })
                }
            }
        }
        for id in &npc.inventory {
            if !self.items.contains_key(id) {
                return Err(ConfigError::UnknownItem {
                    owner,
                    item: id.clone(),
                });
            }
        }

        if has_gun && !has_ammo {
            return Err(ConfigError::MissingAmmo(owner));
        }
        if has_ammo && !has_gun {
            return Err(ConfigError::MissingWeapon(owner));
        }
        Ok(())
    }

    pub fn item(&self, id: &str) -> Option<&ItemTemplate> {
        self.items.get(id)
    }

    pub fn npc(&self, kind: NpcKind) -> Result<&NpcTemplate, ConfigError> {
        self.npcs
            .get(&kind)
            .ok_or_else(|| ConfigError::UnknownNpc(kind.name().to_string()))
    }

    pub fn cities(&self) -> &[CityTemplate] {
        &self.cities
    }

    pub fn building(&self, building_type: BuildingType) -> Option<&BuildingTemplate> {
        self.buildings.get(&building_type)
    }

    pub fn drugs(&self) -> &[String] {
        &self.drugs
    }

    /// Display name of an item template, falling back to its id
    pub fn item_name(&self, id: &str) -> String {
        self.items
            .get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}
