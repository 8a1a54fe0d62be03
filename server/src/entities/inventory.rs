//! Fixed-capacity inventory with an equipment index.
//!
//! Invariant: every id in `equipped` refers to an item that occupies exactly
//! one slot. All removals go through `take`, which clears the equipment
//! entry in the same call.

use std::collections::HashMap;

use uuid::Uuid;

use swi_shared::settings::PLAYER_MAX_INVENTORY;
use swi_shared::{ItemFrame, ItemType, ServerEvent};

use super::item::Item;
use crate::error::GameError;
use crate::templates::Templates;

/// Equipment categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    Gun,
    Melee,
    Ammo,
    Armor,
}

impl EquipSlot {
    pub fn for_type(item_type: ItemType) -> Option<Self> {
        match item_type {
            ItemType::Gun => Some(Self::Gun),
            ItemType::Melee => Some(Self::Melee),
            ItemType::Ammo => Some(Self::Ammo),
            ItemType::Armor => Some(Self::Armor),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Inventory {
    slots: Vec<Option<Item>>,
    equipped: HashMap<EquipSlot, Uuid>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::with_capacity(PLAYER_MAX_INVENTORY)
    }
}

impl Inventory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            equipped: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.is_some())
    }

    /// Puts an item in the first free slot. A full inventory hands the item back.
    pub fn add(&mut self, item: Item) -> Result<usize, Item> {
        match self.slots.iter().position(|s| s.is_none()) {
            Some(index) => {
                self.slots[index] = Some(item);
                Ok(index)
            }
            None => Err(item),
        }
    }

    /// Places an item into a specific empty slot
    pub fn put(&mut self, index: usize, item: Item) -> Result<(), Item> {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(item);
                Ok(())
            }
            _ => Err(item),
        }
    }

    /// Removes the item in `index`, unequipping it first if needed
    pub fn take(&mut self, index: usize) -> Option<Item> {
        let item = self.slots.get_mut(index)?.take()?;
        self.equipped.retain(|_, id| *id != item.id);
        Some(item)
    }

    /// Empties the whole inventory
    pub fn drain(&mut self) -> Vec<Item> {
        self.equipped.clear();
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Item> {
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn index_of(&self, id: &Uuid) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map(|i| &i.id) == Some(id))
    }

    /// Finds an item by its full or short id
    pub fn find(&self, input: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|i| i.matches_id(input)))
    }

    pub fn items(&self) -> impl Iterator<Item = (usize, &Item)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|item| (i, item)))
    }

    pub fn occupied_slots(&self) -> Vec<usize> {
        self.items().map(|(i, _)| i).collect()
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.items().any(|(_, i)| i.template == template)
    }

    // =========================================================================
    // Equipment
    // =========================================================================

    /// Equips the item in `index`, replacing whatever held that category
    pub fn equip(&mut self, index: usize, templates: &Templates) -> Result<EquipSlot, GameError> {
        let item = self.get(index).ok_or(GameError::NoSuchItem)?;
        let category = templates
            .item(&item.template)
            .and_then(|t| EquipSlot::for_type(t.item_type))
            .ok_or_else(|| GameError::rejected("You can't equip that."))?;
        let id = item.id;
        self.equipped.insert(category, id);
        Ok(category)
    }

    pub fn unequip(&mut self, index: usize) -> Result<(), GameError> {
        let id = self.get(index).ok_or(GameError::NoSuchItem)?.id;
        let before = self.equipped.len();
        self.equipped.retain(|_, equipped| *equipped != id);
        if self.equipped.len() == before {
            return Err(GameError::rejected("That item is not equipped."));
        }
        Ok(())
    }

    pub fn is_equipped(&self, id: &Uuid) -> bool {
        self.equipped.values().any(|e| e == id)
    }

    pub fn equipped_index(&self, category: EquipSlot) -> Option<usize> {
        self.index_of(self.equipped.get(&category)?)
    }

    pub fn equipped(&self, category: EquipSlot) -> Option<&Item> {
        self.get(self.equipped_index(category)?)
    }

    pub fn equipped_mut(&mut self, category: EquipSlot) -> Option<&mut Item> {
        let index = self.equipped_index(category)?;
        self.get_mut(index)
    }

    // =========================================================================
    // Frames
    // =========================================================================

    pub fn frames(&self, templates: &Templates) -> Vec<Option<ItemFrame>> {
        self.slots
            .iter()
            .map(|s| s.as_ref().map(|i| i.frame(templates, self.is_equipped(&i.id))))
            .collect()
    }

    pub fn snapshot(&self, templates: &Templates) -> ServerEvent {
        ServerEvent::InventorySnapshot {
            slots: self.frames(templates),
        }
    }

    /// Checks the equipment invariant. Used by tests.
    #[cfg(test)]
    pub fn equipment_consistent(&self) -> bool {
        self.equipped
            .values()
            .all(|id| self.slots.iter().flatten().filter(|i| &i.id == id).count() == 1)
    }
}
