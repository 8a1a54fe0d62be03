//! Live item instances.
//!
//! Items are deliberately not `Clone`: an instance is moved between
//! inventories, the ground and shops, so it can never be duplicated.

use uuid::Uuid;

use swi_shared::{ItemFrame, ItemTemplate, ItemType};

use crate::templates::Templates;

/// An item instance
#[derive(Debug, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub template: String,
    /// Wear, 0..=1
    pub condition: f32,
    /// Units left in the stack (rounds for ammo)
    pub amount: i32,
}

impl Item {
    /// A fresh item in perfect condition
    pub fn new(template: &ItemTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            template: template.id.clone(),
            condition: 1.0,
            amount: template.amount as i32,
        }
    }

    pub fn with_condition(mut self, condition: f32) -> Self {
        self.condition = condition.clamp(0.0, 1.0);
        self
    }

    /// Restores a persisted item
    pub fn restore(id: Uuid, template: String, condition: f32, amount: i32) -> Self {
        Self {
            id,
            template,
            condition,
            amount,
        }
    }

    /// Short id shown to players: the first block of the uuid
    pub fn short_id(&self) -> String {
        short_id(&self.id)
    }

    /// Whether `input` names this item: full uuid or its short form
    pub fn matches_id(&self, input: &str) -> bool {
        let input = input.to_lowercase();
        self.id.to_string() == input || self.short_id() == input
    }

    pub fn degrade(&mut self, by: f32) {
        self.condition = (self.condition - by).max(0.0);
    }

    /// Market value before any shop or regional modifier
    pub fn price(&self, template: &ItemTemplate) -> u32 {
        if template.item_type == ItemType::Drug {
            return (template.base_price as f32 * self.condition).floor() as u32;
        }
        let per_unit = template.base_price as f64 / template.amount.max(1) as f64;
        (per_unit * self.amount.max(0) as f64).floor() as u32
    }

    pub fn frame(&self, templates: &Templates, equipped: bool) -> ItemFrame {
        let template = templates.item(&self.template);
        ItemFrame {
            id: self.short_id(),
            template: self.template.clone(),
            name: template.map(|t| t.name.clone()).unwrap_or_else(|| self.template.clone()),
            item_type: template.map(|t| t.item_type).unwrap_or(ItemType::Mystery),
            condition: self.condition,
            amount: self.amount,
            price: template.map(|t| self.price(t)).unwrap_or(0),
            equipped,
        }
    }

    /// Human readable description for `/info`
    pub fn describe(&self, template: &ItemTemplate) -> Vec<String> {
        let mut lines = vec![
            format!("{} [{}]", template.name, self.short_id()),
            template.description.clone(),
            format!("Type: {}, worth about ${}", template.item_type.name(), self.price(template)),
        ];

        match template.item_type {
            ItemType::Gun => {
                lines.push(format!("Condition: {}", condition_label(self.condition)));
                lines.push(format!("Damage: {}", template.damage));
                lines.push(format!("Jam risk: {:.0}%", (1.0 - self.condition) * 100.0));
            }
            ItemType::Melee => {
                lines.push(format!("Condition: {}", condition_label(self.condition)));
                lines.push(format!("Damage: {}", template.damage));
            }
            ItemType::Armor => {
                lines.push(format!("Condition: {}", condition_label(self.condition)));
                if template.armor_guns > 0 {
                    lines.push(format!("Reduces gun damage by {}", template.armor_guns));
                }
                if template.armor_melee > 0 {
                    lines.push(format!("Reduces melee damage by {}", template.armor_melee));
                }
            }
            ItemType::Ammo => {
                lines.push(format!("Bonus damage: {}", template.damage));
                lines.push(format!("Rounds left: {}", self.amount));
            }
            ItemType::Drug => {
                lines.push(format!("Quality: {}", condition_label(self.condition)));
            }
            _ => {}
        }
        lines
    }
}

pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn condition_label(condition: f32) -> &'static str {
    match condition {
        c if c >= 0.9 => "Pristine",
        c if c >= 0.7 => "Good",
        c if c >= 0.4 => "Worn",
        c if c >= 0.15 => "Poor",
        _ => "Falling apart",
    }
}
