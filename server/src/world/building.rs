//! Buildings attached to Places, with their live shop state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use swi_shared::{BuildingFrame, BuildingTemplate, BuildingType, ItemType};

use crate::templates::Templates;

static NEXT_BUILDING_ID: AtomicU64 = AtomicU64::new(1);

/// One line of a shop's stock
#[derive(Debug, Clone, PartialEq)]
pub struct StockLine {
    pub template: String,
    /// -1 for unlimited
    pub quantity: i32,
}

/// Mutable shop inventory and buy quotas
#[derive(Debug, Clone, Default)]
pub struct ShopState {
    pub stock: Vec<StockLine>,
    /// Quota per item type the shop buys, -1 for unlimited
    pub buys: HashMap<ItemType, i32>,
}

#[derive(Debug)]
pub struct Building {
    pub id: u64,
    pub building_type: BuildingType,
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
    pub shop: Option<Mutex<ShopState>>,
}

impl Building {
    pub fn from_template(template: &BuildingTemplate, templates: &Templates) -> Self {
        let shop = template.shop.as_ref().map(|shop| {
            Mutex::new(ShopState {
                stock: shop
                    .stock
                    .iter()
                    .filter(|(id, _)| templates.item(id).is_some())
                    .map(|(id, quantity)| StockLine {
                        template: id.clone(),
                        quantity: *quantity,
                    })
                    .collect(),
                buys: shop.buys.iter().copied().collect(),
            })
        });

        Self {
            id: NEXT_BUILDING_ID.fetch_add(1, Ordering::Relaxed),
            building_type: template.building_type,
            name: template.name.clone(),
            description: template.description.clone(),
            commands: template.commands.clone(),
            shop,
        }
    }

    pub fn frame(&self) -> BuildingFrame {
        BuildingFrame {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            commands: self.commands.clone(),
        }
    }
}
