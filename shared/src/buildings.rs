//! Building templates. Buildings are attached to fixed Places of a city.

use serde::{Deserialize, Serialize};

use crate::items::ItemType;

/// Building types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuildingType {
    Airport = 1,
    Hospital = 2,
    Bank = 3,
    Bar = 4,
    Arms = 5,
    PawnShop = 6,
}

impl BuildingType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Airport),
            2 => Some(Self::Hospital),
            3 => Some(Self::Bank),
            4 => Some(Self::Bar),
            5 => Some(Self::Arms),
            6 => Some(Self::PawnShop),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Airport => "Airport",
            Self::Hospital => "Hospital",
            Self::Bank => "Bank",
            Self::Bar => "Bar",
            Self::Arms => "Arms Dealer",
            Self::PawnShop => "Pawn Shop",
        }
    }
}

/// Unlimited stock or buy quota
pub const UNLIMITED: i32 = -1;

/// What a shop sells and what it is willing to buy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopTemplate {
    /// (item template id, quantity)
    pub stock: Vec<(String, i32)>,
    /// (item type, quota)
    pub buys: Vec<(ItemType, i32)>,
}

/// Building template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingTemplate {
    pub building_type: BuildingType,
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
    pub shop: Option<ShopTemplate>,
}

impl BuildingTemplate {
    fn new(building_type: BuildingType, name: &str, description: &str, commands: &[&str]) -> Self {
        Self {
            building_type,
            name: name.into(),
            description: description.into(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            shop: None,
        }
    }
}

fn unlimited(ids: &[&str]) -> Vec<(String, i32)> {
    ids.iter().map(|id| (id.to_string(), UNLIMITED)).collect()
}

/// Built-in building templates
pub fn get_building_templates() -> Vec<BuildingTemplate> {
    use BuildingType::*;

    let mut arms = BuildingTemplate::new(Arms, "Arms Dealer", "Guns, blades and protection.", &["/shop"]);
    arms.shop = Some(ShopTemplate {
        stock: unlimited(&[
            "iia_armor", "ii_armor", "iiia_armor", "iii_armor", "iv_armor",
            "stabvest", "chainmail", "hardarmor",
            "subsonic", "sdammo", "plusp", "pluspplus", "apammo",
            "beretta92", "glock22", "sigp320", "sw610", "1911", "ragingbull", "ar-15", "ak47", "scarh", "m82",
            "brassknuckle", "pipewrench", "crowbar", "switchblade", "bbbat", "fireaxe", "machete", "katana", "chainsaw",
        ]),
        buys: vec![
            (ItemType::Gun, UNLIMITED),
            (ItemType::Ammo, UNLIMITED),
            (ItemType::Armor, UNLIMITED),
            (ItemType::Melee, UNLIMITED),
            (ItemType::SmartPhone, UNLIMITED),
        ],
    });

    let mut pawn = BuildingTemplate::new(PawnShop, "Pawn Shop", "Buys almost anything, sells phones.", &["/shop"]);
    pawn.shop = Some(ShopTemplate {
        stock: unlimited(&["smartphone"]),
        buys: vec![
            (ItemType::Melee, UNLIMITED),
            (ItemType::SmartPhone, UNLIMITED),
            (ItemType::Trash, UNLIMITED),
        ],
    });

    vec![
        BuildingTemplate::new(Airport, "International Airport", "Flights to every city.", &["/travel"]),
        BuildingTemplate::new(Hospital, "Private Hospital", "Patches you up for a price.", &["/heal"]),
        BuildingTemplate::new(Bank, "City Bank", "Keeps your money off the street.", &["/withdraw", "/deposit", "/transfer"]),
        BuildingTemplate::new(Bar, "Old Speakeasy", "Drinks buy respect.", &["/drink"]),
        arms,
        pawn,
    ]
}
