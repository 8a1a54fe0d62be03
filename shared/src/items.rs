//! Item templates shared between client and server.
//!
//! Templates are immutable configuration. Live item instances only carry a
//! template id plus their own condition and amount.

use serde::{Deserialize, Serialize};

use crate::ranks::rank_rep;

/// Item types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ItemType {
    Trash = 0,
    Gun = 1,
    Melee = 2,
    Armor = 3,
    Ammo = 4,
    SmartPhone = 5,
    Drug = 6,
    Mystery = 7,
}

impl ItemType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Trash),
            1 => Some(Self::Gun),
            2 => Some(Self::Melee),
            3 => Some(Self::Armor),
            4 => Some(Self::Ammo),
            5 => Some(Self::SmartPhone),
            6 => Some(Self::Drug),
            7 => Some(Self::Mystery),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Trash => "Trash",
            Self::Gun => "Gun",
            Self::Melee => "Melee",
            Self::Armor => "Armor",
            Self::Ammo => "Ammo",
            Self::SmartPhone => "Smart Phone",
            Self::Drug => "Drug",
            Self::Mystery => "Mystery",
        }
    }
}

/// What happens when an item is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UseEffect {
    /// Costs health, gives reputation, consumes one unit
    UseDrug,
    /// Pays the informant for the whereabouts of dealers and addicts
    SmartPhone,
}

/// Item template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub item_type: ItemType,
    pub base_price: u32,
    pub max_price: u32,
    pub min_rep: i64,
    pub damage: u32,
    /// Units in a freshly created stack (rounds for ammo)
    pub amount: u32,
    pub ammo_wear: f32,
    pub armor_guns: u32,
    pub armor_melee: u32,
    pub use_effect: Option<UseEffect>,
}

impl ItemTemplate {
    fn new(id: &str, name: &str, description: &str, item_type: ItemType, base_price: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            item_type,
            base_price,
            max_price: base_price,
            min_rep: 0,
            damage: 0,
            amount: 1,
            ammo_wear: 0.0,
            armor_guns: 0,
            armor_melee: 0,
            use_effect: None,
        }
    }

    fn drug(id: &str, name: &str, description: &str, base_price: u32, max_price: u32) -> Self {
        let mut t = Self::new(id, name, description, ItemType::Drug, base_price);
        t.max_price = max_price;
        t.use_effect = Some(UseEffect::UseDrug);
        t
    }

    fn damage(mut self, damage: u32) -> Self {
        self.damage = damage;
        self
    }

    fn rank(mut self, rank_index: usize) -> Self {
        self.min_rep = rank_rep(rank_index);
        self
    }

    fn guns(mut self, reduction: u32) -> Self {
        self.armor_guns = reduction;
        self
    }

    fn melee(mut self, reduction: u32) -> Self {
        self.armor_melee = reduction;
        self
    }

    fn rounds(mut self, amount: u32, wear: f32) -> Self {
        self.amount = amount;
        self.ammo_wear = wear;
        self
    }
}

/// Built-in item templates
pub fn get_item_templates() -> Vec<ItemTemplate> {
    use ItemType::*;

    vec![
        // Drugs
        ItemTemplate::drug("crack", "Crack", "1 Gram", 30, 60),
        ItemTemplate::drug("coke", "Cocaine", "1 Gram", 60, 100),
        ItemTemplate::drug("heroine", "Heroin", "1 Gram", 150, 500),
        ItemTemplate::drug("meth", "Meth", "1 Gram", 20, 40),
        ItemTemplate::drug("weed", "Weed", "7 Grams / a quarter ounce", 25, 50),
        ItemTemplate::drug("fentanyl", "Fentanyl", "1 Pill", 25, 50),
        ItemTemplate::drug("pcp", "PCP", "1 tablet", 5, 15),
        ItemTemplate::drug("ketamine", "Ketamine", "A dose", 20, 30),
        // Armor against firearms
        ItemTemplate::new("iia_armor", "Level IIA Body Armor", "Designed to protect against 9mm.", Armor, 300).guns(3).rank(6),
        ItemTemplate::new("ii_armor", "Level II Body Armor", "Provides protection against up to .357 Magnum.", Armor, 700).guns(7).rank(10),
        ItemTemplate::new("iiia_armor", "Level IIIA Body Armor", "Protects against handgun threats, including .44 Magnum.", Armor, 1100).guns(11).rank(14),
        ItemTemplate::new("iii_armor", "Level III Body Armor", "Protects against rifle threats, including 7.62x51mm ball.", Armor, 1500).guns(15).rank(18),
        ItemTemplate::new("iv_armor", "Level IV Body Armor", "Protects against armor-piercing rifle rounds.", Armor, 1900).guns(19).rank(22),
        // Guns
        ItemTemplate::new("beretta92", "Beretta 92", "A widely used semi-automatic pistol in 9mm.", Gun, 300).damage(3).rank(5),
        ItemTemplate::new("glock22", "Glock 22", "A popular law enforcement pistol chambered in .40 S&W.", Gun, 500).damage(5).rank(7),
        ItemTemplate::new("sigp320", "Sig Sauer P220", "Reliable and chambered in 10mm.", Gun, 700).damage(7).rank(9),
        ItemTemplate::new("sw610", "Smith & Wesson Model 610", "A durable stainless steel revolver.", Gun, 900).damage(9).rank(11),
        ItemTemplate::new("1911", "Colt 1911", "One of the most iconic handguns in the world. Chambered in .45 ACP", Gun, 1100).damage(11).rank(13),
        ItemTemplate::new("ragingbull", "Taurus Raging Bull", "A large-framed revolver chambered in .44 Magnum.", Gun, 1300).damage(13).rank(15),
        ItemTemplate::new("ar-15", "AR-15 Rifle", "A modular semi-automatic rifle chambered in 5.56x45mm NATO.", Gun, 1500).damage(15).rank(17),
        ItemTemplate::new("ak47", "AK-47", "A legendary and rugged assault rifle chambered in 7.62x39mm.", Gun, 1700).damage(17).rank(19),
        ItemTemplate::new("scarh", "FN SCAR-H", "A versatile battle rifle chambered in 7.62x51mm NATO.", Gun, 1900).damage(19).rank(21),
        ItemTemplate::new("m82", "Barrett M82", "An anti-materiel rifle chambered in .50 BMG.", Gun, 2100).damage(21).rank(23),
        // Ammo
        ItemTemplate::new("subsonic", "Subsonic Ammo", "Quieter rounds with reduced velocity.", Ammo, 100).damage(1).rounds(15, 0.0025).rank(5),
        ItemTemplate::new("sdammo", "Standard Ammo", "Baseline ball ammunition.", Ammo, 300).damage(3).rounds(15, 0.0040).rank(9),
        ItemTemplate::new("plusp", "+P Ammo", "Loaded with higher powder charges than standard loads.", Ammo, 500).damage(5).rounds(15, 0.0055).rank(13),
        ItemTemplate::new("pluspplus", "+P+ Ammo", "Loaded with significantly more powder.", Ammo, 700).damage(7).rounds(15, 0.0070).rank(17),
        ItemTemplate::new("apammo", "AP Ammo", "Armor piercing rounds.", Ammo, 900).damage(9).rounds(15, 0.0085).rank(21),
        // Melee
        ItemTemplate::new("brassknuckle", "Brass Knuckle", "Metal worn around the knuckles.", Melee, 300).damage(3).rank(6),
        ItemTemplate::new("pipewrench", "Pipe Wrench", "Heavy and unforgiving.", Melee, 500).damage(5).rank(8),
        ItemTemplate::new("crowbar", "Crowbar", "Opens doors and skulls alike.", Melee, 700).damage(7).rank(10),
        ItemTemplate::new("switchblade", "Switchblade", "A folding knife with a spring-loaded blade.", Melee, 900).damage(9).rank(12),
        ItemTemplate::new("bbbat", "Baseball Bat", "A solid wooden bat.", Melee, 1100).damage(11).rank(14),
        ItemTemplate::new("fireaxe", "Fire Axe", "Made for doors, works on people.", Melee, 1300).damage(13).rank(16),
        ItemTemplate::new("machete", "Machete", "A long, broad blade.", Melee, 1500).damage(15).rank(18),
        ItemTemplate::new("katana", "Katana", "A curved, single-edged sword.", Melee, 1700).damage(17).rank(20),
        ItemTemplate::new("chainsaw", "Chainsaw", "Loud and messy.", Melee, 1900).damage(19).rank(22),
        // Armor against melee
        ItemTemplate::new("stabvest", "Stab-Resistant Vest", "Protects against knives and blades.", Armor, 400).melee(4).rank(10),
        ItemTemplate::new("chainmail", "Chainmail", "Modern steel or titanium rings.", Armor, 700).melee(7).rank(14),
        ItemTemplate::new("hardarmor", "Hard Plate Armor", "Ceramic or composite plates.", Armor, 1000).melee(10).rank(18),
        // Misc
        {
            let mut phone = ItemTemplate::new(
                "smartphone",
                "Smart Phone",
                "Use to get the location of druggies and dealers, for a small fee to your informant.",
                SmartPhone,
                350,
            );
            phone.use_effect = Some(UseEffect::SmartPhone);
            phone
        },
        // NPC equipment
        ItemTemplate::new("deserteagle", "Desert Eagle", "A semi-automatic handgun chambered in .50 AE.", Gun, 500).damage(15),
        ItemTemplate::new("brokenbottle", "Broken Bottle", "Sharp and jagged edges.", Melee, 50).damage(2),
        ItemTemplate::new("guitar", "Guitar", "A six-stringed instrument.", Melee, 100).damage(4),
        ItemTemplate::new("leadpipe", "Lead Pipe", "A heavy and sturdy tube.", Melee, 100).damage(4),
        ItemTemplate::new("parcel", "Parcel", "A securely wrapped package.", Melee, 50).damage(2),
        ItemTemplate::new("mac-10", "MAC-10", "A compact submachine gun chambered in .45 ACP.", Gun, 400).damage(11),
        ItemTemplate::new("bikelock", "Bike Lock", "An improvised weapon with reach.", Melee, 75).damage(3),
        // Trash
        ItemTemplate::new("goldchain", "Gold Chain", "An accessory made of linked gold segments.", Trash, 300),
        ItemTemplate::new("festivalticket", "Festival Ticket", "A ticket for a music festival.", Trash, 150),
        ItemTemplate::new("sunglasses", "Sun Glasses", "Old, but a decent brand.", Trash, 100),
        ItemTemplate::new("deliverypackage", "\"Amazone\" Package", "Something is inside.", Trash, 100),
        ItemTemplate::new("currentthing", "Current Thing", "Shows you support the \"Current Thing\".", Trash, 100),
        ItemTemplate::new("policebadge", "Police Badge", "Standard police badge.", Trash, 300),
    ]
}
