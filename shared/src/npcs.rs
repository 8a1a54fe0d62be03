//! Non-player character templates.

use serde::{Deserialize, Serialize};

/// NPC kinds. Merchants (dealers and addicts) are restocked by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NpcKind {
    DrugDealer = 0,
    DrugAddict = 1,
    Homeless = 2,
    Tweaker = 3,
    Bouncer = 4,
    Busker = 5,
    StreetVendor = 6,
    StreetGangMember = 7,
    Tourist = 8,
    Activist = 9,
    PoliceOfficer = 10,
    BeatCop = 11,
    DeliveryDriver = 12,
}

impl NpcKind {
    pub const ALL: [NpcKind; 13] = [
        Self::DrugDealer,
        Self::DrugAddict,
        Self::Homeless,
        Self::Tweaker,
        Self::Bouncer,
        Self::Busker,
        Self::StreetVendor,
        Self::StreetGangMember,
        Self::Tourist,
        Self::Activist,
        Self::PoliceOfficer,
        Self::BeatCop,
        Self::DeliveryDriver,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DrugDealer => "Drug Dealer",
            Self::DrugAddict => "Drug Addict",
            Self::Homeless => "Homeless",
            Self::Tweaker => "Tweaker",
            Self::Bouncer => "Bouncer",
            Self::Busker => "Busker",
            Self::StreetVendor => "Street Vendor",
            Self::StreetGangMember => "Street Gang Member",
            Self::Tourist => "Tourist",
            Self::Activist => "Activist",
            Self::PoliceOfficer => "Police Officer",
            Self::BeatCop => "Beat Cop",
            Self::DeliveryDriver => "Delivery Driver",
        }
    }
}

/// Gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Gender {
    Male = 0,
    Female = 1,
}

impl Gender {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Male),
            1 => Some(Self::Female),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// NPC template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcTemplate {
    pub kind: NpcKind,
    pub health: i32,
    pub cash: u32,
    /// Reputation granted to whoever kills this NPC
    pub reputation: i64,
    pub skill_acc: f32,
    /// Fixed gender, or `None` to pick one at spawn
    pub gender: Option<Gender>,
    /// Item template ids equipped at spawn
    pub equipment: Vec<String>,
    /// Item template ids carried at spawn
    pub inventory: Vec<String>,
}

impl NpcTemplate {
    fn new(kind: NpcKind, health: i32, cash: u32, reputation: i64, skill_acc: f32) -> Self {
        Self {
            kind,
            health,
            cash,
            reputation,
            skill_acc,
            gender: None,
            equipment: Vec::new(),
            inventory: Vec::new(),
        }
    }

    fn equip(mut self, items: &[&str]) -> Self {
        self.equipment = items.iter().map(|s| s.to_string()).collect();
        self
    }

    fn carry(mut self, items: &[&str]) -> Self {
        self.inventory = items.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Built-in NPC templates
pub fn get_npc_templates() -> Vec<NpcTemplate> {
    use NpcKind::*;

    let mut dealer = NpcTemplate::new(DrugDealer, 500, 1000, -1750, 75.0)
        .equip(&["iiia_armor", "deserteagle", "plusp"]);
    dealer.gender = Some(Gender::Male);

    vec![
        dealer,
        NpcTemplate::new(DrugAddict, 300, 500, -1750, 75.0).equip(&["iiia_armor", "ragingbull", "plusp"]),
        NpcTemplate::new(Homeless, 80, 12, 25, 15.0).equip(&["brokenbottle"]).carry(&["crack", "ketamine"]),
        NpcTemplate::new(Tweaker, 100, 25, 140, 35.0).equip(&["crowbar"]).carry(&["meth", "meth"]),
        NpcTemplate::new(Bouncer, 110, 200, 272, 45.0).equip(&["bbbat", "stabvest"]).carry(&["coke", "goldchain"]),
        NpcTemplate::new(Busker, 100, 70, 70, 35.0).equip(&["guitar"]).carry(&["festivalticket", "weed"]),
        NpcTemplate::new(StreetVendor, 140, 80, 70, 40.0).equip(&["leadpipe"]).carry(&["sunglasses"]),
        NpcTemplate::new(DeliveryDriver, 100, 10, 80, 40.0).equip(&["parcel"]).carry(&["deliverypackage", "smartphone"]),
        NpcTemplate::new(Tourist, 65, 10, 33, 25.0).carry(&["smartphone", "sunglasses"]),
        NpcTemplate::new(StreetGangMember, 150, 400, 412, 50.0)
            .equip(&["mac-10", "sdammo", "ii_armor"])
            .carry(&["sdammo", "sdammo", "sdammo", "coke", "coke", "weed"]),
        NpcTemplate::new(Activist, 40, 20, 20, 10.0).equip(&["bikelock"]).carry(&["currentthing", "weed"]),
        NpcTemplate::new(BeatCop, 100, 30, 200, 50.0)
            .equip(&["glock22", "sdammo", "iia_armor"])
            .carry(&["policebadge", "sdammo", "sdammo"]),
        NpcTemplate::new(PoliceOfficer, 130, 30, 546, 60.0)
            .equip(&["1911", "sdammo", "ii_armor"])
            .carry(&["policebadge", "sdammo", "sdammo"]),
    ]
}

pub const MALE_NAMES: &[&str] = &[
    "Liam", "Noah", "Oliver", "James", "Elijah", "William", "Henry", "Lucas", "Benjamin", "Theodore",
    "Mateo", "Levi", "Sebastian", "Daniel", "Jack", "Michael", "Alexander", "Owen", "Asher", "Samuel",
    "Ethan", "Leo", "Jackson", "Mason", "Ezra", "John", "Hudson", "Luca", "Aiden", "Joseph",
    "David", "Jacob", "Logan", "Luke", "Julian", "Gabriel", "Grayson", "Wyatt", "Matthew", "Maverick",
];

pub const FEMALE_NAMES: &[&str] = &[
    "Olivia", "Emma", "Charlotte", "Amelia", "Sophia", "Isabella", "Ava", "Mia", "Evelyn", "Luna",
    "Harper", "Camila", "Sofia", "Scarlett", "Elizabeth", "Eleanor", "Emily", "Chloe", "Mila", "Violet",
    "Penelope", "Gianna", "Aria", "Abigail", "Ella", "Avery", "Hazel", "Nora", "Layla", "Lily",
    "Aurora", "Nova", "Ellie", "Madison", "Grace", "Isla", "Willow", "Zoe", "Riley", "Stella",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_template() {
        let templates = get_npc_templates();
        for kind in NpcKind::ALL {
            assert!(templates.iter().any(|t| t.kind == kind), "missing {:?}", kind);
        }
    }

    #[test]
    fn kind_round_trips_through_u8() {
        for kind in NpcKind::ALL {
            assert_eq!(NpcKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(NpcKind::from_u8(13), None);
    }
}
