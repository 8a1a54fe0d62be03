//! City templates: grid size, travel cost bounds, building placement and NPC spawn counts.

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingType;
use crate::npcs::NpcKind;

// =============================================================================
// Grid
// =============================================================================

/// Compass direction of a single step on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::North, Self::South, Self::East, Self::West];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Parses the movement keywords accepted on the command line
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "north" | "up" | "w" | "n" => Some(Self::North),
            "south" | "down" | "s" => Some(Self::South),
            "east" | "right" | "d" | "e" => Some(Self::East),
            "west" | "left" | "a" => Some(Self::West),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
        }
    }
}

/// A grid coordinate inside one city
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub north: u32,
    pub east: u32,
}

impl Coordinates {
    pub const fn new(north: u32, east: u32) -> Self {
        Self { north, east }
    }

    /// One step in `direction`, or `None` when it leaves `0..=height` x `0..=width`
    pub fn step(&self, direction: Direction, height: u32, width: u32) -> Option<Coordinates> {
        let (north, east) = match direction {
            Direction::North => (self.north.checked_add(1)?, self.east),
            Direction::South => (self.north.checked_sub(1)?, self.east),
            Direction::East => (self.north, self.east.checked_add(1)?),
            Direction::West => (self.north, self.east.checked_sub(1)?),
        };
        if north > height || east > width {
            return None;
        }
        Some(Coordinates { north, east })
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "N{}-E{}", self.north, self.east)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// A building placed on a grid coordinate
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuildingLocation {
    pub building: BuildingType,
    pub coords: Coordinates,
}

/// City template. Coordinates run from 0 to `height` north and 0 to `width` east, inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityTemplate {
    pub name: String,
    pub code: String,
    pub width: u32,
    pub height: u32,
    pub travel_cost_min: u32,
    pub travel_cost_max: u32,
    pub buildings: Vec<BuildingLocation>,
    pub npc_spawns: Vec<(NpcKind, u32)>,
}

/// Spawn counts used by every built-in city
fn default_spawns() -> Vec<(NpcKind, u32)> {
    use NpcKind::*;
    vec![
        (DrugDealer, 2),
        (DrugAddict, 2),
        (Homeless, 6),
        (Tweaker, 2),
        (Bouncer, 2),
        (Busker, 3),
        (StreetVendor, 4),
        (StreetGangMember, 2),
        (Tourist, 5),
        (Activist, 5),
        (PoliceOfficer, 3),
        (BeatCop, 2),
        (DeliveryDriver, 4),
    ]
}

/// Builds a 30x30 city. Building coordinates are (north, east) in the order
/// pawn shop, airport, hospital, arms dealer, bank, bar.
fn city(name: &str, code: &str, travel: (u32, u32), coords: [(u32, u32); 6]) -> CityTemplate {
    use BuildingType::*;
    let kinds = [PawnShop, Airport, Hospital, Arms, Bank, Bar];
    CityTemplate {
        name: name.into(),
        code: code.into(),
        width: 30,
        height: 30,
        travel_cost_min: travel.0,
        travel_cost_max: travel.1,
        buildings: kinds
            .iter()
            .zip(coords)
            .map(|(&building, (north, east))| BuildingLocation {
                building,
                coords: Coordinates::new(north, east),
            })
            .collect(),
        npc_spawns: default_spawns(),
    }
}

/// Built-in city templates
pub fn get_city_templates() -> Vec<CityTemplate> {
    vec![
        city("Beijing", "BJ", (800, 1200), [(29, 20), (12, 4), (29, 21), (6, 17), (25, 10), (8, 30)]),
        city("Tokyo", "TY", (800, 1200), [(28, 4), (12, 27), (18, 8), (24, 5), (6, 15), (9, 22)]),
        city("Moscow", "MC", (240, 600), [(3, 29), (16, 11), (5, 19), (23, 1), (7, 21), (28, 15)]),
        city("London", "LD", (600, 900), [(1, 24), (23, 17), (10, 6), (29, 14), (7, 29), (25, 19)]),
        city("Berlin", "BL", (200, 400), [(14, 26), (23, 10), (12, 26), (5, 19), (30, 7), (8, 29)]),
        city("Paris", "PA", (400, 900), [(19, 12), (8, 27), (16, 10), (30, 15), (4, 3), (19, 22)]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buildings_lie_inside_the_grid() {
        for city in get_city_templates() {
            assert_eq!(city.buildings.len(), 6);
            for b in &city.buildings {
                assert!(
                    b.coords.north <= city.height && b.coords.east <= city.width,
                    "{} {:?}",
                    city.code,
                    b
                );
            }
        }
    }

    #[test]
    fn steps_stay_inside_inclusive_bounds() {
        let corner = Coordinates::new(30, 0);
        assert_eq!(corner.step(Direction::North, 30, 30), None);
        assert_eq!(corner.step(Direction::West, 30, 30), None);
        assert_eq!(corner.step(Direction::South, 30, 30), Some(Coordinates::new(29, 0)));
        assert_eq!(corner.step(Direction::East, 30, 30), Some(Coordinates::new(30, 1)));
    }

    #[test]
    fn every_city_has_a_hospital_and_airport() {
        for city in get_city_templates() {
            assert!(city.buildings.iter().any(|b| b.building == BuildingType::Hospital));
            assert!(city.buildings.iter().any(|b| b.building == BuildingType::Airport));
        }
    }
}
