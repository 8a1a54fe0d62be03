//! Money and goods: the drug trade with NPC merchants, shops, the bank and
//! the paid services of other buildings.
//!
//! Operations validate before they mutate. A refusal comes back as a
//! [`GameError`] with nothing changed; success returns the line shown to
//! the requester.

pub mod bank;
pub mod services;
pub mod shop;
pub mod trade;

use std::sync::Arc;

use swi_shared::settings::{DRUG_PROFIT_MARGIN, ITEM_SELL_PRICE_LOSS};
use swi_shared::BuildingType;

use crate::entities::Entity;
use crate::error::GameError;
use crate::world::building::Building;
use crate::world::place::PlaceHandle;

/// Whole dollars, never less than one
fn to_price(amount: f32) -> u32 {
    (amount.round() as u32).max(1)
}

/// What a dealer asks for a drug worth `price`
pub fn dealer_price(price: u32, demand: f32) -> u32 {
    to_price(price as f32 * demand)
}

/// What an addict pays for a drug worth `price`
pub fn addict_price(price: u32, demand: f32) -> u32 {
    to_price(price as f32 * DRUG_PROFIT_MARGIN * demand)
}

/// What a shop pays for an item worth `price`
pub fn buyback_price(price: u32) -> u32 {
    to_price(price as f32 * ITEM_SELL_PRICE_LOSS)
}

/// The requester's Place and its building of `building_type`
pub fn building_here(
    entity: &Entity,
    building_type: BuildingType,
) -> Result<(PlaceHandle, Arc<Building>), GameError> {
    let place = entity.location().ok_or(GameError::InTransit)?;
    let building = place
        .building(building_type)
        .cloned()
        .ok_or(GameError::NoSuchBuilding(building_type.name()))?;
    Ok((place, building))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_and_sell_prices_differ_by_the_margin() {
        assert_eq!(dealer_price(100, 1.0), 100);
        assert_eq!(addict_price(100, 1.0), 120);
        assert_eq!(dealer_price(100, 0.5), 50);
        assert_eq!(addict_price(100, 1.5), 180);
    }

    #[test]
    fn prices_never_drop_below_one() {
        assert_eq!(dealer_price(10, 0.01), 1);
        assert_eq!(addict_price(0, 2.0), 1);
        assert_eq!(buyback_price(1), 1);
    }

    #[test]
    fn shops_pay_sixty_five_percent() {
        assert_eq!(buyback_price(300), 195);
        assert_eq!(buyback_price(1000), 650);
    }
}
