//! Player-only state and the conversions to and from persisted records.

use std::sync::Arc;

use log::warn;

use swi_shared::{rank_for, rep_to_next_rank, ServerEvent, StatsFrame};

use super::{Entity, EntityState, Inventory, Item, Role};
use crate::combat::AttackKind;
use crate::persistence::{CharacterState, Gang, Location, SavedItem};
use crate::session::Session;
use crate::templates::Templates;

/// Fields only players carry
#[derive(Debug, Clone)]
pub struct PlayerData {
    pub user_id: i64,
    pub bank: u32,
    pub npc_kills: u32,
    pub player_kills: u32,
    /// Region code of the home city
    pub hometown: String,
    pub gang: Option<Gang>,
    pub admin: bool,
    pub auto_attack: bool,
    pub last_attack_kind: AttackKind,
    pub last_location: Option<Location>,
}

impl PlayerData {
    pub fn new(user_id: i64, hometown: String) -> Self {
        Self {
            user_id,
            bank: 0,
            npc_kills: 0,
            player_kills: 0,
            hometown,
            gang: None,
            admin: false,
            auto_attack: false,
            last_attack_kind: AttackKind::Punch,
            last_location: None,
        }
    }
}

/// Builds a player entity from its persisted record
pub fn build_player(
    character: CharacterState,
    saved: Vec<SavedItem>,
    gang: Option<Gang>,
    session: Arc<dyn Session>,
    templates: &Templates,
) -> Arc<Entity> {
    let mut state = EntityState::new(
        character.health,
        character.cash,
        character.reputation,
        character.skill_acc,
    );
    state.player = Some(PlayerData {
        bank: character.bank,
        npc_kills: character.npc_kills,
        player_kills: character.player_kills,
        gang,
        admin: character.admin,
        last_location: character.last_location,
        ..PlayerData::new(character.user_id, character.hometown)
    });

    let mut inventory = Inventory::default();
    for saved_item in saved {
        if templates.item(&saved_item.template).is_none() {
            warn!("Dropping unknown item template '{}' from {}", saved_item.template, character.name);
            continue;
        }
        let item = Item::restore(saved_item.id, saved_item.template, saved_item.condition, saved_item.amount);
        match inventory.add(item) {
            Ok(index) if saved_item.equipped => {
                if let Err(e) = inventory.equip(index, templates) {
                    warn!("Could not re-equip item for {}: {}", character.name, e);
                }
            }
            Ok(_) => {}
            Err(item) => warn!("Inventory overflow for {}, dropping {}", character.name, item.template),
        }
    }

    Entity::new(character.name, Role::Player, Some(session), state, inventory)
}

/// Current persisted form of a player, `None` for NPCs
pub fn character_state(entity: &Entity) -> Option<CharacterState> {
    let state = entity.lock();
    let player = state.player.as_ref()?;
    Some(CharacterState {
        user_id: player.user_id,
        name: entity.name.clone(),
        reputation: state.reputation,
        health: state.health,
        npc_kills: player.npc_kills,
        player_kills: player.player_kills,
        cash: state.cash,
        bank: player.bank,
        hometown: player.hometown.clone(),
        skill_acc: state.skill_acc,
        gang_id: player.gang.as_ref().map(|g| g.id),
        admin: player.admin,
        last_location: player.last_location.clone(),
    })
}

pub fn saved_inventory(entity: &Entity) -> Vec<SavedItem> {
    let inventory = entity.inventory();
    inventory
        .items()
        .map(|(_, item)| SavedItem {
            id: item.id,
            template: item.template.clone(),
            condition: item.condition,
            amount: item.amount,
            equipped: inventory.is_equipped(&item.id),
        })
        .collect()
}

pub fn stats_frame(entity: &Entity, state: &EntityState) -> Option<StatsFrame> {
    let player = state.player.as_ref()?;
    Some(StatsFrame {
        name: entity.name.clone(),
        health: state.health,
        cash: state.cash,
        bank: player.bank,
        reputation: state.reputation,
        rank: rank_for(state.reputation).name.to_string(),
        rep_to_next_rank: rep_to_next_rank(state.reputation),
        skill_acc: state.skill_acc,
        npc_kills: player.npc_kills,
        player_kills: player.player_kills,
        hometown: player.hometown.clone(),
        gang_tag: player.gang.as_ref().map(|g| g.tag.clone()),
    })
}

/// Sends a stats snapshot. Takes the state lock.
pub fn send_stats(entity: &Entity) {
    let frame = {
        let state = entity.lock();
        stats_frame(entity, &state)
    };
    if let Some(frame) = frame {
        entity.send(ServerEvent::StatsSnapshot(frame));
    }
}

/// Sends an inventory snapshot. Takes the inventory lock.
pub fn send_inventory(entity: &Entity, templates: &Templates) {
    if !entity.is_player() {
        return;
    }
    let event = entity.inventory().snapshot(templates);
    entity.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::RecordingSession;
    use uuid::Uuid;

    fn character() -> CharacterState {
        CharacterState::new_player(7, "Alice".into(), "TV".into())
    }

    #[test]
    fn round_trips_through_the_persisted_form() {
        let templates = Templates::builtin().unwrap();
        let gun = SavedItem {
            id: Uuid::new_v4(),
            template: "glock22".into(),
            condition: 0.8,
            amount: 1,
            equipped: true,
        };
        let weed = SavedItem {
            id: Uuid::new_v4(),
            template: "weed".into(),
            condition: 0.5,
            amount: 1,
            equipped: false,
        };
        let session = Arc::new(RecordingSession::new());
        let entity = build_player(character(), vec![gun.clone(), weed.clone()], None, session, &templates);

        assert_eq!(character_state(&entity).unwrap(), character());
        let saved = saved_inventory(&entity);
        assert_eq!(saved, vec![gun, weed]);
    }

    #[test]
    fn unknown_templates_are_skipped() {
        let templates = Templates::builtin().unwrap();
        let bogus = SavedItem {
            id: Uuid::new_v4(),
            template: "hoverboard".into(),
            condition: 1.0,
            amount: 1,
            equipped: false,
        };
        let session = Arc::new(RecordingSession::new());
        let entity = build_player(character(), vec![bogus], None, session, &templates);
        assert_eq!(entity.inventory().count(), 0);
    }

    #[test]
    fn stats_carry_rank() {
        let templates = Templates::builtin().unwrap();
        let mut c = character();
        c.reputation = 1500;
        let session = Arc::new(RecordingSession::new());
        let entity = build_player(c, Vec::new(), None, session.clone(), &templates);
        send_stats(&entity);
        let events = session.events.lock();
        match events.last() {
            Some(ServerEvent::StatsSnapshot(frame)) => {
                assert_eq!(frame.rank, "Street Punk");
                assert_eq!(frame.rep_to_next_rank, 3400 - 1500);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
