//! Combat resolution.
//!
//! Every combat request is a [`CombatAction`] resolved in one shot by
//! [`resolve`]. Attacks take both participants' state locks and then both
//! inventory locks, always through the ordered helpers in `entities`, and
//! release them before any event is sent.

mod death;
mod flee;

use death::spawn_death;

use std::sync::Arc;

use log::info;
use tokio::time::Instant;

use swi_shared::settings::{PUNCH_DAMAGE, WEAPON_BASE_WEAR};
use swi_shared::{Coordinates, Direction, ItemTemplate, ServerEvent};

use crate::entities::player::{send_inventory, send_stats};
use crate::entities::skills::accuracy_check;
use crate::entities::{
    lock_inventory_pair, lock_pair, targeting, Entity, EntityState, EquipSlot, Inventory, Item,
    Roller,
};
use crate::error::GameError;
use crate::templates::Templates;
use crate::world::place::PlaceHandle;
use crate::world::World;

const NO_TARGET: &str = "You have no target, so you throw some punches into the air.";

/// The attack a player last used, replayed by auto-attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttackKind {
    #[default]
    Punch,
    Strike,
    Shoot,
}

impl AttackKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Punch => "punch",
            Self::Strike => "strike",
            Self::Shoot => "shoot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeleeStyle {
    Punch,
    Strike,
}

/// One combat request. Carries no state between invocations.
pub enum CombatAction {
    Aim {
        attacker: Arc<Entity>,
        target: Arc<Entity>,
    },
    Melee {
        attacker: Arc<Entity>,
        style: MeleeStyle,
    },
    Ranged {
        attacker: Arc<Entity>,
    },
    Flee {
        entity: Arc<Entity>,
        direction: Direction,
    },
    Death {
        victim: Arc<Entity>,
        killer: Arc<Entity>,
    },
}

impl CombatAction {
    /// The action behind an attack kind, aimed at the attacker's current target
    pub fn attack(attacker: Arc<Entity>, kind: AttackKind) -> Self {
        match kind {
            AttackKind::Punch => Self::Melee {
                attacker,
                style: MeleeStyle::Punch,
            },
            AttackKind::Strike => Self::Melee {
                attacker,
                style: MeleeStyle::Strike,
            },
            AttackKind::Shoot => Self::Ranged { attacker },
        }
    }

    fn preconditions(&self) -> Preconditions {
        match self {
            Self::Aim { .. } => Preconditions {
                same_place: true,
                ..Preconditions::NONE
            },
            Self::Melee {
                style: MeleeStyle::Punch,
                ..
            } => Preconditions {
                same_place: true,
                cooldown: true,
                ..Preconditions::NONE
            },
            Self::Melee {
                style: MeleeStyle::Strike,
                ..
            } => Preconditions {
                same_place: true,
                cooldown: true,
                weapon: Some(EquipSlot::Melee),
                ammo: false,
            },
            Self::Ranged { .. } => Preconditions {
                same_place: true,
                cooldown: true,
                weapon: Some(EquipSlot::Gun),
                ammo: true,
            },
            Self::Flee { .. } | Self::Death { .. } => Preconditions::NONE,
        }
    }
}

/// What an action requires before anything is mutated
#[derive(Debug, Clone, Copy)]
struct Preconditions {
    same_place: bool,
    /// Players only
    cooldown: bool,
    weapon: Option<EquipSlot>,
    ammo: bool,
}

impl Preconditions {
    const NONE: Self = Self {
        same_place: false,
        cooldown: false,
        weapon: None,
        ammo: false,
    };
}

/// Result of one resolved action. Rejections mutate nothing; callers decide
/// whether to show them.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rejected(GameError),
    Aimed,
    Missed,
    Jammed,
    Hit { damage: i32, health: i32 },
    Killed { damage: i32 },
    Fled(Coordinates),
    Died,
}

pub fn resolve(world: &World, action: CombatAction) -> Outcome {
    let rules = action.preconditions();
    match action {
        CombatAction::Aim { attacker, target } => aim(&attacker, &target),
        CombatAction::Melee { attacker, style } => {
            let kind = match style {
                MeleeStyle::Punch => AttackKind::Punch,
                MeleeStyle::Strike => AttackKind::Strike,
            };
            attack(world, &attacker, kind, rules)
        }
        CombatAction::Ranged { attacker } => attack(world, &attacker, AttackKind::Shoot, rules),
        CombatAction::Flee { entity, direction } => flee::flee(world, &entity, direction),
        CombatAction::Death { victim, killer } => {
            spawn_death(world.clone(), victim, killer);
            Outcome::Died
        }
    }
}

/// The Place both share. On a mismatch the attacker's stale lock on
/// `target` is dropped.
fn co_located(attacker: &Arc<Entity>, target: &Arc<Entity>) -> Result<PlaceHandle, GameError> {
    match (attacker.location(), target.location()) {
        (Some(here), Some(there)) if here.same_as(&there) => Ok(here),
        _ => {
            if attacker.lock().target_id() == Some(target.id) {
                targeting::clear_target(attacker);
            }
            Err(GameError::NotSameLocation)
        }
    }
}

// =============================================================================
// Aim
// =============================================================================

fn aim(attacker: &Arc<Entity>, target: &Arc<Entity>) -> Outcome {
    let place = match co_located(attacker, target) {
        Ok(place) => place,
        Err(e) => return Outcome::Rejected(e),
    };
    if let Err(e) = targeting::aim(attacker, target) {
        return Outcome::Rejected(e);
    }

    attacker.send(ServerEvent::warning(format!("You take aim on {}", target.name)));
    target.send(ServerEvent::failure(format!("{} takes aim on you.", attacker.name)));
    place.broadcast(
        ServerEvent::normal(format!("You see {} take aim on {}.", attacker.name, target.name)),
        &[attacker.id, target.id],
    );
    info!(target: "combat", "{} aims at {} at {:?}", attacker.name, target.name, place);
    Outcome::Aimed
}

// =============================================================================
// Attacks
// =============================================================================

enum Landing {
    Miss,
    Jam,
    Hit,
}

/// What happened inside the locked section
struct Blow {
    landing: Landing,
    damage: i32,
    health: i32,
    weapon: String,
    armor_worn: bool,
    armor_broke: Option<String>,
    killed: bool,
}

impl Blow {
    fn new(landing: Landing, weapon: String) -> Self {
        Self {
            landing,
            damage: 0,
            health: 0,
            weapon,
            armor_worn: false,
            armor_broke: None,
            killed: false,
        }
    }
}

/// Both participants, locked
struct Exchange<'a> {
    attacker: &'a mut EntityState,
    target: &'a mut EntityState,
    attacker_inv: &'a mut Inventory,
    target_inv: &'a mut Inventory,
    attacker_is_player: bool,
    target_is_player: bool,
    templates: &'a Templates,
    roller: &'a dyn Roller,
}

fn template_of<'t>(templates: &'t Templates, item: Option<&Item>) -> Option<&'t ItemTemplate> {
    templates.item(&item?.template)
}

fn attack(world: &World, attacker: &Arc<Entity>, kind: AttackKind, rules: Preconditions) -> Outcome {
    let Some(target) = attacker.lock().current_target.clone() else {
        return Outcome::Rejected(GameError::rejected(NO_TARGET));
    };
    let place = if rules.same_place {
        match co_located(attacker, &target) {
            Ok(place) => Some(place),
            Err(e) => return Outcome::Rejected(e),
        }
    } else {
        attacker.location()
    };

    let templates = world.templates();
    let now = Instant::now();

    let blow = {
        let (mut a, mut t) = lock_pair(attacker, &target);
        if a.target_id() != Some(target.id) {
            return Outcome::Rejected(GameError::rejected(NO_TARGET));
        }
        if a.dead {
            return Outcome::Rejected(GameError::rejected("You are in no shape to fight."));
        }
        if t.dead {
            return Outcome::Rejected(GameError::rejected(format!("{} is already down.", target.name)));
        }
        if rules.cooldown && attacker.is_player() {
            if let Some(last) = a.last_attack {
                let cooldown = world.timings().attack_cooldown;
                let elapsed = now.saturating_duration_since(last);
                if elapsed < cooldown {
                    let wait = (cooldown - elapsed).as_secs_f32().ceil() as u64;
                    return Outcome::Rejected(GameError::rejected(format!(
                        "You must wait another {} seconds before you can attack again.",
                        wait
                    )));
                }
            }
        }

        let (mut ai, mut ti) = lock_inventory_pair(attacker, &target);
        if let Some(slot) = rules.weapon {
            if ai.equipped(slot).is_none() {
                let message = match slot {
                    EquipSlot::Gun => "You don't have a gun equipped",
                    _ => "You don't have a melee weapon equipped",
                };
                return Outcome::Rejected(GameError::rejected(message));
            }
        }
        if rules.ammo && ai.equipped(EquipSlot::Ammo).is_none() {
            return Outcome::Rejected(GameError::rejected("Click, click.. You are out of ammo."));
        }

        a.last_attack = Some(now);
        if let Some(player) = a.player.as_mut() {
            player.last_attack_kind = kind;
        }

        let mut exchange = Exchange {
            attacker: &mut *a,
            target: &mut *t,
            attacker_inv: &mut *ai,
            target_inv: &mut *ti,
            attacker_is_player: attacker.is_player(),
            target_is_player: target.is_player(),
            templates,
            roller: world.roller(),
        };
        let mut blow = match kind {
            AttackKind::Punch => exchange.punch(),
            AttackKind::Strike => exchange.strike(),
            AttackKind::Shoot => exchange.shoot(),
        };
        if matches!(blow.landing, Landing::Hit) {
            blow.health = exchange.target.health;
            if exchange.target.health <= 0 {
                exchange.target.dead = true;
                blow.killed = true;
            }
        }
        blow
    };

    narrate(attacker, &target, place.as_ref(), kind, &blow);

    if kind != AttackKind::Punch {
        send_inventory(attacker, templates);
    }
    match blow.landing {
        Landing::Miss => Outcome::Missed,
        Landing::Jam => Outcome::Jammed,
        Landing::Hit => {
            info!(
                target: "combat",
                "{} hit {} with {} ({}) for {} at {:?}",
                attacker.name,
                target.name,
                kind.name(),
                blow.weapon,
                blow.damage,
                place
            );
            send_stats(attacker);
            send_stats(&target);
            if blow.armor_worn {
                send_inventory(&target, templates);
            }
            if blow.killed {
                resolve(
                    world,
                    CombatAction::Death {
                        victim: target,
                        killer: attacker.clone(),
                    },
                );
                Outcome::Killed { damage: blow.damage }
            } else {
                Outcome::Hit {
                    damage: blow.damage,
                    health: blow.health,
                }
            }
        }
    }
}

impl Exchange<'_> {
    fn punch(&mut self) -> Blow {
        if !accuracy_check(&mut self.attacker.skill_acc, self.roller) {
            return Blow::new(Landing::Miss, "fists".into());
        }
        let mut blow = Blow::new(Landing::Hit, "fists".into());
        blow.damage = PUNCH_DAMAGE;
        self.target.health -= blow.damage;
        blow
    }

    fn strike(&mut self) -> Blow {
        let index = self.attacker_inv.equipped_index(EquipSlot::Melee);
        let weapon = index.and_then(|i| template_of(self.templates, self.attacker_inv.get(i)));
        let name = weapon.map(|t| t.name.clone()).unwrap_or_default();
        if !accuracy_check(&mut self.attacker.skill_acc, self.roller) {
            return Blow::new(Landing::Miss, name);
        }

        let raw = weapon.map(|t| t.damage as i32).unwrap_or(0);
        let reduction = self.wear_armor(raw, |armor| armor.armor_melee);
        if self.attacker_is_player {
            if let Some(item) = self.attacker_inv.equipped_mut(EquipSlot::Melee) {
                item.degrade(WEAPON_BASE_WEAR + reduction as f32 / 100.0);
            }
        }
        self.land(Blow::new(Landing::Hit, name), raw, reduction)
    }

    fn shoot(&mut self) -> Blow {
        let gun = template_of(self.templates, self.attacker_inv.equipped(EquipSlot::Gun));
        let ammo = template_of(self.templates, self.attacker_inv.equipped(EquipSlot::Ammo));
        let name = gun.map(|t| t.name.clone()).unwrap_or_default();

        if self.attacker_is_player {
            let wear = WEAPON_BASE_WEAR + ammo.map(|t| t.ammo_wear).unwrap_or(0.0);
            if let Some(item) = self.attacker_inv.equipped_mut(EquipSlot::Gun) {
                if item.condition <= 0.0 || self.roller.unit() > item.condition {
                    return Blow::new(Landing::Jam, name);
                }
                item.degrade(wear);
            }
        }
        if !accuracy_check(&mut self.attacker.skill_acc, self.roller) {
            return Blow::new(Landing::Miss, name);
        }

        let raw = gun.map(|t| t.damage as i32).unwrap_or(0) + ammo.map(|t| t.damage as i32).unwrap_or(0);
        let reduction = self.wear_armor(raw, |armor| armor.armor_guns);
        if self.attacker_is_player {
            if let Some(index) = self.attacker_inv.equipped_index(EquipSlot::Ammo) {
                let spent = match self.attacker_inv.get_mut(index) {
                    Some(rounds) => {
                        rounds.amount -= 1;
                        rounds.amount <= 0
                    }
                    None => false,
                };
                if spent {
                    self.attacker_inv.take(index);
                }
            }
        }
        self.land(Blow::new(Landing::Hit, name), raw, reduction)
    }

    /// Reduction of the target's armor against this damage class. Player
    /// armor wears by the raw damage.
    fn wear_armor(&mut self, raw: i32, class: impl Fn(&ItemTemplate) -> u32) -> i32 {
        let armor = template_of(self.templates, self.target_inv.equipped(EquipSlot::Armor));
        let Some(armor) = armor else {
            return 0;
        };
        if self.target_is_player {
            if let Some(item) = self.target_inv.equipped_mut(EquipSlot::Armor) {
                item.degrade(raw as f32 / 100.0);
            }
        }
        class(armor) as i32
    }

    /// Applies damage, floored at 1, and removes armor that wore through
    fn land(&mut self, mut blow: Blow, raw: i32, reduction: i32) -> Blow {
        blow.damage = (raw - reduction).max(1);
        self.target.health -= blow.damage;

        if self.target_is_player {
            if let Some(index) = self.target_inv.equipped_index(EquipSlot::Armor) {
                blow.armor_worn = true;
                let broken = self
                    .target_inv
                    .get(index)
                    .is_some_and(|armor| armor.condition <= 0.0);
                if broken {
                    if let Some(armor) = self.target_inv.take(index) {
                        blow.armor_broke = Some(self.templates.item_name(&armor.template));
                    }
                }
            }
        }
        blow
    }
}

fn narrate(attacker: &Entity, target: &Entity, place: Option<&PlaceHandle>, kind: AttackKind, blow: &Blow) {
    let (a, t, w) = (&attacker.name, &target.name, &blow.weapon);
    let lines = match (kind, &blow.landing) {
        (_, Landing::Jam) => {
            attacker.send(ServerEvent::warning(
                "Click, jam, silence.. your gun jammed! You clear the jam so you can attempt again.",
            ));
            return;
        }
        (AttackKind::Punch, Landing::Miss) => (
            format!("You take a swing at {} but miss.", t),
            format!("{} takes a swing at you, but miss.", a),
            format!("You see {} take a swing at {} but miss.", a, t),
        ),
        (AttackKind::Punch, Landing::Hit) => (
            format!("You land a solid punch on {}.", t),
            format!("{} lands a damaging blow on you.", a),
            format!("You see {} land a solid blow to {} head.", a, t),
        ),
        (AttackKind::Strike, Landing::Miss) => (
            format!("You strike at {} with your {}, but miss.", t, w),
            format!("{} lunges at you with a {}, but miss.", a, w),
            format!("You see {} strike at {} with a {}, but miss.", a, t, w),
        ),
        (AttackKind::Strike, Landing::Hit) => (
            format!("You land a solid strike on {} with your {}", t, w),
            format!("{} lands a solid strike on you with a {}.", a, w),
            format!("You see {} land a solid strike on {} with a {}.", a, t, w),
        ),
        (AttackKind::Shoot, Landing::Miss) => (
            format!("You fire your {} at {}, but miss.", w, t),
            format!("{} fires their {} at you, but miss.", a, w),
            format!("You see {} fire their {} at {}, but miss.", a, w, t),
        ),
        (AttackKind::Shoot, Landing::Hit) => (
            format!("You fire your {} at {}, it's a direct hit!", w, t),
            format!("{} fires their {} at you, it's a direct hit.", a, w),
            format!("You see {} fire their {} at {}, landing a direct hit.", a, w, t),
        ),
    };

    let (to_attacker, to_target, to_witnesses) = lines;
    match blow.landing {
        Landing::Hit => {
            attacker.send(ServerEvent::success(to_attacker));
            target.send(ServerEvent::failure(to_target));
        }
        _ => {
            attacker.send(ServerEvent::normal(to_attacker));
            target.send(ServerEvent::warning(to_target));
        }
    }
    if let Some(armor) = &blow.armor_broke {
        target.send(ServerEvent::warning(format!(
            "Your {} breaks, the pieces fall to the ground.",
            armor
        )));
    }
    if let Some(place) = place {
        place.broadcast(ServerEvent::normal(to_witnesses), &[attacker.id, target.id]);
    }
}
