//! The symmetric targeting relation.
//!
//! `a.current_target == Some(b)` holds exactly when `b.targeted_by`
//! contains `a`. Both sides are only ever written while both entities'
//! state locks are held.

use std::sync::Arc;

use super::{lock_pair, Entity, LockSet};
use crate::error::GameError;

/// Points `attacker` at `target`, dropping any previous target first.
/// When `target` is an NPC it becomes hostile to the attacker's session.
pub fn aim(attacker: &Arc<Entity>, target: &Arc<Entity>) -> Result<(), GameError> {
    if attacker.id == target.id {
        return Err(GameError::rejected("You can't aim at yourself."));
    }
    loop {
        clear_target(attacker);

        let (mut a, mut t) = lock_pair(attacker, target);
        if a.current_target.is_some() {
            // Raced with another aim from the same entity
            continue;
        }
        if a.dead {
            return Err(GameError::rejected("You are in no shape to fight."));
        }
        if t.dead {
            return Err(GameError::rejected(format!("{} is already down.", target.name)));
        }
        a.current_target = Some(target.clone());
        t.targeted_by.insert(attacker.id, attacker.clone());
        if let (Some(npc), Some(session)) = (t.npc.as_mut(), attacker.session_id()) {
            npc.hostiles.insert(session);
        }
        return Ok(());
    }
}

/// Drops `entity`'s own target, leaving who targets it untouched.
/// Returns the former target.
pub fn clear_target(entity: &Arc<Entity>) -> Option<Arc<Entity>> {
    loop {
        let target = entity.lock().current_target.clone()?;
        let (mut e, mut t) = lock_pair(entity, &target);
        if e.target_id() != Some(target.id) {
            continue;
        }
        e.current_target = None;
        t.targeted_by.remove(&entity.id);
        drop((e, t));
        return Some(target);
    }
}

/// Removes every targeting relation `entity` takes part in, in both directions.
/// Returns the entities that were aiming at it.
///
/// Takes a snapshot of the participants, locks all of them in id order and
/// retries if the snapshot went stale in between.
pub fn clear_all(entity: &Arc<Entity>) -> Vec<Arc<Entity>> {
    loop {
        let (target, hunters) = {
            let state = entity.lock();
            (
                state.current_target.clone(),
                state.targeted_by.values().cloned().collect::<Vec<_>>(),
            )
        };
        if target.is_none() && hunters.is_empty() {
            return Vec::new();
        }

        let mut participants: Vec<&Entity> = vec![entity.as_ref()];
        participants.extend(target.iter().map(|t| t.as_ref()));
        participants.extend(hunters.iter().map(|h| h.as_ref()));
        let mut locks = LockSet::lock(&participants);

        let Some(me) = locks.get_mut(entity.id) else {
            return Vec::new();
        };
        let unchanged = me.target_id() == target.as_ref().map(|t| t.id)
            && me.targeted_by.len() == hunters.len()
            && hunters.iter().all(|h| me.targeted_by.contains_key(&h.id));
        if !unchanged {
            continue;
        }
        me.current_target = None;
        me.targeted_by.clear();

        if let Some(t) = target.as_ref().and_then(|t| locks.get_mut(t.id)) {
            t.targeted_by.remove(&entity.id);
        }
        for hunter in &hunters {
            if let Some(h) = locks.get_mut(hunter.id) {
                if h.target_id() == Some(entity.id) {
                    h.current_target = None;
                }
            }
        }
        drop(locks);
        return hunters;
    }
}

/// Name of someone currently targeting `entity`, if any
pub fn held_up_by(entity: &Entity) -> Option<String> {
    entity
        .lock()
        .targeted_by
        .values()
        .next()
        .map(|h| h.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::{test_npc, test_player};
    use swi_shared::NpcKind;

    fn symmetric(a: &Arc<Entity>, b: &Arc<Entity>) -> bool {
        let (sa, sb) = lock_pair(a, b);
        let forward = sa.target_id() == Some(b.id);
        let backward = sb.targeted_by.contains_key(&a.id);
        forward == backward
    }

    #[test]
    fn aim_is_symmetric() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        aim(&a, &b).unwrap();
        assert!(symmetric(&a, &b));
        assert_eq!(a.lock().target_id(), Some(b.id));
    }

    #[test]
    fn re_aim_releases_previous_target() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        let (c, _) = test_player("C");
        aim(&a, &b).unwrap();
        aim(&a, &c).unwrap();
        assert!(b.lock().targeted_by.is_empty());
        assert!(c.lock().targeted_by.contains_key(&a.id));
        assert!(symmetric(&a, &b) && symmetric(&a, &c));
    }

    #[test]
    fn clear_all_removes_both_directions() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        let (c, _) = test_player("C");
        aim(&a, &b).unwrap();
        aim(&b, &a).unwrap();
        aim(&c, &a).unwrap();

        let hunters = clear_all(&a);
        let mut ids: Vec<_> = hunters.iter().map(|h| h.id).collect();
        ids.sort();
        let mut expected = vec![b.id, c.id];
        expected.sort();
        assert_eq!(ids, expected);

        assert!(a.lock().current_target.is_none());
        assert!(a.lock().targeted_by.is_empty());
        assert!(b.lock().current_target.is_none());
        assert!(b.lock().targeted_by.is_empty());
        assert!(c.lock().current_target.is_none());
    }

    #[test]
    fn aiming_at_npc_marks_hostility() {
        let (a, _) = test_player("A");
        let npc = test_npc("Bob", NpcKind::Tweaker);
        aim(&a, &npc).unwrap();
        let session = a.session_id().unwrap();
        assert!(npc.lock().npc.as_ref().unwrap().hostiles.contains(&session));
    }

    #[test]
    fn cannot_aim_at_the_dead_or_yourself() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        b.lock().dead = true;
        assert!(aim(&a, &b).is_err());
        assert!(aim(&a, &a).is_err());
        assert!(a.lock().current_target.is_none());
    }

    #[test]
    fn concurrent_mutual_aims_do_not_deadlock() {
        let (a, _) = test_player("A");
        let (b, _) = test_player("B");
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let (x, y) = if i % 2 == 0 { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let _ = aim(&x, &y);
                        clear_all(&x);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert!(symmetric(&a, &b) && symmetric(&b, &a));
    }
}
