//! # Targeting Rule
//!
//! ```text
//! guard-1 alive?  ── yes ──► guard-1
//!        │
//!        no
//!        ▼
//! lowest absolute HP among living {guard-2, king}
//! (tie: guard-2, by slot order)
//! ```

use std::collections::BTreeMap;

use bastion_shared::{PlayerIndex, TowerId, TowerSlot};

use super::state::Tower;

/// Picks the tower a troop attacking `defender` must target.
///
/// `None` only when every defending tower is down.
#[must_use]
pub fn select_target(towers: &BTreeMap<TowerId, Tower>, defender: PlayerIndex) -> Option<TowerId> {
    let guard1 = TowerId::new(defender, TowerSlot::Guard1);
    if towers.get(&guard1).is_some_and(Tower::is_alive) {
        return Some(guard1);
    }
    [TowerSlot::Guard2, TowerSlot::King]
        .into_iter()
        .filter_map(|slot| towers.get(&TowerId::new(defender, slot)))
        .filter(|t| t.is_alive())
        .min_by_key(|t| (t.hp, t.id.slot))
        .map(|t| t.id)
}

/// Keeps `current` while it is standing, otherwise re-derives.
#[must_use]
pub fn resolve_target(
    towers: &BTreeMap<TowerId, Tower>,
    defender: PlayerIndex,
    current: Option<TowerId>,
) -> Option<TowerId> {
    match current {
        Some(id) if towers.get(&id).is_some_and(Tower::is_alive) => Some(id),
        _ => select_target(towers, defender),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MatchPlayer, MatchRules};
    use crate::engine::state::MatchState;
    use bastion_rules::UnitCatalog;
    use bastion_shared::MatchId;

    const P1: PlayerIndex = PlayerIndex::P1;

    fn board() -> MatchState {
        let catalog = UnitCatalog::standard().expect("catalog");
        let mut state = MatchState::new(
            MatchId::numbered(1),
            [MatchPlayer::new("a", 1), MatchPlayer::new("b", 1)],
            &MatchRules::default(),
        );
        state.place_towers(&catalog);
        state
    }

    fn id(slot: TowerSlot) -> TowerId {
        TowerId::new(P1, slot)
    }

    #[test]
    fn test_guard1_first_even_when_weakest_elsewhere() {
        let mut s = board();
        s.test_set_tower_hp(id(TowerSlot::Guard1), 999);
        s.test_set_tower_hp(id(TowerSlot::Guard2), 1);
        s.test_set_tower_hp(id(TowerSlot::King), 1);
        assert_eq!(select_target(&s.towers, P1), Some(id(TowerSlot::Guard1)));
    }

    #[test]
    fn test_lower_absolute_hp_after_guard1() {
        let mut s = board();
        s.test_set_tower_hp(id(TowerSlot::Guard1), 0);
        // guard-2 at 900/1000 (90%), king at 800/2000 (40%): absolute HP decides
        s.test_set_tower_hp(id(TowerSlot::Guard2), 900);
        s.test_set_tower_hp(id(TowerSlot::King), 800);
        assert_eq!(select_target(&s.towers, P1), Some(id(TowerSlot::King)));
    }

    #[test]
    fn test_tie_goes_to_guard2() {
        let mut s = board();
        s.test_set_tower_hp(id(TowerSlot::Guard1), 0);
        s.test_set_tower_hp(id(TowerSlot::Guard2), 500);
        s.test_set_tower_hp(id(TowerSlot::King), 500);
        assert_eq!(select_target(&s.towers, P1), Some(id(TowerSlot::Guard2)));
    }

    #[test]
    fn test_dead_towers_skipped() {
        let mut s = board();
        s.test_set_tower_hp(id(TowerSlot::Guard1), 0);
        s.test_set_tower_hp(id(TowerSlot::Guard2), 0);
        assert_eq!(select_target(&s.towers, P1), Some(id(TowerSlot::King)));
        s.test_set_tower_hp(id(TowerSlot::King), 0);
        assert_eq!(select_target(&s.towers, P1), None);
    }

    #[test]
    fn test_resolve_keeps_living_target() {
        let mut s = board();
        s.test_set_tower_hp(id(TowerSlot::Guard1), 0);
        let kept = resolve_target(&s.towers, P1, Some(id(TowerSlot::King)));
        assert_eq!(kept, Some(id(TowerSlot::King)));
        let rederived = resolve_target(&s.towers, P1, Some(id(TowerSlot::Guard1)));
        assert_eq!(rederived, Some(id(TowerSlot::Guard2)));
    }

    #[test]
    fn test_guard1_alive_always_targeted_for_any_hp_mix() {
        let mut s = board();
        for g1 in [1, 50, 1000] {
            for g2 in [0, 1, 1000] {
                for king in [1, 2000] {
                    s.test_set_tower_hp(id(TowerSlot::Guard1), g1);
                    s.test_set_tower_hp(id(TowerSlot::Guard2), g2);
                    s.test_set_tower_hp(id(TowerSlot::King), king);
                    assert_eq!(select_target(&s.towers, P1), Some(id(TowerSlot::Guard1)));
                }
            }
        }
    }
}
