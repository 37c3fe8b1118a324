//! # Real-Time Clock
//!
//! What changes when a match runs against the wall clock instead of turns:
//!
//! | concern      | turn-based              | real-time                          |
//! |--------------|-------------------------|------------------------------------|
//! | who may act  | turn holder             | either player, any time            |
//! | cost         | must be in the offer    | mana                               |
//! | attacks      | inside the action       | on each supervisor tick            |
//! | crits        | never                   | rolled per hit                     |
//! | ends         | king down               | king down, or deadline             |

use std::time::Duration;

use bastion_shared::{EndReason, PlayerIndex};

use super::state::MatchState;
use super::{MatchRules, TerminalResult};

/// Advances the clock and converts whole elapsed seconds into mana.
///
/// Fractions of a second carry over to the next call.
pub fn advance_clock(state: &mut MatchState, rules: &MatchRules, elapsed: Duration) {
    state.elapsed = state.elapsed.saturating_add(elapsed).min(state.duration);
    state.mana_carry = state.mana_carry.saturating_add(elapsed);
    let whole = state.mana_carry.as_secs();
    if whole == 0 {
        return;
    }
    state.mana_carry -= Duration::from_secs(whole);
    let gained = u32::try_from(whole)
        .unwrap_or(u32::MAX)
        .saturating_mul(rules.mana_per_second);
    for player in &mut state.players {
        player.mana = player.mana.saturating_add(gained).min(rules.max_mana);
    }
}

/// Has the deadline passed?
#[must_use]
pub fn deadline_reached(state: &MatchState) -> bool {
    state.elapsed >= state.duration
}

/// Verdict at the deadline: whoever destroyed more enemy towers wins.
#[must_use]
pub fn time_expired_result(state: &MatchState) -> TerminalResult {
    let destroyed_by_p0 = state.destroyed_towers(PlayerIndex::P1);
    let destroyed_by_p1 = state.destroyed_towers(PlayerIndex::P0);
    let winner = match destroyed_by_p0.cmp(&destroyed_by_p1) {
        std::cmp::Ordering::Greater => Some(PlayerIndex::P0),
        std::cmp::Ordering::Less => Some(PlayerIndex::P1),
        std::cmp::Ordering::Equal => None,
    };
    TerminalResult { winner, reason: EndReason::TimeExpired }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatchPlayer;
    use bastion_rules::UnitCatalog;
    use bastion_shared::{MatchId, MatchModeKind, TowerId, TowerSlot};

    fn state(rules: &MatchRules) -> MatchState {
        let catalog = UnitCatalog::standard().expect("catalog");
        let mut s = MatchState::new(
            MatchId::numbered(1),
            [MatchPlayer::new("a", 1), MatchPlayer::new("b", 1)],
            rules,
        );
        s.place_towers(&catalog);
        s
    }

    fn rules() -> MatchRules {
        MatchRules { mode: MatchModeKind::RealTime, ..MatchRules::default() }
    }

    #[test]
    fn test_mana_regen_carries_fractions() {
        let rules = rules();
        let mut s = state(&rules);
        advance_clock(&mut s, &rules, Duration::from_millis(600));
        assert_eq!(s.players[0].mana, 5);
        advance_clock(&mut s, &rules, Duration::from_millis(600));
        assert_eq!(s.players[0].mana, 6);
        assert_eq!(s.mana_carry, Duration::from_millis(200));
    }

    #[test]
    fn test_mana_capped() {
        let rules = rules();
        let mut s = state(&rules);
        advance_clock(&mut s, &rules, Duration::from_secs(60));
        assert_eq!(s.players[1].mana, rules.max_mana);
    }

    #[test]
    fn test_clock_stops_at_deadline() {
        let rules = rules();
        let mut s = state(&rules);
        advance_clock(&mut s, &rules, rules.match_duration + Duration::from_secs(5));
        assert!(deadline_reached(&s));
        assert_eq!(s.seconds_remaining(), 0);
    }

    #[test]
    fn test_time_expired_counts_destroyed_towers() {
        let rules = rules();
        let mut s = state(&rules);
        assert_eq!(time_expired_result(&s).winner, None);
        s.test_set_tower_hp(TowerId::new(PlayerIndex::P0, TowerSlot::Guard1), 0);
        assert_eq!(time_expired_result(&s).winner, Some(PlayerIndex::P1));
        s.test_set_tower_hp(TowerId::new(PlayerIndex::P1, TowerSlot::Guard1), 0);
        s.test_set_tower_hp(TowerId::new(PlayerIndex::P1, TowerSlot::Guard2), 0);
        assert_eq!(time_expired_result(&s).winner, Some(PlayerIndex::P0));
    }
}
