//! # Settlement
//!
//! Post-match EXP and level changes.
//!
//! ```text
//! earned = Σ exp_yield of the opponent's towers at 0 HP
//!        + 30 for a win, 10 each for a draw
//! ```
//!
//! A no contest earns nothing. Level-ups loop, so one big match can cross
//! several levels; leftover EXP is kept.

use bastion_rules::{LevelState, DRAW_BONUS_EXP, WIN_BONUS_EXP};
use bastion_shared::{EndReason, GameOverPayload, PlayerIndex};

use crate::engine::state::MatchState;
use crate::engine::TerminalResult;

/// One player's settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerSettlement {
    /// EXP earned this match.
    pub exp_earned: u32,
    /// Progress before the match.
    pub before: LevelState,
    /// Progress after the match.
    pub after: LevelState,
}

impl PlayerSettlement {
    /// Did the player gain a level?
    #[must_use]
    pub const fn leveled_up(&self) -> bool {
        self.after.level > self.before.level
    }

    /// Wire payload.
    #[must_use]
    pub const fn payload(&self, result: TerminalResult) -> GameOverPayload {
        GameOverPayload {
            winner: result.winner,
            reason: result.reason,
            exp_earned: self.exp_earned,
            new_total_exp: self.after.exp,
            new_level: self.after.level,
            leveled_up: self.leveled_up(),
        }
    }
}

/// EXP `player` earned in `state` under `result`.
#[must_use]
pub fn exp_earned(state: &MatchState, result: TerminalResult, player: PlayerIndex) -> u32 {
    if result.reason == EndReason::NoContest {
        return 0;
    }
    let towers: u32 = state
        .towers_of(player.other())
        .filter(|t| !t.is_alive())
        .map(|t| t.exp_yield)
        .sum();
    let bonus = match result.winner {
        Some(w) if w == player => WIN_BONUS_EXP,
        Some(_) => 0,
        None => DRAW_BONUS_EXP,
    };
    towers + bonus
}

/// Settles both players. `progress` is indexed by seat.
#[must_use]
pub fn settle(state: &MatchState, result: TerminalResult, progress: [LevelState; 2]) -> [PlayerSettlement; 2] {
    PlayerIndex::BOTH.map(|player| {
        let before = progress[player.index()];
        let exp_earned = exp_earned(state, result, player);
        let mut after = before;
        after.gain(exp_earned);
        PlayerSettlement { exp_earned, before, after }
    })
}
