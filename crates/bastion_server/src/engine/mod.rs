//! # Session Engine
//!
//! The per-match state machine. Owns one [`MatchState`], validates every
//! action against it, and runs the resolution algorithm.
//!
//! ## State machine
//!
//! ```text
//!            start()                 king down / deadline / forfeit
//! ┌─────────┐ ───────► ┌─────────┐ ─────────────────────────────► ┌──────────┐
//! │ Waiting │          │ Running │                                │ Finished │
//! └─────────┘          └─────────┘ ─────────────────────────────► └──────────┘
//!                                     invariant violation (NoContest)
//! ```
//!
//! ## Rejection is free
//!
//! Every check happens before the first mutation. A rejected action leaves
//! the state exactly as it was, and rejecting it again gives the same error.
//!
//! The engine is synchronous and not `Sync`-shared. Serializing callers is
//! the supervisor's job.

pub mod offers;
pub mod realtime;
pub mod resolution;
pub mod state;
pub mod targeting;

use std::sync::Arc;
use std::time::Duration;

use bastion_rules::{
    UnitCatalog, DEFAULT_MATCH_SECONDS, DEFAULT_OFFER_SIZE, MANA_PER_SECOND, MAX_MANA,
    STARTING_MANA,
};
use bastion_shared::{
    EndReason, EventKind, GameEvent, MatchId, MatchModeKind, MatchPhase, MatchSnapshot,
    PlayerIndex, UnitId,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info};

use crate::error::{EngineError, EngineResult};
use resolution::Crits;
use state::MatchState;

// ============================================================================
// INPUTS
// ============================================================================

/// A player as the engine needs them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchPlayer {
    /// Display name.
    pub name: String,
    /// Level at match start.
    pub level: u32,
}

impl MatchPlayer {
    /// Creates a match player.
    #[must_use]
    pub fn new(name: impl Into<String>, level: u32) -> Self {
        Self { name: name.into(), level }
    }
}

/// Per-match rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchRules {
    /// Turn-based or real-time.
    pub mode: MatchModeKind,
    /// Troops offered per turn (turn-based).
    pub offer_size: usize,
    /// Match length (real-time).
    pub match_duration: Duration,
    /// Mana at start (real-time).
    pub starting_mana: u32,
    /// Mana ceiling (real-time).
    pub max_mana: u32,
    /// Mana per second (real-time).
    pub mana_per_second: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            mode: MatchModeKind::TurnBased,
            offer_size: DEFAULT_OFFER_SIZE,
            match_duration: Duration::from_secs(DEFAULT_MATCH_SECONDS),
            starting_mana: STARTING_MANA,
            max_mana: MAX_MANA,
            mana_per_second: MANA_PER_SECOND,
        }
    }
}

/// A validated player action. Forfeits go through [`SessionEngine::forfeit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerAction {
    /// Deploy a troop or cast the healer.
    Deploy {
        /// Unit type.
        unit: UnitId,
    },
}

// ============================================================================
// OUTPUTS
// ============================================================================

/// How a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerminalResult {
    /// Winner, `None` for a draw or no contest.
    pub winner: Option<PlayerIndex>,
    /// Why.
    pub reason: EndReason,
}

/// Result of one accepted action or tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Narration in resolution order.
    pub events: Vec<GameEvent>,
    /// Set if the match finished.
    pub terminal: Option<TerminalResult>,
}

// ============================================================================
// ENGINE
// ============================================================================

/// One match's authority.
pub struct SessionEngine {
    state: MatchState,
    catalog: Arc<UnitCatalog>,
    rules: MatchRules,
    rng: ChaCha8Rng,
}

impl SessionEngine {
    /// Creates an engine in `Waiting`.
    ///
    /// # Errors
    ///
    /// `Configuration` if the catalog cannot field a match.
    pub fn new(
        match_id: MatchId,
        players: [MatchPlayer; 2],
        catalog: Arc<UnitCatalog>,
        rules: MatchRules,
        seed: u64,
    ) -> EngineResult<Self> {
        if catalog.troop_count() == 0 {
            return Err(EngineError::Configuration(bastion_rules::RulesError::NoTroops));
        }
        Ok(Self {
            state: MatchState::new(match_id, players, &rules),
            catalog,
            rules,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Places towers and opens the match.
    ///
    /// Turn-based: player 0 moves first and receives the first offer.
    /// Real-time: the clock starts at zero.
    ///
    /// # Errors
    ///
    /// `MatchOver` if already started.
    pub fn start(&mut self) -> EngineResult<Vec<GameEvent>> {
        if self.state.phase != MatchPhase::Waiting {
            return Err(EngineError::MatchOver);
        }
        self.state.place_towers(&self.catalog);
        self.state.phase = MatchPhase::Running;
        let first = PlayerIndex::P0;
        self.state.current_turn = first;

        let mut events = vec![GameEvent::now(
            EventKind::TurnChanged,
            format!(
                "Match {} started: {} vs {}",
                self.state.match_id,
                self.state.name(PlayerIndex::P0),
                self.state.name(PlayerIndex::P1)
            ),
        )];
        if self.is_turn_based() {
            self.refresh_offer(first);
            events.push(GameEvent::now(
                EventKind::TurnChanged,
                format!("Turn changed to player {}", self.state.name(first)),
            ));
        }
        info!(match_id = %self.state.match_id, mode = ?self.rules.mode, "match started");
        Ok(events)
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Validates and resolves one action.
    ///
    /// # Errors
    ///
    /// Recoverable rejections leave the state untouched. `InvariantViolation`
    /// aborts the match as a no contest before returning.
    pub fn submit_action(&mut self, player: PlayerIndex, action: PlayerAction) -> EngineResult<ActionOutcome> {
        self.ensure_running()?;
        let PlayerAction::Deploy { unit } = action;

        if self.is_turn_based() && player != self.state.current_turn {
            return Err(EngineError::NotYourTurn { player, current: self.state.current_turn });
        }
        let spec = self
            .catalog
            .troop(&unit)
            .ok_or_else(|| EngineError::InvalidTroop { unit: unit.clone() })?
            .clone();
        if self.is_turn_based() {
            if !self.state.player(player).offer.contains(&unit) {
                return Err(EngineError::InvalidTroop { unit });
            }
        } else {
            let available = self.state.player(player).mana;
            if available < spec.mana_cost {
                return Err(EngineError::InsufficientResource { required: spec.mana_cost, available });
            }
        }

        // Accepted: mutation starts here.
        debug!(match_id = %self.state.match_id, %player, %unit, "action accepted");
        let result = if self.is_turn_based() {
            self.resolve_turn(player, &spec)
        } else {
            self.state.player_mut(player).mana -= spec.mana_cost;
            let mut events = Vec::new();
            resolution::deploy(&mut self.state, player, &spec, &mut events);
            Ok(ActionOutcome { events, terminal: None })
        };
        self.checked(result)
    }

    /// Advances a real-time match by `elapsed`.
    ///
    /// Mana regenerates, then each player's troops attack in seat order,
    /// then the deadline is checked.
    ///
    /// # Errors
    ///
    /// `WrongMode` on a turn-based match, otherwise as [`Self::submit_action`].
    pub fn tick(&mut self, elapsed: Duration) -> EngineResult<ActionOutcome> {
        self.ensure_running()?;
        if self.is_turn_based() {
            return Err(EngineError::WrongMode { operation: "tick" });
        }
        let result = self.resolve_tick(elapsed);
        self.checked(result)
    }

    /// Ends the match in favour of `player`'s opponent.
    ///
    /// # Errors
    ///
    /// `MatchNotStarted` or `MatchOver`.
    pub fn forfeit(&mut self, player: PlayerIndex, reason: EndReason) -> EngineResult<ActionOutcome> {
        self.ensure_running()?;
        let winner = player.other();
        let mut events = Vec::new();
        let terminal = self.finish(Some(winner), reason, &mut events);
        Ok(ActionOutcome { events, terminal: Some(terminal) })
    }

    /// Ends the match as a no contest, whatever its phase.
    pub fn abort(&mut self, why: &str) -> TerminalResult {
        error!(match_id = %self.state.match_id, why, "match aborted");
        let mut events = Vec::new();
        self.finish(None, EndReason::NoContest, &mut events)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &MatchState {
        &self.state
    }

    /// Snapshot for `viewer`, including their offer.
    #[must_use]
    pub fn snapshot_for(&self, viewer: PlayerIndex) -> MatchSnapshot {
        self.state.snapshot_for(Some(viewer))
    }

    /// Snapshot without any offer.
    #[must_use]
    pub fn snapshot(&self) -> MatchSnapshot {
        self.state.snapshot_for(None)
    }

    /// Phase.
    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    /// Turn holder, turn-based only.
    #[must_use]
    pub fn current_turn(&self) -> Option<PlayerIndex> {
        self.is_turn_based().then_some(self.state.current_turn)
    }

    /// `player`'s current offer.
    #[must_use]
    pub fn offer(&self, player: PlayerIndex) -> &[UnitId] {
        &self.state.player(player).offer
    }

    /// Terminal result once finished.
    #[must_use]
    pub const fn result(&self) -> Option<TerminalResult> {
        self.state.result
    }

    /// Catalog in use.
    #[must_use]
    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Rules in use.
    #[must_use]
    pub const fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Direct state access for scenario setup. Bypasses every rule.
    #[cfg(any(test, feature = "test-util"))]
    pub fn test_state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn is_turn_based(&self) -> bool {
        self.rules.mode == MatchModeKind::TurnBased
    }

    fn ensure_running(&self) -> EngineResult<()> {
        match self.state.phase {
            MatchPhase::Waiting => Err(EngineError::MatchNotStarted),
            MatchPhase::Running => Ok(()),
            MatchPhase::Finished => Err(EngineError::MatchOver),
        }
    }

    fn resolve_turn(&mut self, player: PlayerIndex, spec: &bastion_rules::UnitSpec) -> EngineResult<ActionOutcome> {
        self.state.action_seq += 1;
        let mut events = Vec::new();

        resolution::deploy(&mut self.state, player, spec, &mut events);
        self.state.player_mut(player).offer.clear();

        let winner = resolution::attack_round(&mut self.state, player, &mut Crits::Disabled, &mut events)?;
        if let Some(winner) = winner {
            let terminal = self.finish(Some(winner), EndReason::KingDestroyed, &mut events);
            return Ok(ActionOutcome { events, terminal: Some(terminal) });
        }

        let next = player.other();
        self.state.current_turn = next;
        self.refresh_offer(next);
        events.push(GameEvent::now(
            EventKind::TurnChanged,
            format!("Turn changed to player {}", self.state.name(next)),
        ));
        Ok(ActionOutcome { events, terminal: None })
    }

    fn resolve_tick(&mut self, elapsed: Duration) -> EngineResult<ActionOutcome> {
        realtime::advance_clock(&mut self.state, &self.rules, elapsed);
        self.state.action_seq += 1;
        let mut events = Vec::new();

        for player in PlayerIndex::BOTH {
            let mut crits = Crits::Enabled(&mut self.rng);
            let winner = resolution::attack_round(&mut self.state, player, &mut crits, &mut events)?;
            if let Some(winner) = winner {
                let terminal = self.finish(Some(winner), EndReason::KingDestroyed, &mut events);
                return Ok(ActionOutcome { events, terminal: Some(terminal) });
            }
        }

        if realtime::deadline_reached(&self.state) {
            let verdict = realtime::time_expired_result(&self.state);
            let terminal = self.finish(verdict.winner, verdict.reason, &mut events);
            return Ok(ActionOutcome { events, terminal: Some(terminal) });
        }
        Ok(ActionOutcome { events, terminal: None })
    }

    fn refresh_offer(&mut self, player: PlayerIndex) {
        let offer = offers::draw_offer(&self.catalog, &mut self.rng, self.rules.offer_size);
        self.state.player_mut(player).offer = offer;
    }

    fn finish(&mut self, winner: Option<PlayerIndex>, reason: EndReason, events: &mut Vec<GameEvent>) -> TerminalResult {
        let terminal = TerminalResult { winner, reason };
        self.state.phase = MatchPhase::Finished;
        self.state.result = Some(terminal);
        for player in &mut self.state.players {
            player.offer.clear();
        }
        let message = match winner {
            Some(w) => format!("Game Over: {} wins! ({})", self.state.name(w), reason.describe()),
            None => format!("Game Over: no winner ({})", reason.describe()),
        };
        events.push(GameEvent::now(EventKind::GameOver, message));
        info!(
            match_id = %self.state.match_id,
            winner = ?winner,
            reason = ?reason,
            "match finished"
        );
        terminal
    }

    /// Post-action consistency gate. Any violation ends the match.
    fn checked(&mut self, result: EngineResult<ActionOutcome>) -> EngineResult<ActionOutcome> {
        let result = result.and_then(|outcome| self.state.check_invariants().map(|()| outcome));
        if let Err(EngineError::InvariantViolation(why)) = &result {
            let why = why.clone();
            self.abort(&why);
        }
        result
    }
}
