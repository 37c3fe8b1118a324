//! # Session Protocol
//!
//! The closed set of messages exchanged between a player and their match.
//!
//! ## Design
//!
//! ```text
//! CLIENT                         SERVER (one supervisor per match)
//!   │ ── ClientCommand ─────────► │  validated here, never a field bag
//!   │ ◄─ ServerMessage ────────── │  Events, StateUpdate, TurnChange, ...
//! ```
//!
//! Framing and transport are someone else's problem. Everything in here is
//! plain data with serde derives.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::{MatchId, PlayerIndex, TowerId, TowerSlot, TroopId, UnitId};

// ============================================================================
// CLIENT -> SERVER
// ============================================================================

/// An action a player may request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Deploy a troop (or cast the healer).
    Deploy {
        /// Unit type to deploy.
        unit: UnitId,
    },
    /// Give up the match.
    Forfeit,
}

// ============================================================================
// MATCH METADATA
// ============================================================================

/// Which ruleset a match runs under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchModeKind {
    /// Players alternate single actions.
    #[default]
    TurnBased,
    /// Continuous ticks until a wall-clock deadline.
    RealTime,
}

/// Lifecycle phase of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Created, towers not yet placed.
    Waiting,
    /// Accepting actions.
    Running,
    /// Terminal. Read-only from here on.
    Finished,
}

/// Why a match ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A king tower fell.
    KingDestroyed,
    /// Real-time deadline reached.
    TimeExpired,
    /// A player gave up.
    Forfeit,
    /// A player's connection went away.
    Disconnect,
    /// The match was aborted by the server. Nobody wins, nobody earns.
    NoContest,
}

impl EndReason {
    /// Human-readable reason.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::KingDestroyed => "King Tower destroyed",
            Self::TimeExpired => "time expired",
            Self::Forfeit => "opponent forfeited",
            Self::Disconnect => "opponent disconnected",
            Self::NoContest => "no contest",
        }
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Event category, for clients that want more than the narration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Troop placed on the board.
    Deploy,
    /// Healer restored tower HP.
    Heal,
    /// Troop hit a tower.
    Attack,
    /// Tower reached 0 HP.
    TowerDestroyed,
    /// Troop picked a new target after a kill.
    Retarget,
    /// Tower struck back at its last attacker.
    Counterattack,
    /// Troop reached 0 HP.
    TroopDefeated,
    /// Turn pointer moved.
    TurnChanged,
    /// Match reached a terminal state.
    GameOver,
}

/// One line of match narration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Category.
    pub kind: EventKind,
    /// Human-readable text.
    pub message: String,
    /// Wall-clock time the event was recorded.
    pub at: SystemTime,
}

impl GameEvent {
    /// Records an event stamped with the current time.
    #[must_use]
    pub fn now(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            at: SystemTime::now(),
        }
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Public view of a tower.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerView {
    /// Tower id.
    pub id: TowerId,
    /// Catalog unit type.
    pub unit: UnitId,
    /// Owner.
    pub owner: PlayerIndex,
    /// Slot.
    pub slot: TowerSlot,
    /// Current HP.
    pub hp: u32,
    /// Max HP.
    pub max_hp: u32,
}

/// Public view of a troop on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopView {
    /// Instance id.
    pub id: TroopId,
    /// Catalog unit type.
    pub unit: UnitId,
    /// Owner.
    pub owner: PlayerIndex,
    /// Current HP.
    pub hp: u32,
    /// Max HP.
    pub max_hp: u32,
    /// Current target, if any.
    pub target: Option<TowerId>,
}

/// Public view of a player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Seat.
    pub seat: PlayerIndex,
    /// Display name.
    pub name: String,
    /// Level at match start.
    pub level: u32,
    /// Mana pool (real-time only).
    pub mana: Option<u32>,
}

/// Full match state as a collaborator may see it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Match id.
    pub match_id: MatchId,
    /// Ruleset.
    pub mode: MatchModeKind,
    /// Phase.
    pub phase: MatchPhase,
    /// Both players, seat order.
    pub players: Vec<PlayerView>,
    /// Every tower, including destroyed ones.
    pub towers: Vec<TowerView>,
    /// Every troop on the board.
    pub troops: Vec<TroopView>,
    /// Whose turn it is (turn-based only).
    pub current_turn: Option<PlayerIndex>,
    /// Seconds until the deadline (real-time only).
    pub seconds_remaining: Option<u64>,
    /// Troops the receiving player may deploy right now.
    ///
    /// Empty unless the snapshot was taken for the player holding the offer.
    pub offer: Vec<UnitId>,
}

impl MatchSnapshot {
    /// Looks up a tower by id.
    #[must_use]
    pub fn tower(&self, id: TowerId) -> Option<&TowerView> {
        self.towers.iter().find(|t| t.id == id)
    }

    /// Troops owned by `player`.
    pub fn troops_of(&self, player: PlayerIndex) -> impl Iterator<Item = &TroopView> {
        self.troops.iter().filter(move |t| t.owner == player)
    }
}

// ============================================================================
// SERVER -> CLIENT
// ============================================================================

/// Why an action was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Match has not started.
    MatchNotStarted,
    /// Not the sender's turn.
    NotYourTurn,
    /// Match already finished.
    MatchOver,
    /// Unknown or not-offered unit.
    InvalidTroop,
    /// Not enough mana.
    InsufficientResource,
    /// Server-side failure.
    Internal,
}

/// Troops a player is currently allowed to deploy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroopOffer {
    /// Who the offer is for.
    pub player: PlayerIndex,
    /// Offered unit types.
    pub units: Vec<UnitId>,
}

/// Terminal payload, one per player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverPayload {
    /// Winner, or `None` for a draw / no contest.
    pub winner: Option<PlayerIndex>,
    /// Why it ended.
    pub reason: EndReason,
    /// EXP earned by the receiving player this match.
    pub exp_earned: u32,
    /// Total EXP after settlement (remainder past the last level-up).
    pub new_total_exp: u32,
    /// Level after settlement.
    pub new_level: u32,
    /// Did the player gain at least one level?
    pub leveled_up: bool,
}

/// Everything the server sends to a player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Match is starting.
    GameStart {
        /// Match id.
        match_id: MatchId,
        /// Receiver's seat.
        seat: PlayerIndex,
        /// Opponent's display name.
        opponent_name: String,
        /// Ruleset.
        mode: MatchModeKind,
        /// First player to move (turn-based only).
        first_turn: Option<PlayerIndex>,
    },
    /// Fresh troop offer for the receiver.
    TroopOffer {
        /// Offer contents.
        offer: TroopOffer,
    },
    /// Ordered narration of one action or tick.
    Events {
        /// Events in resolution order.
        events: Vec<GameEvent>,
    },
    /// State after the events above.
    StateUpdate {
        /// Snapshot.
        snapshot: MatchSnapshot,
    },
    /// Turn pointer moved.
    TurnChange {
        /// Player to move.
        current: PlayerIndex,
        /// Is it the receiver?
        your_turn: bool,
    },
    /// The receiver's last command was rejected.
    Error {
        /// Machine-readable code.
        code: ErrorCode,
        /// Human-readable detail.
        message: String,
    },
    /// Match over, settlement applied.
    GameOver {
        /// Result and settlement.
        result: GameOverPayload,
    },
}

impl ServerMessage {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GameStart { .. } => "game_start",
            Self::TroopOffer { .. } => "troop_offer",
            Self::Events { .. } => "events",
            Self::StateUpdate { .. } => "state_update",
            Self::TurnChange { .. } => "turn_change",
            Self::Error { .. } => "error",
            Self::GameOver { .. } => "game_over",
        }
    }
}
