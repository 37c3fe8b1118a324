//! # Identifiers
//!
//! Stable, copyable handles for everything a match refers to.
//!
//! ## Design
//!
//! Entities reference each other by id, never by pointer:
//!
//! ```text
//! ┌──────────────┐  target   ┌──────────────┐
//! │ ActiveTroop  │ ────────► │    Tower     │
//! │  (TroopId)   │ ◄──────── │  (TowerId)   │
//! └──────────────┘ last hit  └──────────────┘
//! ```
//!
//! Both arrows are lookups. Removing a troop means clearing every
//! `TowerId -> TroopId` back-reference that pointed at it.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// PLAYERS
// ============================================================================

/// One of the two seats in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerIndex {
    /// First seat. Moves first in turn-based mode.
    P0,
    /// Second seat.
    P1,
}

impl PlayerIndex {
    /// Both seats, in index order.
    pub const BOTH: [Self; 2] = [Self::P0, Self::P1];

    /// Numeric index (0 or 1).
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::P0 => 0,
            Self::P1 => 1,
        }
    }

    /// The opposing seat.
    #[must_use]
    #[inline]
    pub const fn other(self) -> Self {
        match self {
            Self::P0 => Self::P1,
            Self::P1 => Self::P0,
        }
    }

    /// Seat from a numeric index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::P0),
            1 => Some(Self::P1),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.index())
    }
}

// ============================================================================
// TOWERS
// ============================================================================

/// Fixed position of a tower on one side of the board.
///
/// Ordering is the tie-break order used by targeting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TowerSlot {
    /// First guard tower. Always the first target.
    Guard1,
    /// Second guard tower.
    Guard2,
    /// King tower. Its fall ends the match.
    King,
}

impl TowerSlot {
    /// All slots in creation order.
    pub const ALL: [Self; 3] = [Self::King, Self::Guard1, Self::Guard2];

    /// Stable label used in ids and messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::King => "king",
            Self::Guard1 => "guard-1",
            Self::Guard2 => "guard-2",
        }
    }

    /// Is this the king slot?
    #[must_use]
    #[inline]
    pub const fn is_king(self) -> bool {
        matches!(self, Self::King)
    }
}

impl fmt::Display for TowerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tower identifier. Encodes owner and slot, so it is stable for the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TowerId {
    /// Owning player.
    pub owner: PlayerIndex,
    /// Slot on the owner's side.
    pub slot: TowerSlot,
}

impl TowerId {
    /// Creates a tower id.
    #[must_use]
    pub const fn new(owner: PlayerIndex, slot: TowerSlot) -> Self {
        Self { owner, slot }
    }
}

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.owner, self.slot)
    }
}

// ============================================================================
// TROOPS & UNITS
// ============================================================================

/// Troop instance id. Monotonic per match, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TroopId(pub u32);

impl fmt::Display for TroopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "troop-{}", self.0)
    }
}

/// Unit type identifier from the catalog (`"knight"`, `"king_tower"`, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    /// Creates a unit id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Match identifier (`match-<n>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub String);

impl MatchId {
    /// Id for the `n`th match created by a lobby.
    #[must_use]
    pub fn numbered(n: u64) -> Self {
        Self(format!("match-{n}"))
    }

    /// Borrow as `&str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
