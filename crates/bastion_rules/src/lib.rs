//! # Bastion Rules
//!
//! The static half of the game: what units exist, how hard they hit, and
//! how players grow between matches.
//!
//! ## Overview
//!
//! ```text
//! units.toml ──► UnitCatalog ──► (engine instantiates towers/troops)
//!                                   │
//!              combat::resolve ◄────┤  every attack
//!          progression::scale ◄─────┘  every instantiation, settlement
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bastion_rules::{combat, progression, UnitCatalog};
//!
//! let catalog = UnitCatalog::standard().expect("embedded catalog is valid");
//! let guard = catalog.guard_tower();
//! assert_eq!(guard.hp, 1000);
//!
//! assert_eq!(combat::resolve(150, 100, 0.0, None).damage, 50);
//! assert_eq!(progression::exp_for_next_level(1), 100);
//! ```

#![deny(unsafe_code)]

pub mod catalog;
pub mod combat;
pub mod error;
pub mod progression;

pub use catalog::{ScaledStats, UnitCatalog, UnitSpec, GUARD_TOWER_ID, KING_TOWER_ID};
pub use combat::Hit;
pub use error::{RulesError, RulesResult};
pub use progression::LevelState;

// ============================================================================
// RULE CONSTANTS
// ============================================================================

/// HP restored by the healer troop, capped at the tower's max HP.
pub const HEAL_AMOUNT: u32 = 300;

/// Settlement bonus for the winner.
pub const WIN_BONUS_EXP: u32 = 30;

/// Settlement bonus for each player on a draw.
pub const DRAW_BONUS_EXP: u32 = 10;

/// ATK multiplier applied on a critical hit.
pub const CRIT_MULTIPLIER: f64 = 1.2;

/// Troops offered per turn in turn-based mode.
pub const DEFAULT_OFFER_SIZE: usize = 3;

/// Real-time mode: mana at match start.
pub const STARTING_MANA: u32 = 5;

/// Real-time mode: mana ceiling.
pub const MAX_MANA: u32 = 10;

/// Real-time mode: mana regenerated per second.
pub const MANA_PER_SECOND: u32 = 1;

/// Real-time mode: match length.
pub const DEFAULT_MATCH_SECONDS: u64 = 180;
