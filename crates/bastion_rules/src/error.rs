//! # Rules Error Types
//!
//! Everything that can go wrong while loading or validating the rules.
//! None of these can happen once a match is running.

use thiserror::Error;

/// Errors raised by catalog loading and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// A required tower or troop type is absent.
    #[error("catalog is missing required unit: {0}")]
    MissingUnit(String),

    /// The troop table is empty.
    #[error("catalog defines no troops")]
    NoTroops,

    /// Exactly one troop must be flagged as the healer.
    #[error("catalog must define exactly one heal troop, found {0}")]
    HealerCount(usize),

    /// Crit chance outside `0.0..=1.0`.
    #[error("unit {unit} has invalid crit chance {value}")]
    InvalidCritChance {
        /// Offending unit.
        unit: String,
        /// Value found in the file, formatted.
        value: String,
    },

    /// A tower or fighting troop with no hit points.
    #[error("unit {0} must have hp above zero")]
    ZeroHp(String),

    /// A unit id appears in both tables.
    #[error("unit id {0} is both a tower and a troop")]
    DuplicateUnit(String),

    /// The TOML did not parse.
    #[error("invalid catalog file: {0}")]
    Parse(String),

    /// The file could not be read.
    #[error("failed to read catalog {path}: {reason}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        reason: String,
    },
}

/// Result type for rules operations.
pub type RulesResult<T> = Result<T, RulesError>;
