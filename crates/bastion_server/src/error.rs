//! # Server Error Types
//!
//! One enum per layer. Engine errors split into client-caused rejections,
//! which leave the match untouched, and fatal ones, which end it.

use bastion_rules::RulesError;
use bastion_shared::{ErrorCode, PlayerIndex, UnitId};
use thiserror::Error;

// ============================================================================
// ENGINE
// ============================================================================

/// Errors raised by the Session Engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The catalog cannot support a match.
    #[error("configuration error: {0}")]
    Configuration(#[from] RulesError),

    /// Action arrived before `start`.
    #[error("match has not started")]
    MatchNotStarted,

    /// Action from the player who does not hold the turn.
    #[error("not your turn: {player} acted while {current} holds the turn")]
    NotYourTurn {
        /// Who tried to act.
        player: PlayerIndex,
        /// Who holds the turn.
        current: PlayerIndex,
    },

    /// The match is finished.
    #[error("match is over")]
    MatchOver,

    /// Unknown unit, or not in the player's current offer.
    #[error("unit {unit} cannot be deployed")]
    InvalidTroop {
        /// Requested unit.
        unit: UnitId,
    },

    /// Not enough mana for the requested unit.
    #[error("insufficient mana: need {required}, have {available}")]
    InsufficientResource {
        /// Cost of the unit.
        required: u32,
        /// Current pool.
        available: u32,
    },

    /// Operation does not exist in this match's mode.
    #[error("{operation} is not available in this match mode")]
    WrongMode {
        /// Operation name.
        operation: &'static str,
    },

    /// Match state is inconsistent. The match is aborted.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    /// Client-caused, state unchanged, the client may try again.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MatchNotStarted
                | Self::NotYourTurn { .. }
                | Self::MatchOver
                | Self::InvalidTroop { .. }
                | Self::InsufficientResource { .. }
        )
    }

    /// Wire code sent back to the client.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MatchNotStarted => ErrorCode::MatchNotStarted,
            Self::NotYourTurn { .. } => ErrorCode::NotYourTurn,
            Self::MatchOver => ErrorCode::MatchOver,
            Self::InvalidTroop { .. } => ErrorCode::InvalidTroop,
            Self::InsufficientResource { .. } => ErrorCode::InsufficientResource,
            Self::Configuration(_) | Self::WrongMode { .. } | Self::InvariantViolation(_) => {
                ErrorCode::Internal
            }
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// SESSION
// ============================================================================

/// Errors seen by callers of a [`crate::session::SessionHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The engine rejected the action.
    #[error("action rejected: {0}")]
    Rejected(#[from] EngineError),

    /// The supervisor task is gone.
    #[error("session closed")]
    Closed,
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

// ============================================================================
// ACCOUNTS
// ============================================================================

/// Errors raised by account and profile stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Username or secret wrong.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No profile under that name.
    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    /// Backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// LOBBY
// ============================================================================

/// Errors raised by the lobby.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LobbyError {
    /// Username or secret empty.
    #[error("username and secret are required")]
    EmptyCredentials,

    /// Store rejected the login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// That user already has a live session.
    #[error("{0} is already logged in")]
    AlreadyLoggedIn(String),

    /// Request from a user who never logged in.
    #[error("{0} is not logged in")]
    NotLoggedIn(String),

    /// Already waiting in the queue.
    #[error("{0} is already queued")]
    AlreadyQueued(String),

    /// Still playing a match that has not settled.
    #[error("{0} is already in a match")]
    AlreadyInMatch(String),

    /// Left the queue before being paired.
    #[error("left the queue")]
    LeftQueue,

    /// Pairing succeeded but the match could not be created.
    #[error("match setup failed: {0}")]
    MatchSetup(String),

    /// Store failure other than bad credentials.
    #[error(transparent)]
    Store(StoreError),

    /// The lobby task is gone.
    #[error("lobby closed")]
    Closed,
}

impl From<StoreError> for LobbyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidCredentials | StoreError::UnknownPlayer(_) => Self::InvalidCredentials,
            other => Self::Store(other),
        }
    }
}

/// Result type for lobby operations.
pub type LobbyResult<T> = Result<T, LobbyError>;

// ============================================================================
// CONFIG
// ============================================================================

/// Errors raised while loading server configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {reason}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// TOML did not parse.
    #[error("invalid config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The unit catalog failed to load.
    #[error(transparent)]
    Catalog(#[from] RulesError),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_recoverable() {
        assert!(EngineError::MatchOver.is_recoverable());
        assert!(EngineError::InvalidTroop { unit: UnitId::from("x") }.is_recoverable());
        assert!(EngineError::InsufficientResource { required: 5, available: 1 }.is_recoverable());
        assert!(!EngineError::InvariantViolation("x".into()).is_recoverable());
        assert!(!EngineError::Configuration(RulesError::NoTroops).is_recoverable());
    }

    #[test]
    fn test_codes() {
        let err = EngineError::NotYourTurn { player: PlayerIndex::P1, current: PlayerIndex::P0 };
        assert_eq!(err.code(), ErrorCode::NotYourTurn);
        assert_eq!(EngineError::InvariantViolation(String::new()).code(), ErrorCode::Internal);
    }

    #[test]
    fn test_store_errors_map_to_login_failures() {
        assert_eq!(LobbyError::from(StoreError::InvalidCredentials), LobbyError::InvalidCredentials);
        assert_eq!(
            LobbyError::from(StoreError::Unavailable("disk".into())),
            LobbyError::Store(StoreError::Unavailable("disk".into()))
        );
    }
}
