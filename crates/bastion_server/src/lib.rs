//! # Bastion Server
//!
//! The authority for Bastion tower duels. Clients send intents; this crate
//! decides what happened.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Lobby task            login gate, active users, FIFO queue   │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ pairs two players, spawns
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SessionSupervisor     one task per match, bounded mailbox   │
//! │    └─ SessionEngine    validation + resolution (sync)        │
//! │         └─ MatchState  towers, troops, turn, clock           │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ Events / StateUpdate / GameOver
//!                 ▼
//!           per-player outboxes (bounded, drop on timeout)
//! ```
//!
//! ## Design Principles
//!
//! 1. **One mutator per match** - only the supervisor task touches a
//!    `MatchState`, so no locks guard match data
//! 2. **Rejection is free** - a refused action changes nothing
//! 3. **Deterministic** - same seed, same commands, same match
//! 4. **Persistence at the edge** - stores sit behind traits
//!
//! ## Example
//!
//! ```rust,ignore
//! let store = Arc::new(MemoryAccounts::new().with_account("alice", "pw"));
//! let catalog = Arc::new(config.load_catalog()?);
//! let (lobby, reports) = Lobby::spawn(store.clone(), store, catalog, config);
//!
//! lobby.login("alice", "pw").await?;
//! let ticket = lobby.join_queue("alice", outbox_tx).await?;
//! let assignment = ticket.wait().await?;
//! assignment.session.submit(assignment.seat, command).await?;
//! ```

#![deny(unsafe_code)]

pub mod accounts;
pub mod config;
pub mod engine;
pub mod error;
pub mod lobby;
pub mod session;

pub use accounts::{CredentialStore, MemoryAccounts, PlayerProfile, ProfileStore};
pub use config::ServerConfig;
pub use engine::{ActionOutcome, MatchPlayer, MatchRules, PlayerAction, SessionEngine, TerminalResult};
pub use error::{
    ConfigError, ConfigResult, EngineError, EngineResult, LobbyError, LobbyResult, SessionError,
    SessionResult, StoreError, StoreResult,
};
pub use lobby::{Lobby, LobbyHandle, MatchAssignment, MatchTicket};
pub use session::{PlayerSettlement, SessionHandle, SessionReport, SessionSeat, SessionSupervisor};
