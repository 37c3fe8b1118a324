//! # Bastion Shared
//!
//! Common types used by both client and server.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `tokio`
//! - `bastion_rules`
//! - Anything that mutates match state
//!
//! Clients only ever see what is in here: identifiers, the closed set of
//! commands they may send, and the messages the server sends back.

#![deny(unsafe_code)]

pub mod ids;
pub mod protocol;

pub use ids::{MatchId, PlayerIndex, TowerId, TowerSlot, TroopId, UnitId};
pub use protocol::{
    ClientCommand, EndReason, ErrorCode, EventKind, GameEvent, GameOverPayload, MatchModeKind, MatchPhase,
    MatchSnapshot, PlayerView, ServerMessage, TowerView, TroopOffer, TroopView,
};
