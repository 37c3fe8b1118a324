//! # Session Layer
//!
//! The concurrency shell around one [`crate::engine::SessionEngine`]:
//!
//! - [`supervisor`]: the per-match task and its handle
//! - [`outbox`]: bounded per-player delivery
//! - [`settlement`]: EXP and level changes at match end

pub mod outbox;
pub mod settlement;
pub mod supervisor;

pub use outbox::{Delivery, PlayerOutbox};
pub use settlement::PlayerSettlement;
pub use supervisor::{SessionHandle, SessionReport, SessionSeat, SessionSupervisor};
