//! # Session Supervisor
//!
//! One tokio task per match. The task owns the [`SessionEngine`]; every
//! other party talks to it through a [`SessionHandle`].
//!
//! ```text
//!  conn p0 ──┐                        ┌──► outbox p0
//!            ├─► mailbox ─► task ─────┤
//!  conn p1 ──┘   (bounded)   │        └──► outbox p1
//!                            │
//!                 tick (real-time only)
//! ```
//!
//! ## Ordering
//!
//! Commands are handled one at a time. A command's reply is sent only after
//! its messages are queued on both outboxes, so the next command always
//! sees (and produces) state after the previous one.
//!
//! | trigger          | messages                                             |
//! |------------------|------------------------------------------------------|
//! | start            | `GameStart`, `StateUpdate`, `TroopOffer` (mover)      |
//! | accepted action  | `Events`, `StateUpdate`, `TurnChange`, `TroopOffer`  |
//! | rejected action  | `Error` (offender only)                              |
//! | tick             | `Events` (if any), `StateUpdate`                     |
//! | match over       | `GameOver` (per player)                              |

use std::sync::Arc;
use std::time::Duration;

use bastion_rules::{LevelState, UnitCatalog};
use bastion_shared::{
    ClientCommand, EndReason, MatchId, MatchModeKind, MatchPhase, MatchSnapshot, PlayerIndex,
    ServerMessage, TroopOffer,
};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::outbox::{send_both, PlayerOutbox};
use super::settlement::{self, PlayerSettlement};
use crate::accounts::{PlayerProfile, ProfileStore};
use crate::config::ServerConfig;
use crate::engine::{ActionOutcome, MatchPlayer, PlayerAction, SessionEngine, TerminalResult};
use crate::error::{EngineError, EngineResult, SessionError, SessionResult, StoreError};

// ============================================================================
// HANDLE
// ============================================================================

#[derive(Debug)]
enum SessionCommand {
    Submit {
        player: PlayerIndex,
        command: ClientCommand,
        reply: oneshot::Sender<SessionResult<()>>,
    },
    Disconnect {
        player: PlayerIndex,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
}

/// Cloneable entry point into one match.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    match_id: MatchId,
    tx: mpsc::Sender<SessionCommand>,
    settled: watch::Receiver<bool>,
}

impl SessionHandle {
    /// Match this handle drives.
    #[must_use]
    pub const fn match_id(&self) -> &MatchId {
        &self.match_id
    }

    /// Has settlement been persisted? Also true if the task is gone.
    ///
    /// Flips before `GameOver` is queued, so a player who has seen
    /// `GameOver` always observes `true`.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        *self.settled.borrow() || self.settled.has_changed().is_err()
    }

    /// Submits a command and waits until it is resolved and broadcast.
    ///
    /// # Errors
    ///
    /// `Rejected` with the engine's reason, `Closed` if the match is gone.
    pub async fn submit(&self, player: PlayerIndex, command: ClientCommand) -> SessionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Submit { player, command, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Concedes the match.
    ///
    /// # Errors
    ///
    /// As [`Self::submit`].
    pub async fn forfeit(&self, player: PlayerIndex) -> SessionResult<()> {
        self.submit(player, ClientCommand::Forfeit).await
    }

    /// Reports a lost connection. The match ends in the opponent's favour.
    ///
    /// # Errors
    ///
    /// `Closed` if the match is already gone.
    pub async fn disconnect(&self, player: PlayerIndex) -> SessionResult<()> {
        self.tx
            .send(SessionCommand::Disconnect { player })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Spectator view of the current state.
    ///
    /// # Errors
    ///
    /// `Closed` if the match is gone.
    pub async fn snapshot(&self) -> SessionResult<MatchSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// A player entering a match.
#[derive(Debug)]
pub struct SessionSeat {
    /// Profile as loaded at pairing time.
    pub profile: PlayerProfile,
    /// Where this player's messages go.
    pub outbox: mpsc::Sender<ServerMessage>,
}

/// What the supervisor task returns when the match is over.
#[derive(Debug)]
pub struct SessionReport {
    /// Match id.
    pub match_id: MatchId,
    /// Final result.
    pub result: TerminalResult,
    /// Per-seat settlement.
    pub settlements: [PlayerSettlement; 2],
    /// Profiles that failed to save.
    pub persistence_errors: Vec<(PlayerIndex, StoreError)>,
    /// Actions the engine accepted.
    pub actions_accepted: u64,
    /// Outbound messages dropped on full outboxes.
    pub messages_dropped: u64,
}

// ============================================================================
// SUPERVISOR
// ============================================================================

/// Owner of one match.
pub struct SessionSupervisor {
    engine: SessionEngine,
    profiles: [PlayerProfile; 2],
    outboxes: [PlayerOutbox; 2],
    store: Arc<dyn ProfileStore>,
    rx: mpsc::Receiver<SessionCommand>,
    settled: watch::Sender<bool>,
    tick_interval: Duration,
    actions_accepted: u64,
}

impl SessionSupervisor {
    /// Creates the engine and spawns the supervisor task.
    ///
    /// # Errors
    ///
    /// `Configuration` if the catalog cannot field a match.
    pub fn spawn(
        match_id: MatchId,
        seats: [SessionSeat; 2],
        catalog: Arc<UnitCatalog>,
        config: &ServerConfig,
        store: Arc<dyn ProfileStore>,
    ) -> EngineResult<(SessionHandle, JoinHandle<SessionReport>)> {
        let [s0, s1] = seats;
        let players = [
            MatchPlayer::new(s0.profile.username.clone(), s0.profile.progress.level),
            MatchPlayer::new(s1.profile.username.clone(), s1.profile.progress.level),
        ];
        let seed = config.match_seed(&match_id);
        let engine = SessionEngine::new(match_id.clone(), players, catalog, config.match_rules(), seed)?;

        let timeout = config.outbox_send_timeout();
        let outboxes = [
            PlayerOutbox::new(match_id.clone(), PlayerIndex::P0, s0.outbox, timeout),
            PlayerOutbox::new(match_id.clone(), PlayerIndex::P1, s1.outbox, timeout),
        ];
        let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let (settled, settled_rx) = watch::channel(false);
        let supervisor = Self {
            engine,
            profiles: [s0.profile, s1.profile],
            outboxes,
            store,
            rx,
            settled,
            tick_interval: config.tick_interval(),
            actions_accepted: 0,
        };
        let task = tokio::spawn(supervisor.run());
        Ok((SessionHandle { match_id, tx, settled: settled_rx }, task))
    }

    async fn run(mut self) -> SessionReport {
        if let Err(err) = self.open().await {
            error!(match_id = %self.match_id(), %err, "match failed to start");
            self.engine.abort("start failed");
        }

        let realtime = self.engine.rules().mode == MatchModeKind::RealTime;
        let mut ticker = interval(self.tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            self.detect_hangups().await;
            if self.engine.phase() != MatchPhase::Running {
                break;
            }
            let [p0, p1] = &self.outboxes;
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        warn!(match_id = %self.match_id(), "every handle dropped");
                        self.engine.abort("every session handle dropped");
                    }
                },
                now = ticker.tick(), if realtime => {
                    let elapsed = now.saturating_duration_since(last_tick);
                    last_tick = now;
                    self.on_tick(elapsed).await;
                }
                // Hang-ups are handled at the top of the loop.
                () = p0.closed() => {}
                () = p1.closed() => {}
            }
        }

        self.settle().await
    }

    fn match_id(&self) -> &MatchId {
        &self.engine.state().match_id
    }

    async fn open(&mut self) -> EngineResult<()> {
        let events = self.engine.start()?;
        for event in &events {
            debug!(match_id = %self.match_id(), message = %event.message, "start");
        }
        let first_turn = self.engine.current_turn();
        let mode = self.engine.rules().mode;
        let [a, b] = PlayerIndex::BOTH.map(|seat| ServerMessage::GameStart {
            match_id: self.match_id().clone(),
            seat,
            opponent_name: self.profiles[seat.other().index()].username.clone(),
            mode,
            first_turn,
        });
        send_both(&mut self.outboxes, a, b).await;
        self.broadcast_state().await;
        if let Some(mover) = first_turn {
            self.send_offer(mover).await;
        }
        Ok(())
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit { player, command, reply } => {
                let result = self.submit(player, command).await;
                // Caller may have given up waiting; the action stands either way.
                let _ = reply.send(result);
            }
            SessionCommand::Disconnect { player } => self.disconnect(player).await,
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.engine.snapshot());
            }
        }
    }

    async fn submit(&mut self, player: PlayerIndex, command: ClientCommand) -> SessionResult<()> {
        let result = match command {
            ClientCommand::Deploy { unit } => self.engine.submit_action(player, PlayerAction::Deploy { unit }),
            ClientCommand::Forfeit => self.engine.forfeit(player, EndReason::Forfeit),
        };
        match result {
            Ok(outcome) => {
                self.actions_accepted += 1;
                self.publish(outcome).await;
                Ok(())
            }
            Err(err) => {
                self.reject(player, &err).await;
                Err(SessionError::Rejected(err))
            }
        }
    }

    async fn reject(&mut self, player: PlayerIndex, err: &EngineError) {
        if err.is_recoverable() {
            debug!(match_id = %self.match_id(), %player, %err, "action rejected");
        } else {
            error!(match_id = %self.match_id(), %player, %err, "action failed");
        }
        let message = ServerMessage::Error { code: err.code(), message: err.to_string() };
        self.outboxes[player.index()].send(message).await;
        if self.engine.phase() == MatchPhase::Finished {
            // Invariant abort: the opponent still needs to see the match end.
            self.broadcast_state().await;
        }
    }

    async fn disconnect(&mut self, player: PlayerIndex) {
        if self.engine.phase() != MatchPhase::Running {
            return;
        }
        info!(match_id = %self.match_id(), %player, "player disconnected");
        match self.engine.forfeit(player, EndReason::Disconnect) {
            Ok(outcome) => self.publish(outcome).await,
            Err(err) => debug!(match_id = %self.match_id(), %player, %err, "disconnect ignored"),
        }
    }

    async fn on_tick(&mut self, elapsed: Duration) {
        match self.engine.tick(elapsed) {
            Ok(outcome) => {
                if !outcome.events.is_empty() {
                    self.broadcast_events(outcome.events).await;
                }
                self.broadcast_state().await;
            }
            Err(err) => {
                error!(match_id = %self.match_id(), %err, "tick failed");
                self.broadcast_state().await;
            }
        }
    }

    /// A dropped receiver counts as a disconnect.
    async fn detect_hangups(&mut self) {
        for player in PlayerIndex::BOTH {
            if self.engine.phase() == MatchPhase::Running && self.outboxes[player.index()].is_closed() {
                self.disconnect(player).await;
            }
        }
    }

    // =========================================================================
    // FAN-OUT
    // =========================================================================

    async fn publish(&mut self, outcome: ActionOutcome) {
        self.broadcast_events(outcome.events).await;
        self.broadcast_state().await;
        if outcome.terminal.is_some() {
            return;
        }
        if let Some(current) = self.engine.current_turn() {
            let [a, b] = PlayerIndex::BOTH.map(|seat| ServerMessage::TurnChange {
                current,
                your_turn: seat == current,
            });
            send_both(&mut self.outboxes, a, b).await;
            self.send_offer(current).await;
        }
    }

    async fn broadcast_events(&mut self, events: Vec<bastion_shared::GameEvent>) {
        for event in &events {
            debug!(match_id = %self.match_id(), kind = ?event.kind, message = %event.message, "event");
        }
        let a = ServerMessage::Events { events: events.clone() };
        let b = ServerMessage::Events { events };
        send_both(&mut self.outboxes, a, b).await;
    }

    async fn broadcast_state(&mut self) {
        let [a, b] = PlayerIndex::BOTH.map(|seat| ServerMessage::StateUpdate {
            snapshot: self.engine.snapshot_for(seat),
        });
        send_both(&mut self.outboxes, a, b).await;
    }

    async fn send_offer(&mut self, player: PlayerIndex) {
        let offer = TroopOffer { player, units: self.engine.offer(player).to_vec() };
        self.outboxes[player.index()]
            .send(ServerMessage::TroopOffer { offer })
            .await;
    }

    // =========================================================================
    // SETTLEMENT
    // =========================================================================

    async fn settle(mut self) -> SessionReport {
        let result = match self.engine.result() {
            Some(result) => result,
            None => self.engine.abort("loop exited without a result"),
        };
        // Progress may have moved since pairing; settle on top of the stored record.
        let mut persistence_errors = Vec::new();
        let mut stale = [false; 2];
        for player in PlayerIndex::BOTH {
            let username = &self.profiles[player.index()].username;
            match self.store.load(username) {
                Ok(current) => self.profiles[player.index()] = current,
                Err(err) => {
                    error!(
                        match_id = %self.engine.state().match_id,
                        %player,
                        %username,
                        %err,
                        "failed to reload profile for settlement"
                    );
                    persistence_errors.push((player, err));
                    stale[player.index()] = true;
                }
            }
        }
        let progress: [LevelState; 2] = PlayerIndex::BOTH.map(|p| self.profiles[p.index()].progress);
        let settlements = settlement::settle(self.engine.state(), result, progress);

        for player in PlayerIndex::BOTH {
            let settled = settlements[player.index()];
            let profile = &mut self.profiles[player.index()];
            profile.progress = settled.after;
            if stale[player.index()] {
                continue;
            }
            if let Err(err) = self.store.save(profile) {
                error!(
                    match_id = %self.engine.state().match_id,
                    %player,
                    username = %profile.username,
                    %err,
                    "failed to persist settlement"
                );
                persistence_errors.push((player, err));
            }
            info!(
                match_id = %self.engine.state().match_id,
                %player,
                exp_earned = settled.exp_earned,
                level = settled.after.level,
                leveled_up = settled.leveled_up(),
                "player settled"
            );
        }
        self.settled.send_replace(true);

        let [a, b] = PlayerIndex::BOTH.map(|p| ServerMessage::GameOver {
            result: settlements[p.index()].payload(result),
        });
        send_both(&mut self.outboxes, a, b).await;

        SessionReport {
            match_id: self.engine.state().match_id.clone(),
            result,
            settlements,
            persistence_errors,
            actions_accepted: self.actions_accepted,
            messages_dropped: self.outboxes.iter().map(PlayerOutbox::dropped).sum(),
        }
    }
}
