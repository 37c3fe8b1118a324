//! # Lobby
//!
//! Login gate, active-user registry and matchmaking queue, owned by one
//! task so that a username can never be logged in twice or queued twice.
//!
//! ```text
//! login ──► [active users] ──► join_queue ──► [FIFO] ──► pair ──► SessionSupervisor
//!                                                  first two waiting
//! ```
//!
//! Profiles are reloaded from the store when a pair is formed, so a player's
//! level reflects the settlement of their previous match. A player whose
//! match has not settled yet cannot queue again.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use bastion_rules::UnitCatalog;
use bastion_shared::{MatchId, PlayerIndex, ServerMessage};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::accounts::{CredentialStore, PlayerProfile, ProfileStore};
use crate::config::ServerConfig;
use crate::error::{LobbyError, LobbyResult};
use crate::session::{SessionHandle, SessionReport, SessionSeat, SessionSupervisor};

/// Where a paired player ended up.
#[derive(Clone, Debug)]
pub struct MatchAssignment {
    /// Match id.
    pub match_id: MatchId,
    /// The player's seat.
    pub seat: PlayerIndex,
    /// Handle for submitting commands.
    pub session: SessionHandle,
}

/// Resolves once the player is paired.
#[derive(Debug)]
pub struct MatchTicket {
    rx: oneshot::Receiver<LobbyResult<MatchAssignment>>,
}

impl MatchTicket {
    /// Waits for a pairing.
    ///
    /// # Errors
    ///
    /// `LeftQueue` after `leave_queue` or `logout`, `MatchSetup` if the
    /// match could not be created, `Closed` if the lobby is gone.
    pub async fn wait(self) -> LobbyResult<MatchAssignment> {
        self.rx.await.map_err(|_| LobbyError::Closed)?
    }
}

#[derive(Debug)]
enum LobbyRequest {
    Login {
        username: String,
        secret: String,
        reply: oneshot::Sender<LobbyResult<PlayerProfile>>,
    },
    JoinQueue {
        username: String,
        outbox: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<LobbyResult<MatchTicket>>,
    },
    LeaveQueue {
        username: String,
        reply: oneshot::Sender<bool>,
    },
    Logout {
        username: String,
        reply: oneshot::Sender<LobbyResult<()>>,
    },
}

/// Cloneable entry point into the lobby.
#[derive(Clone, Debug)]
pub struct LobbyHandle {
    tx: mpsc::Sender<LobbyRequest>,
}

impl LobbyHandle {
    /// Logs a user in.
    ///
    /// # Errors
    ///
    /// `EmptyCredentials`, `InvalidCredentials`, `AlreadyLoggedIn`.
    pub async fn login(&self, username: &str, secret: &str) -> LobbyResult<PlayerProfile> {
        let (reply, rx) = oneshot::channel();
        self.request(LobbyRequest::Login { username: username.to_owned(), secret: secret.to_owned(), reply })
            .await?;
        rx.await.map_err(|_| LobbyError::Closed)?
    }

    /// Enters the matchmaking queue. `outbox` receives the match's messages.
    ///
    /// # Errors
    ///
    /// `NotLoggedIn`, `AlreadyInMatch`, or `AlreadyQueued` (the existing
    /// entry is kept).
    pub async fn join_queue(&self, username: &str, outbox: mpsc::Sender<ServerMessage>) -> LobbyResult<MatchTicket> {
        let (reply, rx) = oneshot::channel();
        self.request(LobbyRequest::JoinQueue { username: username.to_owned(), outbox, reply })
            .await?;
        rx.await.map_err(|_| LobbyError::Closed)?
    }

    /// Leaves the queue. Returns whether the user was waiting.
    ///
    /// # Errors
    ///
    /// `Closed` if the lobby is gone.
    pub async fn leave_queue(&self, username: &str) -> LobbyResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(LobbyRequest::LeaveQueue { username: username.to_owned(), reply })
            .await?;
        rx.await.map_err(|_| LobbyError::Closed)
    }

    /// Logs out and leaves the queue.
    ///
    /// # Errors
    ///
    /// `NotLoggedIn`.
    pub async fn logout(&self, username: &str) -> LobbyResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(LobbyRequest::Logout { username: username.to_owned(), reply })
            .await?;
        rx.await.map_err(|_| LobbyError::Closed)?
    }

    async fn request(&self, request: LobbyRequest) -> LobbyResult<()> {
        self.tx.send(request).await.map_err(|_| LobbyError::Closed)
    }
}

struct Waiting {
    username: String,
    outbox: mpsc::Sender<ServerMessage>,
    reply: oneshot::Sender<LobbyResult<MatchAssignment>>,
}

/// The lobby task's state.
pub struct Lobby {
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<dyn ProfileStore>,
    catalog: Arc<UnitCatalog>,
    config: ServerConfig,
    active: HashSet<String>,
    in_match: HashMap<String, SessionHandle>,
    queue: VecDeque<Waiting>,
    matches_created: u64,
    sessions: Vec<JoinHandle<SessionReport>>,
}

impl Lobby {
    /// Spawns the lobby task.
    ///
    /// The task runs until every [`LobbyHandle`] is dropped, then waits for
    /// its matches to finish and returns their reports.
    #[must_use]
    pub fn spawn(
        credentials: Arc<dyn CredentialStore>,
        profiles: Arc<dyn ProfileStore>,
        catalog: Arc<UnitCatalog>,
        config: ServerConfig,
    ) -> (LobbyHandle, JoinHandle<Vec<SessionReport>>) {
        let (tx, rx) = mpsc::channel(config.mailbox_capacity.max(1));
        let lobby = Self {
            credentials,
            profiles,
            catalog,
            config,
            active: HashSet::new(),
            in_match: HashMap::new(),
            queue: VecDeque::new(),
            matches_created: 0,
            sessions: Vec::new(),
        };
        (LobbyHandle { tx }, tokio::spawn(lobby.run(rx)))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<LobbyRequest>) -> Vec<SessionReport> {
        while let Some(request) = rx.recv().await {
            self.handle(request);
        }
        debug!(matches = self.sessions.len(), "lobby closing, draining matches");
        for waiting in self.queue.drain(..) {
            let _ = waiting.reply.send(Err(LobbyError::Closed));
        }
        let mut reports = Vec::with_capacity(self.sessions.len());
        for task in self.sessions {
            match task.await {
                Ok(report) => reports.push(report),
                Err(err) => error!(%err, "session task failed"),
            }
        }
        reports
    }

    fn handle(&mut self, request: LobbyRequest) {
        match request {
            LobbyRequest::Login { username, secret, reply } => {
                let _ = reply.send(self.login(username, &secret));
            }
            LobbyRequest::JoinQueue { username, outbox, reply } => {
                let _ = reply.send(self.join_queue(username, outbox));
                self.pair();
            }
            LobbyRequest::LeaveQueue { username, reply } => {
                let _ = reply.send(self.leave_queue(&username));
            }
            LobbyRequest::Logout { username, reply } => {
                let _ = reply.send(self.logout(&username));
            }
        }
    }

    fn login(&mut self, username: String, secret: &str) -> LobbyResult<PlayerProfile> {
        if username.is_empty() || secret.is_empty() {
            return Err(LobbyError::EmptyCredentials);
        }
        if self.active.contains(&username) {
            warn!(%username, "duplicate login refused");
            return Err(LobbyError::AlreadyLoggedIn(username));
        }
        let profile = self.credentials.authenticate(&username, secret).map_err(|err| {
            info!(%username, %err, "login failed");
            LobbyError::from(err)
        })?;
        info!(%username, level = profile.progress.level, "logged in");
        self.active.insert(username);
        Ok(profile)
    }

    fn join_queue(&mut self, username: String, outbox: mpsc::Sender<ServerMessage>) -> LobbyResult<MatchTicket> {
        if !self.active.contains(&username) {
            return Err(LobbyError::NotLoggedIn(username));
        }
        if self.in_match.get(&username).is_some_and(|session| !session.is_settled()) {
            return Err(LobbyError::AlreadyInMatch(username));
        }
        self.in_match.remove(&username);
        if self.queue.iter().any(|w| w.username == username) {
            return Err(LobbyError::AlreadyQueued(username));
        }
        let (reply, rx) = oneshot::channel();
        debug!(%username, waiting = self.queue.len() + 1, "queued");
        self.queue.push_back(Waiting { username, outbox, reply });
        Ok(MatchTicket { rx })
    }

    fn leave_queue(&mut self, username: &str) -> bool {
        let Some(pos) = self.queue.iter().position(|w| w.username == username) else {
            return false;
        };
        if let Some(waiting) = self.queue.remove(pos) {
            let _ = waiting.reply.send(Err(LobbyError::LeftQueue));
        }
        debug!(%username, "left queue");
        true
    }

    fn logout(&mut self, username: &str) -> LobbyResult<()> {
        if !self.active.remove(username) {
            return Err(LobbyError::NotLoggedIn(username.to_owned()));
        }
        self.leave_queue(username);
        info!(%username, "logged out");
        Ok(())
    }

    fn pair(&mut self) {
        while self.queue.len() >= 2 {
            let (Some(first), Some(second)) = (self.queue.pop_front(), self.queue.pop_front()) else {
                break;
            };
            self.start_match(first, second);
        }
    }

    fn start_match(&mut self, first: Waiting, second: Waiting) {
        self.matches_created += 1;
        let match_id = MatchId::numbered(self.matches_created);

        let loaded = self
            .profiles
            .load(&first.username)
            .and_then(|a| self.profiles.load(&second.username).map(|b| (a, b)));
        let (p0, p1) = match loaded {
            Ok(pair) => pair,
            Err(err) => {
                error!(%match_id, %err, "profile load failed at pairing");
                Self::refuse([first, second], &LobbyError::MatchSetup(err.to_string()));
                return;
            }
        };

        let seats = [
            SessionSeat { profile: p0, outbox: first.outbox },
            SessionSeat { profile: p1, outbox: second.outbox },
        ];
        match SessionSupervisor::spawn(match_id.clone(), seats, self.catalog.clone(), &self.config, self.profiles.clone()) {
            Ok((session, task)) => {
                info!(%match_id, p0 = %first.username, p1 = %second.username, "match paired");
                self.sessions.push(task);
                self.in_match.insert(first.username.clone(), session.clone());
                self.in_match.insert(second.username.clone(), session.clone());
                let _ = first.reply.send(Ok(MatchAssignment {
                    match_id: match_id.clone(),
                    seat: PlayerIndex::P0,
                    session: session.clone(),
                }));
                let _ = second.reply.send(Ok(MatchAssignment { match_id, seat: PlayerIndex::P1, session }));
            }
            Err(err) => {
                error!(%match_id, %err, "match setup failed");
                let refusal = LobbyError::MatchSetup(err.to_string());
                let _ = first.reply.send(Err(refusal.clone()));
                let _ = second.reply.send(Err(refusal));
            }
        }
    }

    fn refuse(waiting: [Waiting; 2], why: &LobbyError) {
        for w in waiting {
            let _ = w.reply.send(Err(why.clone()));
        }
    }
}
