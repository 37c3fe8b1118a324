//! # Player Outbox
//!
//! Bounded delivery to one player.
//!
//! ```text
//! supervisor ──send──► [ mpsc, capacity N ] ──► connection task ──► socket
//!                  │
//!                  └─ full for longer than the timeout? drop + warn
//! ```
//!
//! A stalled client can delay its own match by at most one timeout per
//! message, and broadcasts go to both seats concurrently, so the other
//! player's copy is never held up behind it.

use std::time::Duration;

use bastion_shared::{MatchId, PlayerIndex, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What happened to one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the player.
    Delivered,
    /// Timed out on a full queue.
    Dropped,
    /// Receiver is gone.
    Closed,
}

/// Creates an outbox channel. The receiver belongs to the player's connection.
#[must_use]
pub fn channel(capacity: usize) -> (mpsc::Sender<ServerMessage>, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(capacity.max(1))
}

/// Sending half held by the supervisor.
#[derive(Debug)]
pub struct PlayerOutbox {
    match_id: MatchId,
    seat: PlayerIndex,
    tx: mpsc::Sender<ServerMessage>,
    timeout: Duration,
    dropped: u64,
}

impl PlayerOutbox {
    /// Wraps a sender.
    #[must_use]
    pub const fn new(match_id: MatchId, seat: PlayerIndex, tx: mpsc::Sender<ServerMessage>, timeout: Duration) -> Self {
        Self { match_id, seat, tx, timeout, dropped: 0 }
    }

    /// Sends with a bounded wait.
    pub async fn send(&mut self, message: ServerMessage) -> Delivery {
        if self.tx.is_closed() {
            return Delivery::Closed;
        }
        let kind = message.name();
        match tokio::time::timeout(self.timeout, self.tx.send(message)).await {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(_)) => {
                debug!(match_id = %self.match_id, player = %self.seat, kind, "outbox closed");
                Delivery::Closed
            }
            Err(_) => {
                self.dropped += 1;
                warn!(
                    match_id = %self.match_id,
                    player = %self.seat,
                    kind,
                    dropped = self.dropped,
                    "outbox full, message dropped"
                );
                Delivery::Dropped
            }
        }
    }

    /// Has the player's side hung up?
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the player's side hangs up.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Messages dropped so far.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Sends `a` and `b` concurrently.
pub async fn send_both(
    outboxes: &mut [PlayerOutbox; 2],
    a: ServerMessage,
    b: ServerMessage,
) -> [Delivery; 2] {
    let [first, second] = outboxes;
    let (da, db) = tokio::join!(first.send(a), second.send(b));
    [da, db]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_shared::ErrorCode;

    fn msg() -> ServerMessage {
        ServerMessage::Error { code: ErrorCode::Internal, message: "x".into() }
    }

    #[tokio::test]
    async fn test_delivers_when_room() {
        let (tx, mut rx) = channel(4);
        let mut outbox = PlayerOutbox::new(MatchId::numbered(1), PlayerIndex::P0, tx, Duration::from_millis(10));
        assert_eq!(outbox.send(msg()).await, Delivery::Delivered);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_outbox_drops_after_timeout() {
        let (tx, _rx) = channel(1);
        let mut outbox = PlayerOutbox::new(MatchId::numbered(1), PlayerIndex::P0, tx, Duration::from_millis(20));
        assert_eq!(outbox.send(msg()).await, Delivery::Delivered);
        assert_eq!(outbox.send(msg()).await, Delivery::Dropped);
        assert_eq!(outbox.dropped(), 1);
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (tx, rx) = channel(1);
        drop(rx);
        let mut outbox = PlayerOutbox::new(MatchId::numbered(1), PlayerIndex::P1, tx, Duration::from_millis(20));
        assert!(outbox.is_closed());
        assert_eq!(outbox.send(msg()).await, Delivery::Closed);
    }

    #[tokio::test]
    async fn test_stalled_player_does_not_block_other() {
        let (stalled_tx, _stalled_rx) = channel(1);
        let (live_tx, mut live_rx) = channel(8);
        let timeout = Duration::from_millis(20);
        let mut outboxes = [
            PlayerOutbox::new(MatchId::numbered(1), PlayerIndex::P0, stalled_tx, timeout),
            PlayerOutbox::new(MatchId::numbered(1), PlayerIndex::P1, live_tx, timeout),
        ];
        for _ in 0..3 {
            send_both(&mut outboxes, msg(), msg()).await;
        }
        let mut received = 0;
        while live_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 3);
        assert_eq!(outboxes[0].dropped(), 2);
    }
}
