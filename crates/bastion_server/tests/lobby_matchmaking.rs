//! Login, queueing and pairing through the lobby task.

use std::sync::Arc;

use bastion_rules::{LevelState, UnitCatalog};
use bastion_server::session::outbox;
use bastion_server::{Lobby, LobbyError, LobbyHandle, MatchAssignment, MemoryAccounts, ServerConfig};
use bastion_shared::{MatchId, PlayerIndex, ServerMessage};
use tokio::sync::mpsc;

fn accounts() -> Arc<MemoryAccounts> {
    let store = MemoryAccounts::new();
    store.register("alice", "a", LevelState::new(1, 90));
    store.register("bob", "b", LevelState::NEW);
    store.register("carol", "c", LevelState::NEW);
    Arc::new(store)
}

fn lobby(store: &Arc<MemoryAccounts>) -> (LobbyHandle, tokio::task::JoinHandle<Vec<bastion_server::SessionReport>>) {
    let catalog = Arc::new(UnitCatalog::standard().expect("catalog"));
    Lobby::spawn(store.clone(), store.clone(), catalog, ServerConfig::default())
}

async fn queue(lobby: &LobbyHandle, username: &str) -> (bastion_server::MatchTicket, mpsc::Receiver<ServerMessage>) {
    let (tx, rx) = outbox::channel(64);
    let ticket = lobby.join_queue(username, tx).await.expect("queued");
    (ticket, rx)
}

async fn pair(lobby: &LobbyHandle, a: &str, b: &str) -> ([MatchAssignment; 2], [mpsc::Receiver<ServerMessage>; 2]) {
    let (ticket_a, rx_a) = queue(lobby, a).await;
    let (ticket_b, rx_b) = queue(lobby, b).await;
    let first = ticket_a.wait().await.expect("paired");
    let second = ticket_b.wait().await.expect("paired");
    ([first, second], [rx_a, rx_b])
}

async fn wait_game_over(rx: &mut mpsc::Receiver<ServerMessage>) {
    while let Some(message) = rx.recv().await {
        if matches!(message, ServerMessage::GameOver { .. }) {
            return;
        }
    }
    panic!("no GameOver");
}

#[tokio::test]
async fn test_first_two_waiting_are_paired() {
    let store = accounts();
    let (lobby, _task) = lobby(&store);
    for (user, secret) in [("alice", "a"), ("bob", "b"), ("carol", "c")] {
        lobby.login(user, secret).await.expect("login");
    }

    let ([a, b], _rx) = pair(&lobby, "alice", "bob").await;
    assert_eq!(a.match_id, MatchId::numbered(1));
    assert_eq!(a.match_id, b.match_id);
    assert_eq!((a.seat, b.seat), (PlayerIndex::P0, PlayerIndex::P1));

    // carol waits alone until she leaves
    let (ticket, _carol_rx) = queue(&lobby, "carol").await;
    assert!(lobby.leave_queue("carol").await.expect("leave"));
    assert_eq!(ticket.wait().await.unwrap_err(), LobbyError::LeftQueue);
}

#[tokio::test]
async fn test_second_match_sees_settled_level() {
    let store = accounts();
    let (lobby, _task) = lobby(&store);
    lobby.login("alice", "a").await.expect("login");
    lobby.login("bob", "b").await.expect("login");

    let ([a, _b], [mut rx_a, _rx_b]) = pair(&lobby, "alice", "bob").await;
    a.session.forfeit(PlayerIndex::P1).await.expect("bob concedes");
    wait_game_over(&mut rx_a).await;
    // 90 + 30 crosses the 100 EXP threshold
    assert_eq!(
        store_progress(&store, "alice"),
        LevelState::new(2, 20)
    );

    let ([a2, _], _rx) = pair(&lobby, "alice", "bob").await;
    assert_eq!(a2.match_id, MatchId::numbered(2));
    let snapshot = a2.session.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.players[a2.seat.index()].level, 2);
}

#[tokio::test]
async fn test_unsettled_player_cannot_queue_again() {
    let store = accounts();
    let (lobby, _task) = lobby(&store);
    for (user, secret) in [("alice", "a"), ("bob", "b"), ("carol", "c")] {
        lobby.login(user, secret).await.expect("login");
    }

    let ([bob, _carol], [mut rx_bob, _rx_carol]) = pair(&lobby, "bob", "carol").await;
    let (tx, _rx) = outbox::channel(64);
    assert_eq!(
        lobby.join_queue("bob", tx).await.unwrap_err(),
        LobbyError::AlreadyInMatch("bob".into())
    );

    bob.session.forfeit(PlayerIndex::P1).await.expect("carol concedes");
    wait_game_over(&mut rx_bob).await;

    // settled, so bob may play again and both wins are kept
    let ([bob, _alice], [mut rx_bob, _rx_alice]) = pair(&lobby, "bob", "alice").await;
    bob.session.forfeit(PlayerIndex::P1).await.expect("alice concedes");
    wait_game_over(&mut rx_bob).await;
    assert_eq!(store_progress(&store, "bob"), LevelState::new(1, 60));
}

#[tokio::test]
async fn test_logout_frees_username_and_queue_slot() {
    let store = accounts();
    let (lobby, _task) = lobby(&store);
    lobby.login("bob", "b").await.expect("login");
    let (ticket, _rx) = queue(&lobby, "bob").await;

    lobby.logout("bob").await.expect("logout");
    assert_eq!(ticket.wait().await.unwrap_err(), LobbyError::LeftQueue);
    assert_eq!(lobby.logout("bob").await.unwrap_err(), LobbyError::NotLoggedIn("bob".into()));
    lobby.login("bob", "b").await.expect("login again");
}

#[tokio::test]
async fn test_dropping_lobby_returns_reports() {
    let store = accounts();
    let (lobby, task) = lobby(&store);
    lobby.login("alice", "a").await.expect("login");
    lobby.login("bob", "b").await.expect("login");
    let ([a, _], _rx) = pair(&lobby, "alice", "bob").await;
    a.session.forfeit(PlayerIndex::P0).await.expect("forfeit");
    drop(a);
    drop(lobby);

    let reports = task.await.expect("join");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].result.winner, Some(PlayerIndex::P1));
}

fn store_progress(store: &MemoryAccounts, username: &str) -> LevelState {
    use bastion_server::ProfileStore;
    store.load(username).map(|p| p.progress).expect("profile")
}
