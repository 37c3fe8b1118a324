//! Supervisor behaviour seen from the players' outboxes.

use std::sync::Arc;

use bastion_rules::{LevelState, UnitCatalog};
use bastion_server::session::outbox;
use bastion_server::{
    EngineError, MemoryAccounts, ProfileStore, ServerConfig, SessionError, SessionHandle,
    SessionReport, SessionSeat, SessionSupervisor,
};
use bastion_shared::{
    ClientCommand, EndReason, ErrorCode, MatchId, MatchModeKind, PlayerIndex, ServerMessage, UnitId,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const P0: PlayerIndex = PlayerIndex::P0;
const P1: PlayerIndex = PlayerIndex::P1;

struct Match {
    handle: SessionHandle,
    task: JoinHandle<SessionReport>,
    rx: [mpsc::Receiver<ServerMessage>; 2],
    store: Arc<MemoryAccounts>,
}

fn spawn_with(config: &ServerConfig, capacities: [usize; 2]) -> Match {
    let store = Arc::new(MemoryAccounts::new().with_account("alice", "a").with_account("bob", "b"));
    let (tx0, rx0) = outbox::channel(capacities[0]);
    let (tx1, rx1) = outbox::channel(capacities[1]);
    let seats = [
        SessionSeat { profile: store.load("alice").expect("alice"), outbox: tx0 },
        SessionSeat { profile: store.load("bob").expect("bob"), outbox: tx1 },
    ];
    let catalog = Arc::new(UnitCatalog::standard().expect("catalog"));
    let (handle, task) = SessionSupervisor::spawn(MatchId::numbered(1), seats, catalog, config, store.clone())
        .expect("spawn");
    Match { handle, task, rx: [rx0, rx1], store }
}

fn spawn(config: &ServerConfig) -> Match {
    spawn_with(config, [config.outbox_capacity; 2])
}

fn realtime(duration_secs: u64) -> ServerConfig {
    ServerConfig {
        mode: MatchModeKind::RealTime,
        match_duration_secs: duration_secs,
        tick_interval_ms: 100,
        outbox_capacity: 1024,
        ..ServerConfig::default()
    }
}

async fn next(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    rx.recv().await.expect("outbox open")
}

/// Reads the start sequence and returns P0's first offer.
async fn drain_start(m: &mut Match) -> Vec<UnitId> {
    let [rx0, rx1] = &mut m.rx;
    assert!(matches!(next(rx0).await, ServerMessage::GameStart { .. }));
    assert!(matches!(next(rx0).await, ServerMessage::StateUpdate { .. }));
    let offer = match next(rx0).await {
        ServerMessage::TroopOffer { offer } => offer.units,
        other => panic!("expected offer, got {other:?}"),
    };
    assert!(matches!(next(rx1).await, ServerMessage::GameStart { .. }));
    assert!(matches!(next(rx1).await, ServerMessage::StateUpdate { .. }));
    offer
}

async fn game_over(rx: &mut mpsc::Receiver<ServerMessage>) -> bastion_shared::GameOverPayload {
    while let Some(message) = rx.recv().await {
        if let ServerMessage::GameOver { result } = message {
            return result;
        }
    }
    panic!("outbox closed without GameOver");
}

#[tokio::test]
async fn test_accepted_action_message_order() {
    let mut m = spawn(&ServerConfig::default());
    let offer = drain_start(&mut m).await;

    m.handle
        .submit(P0, ClientCommand::Deploy { unit: offer[0].clone() })
        .await
        .expect("accepted");

    let [rx0, rx1] = &mut m.rx;
    assert!(matches!(next(rx0).await, ServerMessage::Events { .. }));
    match next(rx0).await {
        ServerMessage::StateUpdate { snapshot } => {
            assert_eq!(snapshot.current_turn, Some(P1));
            assert!(snapshot.offer.is_empty());
        }
        other => panic!("expected state, got {other:?}"),
    }
    assert!(matches!(next(rx0).await, ServerMessage::TurnChange { current: P1, your_turn: false }));

    assert!(matches!(next(rx1).await, ServerMessage::Events { .. }));
    match next(rx1).await {
        ServerMessage::StateUpdate { snapshot } => assert_eq!(snapshot.offer.len(), 3),
        other => panic!("expected state, got {other:?}"),
    }
    assert!(matches!(next(rx1).await, ServerMessage::TurnChange { current: P1, your_turn: true }));
    match next(rx1).await {
        ServerMessage::TroopOffer { offer } => assert_eq!(offer.player, P1),
        other => panic!("expected offer, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions_one_wins() {
    let mut m = spawn(&ServerConfig::default());
    let offer = drain_start(&mut m).await;
    let command = ClientCommand::Deploy { unit: offer[0].clone() };

    let (a, b) = tokio::join!(
        m.handle.submit(P0, command.clone()),
        m.handle.submit(P0, command)
    );
    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(SessionError::Rejected(EngineError::NotYourTurn { player: P0, current: P1 }))
    )));

    // Accepted action's StateUpdate precedes the rejection's Error.
    let rx0 = &mut m.rx[0];
    let kinds: Vec<&str> = [next(rx0).await, next(rx0).await, next(rx0).await, next(rx0).await]
        .iter()
        .map(ServerMessage::name)
        .collect();
    assert_eq!(kinds, ["events", "state_update", "turn_change", "error"]);
}

#[tokio::test]
async fn test_rejected_deploy_reports_code() {
    let mut m = spawn(&ServerConfig::default());
    drain_start(&mut m).await;

    let err = m
        .handle
        .submit(P0, ClientCommand::Deploy { unit: UnitId::from("dragon") })
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Rejected(EngineError::InvalidTroop { .. })));
    assert!(matches!(
        next(&mut m.rx[0]).await,
        ServerMessage::Error { code: ErrorCode::InvalidTroop, .. }
    ));
    assert!(m.rx[1].try_recv().is_err());
}

#[tokio::test]
async fn test_forfeit_persists_both_profiles() {
    let mut m = spawn(&ServerConfig::default());
    drain_start(&mut m).await;
    m.handle.forfeit(P0).await.expect("forfeit");

    let p0 = game_over(&mut m.rx[0]).await;
    let p1 = game_over(&mut m.rx[1]).await;
    assert_eq!((p0.winner, p0.reason), (Some(P1), EndReason::Forfeit));
    assert_eq!(p0.exp_earned, 0);
    assert_eq!(p1.exp_earned, 30);
    assert_eq!(p1.new_total_exp, 30);

    let report = m.task.await.expect("join");
    assert!(report.persistence_errors.is_empty());
    assert_eq!(m.store.save_count(), 2);
    assert_eq!(m.store.load("bob").map(|p| p.progress.exp), Ok(30));

    // Session is gone once settled.
    assert_eq!(m.handle.snapshot().await.unwrap_err(), SessionError::Closed);
}

#[tokio::test]
async fn test_disconnect_is_forfeit_with_reason() {
    let mut m = spawn(&ServerConfig::default());
    drain_start(&mut m).await;
    m.handle.disconnect(P1).await.expect("sent");

    let payload = game_over(&mut m.rx[0]).await;
    assert_eq!((payload.winner, payload.reason), (Some(P0), EndReason::Disconnect));
    let report = m.task.await.expect("join");
    assert_eq!(report.result.reason, EndReason::Disconnect);
}

#[tokio::test]
async fn test_stalled_outbox_does_not_block_opponent() {
    let config = ServerConfig { outbox_send_timeout_ms: 20, ..ServerConfig::default() };
    // p0 never reads and has room for one message
    let mut m = spawn_with(&config, [1, 64]);

    let rx1 = &mut m.rx[1];
    assert!(matches!(next(rx1).await, ServerMessage::GameStart { .. }));
    assert!(matches!(next(rx1).await, ServerMessage::StateUpdate { .. }));

    m.handle.forfeit(P1).await.expect("forfeit");
    let payload = game_over(&mut m.rx[1]).await;
    assert_eq!(payload.winner, Some(P0));

    let report = m.task.await.expect("join");
    assert!(report.messages_dropped > 0);
}

#[tokio::test(start_paused = true)]
async fn test_realtime_insufficient_mana() {
    let mut m = spawn(&realtime(30));
    let err = m
        .handle
        .submit(P0, ClientCommand::Deploy { unit: UnitId::from("prince") })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::Rejected(EngineError::InsufficientResource { required: 6, available: 5 })
    );
    m.handle
        .submit(P0, ClientCommand::Deploy { unit: UnitId::from("pawn") })
        .await
        .expect("pawn is affordable");
    m.handle.forfeit(P1).await.expect("forfeit");
    let payload = game_over(&mut m.rx[0]).await;
    assert_eq!(payload.winner, Some(P0));
}

#[tokio::test(start_paused = true)]
async fn test_realtime_deadline_draw_pays_both() {
    let mut m = spawn(&realtime(3));

    let p0 = game_over(&mut m.rx[0]).await;
    let p1 = game_over(&mut m.rx[1]).await;
    for payload in [&p0, &p1] {
        assert_eq!(payload.reason, EndReason::TimeExpired);
        assert_eq!(payload.winner, None);
        assert_eq!(payload.exp_earned, bastion_rules::DRAW_BONUS_EXP);
    }
    let report = m.task.await.expect("join");
    assert_eq!(report.actions_accepted, 0);
}

#[tokio::test]
async fn test_settled_profile_feeds_next_match() {
    let mut m = spawn(&ServerConfig::default());
    drain_start(&mut m).await;
    m.handle.forfeit(P1).await.expect("forfeit");
    m.task.await.expect("join");

    let alice = m.store.load("alice").expect("alice");
    assert_eq!(alice.progress, LevelState::new(1, 30));
}
