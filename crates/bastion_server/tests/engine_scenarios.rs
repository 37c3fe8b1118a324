//! End-to-end engine scenarios, driven through the public `SessionEngine` API.

use std::sync::Arc;

use bastion_rules::{LevelState, UnitCatalog};
use bastion_server::engine::state::MatchState;
use bastion_server::session::settlement;
use bastion_server::{EngineError, MatchPlayer, MatchRules, PlayerAction, SessionEngine, TerminalResult};
use bastion_shared::{EndReason, EventKind, MatchId, MatchPhase, PlayerIndex, TowerId, TowerSlot, UnitId};

const P0: PlayerIndex = PlayerIndex::P0;
const P1: PlayerIndex = PlayerIndex::P1;

fn catalog() -> Arc<UnitCatalog> {
    Arc::new(UnitCatalog::standard().expect("standard catalog"))
}

fn started(seed: u64) -> SessionEngine {
    let mut engine = SessionEngine::new(
        MatchId::numbered(1),
        [MatchPlayer::new("alice", 1), MatchPlayer::new("bob", 1)],
        catalog(),
        MatchRules::default(),
        seed,
    )
    .expect("engine");
    engine.start().expect("start");
    engine
}

fn deploy(unit: &str) -> PlayerAction {
    PlayerAction::Deploy { unit: UnitId::from(unit) }
}

fn first_offer(engine: &SessionEngine, player: PlayerIndex) -> PlayerAction {
    PlayerAction::Deploy { unit: engine.offer(player)[0].clone() }
}

fn guard1(owner: PlayerIndex) -> TowerId {
    TowerId::new(owner, TowerSlot::Guard1)
}

/// Deploys the hardest-hitting troop on offer.
fn strongest_offer(engine: &SessionEngine, player: PlayerIndex) -> PlayerAction {
    let unit = engine
        .offer(player)
        .iter()
        .max_by_key(|id| engine.catalog().troop(id).map_or(0, |spec| spec.atk))
        .cloned()
        .expect("offer is never empty on the mover's turn");
    PlayerAction::Deploy { unit }
}

/// Plays strongest-offer bots until the match ends, calling `check` after every action.
fn play_out(engine: &mut SessionEngine, mut check: impl FnMut(PlayerIndex, &MatchState, &MatchState)) -> TerminalResult {
    for _ in 0..1_000 {
        let Some(mover) = engine.current_turn() else { break };
        let before = engine.state().clone();
        let action = strongest_offer(engine, mover);
        let outcome = engine.submit_action(mover, action).expect("bot action accepted");
        check(mover, &before, engine.state());
        if let Some(result) = outcome.terminal {
            return result;
        }
    }
    panic!("match did not finish");
}

#[test]
fn test_scenario_a_single_attack_passes_turn() {
    let mut engine = started(11);
    let pawn = engine.catalog().troop(&UnitId::from("pawn")).expect("pawn").clone();
    engine.test_state_mut().test_place_troop(P0, &pawn, Some(guard1(P1)));

    let action = first_offer(&engine, P0);
    let outcome = engine.submit_action(P0, action).expect("accepted");

    let attacks: Vec<_> = outcome.events.iter().filter(|e| e.kind == EventKind::Attack).collect();
    assert_eq!(attacks.len(), 1);
    assert!(attacks[0].message.contains("for 50 damage"));
    assert_eq!(engine.state().tower(guard1(P1)).map(|t| t.hp), Some(950));
    assert_eq!(engine.current_turn(), Some(P1));
}

#[test]
fn test_scenario_b_kill_and_retarget_in_one_action() {
    let mut engine = started(12);
    let knight = engine.catalog().troop(&UnitId::from("knight")).expect("knight").clone();
    let state = engine.test_state_mut();
    state.test_set_tower_hp(guard1(P1), 40);
    state.test_place_troop(P0, &knight, Some(guard1(P1)));

    let action = first_offer(&engine, P0);
    let outcome = engine.submit_action(P0, action).expect("accepted");

    let count = |kind| outcome.events.iter().filter(|e| e.kind == kind).count();
    assert_eq!(count(EventKind::Attack), 2);
    assert_eq!(count(EventKind::TowerDestroyed), 1);
    assert!(count(EventKind::Retarget) >= 1);
    let guard2 = engine.state().tower(TowerId::new(P1, TowerSlot::Guard2)).expect("guard-2");
    assert_eq!(guard2.hp, 800);
}

#[test]
fn test_scenario_c_actor_towers_never_lose_hp() {
    let mut engine = started(13);
    let result = play_out(&mut engine, |mover, before, after| {
        for tower in after.towers_of(mover) {
            let prior = before.tower(tower.id).map_or(0, |t| t.hp);
            assert!(tower.hp >= prior, "{} lost HP on its owner's action", tower.id);
        }
        for tower in after.towers.values() {
            assert!(tower.hp <= tower.max_hp);
        }
    });
    assert_eq!(result.reason, EndReason::KingDestroyed);
}

#[test]
fn test_scenario_d_heal_lowest_percentage() {
    let mut engine = started(14);
    let state = engine.test_state_mut();
    state.test_set_tower_hp(guard1(P0), 100);
    state.test_set_tower_hp(TowerId::new(P0, TowerSlot::King), 1600);
    state.player_mut(P0).offer = vec![UnitId::from("queen")];

    let outcome = engine.submit_action(P0, deploy("queen")).expect("accepted");

    assert!(outcome.events.iter().any(|e| e.kind == EventKind::Heal));
    assert_eq!(engine.state().tower(guard1(P0)).map(|t| t.hp), Some(400));
    assert_eq!(engine.state().tower(TowerId::new(P0, TowerSlot::King)).map(|t| t.hp), Some(1600));
    assert_eq!(engine.state().troops_of(P0).count(), 0);
}

#[test]
fn test_guard1_alive_means_guard1_targeted() {
    let mut engine = started(15);
    for _ in 0..20 {
        let Some(mover) = engine.current_turn() else { break };
        let action = first_offer(&engine, mover);
        let outcome = engine.submit_action(mover, action).expect("accepted");
        if outcome.terminal.is_some() {
            break;
        }
        let state = engine.state();
        for troop in state.troops.values() {
            let enemy_g1 = guard1(troop.owner.other());
            if state.tower(enemy_g1).is_some_and(|t| t.is_alive()) {
                assert_eq!(troop.target, Some(enemy_g1));
            }
        }
    }
}

#[test]
fn test_same_seed_same_match() {
    let mut a = started(99);
    let mut b = started(99);
    let ra = play_out(&mut a, |_, _, _| {});
    let rb = play_out(&mut b, |_, _, _| {});
    assert_eq!(ra, rb);
    assert_eq!(a.state(), b.state());
}

#[test]
fn test_rejection_is_idempotent() {
    let mut engine = started(16);
    let before = engine.state().clone();
    let first = engine.submit_action(P1, deploy("pawn")).unwrap_err();
    let second = engine.submit_action(P1, deploy("pawn")).unwrap_err();
    assert_eq!(first, EngineError::NotYourTurn { player: P1, current: P0 });
    assert_eq!(first, second);
    assert_eq!(engine.state(), &before);
}

#[test]
fn test_winner_levels_up_with_carry() {
    let mut engine = started(17);
    let result = play_out(&mut engine, |_, _, _| {});
    let winner = result.winner.expect("king kill has a winner");
    assert_eq!(engine.phase(), MatchPhase::Finished);

    let settled = settlement::settle(engine.state(), result, [LevelState::NEW, LevelState::NEW]);
    let won = settled[winner.index()];
    // king (200) + win bonus (30) at least
    assert!(won.exp_earned >= 230);
    assert!(won.after.level >= 2);
    assert!(won.leveled_up());
    assert!(won.after.exp < bastion_rules::progression::exp_for_next_level(won.after.level));
}
