//! # Attack Resolution
//!
//! The step functions that make up one action (turn-based) or one side of
//! a tick (real-time). Each works directly on the [`MatchState`] and
//! appends narration to the event log.
//!
//! ## Order
//!
//! ```text
//! 1. deploy            troop placed + initial target, or healer heals
//! 2. troop_attacks     older troops hit, kill, retarget, hit again
//! 3. winner?           king down ──► stop
//! 4. counterattacks    each hit tower strikes its last attacker once
//! 5. purge_dead        dead troops removed, back-references cleared
//! 6. winner?           king down ──► stop
//! ```
//!
//! [`attack_round`] runs 2 through 6. Counterattacks only ever touch
//! troops, so step 6 can only see a king that fell in step 2.

use bastion_rules::{combat, UnitSpec, HEAL_AMOUNT};
use bastion_shared::{EventKind, GameEvent, PlayerIndex, TowerId, TroopId};
use rand_chacha::ChaCha8Rng;

use super::state::MatchState;
use super::targeting::{resolve_target, select_target};
use crate::error::{EngineError, EngineResult};

/// Source of critical-hit rolls.
pub enum Crits<'r> {
    /// Turn-based: never crit.
    Disabled,
    /// Real-time: roll against each attacker's crit chance.
    Enabled(&'r mut ChaCha8Rng),
}

impl Crits<'_> {
    fn roll(&mut self) -> Option<f64> {
        match self {
            Self::Disabled => None,
            Self::Enabled(rng) => Some(combat::roll(&mut **rng)),
        }
    }
}

fn push(events: &mut Vec<GameEvent>, kind: EventKind, message: String) {
    events.push(GameEvent::now(kind, message));
}

fn damage_phrase(damage: u32, critical: bool) -> String {
    if critical {
        format!("{damage} critical damage")
    } else {
        format!("{damage} damage")
    }
}

// ============================================================================
// STEP 1 - DEPLOY
// ============================================================================

/// Deploys `spec` for `player`. The healer heals instead of spawning.
///
/// Returns the new troop's id, `None` for the healer.
pub fn deploy(
    state: &mut MatchState,
    player: PlayerIndex,
    spec: &UnitSpec,
    events: &mut Vec<GameEvent>,
) -> Option<TroopId> {
    let name = state.name(player).to_owned();
    push(events, EventKind::Deploy, format!("{name} deployed {}", spec.name));

    if spec.heal {
        heal_weakest_tower(state, player, &spec.name, events);
        return None;
    }

    let id = state.spawn_troop(player, spec);
    let defender = player.other();
    let target = select_target(&state.towers, defender);
    if let Some(troop) = state.troops.get_mut(&id) {
        troop.target = target;
    }
    let message = match target.and_then(|t| state.tower(t)) {
        Some(tower) => format!(
            "{name}'s {} is initially targeting {}'s {}",
            spec.name,
            state.name(defender),
            tower.name
        ),
        None => format!("{name}'s {} deployed but has no initial target.", spec.name),
    };
    push(events, EventKind::Retarget, message);
    Some(id)
}

/// Heals the living friendly tower with the lowest HP percentage.
///
/// Ties go to slot order. Returns the healed tower.
pub fn heal_weakest_tower(
    state: &mut MatchState,
    player: PlayerIndex,
    healer_name: &str,
    events: &mut Vec<GameEvent>,
) -> Option<TowerId> {
    // a/b < c/d  <=>  a*d < c*b
    let weakest = state
        .towers_of(player)
        .filter(|t| t.is_alive())
        .min_by(|a, b| {
            let lhs = u64::from(a.hp) * u64::from(b.max_hp);
            let rhs = u64::from(b.hp) * u64::from(a.max_hp);
            lhs.cmp(&rhs)
        })
        .map(|t| t.id)?;

    let name = state.name(player).to_owned();
    let tower = state.towers.get_mut(&weakest)?;
    let restored = tower.heal(HEAL_AMOUNT);
    push(
        events,
        EventKind::Heal,
        format!(
            "{name}'s {healer_name} healed {} for {restored} HP (HP: {}/{})",
            tower.name, tower.hp, tower.max_hp
        ),
    );
    Some(weakest)
}

// ============================================================================
// STEP 2 - TROOP ATTACKS
// ============================================================================

/// Every troop of `attacker` deployed before the current logical tick
/// attacks. A troop that destroys its target retargets and attacks again.
///
/// Returns the winner if a king fell; no further attacks happen after that.
///
/// # Errors
///
/// `InvariantViolation` if a troop or tower vanishes mid-resolution.
pub fn troop_attacks(
    state: &mut MatchState,
    attacker: PlayerIndex,
    crits: &mut Crits<'_>,
    events: &mut Vec<GameEvent>,
) -> EngineResult<Option<PlayerIndex>> {
    let defender = attacker.other();
    let seq = state.action_seq;
    let eligible: Vec<TroopId> = state
        .troops_of(attacker)
        .filter(|t| t.deployed_seq < seq && t.is_alive())
        .map(|t| t.id)
        .collect();

    let attacker_name = state.name(attacker).to_owned();
    let defender_name = state.name(defender).to_owned();

    for troop_id in eligible {
        loop {
            let troop = state.troops.get_mut(&troop_id).ok_or_else(|| {
                EngineError::InvariantViolation(format!("{troop_id} vanished during its attack"))
            })?;
            let previous = troop.target;
            let Some(target_id) = resolve_target(&state.towers, defender, previous) else {
                troop.target = None;
                push(
                    events,
                    EventKind::Retarget,
                    format!("{attacker_name}'s {} has no valid targets left.", troop.name),
                );
                break;
            };
            troop.target = Some(target_id);
            let (troop_name, atk, crit_chance) = (troop.name.clone(), troop.atk, troop.crit_chance);

            let tower = state.towers.get_mut(&target_id).ok_or_else(|| {
                EngineError::InvariantViolation(format!("target {target_id} does not exist"))
            })?;
            if previous != Some(target_id) {
                push(
                    events,
                    EventKind::Retarget,
                    format!("{attacker_name}'s {troop_name} retargets {defender_name}'s {}", tower.name),
                );
            }

            let hit = combat::resolve(atk, tower.def, crit_chance, crits.roll());
            let before = tower.take_damage(hit.damage);
            tower.last_attacker = Some(troop_id);
            push(
                events,
                EventKind::Attack,
                format!(
                    "{attacker_name}'s {troop_name} attacks {defender_name}'s {} for {} (HP: {before} -> {}/{})",
                    tower.name,
                    damage_phrase(hit.damage, hit.critical),
                    tower.hp,
                    tower.max_hp
                ),
            );

            if tower.is_alive() {
                break;
            }
            push(
                events,
                EventKind::TowerDestroyed,
                format!("{defender_name}'s {} was destroyed!", tower.name),
            );
            if tower.id.slot.is_king() {
                return Ok(Some(attacker));
            }
        }
    }
    Ok(None)
}

// ============================================================================
// STEP 4 - COUNTERATTACKS
// ============================================================================

/// Each standing tower of `attacker`'s opponent strikes back once at the
/// troop that last hit it. Every tower's memory is consumed either way.
///
/// # Errors
///
/// `InvariantViolation` if a remembered attacker is missing or belongs to
/// the wrong side.
pub fn counterattacks(
    state: &mut MatchState,
    attacker: PlayerIndex,
    crits: &mut Crits<'_>,
    events: &mut Vec<GameEvent>,
) -> EngineResult<()> {
    let defender = attacker.other();
    let attacker_name = state.name(attacker).to_owned();
    let defender_name = state.name(defender).to_owned();
    let towers: Vec<TowerId> = state.towers_of(defender).map(|t| t.id).collect();

    for tower_id in towers {
        let Some(tower) = state.towers.get_mut(&tower_id) else {
            continue;
        };
        let Some(troop_id) = tower.last_attacker.take() else {
            continue;
        };
        if !tower.is_alive() {
            continue;
        }

        let troop = state.troops.get_mut(&troop_id).ok_or_else(|| {
            EngineError::InvariantViolation(format!("{tower_id} remembers missing attacker {troop_id}"))
        })?;
        if troop.owner != attacker {
            return Err(EngineError::InvariantViolation(format!(
                "{tower_id} remembers {troop_id}, which belongs to {}",
                troop.owner
            )));
        }
        if !troop.is_alive() {
            continue;
        }

        let hit = combat::resolve(tower.atk, troop.def, tower.crit_chance, crits.roll());
        let before = troop.take_damage(hit.damage);
        push(
            events,
            EventKind::Counterattack,
            format!(
                "{defender_name}'s {} counterattacks {attacker_name}'s {} for {} (HP: {before} -> {}/{})",
                tower.name,
                troop.name,
                damage_phrase(hit.damage, hit.critical),
                troop.hp,
                troop.max_hp
            ),
        );
        if !troop.is_alive() {
            push(
                events,
                EventKind::TroopDefeated,
                format!(
                    "{attacker_name}'s {} was defeated by {defender_name}'s {}!",
                    troop.name, tower.name
                ),
            );
        }
    }
    Ok(())
}

// ============================================================================
// STEP 5 - PURGE
// ============================================================================

/// Removes dead troops and every reference to them.
pub fn purge_dead(state: &mut MatchState) -> Vec<TroopId> {
    let dead: Vec<TroopId> = state
        .troops
        .values()
        .filter(|t| !t.is_alive())
        .map(|t| t.id)
        .collect();
    if dead.is_empty() {
        return dead;
    }
    state.troops.retain(|_, t| t.is_alive());
    for tower in state.towers.values_mut() {
        if tower.last_attacker.is_some_and(|id| dead.contains(&id)) {
            tower.last_attacker = None;
        }
    }
    dead
}

// ============================================================================
// STEPS 3 & 6 - TERMINAL CHECK
// ============================================================================

/// Winner by king destruction, if any.
#[must_use]
pub fn king_winner(state: &MatchState) -> Option<PlayerIndex> {
    PlayerIndex::BOTH
        .into_iter()
        .find(|&p| state.king_destroyed(p))
        .map(PlayerIndex::other)
}

/// Steps 2 through 6 for `attacker`.
///
/// # Errors
///
/// `InvariantViolation` from any step.
pub fn attack_round(
    state: &mut MatchState,
    attacker: PlayerIndex,
    crits: &mut Crits<'_>,
    events: &mut Vec<GameEvent>,
) -> EngineResult<Option<PlayerIndex>> {
    if let Some(winner) = troop_attacks(state, attacker, crits, events)? {
        return Ok(Some(winner));
    }
    if let Some(winner) = king_winner(state) {
        return Ok(Some(winner));
    }
    counterattacks(state, attacker, crits, events)?;
    purge_dead(state);
    Ok(king_winner(state))
}
