//! # Match State
//!
//! The authoritative record of one match.
//!
//! ## Design
//!
//! - One tower map and one troop map for the whole board. Per-player views
//!   are filters over them, so the two can never disagree.
//! - `BTreeMap` everywhere: iteration order is part of the rules.
//! - Destroyed towers stay at 0 HP. Dead troops are purged.
//! - No RNG in here, so two states compare equal iff the board is equal.

use std::collections::BTreeMap;
use std::time::Duration;

use bastion_rules::{UnitCatalog, UnitSpec};
use bastion_shared::{
    MatchId, MatchModeKind, MatchPhase, MatchSnapshot, PlayerIndex, PlayerView, TowerId,
    TowerSlot, TowerView, TroopId, TroopView, UnitId,
};

use super::{MatchPlayer, MatchRules, TerminalResult};
use crate::error::{EngineError, EngineResult};

// ============================================================================
// TOWERS
// ============================================================================

/// A tower on the board.
#[derive(Clone, Debug, PartialEq)]
pub struct Tower {
    /// Stable id (owner + slot).
    pub id: TowerId,
    /// Catalog unit type.
    pub unit: UnitId,
    /// Display name.
    pub name: String,
    /// Current HP, `0..=max_hp`.
    pub hp: u32,
    /// Max HP at the owner's level.
    pub max_hp: u32,
    /// Attack at the owner's level.
    pub atk: u32,
    /// Defence at the owner's level.
    pub def: u32,
    /// Critical-hit chance (real-time only).
    pub crit_chance: f64,
    /// EXP awarded to the opponent when destroyed.
    pub exp_yield: u32,
    /// Troop that last damaged this tower. Consumed by the counterattack.
    pub last_attacker: Option<TroopId>,
}

impl Tower {
    fn instantiate(id: TowerId, spec: &UnitSpec, level: u32) -> Self {
        let stats = spec.scaled(level);
        let name = match id.slot {
            TowerSlot::King => spec.name.clone(),
            TowerSlot::Guard1 => format!("{} 1", spec.name),
            TowerSlot::Guard2 => format!("{} 2", spec.name),
        };
        Self {
            id,
            unit: spec.id.clone(),
            name,
            hp: stats.hp,
            max_hp: stats.hp,
            atk: stats.atk,
            def: stats.def,
            crit_chance: spec.crit_chance,
            exp_yield: spec.exp_yield,
            last_attacker: None,
        }
    }

    /// Still standing?
    #[must_use]
    #[inline]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Owning player.
    #[must_use]
    #[inline]
    pub const fn owner(&self) -> PlayerIndex {
        self.id.owner
    }

    /// Applies damage, clamping at 0. Returns HP before the hit.
    pub fn take_damage(&mut self, damage: u32) -> u32 {
        let before = self.hp;
        self.hp = self.hp.saturating_sub(damage);
        before
    }

    /// Heals up to max HP. Returns HP actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
        self.hp - before
    }

    fn view(&self) -> TowerView {
        TowerView {
            id: self.id,
            unit: self.unit.clone(),
            owner: self.id.owner,
            slot: self.id.slot,
            hp: self.hp,
            max_hp: self.max_hp,
        }
    }
}

// ============================================================================
// TROOPS
// ============================================================================

/// A deployed troop.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveTroop {
    /// Instance id.
    pub id: TroopId,
    /// Owner.
    pub owner: PlayerIndex,
    /// Catalog unit type.
    pub unit: UnitId,
    /// Display name.
    pub name: String,
    /// Current HP. A troop at 0 is dead and awaiting purge.
    pub hp: u32,
    /// Max HP at the owner's level.
    pub max_hp: u32,
    /// Attack.
    pub atk: u32,
    /// Defence.
    pub def: u32,
    /// Critical-hit chance (real-time only).
    pub crit_chance: f64,
    /// Tower this troop is attacking.
    pub target: Option<TowerId>,
    /// Logical clock value at deployment.
    pub deployed_seq: u64,
}

impl ActiveTroop {
    /// Still alive?
    #[must_use]
    #[inline]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Applies damage, clamping at 0. Returns HP before the hit.
    pub fn take_damage(&mut self, damage: u32) -> u32 {
        let before = self.hp;
        self.hp = self.hp.saturating_sub(damage);
        before
    }

    fn view(&self) -> TroopView {
        TroopView {
            id: self.id,
            unit: self.unit.clone(),
            owner: self.owner,
            hp: self.hp,
            max_hp: self.max_hp,
            target: self.target,
        }
    }
}

// ============================================================================
// PLAYERS
// ============================================================================

/// Per-seat match data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerSlot {
    /// Display name.
    pub name: String,
    /// Level at match start.
    pub level: u32,
    /// Mana pool (real-time).
    pub mana: u32,
    /// Troops this player may deploy on their current turn.
    pub offer: Vec<UnitId>,
}

// ============================================================================
// MATCH
// ============================================================================

/// Authoritative state of one match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchState {
    /// Match id.
    pub match_id: MatchId,
    /// Ruleset.
    pub mode: MatchModeKind,
    /// Lifecycle phase.
    pub phase: MatchPhase,
    /// Both seats.
    pub players: [PlayerSlot; 2],
    /// Every tower, destroyed ones included.
    pub towers: BTreeMap<TowerId, Tower>,
    /// Troops on the board.
    pub troops: BTreeMap<TroopId, ActiveTroop>,
    /// Turn holder (turn-based).
    pub current_turn: PlayerIndex,
    /// Time played (real-time).
    pub elapsed: Duration,
    /// Match length (real-time).
    pub duration: Duration,
    /// Time not yet converted into mana (real-time).
    pub mana_carry: Duration,
    /// Logical clock: accepted actions in turn-based mode, ticks in real-time.
    pub action_seq: u64,
    /// Next troop id.
    pub next_troop_id: u32,
    /// Set once `phase` is `Finished`.
    pub result: Option<TerminalResult>,
}

impl MatchState {
    /// Creates a match in `Waiting` with no towers.
    #[must_use]
    pub fn new(match_id: MatchId, players: [MatchPlayer; 2], rules: &MatchRules) -> Self {
        let [p0, p1] = players;
        let slot = |p: MatchPlayer| PlayerSlot {
            name: p.name,
            level: p.level.max(1),
            mana: rules.starting_mana,
            offer: Vec::new(),
        };
        Self {
            match_id,
            mode: rules.mode,
            phase: MatchPhase::Waiting,
            players: [slot(p0), slot(p1)],
            towers: BTreeMap::new(),
            troops: BTreeMap::new(),
            current_turn: PlayerIndex::P0,
            elapsed: Duration::ZERO,
            duration: rules.match_duration,
            mana_carry: Duration::ZERO,
            action_seq: 0,
            next_troop_id: 1,
            result: None,
        }
    }

    /// Places both players' towers, scaled to their levels.
    pub fn place_towers(&mut self, catalog: &UnitCatalog) {
        for owner in PlayerIndex::BOTH {
            let level = self.players[owner.index()].level;
            for slot in TowerSlot::ALL {
                let spec = if slot.is_king() {
                    catalog.king_tower()
                } else {
                    catalog.guard_tower()
                };
                let id = TowerId::new(owner, slot);
                self.towers.insert(id, Tower::instantiate(id, spec, level));
            }
        }
    }

    /// Creates a troop for `owner` and returns its id.
    pub fn spawn_troop(&mut self, owner: PlayerIndex, spec: &UnitSpec) -> TroopId {
        let level = self.players[owner.index()].level;
        let stats = spec.scaled(level);
        let id = TroopId(self.next_troop_id);
        self.next_troop_id += 1;
        self.troops.insert(
            id,
            ActiveTroop {
                id,
                owner,
                unit: spec.id.clone(),
                name: spec.name.clone(),
                hp: stats.hp,
                max_hp: stats.hp,
                atk: stats.atk,
                def: stats.def,
                crit_chance: spec.crit_chance,
                target: None,
                deployed_seq: self.action_seq,
            },
        );
        id
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// Player data.
    #[must_use]
    pub fn player(&self, index: PlayerIndex) -> &PlayerSlot {
        &self.players[index.index()]
    }

    /// Mutable player data.
    pub fn player_mut(&mut self, index: PlayerIndex) -> &mut PlayerSlot {
        &mut self.players[index.index()]
    }

    /// Display name of a seat.
    #[must_use]
    pub fn name(&self, index: PlayerIndex) -> &str {
        &self.players[index.index()].name
    }

    /// Tower by id.
    #[must_use]
    pub fn tower(&self, id: TowerId) -> Option<&Tower> {
        self.towers.get(&id)
    }

    /// Towers owned by `owner`, slot order.
    pub fn towers_of(&self, owner: PlayerIndex) -> impl Iterator<Item = &Tower> {
        self.towers.values().filter(move |t| t.owner() == owner)
    }

    /// Troops owned by `owner`, id order.
    pub fn troops_of(&self, owner: PlayerIndex) -> impl Iterator<Item = &ActiveTroop> {
        self.troops.values().filter(move |t| t.owner == owner)
    }

    /// Has `owner` lost their king?
    #[must_use]
    pub fn king_destroyed(&self, owner: PlayerIndex) -> bool {
        self.tower(TowerId::new(owner, TowerSlot::King))
            .is_some_and(|t| !t.is_alive())
    }

    /// Number of `owner`'s towers at 0 HP.
    #[must_use]
    pub fn destroyed_towers(&self, owner: PlayerIndex) -> usize {
        self.towers_of(owner).filter(|t| !t.is_alive()).count()
    }

    /// Seconds until the real-time deadline.
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        self.duration.saturating_sub(self.elapsed).as_secs()
    }

    // =========================================================================
    // CONSISTENCY
    // =========================================================================

    /// Verifies the structural invariants of the board.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` describing the first broken rule.
    pub fn check_invariants(&self) -> EngineResult<()> {
        for tower in self.towers.values() {
            if tower.hp > tower.max_hp {
                return Err(EngineError::InvariantViolation(format!(
                    "{} has {} HP over max {}",
                    tower.id, tower.hp, tower.max_hp
                )));
            }
            if let Some(troop) = tower.last_attacker {
                if !self.troops.contains_key(&troop) {
                    return Err(EngineError::InvariantViolation(format!(
                        "{} remembers missing attacker {troop}",
                        tower.id
                    )));
                }
            }
        }
        for troop in self.troops.values() {
            if !troop.is_alive() {
                return Err(EngineError::InvariantViolation(format!(
                    "{} is dead but still on the board",
                    troop.id
                )));
            }
            if troop.hp > troop.max_hp {
                return Err(EngineError::InvariantViolation(format!(
                    "{} has {} HP over max {}",
                    troop.id, troop.hp, troop.max_hp
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Snapshot as seen by `viewer`. Only the viewer's own offer is included.
    #[must_use]
    pub fn snapshot_for(&self, viewer: Option<PlayerIndex>) -> MatchSnapshot {
        let turn_based = self.mode == MatchModeKind::TurnBased;
        MatchSnapshot {
            match_id: self.match_id.clone(),
            mode: self.mode,
            phase: self.phase,
            players: PlayerIndex::BOTH
                .iter()
                .map(|&seat| {
                    let p = self.player(seat);
                    PlayerView {
                        seat,
                        name: p.name.clone(),
                        level: p.level,
                        mana: (!turn_based).then_some(p.mana),
                    }
                })
                .collect(),
            towers: self.towers.values().map(Tower::view).collect(),
            troops: self.troops.values().map(ActiveTroop::view).collect(),
            current_turn: turn_based.then_some(self.current_turn),
            seconds_remaining: (!turn_based).then(|| self.seconds_remaining()),
            offer: viewer
                .map(|v| self.player(v).offer.clone())
                .unwrap_or_default(),
        }
    }

    // =========================================================================
    // TEST-ONLY SETUP - bypasses the rules
    // =========================================================================

    /// Sets a tower's HP directly.
    #[cfg(any(test, feature = "test-util"))]
    pub fn test_set_tower_hp(&mut self, id: TowerId, hp: u32) {
        if let Some(tower) = self.towers.get_mut(&id) {
            tower.hp = hp.min(tower.max_hp);
        }
    }

    /// Places a troop as if it had been deployed before the current action.
    #[cfg(any(test, feature = "test-util"))]
    pub fn test_place_troop(&mut self, owner: PlayerIndex, spec: &UnitSpec, target: Option<TowerId>) -> TroopId {
        let id = self.spawn_troop(owner, spec);
        if let Some(troop) = self.troops.get_mut(&id) {
            troop.target = target;
            troop.deployed_seq = 0;
        }
        id
    }
}
