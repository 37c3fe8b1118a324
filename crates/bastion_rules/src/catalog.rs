//! # Unit Catalog
//!
//! The read-only table of base stats for every tower and troop type.
//!
//! ## File format
//!
//! ```toml
//! [towers.king_tower]
//! name = "King Tower"
//! hp = 2000
//! atk = 500
//! def = 300
//! crit_chance = 0.10
//! exp_yield = 200
//!
//! [troops.queen]
//! name = "Queen"
//! hp = 0
//! atk = 0
//! def = 0
//! mana_cost = 5
//! heal = true
//! ```
//!
//! The table key is the unit id. A catalog is validated once on load:
//! both tower types present, at least one troop, exactly one healer.
//! After that every lookup the engine needs is infallible.

use std::collections::BTreeMap;
use std::path::Path;

use bastion_shared::UnitId;
use serde::{Deserialize, Serialize};

use crate::error::{RulesError, RulesResult};
use crate::progression::scale_stat;

/// Id of the king tower type.
pub const KING_TOWER_ID: &str = "king_tower";

/// Id of the guard tower type (used for both guard slots).
pub const GUARD_TOWER_ID: &str = "guard_tower";

/// Catalog shipped with the server.
const STANDARD_CATALOG: &str = include_str!("../data/units.toml");

/// Base stats of one unit type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Unit id (the table key).
    #[serde(skip)]
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Base HP.
    pub hp: u32,
    /// Base attack.
    pub atk: u32,
    /// Base defence.
    pub def: u32,
    /// Mana cost (real-time mode).
    #[serde(default)]
    pub mana_cost: u32,
    /// Critical-hit chance as a fraction.
    #[serde(default)]
    pub crit_chance: f64,
    /// EXP awarded to the opponent when this unit is destroyed.
    #[serde(default)]
    pub exp_yield: u32,
    /// Is this the healer troop?
    #[serde(default)]
    pub heal: bool,
}

/// Stats of a unit after level scaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaledStats {
    /// HP.
    pub hp: u32,
    /// Attack.
    pub atk: u32,
    /// Defence.
    pub def: u32,
}

impl UnitSpec {
    /// Stats at `level`.
    #[must_use]
    pub fn scaled(&self, level: u32) -> ScaledStats {
        ScaledStats {
            hp: scale_stat(self.hp, level),
            atk: scale_stat(self.atk, level),
            def: scale_stat(self.def, level),
        }
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    towers: BTreeMap<String, UnitSpec>,
    #[serde(default)]
    troops: BTreeMap<String, UnitSpec>,
}

/// Validated unit table.
#[derive(Clone, Debug)]
pub struct UnitCatalog {
    king: UnitSpec,
    guard: UnitSpec,
    troops: BTreeMap<UnitId, UnitSpec>,
    healer: UnitId,
}

impl UnitCatalog {
    /// The embedded standard catalog.
    ///
    /// # Errors
    ///
    /// Only if the embedded file is broken.
    pub fn standard() -> RulesResult<Self> {
        Self::from_toml_str(STANDARD_CATALOG)
    }

    /// Parses and validates a catalog.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed TOML and the specific variant for any
    /// failed validation.
    pub fn from_toml_str(source: &str) -> RulesResult<Self> {
        let file: CatalogFile =
            toml::from_str(source).map_err(|e| RulesError::Parse(e.to_string()))?;
        Self::from_tables(file.towers, file.troops)
    }

    /// Reads, parses and validates a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> RulesResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| RulesError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&source)
    }

    /// Builds a catalog from tower and troop tables keyed by id.
    ///
    /// # Errors
    ///
    /// See [`RulesError`].
    pub fn from_tables(
        towers: BTreeMap<String, UnitSpec>,
        troops: BTreeMap<String, UnitSpec>,
    ) -> RulesResult<Self> {
        let mut towers = with_ids(towers);
        let troops = with_ids(troops);

        for spec in towers.values().chain(troops.values()) {
            if !(0.0..=1.0).contains(&spec.crit_chance) {
                return Err(RulesError::InvalidCritChance {
                    unit: spec.id.to_string(),
                    value: spec.crit_chance.to_string(),
                });
            }
        }
        // The healer never stays on the board, so it alone may have no hp.
        if let Some(dead) = towers.values().chain(troops.values().filter(|s| !s.heal)).find(|s| s.hp == 0) {
            return Err(RulesError::ZeroHp(dead.id.to_string()));
        }
        if let Some(dup) = troops.keys().find(|id| towers.contains_key(*id)) {
            return Err(RulesError::DuplicateUnit(dup.to_string()));
        }

        let king = towers
            .remove(&UnitId::from(KING_TOWER_ID))
            .ok_or_else(|| RulesError::MissingUnit(KING_TOWER_ID.to_owned()))?;
        let guard = towers
            .remove(&UnitId::from(GUARD_TOWER_ID))
            .ok_or_else(|| RulesError::MissingUnit(GUARD_TOWER_ID.to_owned()))?;

        if troops.is_empty() {
            return Err(RulesError::NoTroops);
        }
        let healers: Vec<&UnitId> = troops.values().filter(|s| s.heal).map(|s| &s.id).collect();
        let healer = match healers.as_slice() {
            [only] => (*only).clone(),
            other => return Err(RulesError::HealerCount(other.len())),
        };

        Ok(Self { king, guard, troops, healer })
    }

    /// King tower spec.
    #[must_use]
    pub const fn king_tower(&self) -> &UnitSpec {
        &self.king
    }

    /// Guard tower spec.
    #[must_use]
    pub const fn guard_tower(&self) -> &UnitSpec {
        &self.guard
    }

    /// Looks up a troop.
    #[must_use]
    pub fn troop(&self, id: &UnitId) -> Option<&UnitSpec> {
        self.troops.get(id)
    }

    /// All troops, ordered by id.
    pub fn troops(&self) -> impl Iterator<Item = &UnitSpec> {
        self.troops.values()
    }

    /// All troop ids, ordered.
    pub fn troop_ids(&self) -> impl Iterator<Item = &UnitId> {
        self.troops.keys()
    }

    /// Number of troop types.
    #[must_use]
    pub fn troop_count(&self) -> usize {
        self.troops.len()
    }

    /// Id of the healer troop.
    #[must_use]
    pub const fn healer(&self) -> &UnitId {
        &self.healer
    }

    /// Is `id` the healer?
    #[must_use]
    pub fn is_healer(&self, id: &UnitId) -> bool {
        &self.healer == id
    }

    /// Cheapest troop the holder of `mana` can afford. Ties go to the lower id.
    #[must_use]
    pub fn cheapest_affordable(&self, mana: u32) -> Option<&UnitSpec> {
        self.troops
            .values()
            .filter(|s| s.mana_cost <= mana)
            .min_by_key(|s| s.mana_cost)
    }
}

fn with_ids(table: BTreeMap<String, UnitSpec>) -> BTreeMap<UnitId, UnitSpec> {
    table
        .into_iter()
        .map(|(key, mut spec)| {
            let id = UnitId::new(key);
            spec.id = id.clone();
            (id, spec)
        })
        .collect()
}
