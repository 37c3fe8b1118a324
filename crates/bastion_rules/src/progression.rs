//! # Progression Calculator
//!
//! Level scaling and the EXP curve.
//!
//! | level | stat multiplier | EXP to next |
//! |-------|-----------------|-------------|
//! | 1     | 1.0             | 100         |
//! | 2     | 1.1             | 110         |
//! | 3     | 1.21            | 121         |
//! | n     | 1.1^(n-1)       | ⌊100·1.1^(n-1)⌋ |
//!
//! Levels below 1 are treated as level 1.

use serde::{Deserialize, Serialize};

/// Per-level growth factor.
const GROWTH: f64 = 1.1;

/// EXP needed to leave level 1.
const BASE_EXP: u32 = 100;

/// `1.1^(level-1)`, multiplied out step by step.
#[must_use]
pub fn stat_multiplier(level: u32) -> f64 {
    let mut multiplier = 1.0;
    for _ in 1..level.max(1) {
        multiplier *= GROWTH;
    }
    multiplier
}

/// Scales a base stat to `level`, rounding down.
#[must_use]
pub fn scale_stat(base: u32, level: u32) -> u32 {
    let scaled = (f64::from(base) * stat_multiplier(level)).floor();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// EXP required to advance from `level` to `level + 1`.
#[must_use]
pub fn exp_for_next_level(level: u32) -> u32 {
    if level <= 1 {
        return BASE_EXP;
    }
    let required = (f64::from(BASE_EXP) * stat_multiplier(level)).floor();
    if required >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        required as u32
    }
}

/// A player's persistent progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelState {
    /// Current level (1-based).
    pub level: u32,
    /// EXP accumulated towards the next level.
    pub exp: u32,
}

impl LevelState {
    /// Fresh account.
    pub const NEW: Self = Self { level: 1, exp: 0 };

    /// Creates a level state.
    #[must_use]
    pub const fn new(level: u32, exp: u32) -> Self {
        Self { level, exp }
    }

    /// Adds `earned` EXP and levels up as many times as it pays for.
    ///
    /// Returns the number of levels gained. Leftover EXP is kept.
    pub fn gain(&mut self, earned: u32) -> u32 {
        self.level = self.level.max(1);
        self.exp = self.exp.saturating_add(earned);
        let mut gained = 0;
        loop {
            let required = exp_for_next_level(self.level);
            if self.exp < required {
                break;
            }
            self.exp -= required;
            self.level += 1;
            gained += 1;
        }
        gained
    }
}

impl Default for LevelState {
    fn default() -> Self {
        Self::NEW
    }
}
