//! # Combat Resolver
//!
//! Damage from one hit. No state, no side effects.
//!
//! ```text
//! normal:   max(0, ATK - DEF)
//! critical: max(0, round(ATK * 1.2) - DEF)
//! ```
//!
//! The random draw is taken by the caller and passed in, so `resolve`
//! stays a plain function. Turn-based matches pass `None` and never crit.

use rand::Rng;

use crate::CRIT_MULTIPLIER;

/// Outcome of a single hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hit {
    /// HP to subtract from the defender.
    pub damage: u32,
    /// Was this a critical hit?
    pub critical: bool,
}

/// Non-critical damage.
#[must_use]
#[inline]
pub const fn base_damage(attacker_atk: u32, defender_def: u32) -> u32 {
    attacker_atk.saturating_sub(defender_def)
}

/// Critical damage: ATK boosted by [`CRIT_MULTIPLIER`] and rounded.
#[must_use]
pub fn critical_damage(attacker_atk: u32, defender_def: u32) -> u32 {
    let boosted = (f64::from(attacker_atk) * CRIT_MULTIPLIER).round();
    let boosted = if boosted >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        boosted as u32
    };
    boosted.saturating_sub(defender_def)
}

/// Resolves one hit.
///
/// `roll` is a uniform draw in `[0, 1)`. The hit is critical when
/// `roll < crit_chance`. With `roll = None` the hit is never critical.
#[must_use]
pub fn resolve(attacker_atk: u32, defender_def: u32, crit_chance: f64, roll: Option<f64>) -> Hit {
    let critical = roll.is_some_and(|r| r < crit_chance);
    let damage = if critical {
        critical_damage(attacker_atk, defender_def)
    } else {
        base_damage(attacker_atk, defender_def)
    };
    Hit { damage, critical }
}

/// Draws a crit roll from `rng`.
#[inline]
pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>()
}
