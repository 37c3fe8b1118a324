//! Troop offers for turn-based play.
//!
//! Each turn the player holding it is offered a random subset of the troop
//! table. The healer is an ordinary member of the table and takes part in
//! the draw.

use bastion_rules::UnitCatalog;
use bastion_shared::UnitId;
use rand::Rng;

/// Draws up to `size` distinct troop ids.
///
/// Partial Fisher-Yates over the catalog's id order, so a given RNG state
/// always yields the same offer.
pub fn draw_offer<R: Rng + ?Sized>(catalog: &UnitCatalog, rng: &mut R, size: usize) -> Vec<UnitId> {
    let mut pool: Vec<UnitId> = catalog.troop_ids().cloned().collect();
    let take = size.min(pool.len());
    for i in 0..take {
        let j = rng.gen_range(i..pool.len());
        pool.swap(i, j);
    }
    pool.truncate(take);
    pool
}
