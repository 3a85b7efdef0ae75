//! Winner selection by cumulative weight.
//!
//! Stakes are walked in placement order with a running sum. Stake `i` owns the half-open bucket
//! `[cum_{i-1}, cum_i)`, so the winner is the first stake whose cumulative sum exceeds the draw.
//! With `draw` uniform over `[0, bank)` every stake wins with probability `amount / bank`.

use colorpot_types::Stake;
use rand::Rng;

use crate::{EngineError, Pool};

/// Select the winning stake for `draw`.
///
/// Fails with [`EngineError::NoParticipants`] on an empty pool and with
/// [`EngineError::DrawOutOfRange`] when `draw >= bank`.
pub fn resolve(pool: &Pool, draw: u64) -> Result<(usize, &Stake), EngineError> {
    let bank = pool.bank();
    if bank == 0 {
        return Err(EngineError::NoParticipants);
    }
    if draw >= bank {
        return Err(EngineError::DrawOutOfRange { draw, bank });
    }

    let mut cumulative: u64 = 0;
    for (index, stake) in pool.stakes().iter().enumerate() {
        // Cannot overflow: the pool caps the running total at `bank`.
        cumulative += stake.amount;
        if cumulative > draw {
            return Ok((index, stake));
        }
    }

    // Unreachable while `bank` equals the sum of stakes.
    Err(EngineError::DrawOutOfRange { draw, bank })
}

/// Draw uniformly from `[0, bank)`.
pub fn sample_draw<R: Rng + ?Sized>(rng: &mut R, bank: u64) -> Result<u64, EngineError> {
    if bank == 0 {
        return Err(EngineError::NoParticipants);
    }
    Ok(rng.gen_range(0..bank))
}
