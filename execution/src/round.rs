//! Round state machine.
//!
//! A round composes a [`Pool`] with the [`resolver`](crate::resolver) over its lifetime:
//!
//! ```text
//! Open --lock()--> Locked --resolve()--> Resolved
//! ```
//!
//! No other transitions exist. Every failing call leaves the round and the wallet exactly as they
//! were. The draw comes from the round's own commit-reveal pair, fixed before the first bet.

use colorpot_types::api::{EntryView, SnapshotView};
use colorpot_types::{Outcome, RoundPhase, RoundRecord, Stake, BPS_DENOMINATOR};
use tracing::{debug, info};

use crate::rng_pipeline::{draw_rng, CommitRevealPair};
use crate::{resolver, EngineError, Pool, Wallet};

/// How a resolved bank is split between the winner and the house.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayoutRule {
    /// Share of the bank taken by the house, in basis points.
    pub commission_bps: u64,
    pub house_account: String,
}

impl PayoutRule {
    /// Winner takes the entire bank.
    pub fn winner_take_all() -> Self {
        Self {
            commission_bps: 0,
            house_account: colorpot_types::DEFAULT_HOUSE_ACCOUNT.to_string(),
        }
    }

    /// Returns `(payout, commission)`; the two always sum to `bank`.
    pub fn split(&self, bank: u64) -> (u64, u64) {
        let bps = self.commission_bps.min(BPS_DENOMINATOR);
        let commission = (bank as u128 * bps as u128 / BPS_DENOMINATOR as u128) as u64;
        (bank - commission, commission)
    }
}

#[derive(Clone, Debug)]
pub struct Round {
    id: u64,
    phase: RoundPhase,
    pool: Pool,
    pair: CommitRevealPair,
    outcome: Option<Outcome>,
}

impl Round {
    /// Open a new round bound to `pair`.
    pub fn new(id: u64, pair: CommitRevealPair) -> Self {
        Self {
            id,
            phase: RoundPhase::Open,
            pool: Pool::new(),
            pair,
            outcome: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn commit(&self) -> &[u8; colorpot_types::COMMITMENT_LEN] {
        &self.pair.commit
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Debit `amount` from `user_id` and add the stake, as one unit.
    pub fn place_bet(
        &mut self,
        wallet: &mut Wallet,
        user_id: &str,
        amount: u64,
        color_label: &str,
    ) -> Result<&Stake, EngineError> {
        if self.phase != RoundPhase::Open {
            return Err(EngineError::RoundNotOpen { phase: self.phase });
        }
        if amount == 0 {
            return Err(EngineError::InvalidAmount { min: 1 });
        }
        // Check the bank before touching the wallet so the debit never needs undoing.
        self.pool.checked_bank_after(amount)?;
        wallet.debit(user_id, amount)?;

        let stake = Stake {
            user_id: user_id.to_string(),
            color_label: color_label.to_string(),
            amount,
            placed_at_sequence: self.pool.next_sequence(),
        };
        if let Err(err) = self.pool.add_stake(stake) {
            wallet.credit(user_id, amount)?;
            return Err(err);
        }
        debug!(
            round_id = self.id,
            user_id,
            amount,
            bank = self.pool.bank(),
            "stake placed"
        );
        Ok(&self.pool.stakes()[self.pool.len() - 1])
    }

    /// Close betting. Callable once, only while open.
    pub fn lock(&mut self) -> Result<(), EngineError> {
        if self.phase != RoundPhase::Open {
            return Err(EngineError::InvalidState {
                phase: self.phase,
                action: "lock",
            });
        }
        self.phase = RoundPhase::Locked;
        info!(
            round_id = self.id,
            stakes = self.pool.len(),
            bank = self.pool.bank(),
            "round locked"
        );
        Ok(())
    }

    /// Draw the winner and pay out the bank.
    ///
    /// The draw is taken once from the round's reveal over `[0, bank)`. An empty pool fails with
    /// [`EngineError::NoParticipants`] and the round stays locked.
    pub fn resolve(&mut self, wallet: &mut Wallet, rule: &PayoutRule) -> Result<&Outcome, EngineError> {
        if self.phase != RoundPhase::Locked {
            return Err(EngineError::InvalidState {
                phase: self.phase,
                action: "resolve",
            });
        }
        let bank = self.pool.bank();
        let draw = resolver::sample_draw(&mut draw_rng(&self.pair.reveal), bank)?;
        let (_, winner) = resolver::resolve(&self.pool, draw)?;
        let winning_stake = winner.clone();

        let (payout, commission) = rule.split(bank);
        wallet.credit_all(&[
            (winning_stake.user_id.as_str(), payout),
            (rule.house_account.as_str(), commission),
        ])?;

        info!(
            round_id = self.id,
            winner = %winning_stake.user_id,
            draw,
            bank,
            payout,
            commission,
            "round resolved"
        );
        self.phase = RoundPhase::Resolved;
        Ok(self.outcome.insert(Outcome {
            winning_stake,
            draw_value: draw,
            bank,
            payout,
            commission,
            reveal: self.pair.reveal,
        }))
    }

    /// Read-only view for display. Safe in any phase.
    pub fn snapshot(&self) -> SnapshotView {
        SnapshotView {
            round_id: self.id,
            phase: self.phase,
            bank: self.pool.bank(),
            entries: self
                .pool
                .percentages()
                .into_iter()
                .map(|(stake, percent)| EntryView {
                    color_label: stake.color_label.clone(),
                    amount: stake.amount,
                    percent,
                })
                .collect(),
            commit: self.pair.commit,
        }
    }

    /// Archival form of the round. The reveal is only included through the outcome.
    pub fn record(&self) -> RoundRecord {
        RoundRecord {
            round_id: self.id,
            commit: self.pair.commit,
            stakes: self.pool.stakes().to_vec(),
            outcome: self.outcome.clone(),
        }
    }
}
