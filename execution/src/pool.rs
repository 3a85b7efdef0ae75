//! Stakes placed into the active round.
//!
//! The pool keeps stakes in placement order and tracks the bank incrementally. Percentages are a
//! derived view recomputed on every read: each stake's share of the whole bank.

use colorpot_types::Stake;

use crate::EngineError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pool {
    stakes: Vec<Stake>,
    bank: u64,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a pool from archived stakes, validating each one.
    pub fn from_stakes(stakes: impl IntoIterator<Item = Stake>) -> Result<Self, EngineError> {
        let mut pool = Self::new();
        for stake in stakes {
            pool.add_stake(stake)?;
        }
        Ok(pool)
    }

    /// Append a stake. Rejects zero amounts and banks that would overflow.
    pub fn add_stake(&mut self, stake: Stake) -> Result<(), EngineError> {
        if stake.amount == 0 {
            return Err(EngineError::InvalidAmount { min: 1 });
        }
        self.bank = self.checked_bank_after(stake.amount)?;
        self.stakes.push(stake);
        Ok(())
    }

    /// Bank after adding `amount`, without mutating the pool.
    pub fn checked_bank_after(&self, amount: u64) -> Result<u64, EngineError> {
        self.bank
            .checked_add(amount)
            .ok_or(EngineError::BalanceOverflow)
    }

    pub fn bank(&self) -> u64 {
        self.bank
    }

    /// Sequence number the next stake will carry.
    pub fn next_sequence(&self) -> u64 {
        self.stakes.len() as u64
    }

    pub fn stakes(&self) -> &[Stake] {
        &self.stakes
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Each stake paired with `100 * amount / bank`, in placement order.
    ///
    /// Empty when the bank is zero.
    pub fn percentages(&self) -> Vec<(&Stake, f64)> {
        if self.bank == 0 {
            return Vec::new();
        }
        let bank = self.bank as f64;
        self.stakes
            .iter()
            .map(|stake| (stake, 100.0 * stake.amount as f64 / bank))
            .collect()
    }

    /// Total staked by one user in this pool.
    pub fn staked_by(&self, user_id: &str) -> u64 {
        self.stakes
            .iter()
            .filter(|stake| stake.user_id == user_id)
            .map(|stake| stake.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colorpot_types::PERCENT_TOLERANCE;
    use proptest::prelude::*;

    fn stake(user_id: &str, amount: u64, seq: u64) -> Stake {
        Stake {
            user_id: user_id.to_string(),
            color_label: "red".to_string(),
            amount,
            placed_at_sequence: seq,
        }
    }

    #[test]
    fn test_empty_pool() {
        let pool = Pool::new();
        assert_eq!(pool.bank(), 0);
        assert!(pool.percentages().is_empty());
        assert_eq!(pool.next_sequence(), 0);
    }

    #[test]
    fn test_percentages_follow_whole_bank() {
        let mut pool = Pool::new();
        pool.add_stake(stake("a", 30, 0)).unwrap();
        pool.add_stake(stake("b", 70, 1)).unwrap();
        assert_eq!(pool.bank(), 100);

        let percents: Vec<f64> = pool.percentages().iter().map(|(_, p)| *p).collect();
        assert_eq!(percents, vec![30.0, 70.0]);
    }

    #[test]
    fn test_same_color_does_not_group() {
        let mut pool = Pool::new();
        pool.add_stake(stake("a", 25, 0)).unwrap();
        pool.add_stake(stake("b", 25, 1)).unwrap();
        pool.add_stake(stake("c", 50, 2)).unwrap();

        // All three share the label "red"; each still gets its own share of the bank.
        let percents: Vec<f64> = pool.percentages().iter().map(|(_, p)| *p).collect();
        assert_eq!(percents, vec![25.0, 25.0, 50.0]);
    }

    #[test]
    fn test_zero_stake_rejected() {
        let mut pool = Pool::new();
        assert_eq!(
            pool.add_stake(stake("a", 0, 0)),
            Err(EngineError::InvalidAmount { min: 1 })
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn test_bank_overflow_rejected() {
        let mut pool = Pool::new();
        pool.add_stake(stake("a", u64::MAX, 0)).unwrap();
        assert_eq!(
            pool.add_stake(stake("b", 1, 1)),
            Err(EngineError::BalanceOverflow)
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.bank(), u64::MAX);
    }

    #[test]
    fn test_staked_by_sums_user_stakes() {
        let mut pool = Pool::new();
        pool.add_stake(stake("a", 10, 0)).unwrap();
        pool.add_stake(stake("b", 20, 1)).unwrap();
        pool.add_stake(stake("a", 5, 2)).unwrap();
        assert_eq!(pool.staked_by("a"), 15);
        assert_eq!(pool.staked_by("c"), 0);
    }

    proptest! {
        #[test]
        fn prop_percentages_sum_to_100(amounts in prop::collection::vec(1u64..1_000_000_000, 1..64)) {
            let mut pool = Pool::new();
            for (i, amount) in amounts.iter().enumerate() {
                pool.add_stake(stake("p", *amount, i as u64)).unwrap();
                let sum: f64 = pool.percentages().iter().map(|(_, p)| p).sum();
                prop_assert!((sum - 100.0).abs() < PERCENT_TOLERANCE, "sum was {}", sum);
            }
            prop_assert_eq!(pool.bank(), amounts.iter().sum::<u64>());
        }
    }
}
