//! Per-user balance ledger.
//!
//! The wallet is the only owner of spendable balances. Balances are unsigned, so they can never go
//! negative; a debit larger than the balance fails without touching the entry.

use std::collections::HashMap;

use crate::EngineError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Wallet {
    balances: HashMap<String, u64>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a wallet from persisted `(user_id, balance)` pairs.
    pub fn from_balances<I, S>(balances: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            balances: balances
                .into_iter()
                .map(|(user, balance)| (user.into(), balance))
                .collect(),
        }
    }

    /// Current balance. Unknown users hold nothing.
    pub fn balance(&self, user_id: &str) -> u64 {
        self.balances.get(user_id).copied().unwrap_or(0)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.balances.contains_key(user_id)
    }

    /// Open an account with a zero balance if none exists. Returns `true` if it was created.
    pub fn open(&mut self, user_id: &str) -> bool {
        if self.balances.contains_key(user_id) {
            return false;
        }
        self.balances.insert(user_id.to_string(), 0);
        true
    }

    pub fn debit(&mut self, user_id: &str, amount: u64) -> Result<(), EngineError> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount { min: 1 });
        }
        let balance = self.balance(user_id);
        let remaining = balance
            .checked_sub(amount)
            .ok_or(EngineError::InsufficientFunds {
                balance,
                required: amount,
            })?;
        self.balances.insert(user_id.to_string(), remaining);
        Ok(())
    }

    /// Add `amount` to a balance, opening the account if needed. Zero credits are no-ops.
    pub fn credit(&mut self, user_id: &str, amount: u64) -> Result<(), EngineError> {
        if amount == 0 {
            return Ok(());
        }
        let updated = self
            .balance(user_id)
            .checked_add(amount)
            .ok_or(EngineError::BalanceOverflow)?;
        self.balances.insert(user_id.to_string(), updated);
        Ok(())
    }

    /// Apply several credits as one unit: either all land or none do.
    pub fn credit_all(&mut self, credits: &[(&str, u64)]) -> Result<(), EngineError> {
        let mut staged: Vec<(&str, u64)> = Vec::with_capacity(credits.len());
        for (user_id, amount) in credits {
            match staged.iter_mut().find(|(staged_user, _)| staged_user == user_id) {
                Some((_, balance)) => {
                    *balance = balance
                        .checked_add(*amount)
                        .ok_or(EngineError::BalanceOverflow)?;
                }
                None => {
                    let balance = self
                        .balance(user_id)
                        .checked_add(*amount)
                        .ok_or(EngineError::BalanceOverflow)?;
                    staged.push((*user_id, balance));
                }
            }
        }
        for (user_id, balance) in staged {
            self.balances.insert(user_id.to_string(), balance);
        }
        Ok(())
    }

    /// Sum of every balance. Wider than `u64` so the total itself cannot overflow.
    pub fn total(&self) -> u128 {
        self.balances.values().map(|balance| *balance as u128).sum()
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}
