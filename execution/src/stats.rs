//! Lifetime player statistics, derived from resolved rounds.

use std::collections::{HashMap, HashSet};

use colorpot_types::{Outcome, PlayerStats, Stake};

#[derive(Clone, Debug, Default)]
pub struct StatsBook {
    players: HashMap<String, PlayerStats>,
}

impl StatsBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one resolved round into the book.
    ///
    /// A user with several stakes in the round counts one game; all of their stakes add to
    /// `total_wagered`.
    pub fn record(&mut self, stakes: &[Stake], outcome: &Outcome) {
        let mut seen = HashSet::new();
        for stake in stakes {
            let entry = self.players.entry(stake.user_id.clone()).or_default();
            entry.total_wagered = entry.total_wagered.saturating_add(stake.amount);
            if seen.insert(stake.user_id.as_str()) {
                entry.games_played += 1;
            }
        }

        let winner = self
            .players
            .entry(outcome.winning_stake.user_id.clone())
            .or_default();
        winner.games_won += 1;
        winner.total_won = winner.total_won.saturating_add(outcome.payout);
    }

    /// Stats for `user_id`; zeros for users who never played.
    pub fn get(&self, user_id: &str) -> PlayerStats {
        self.players.get(user_id).copied().unwrap_or_default()
    }
}
