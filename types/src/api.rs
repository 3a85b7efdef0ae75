//! JSON views returned to callers of the table.
//!
//! Field names are part of the external contract; do not rename them.

use serde::{Deserialize, Serialize};

use crate::{Outcome, PlayerStats, RoundPhase, COMMITMENT_LEN};

/// One stake as shown to players.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryView {
    pub color_label: String,
    pub amount: u64,
    pub percent: f64,
}

/// Point-in-time view of the active round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotView {
    pub round_id: u64,
    pub phase: RoundPhase,
    pub bank: u64,
    /// Ordered by placement.
    pub entries: Vec<EntryView>,
    /// Commitment to the round's draw, published before betting closes.
    #[serde(with = "crate::serde_hex")]
    pub commit: [u8; COMMITMENT_LEN],
}

impl SnapshotView {
    /// Entries ordered by percent, largest first. Ties keep placement order.
    pub fn entries_by_percent(&self) -> Vec<EntryView> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| b.percent.total_cmp(&a.percent));
        entries
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinnerView {
    pub user_id: String,
    pub color_label: String,
    pub amount: u64,
    pub percent: f64,
}

impl From<&Outcome> for WinnerView {
    fn from(outcome: &Outcome) -> Self {
        Self {
            user_id: outcome.winning_stake.user_id.clone(),
            color_label: outcome.winning_stake.color_label.clone(),
            amount: outcome.winning_stake.amount,
            percent: outcome.winner_percent(),
        }
    }
}

/// Settlement of a round, emitted once when it resolves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionView {
    pub round_id: u64,
    pub winner: WinnerView,
    pub bank: u64,
    pub payout: u64,
    pub commission: u64,
    pub draw_value: u64,
    #[serde(with = "crate::serde_hex")]
    pub reveal: [u8; COMMITMENT_LEN],
}

impl ResolutionView {
    pub fn new(round_id: u64, outcome: &Outcome) -> Self {
        Self {
            round_id,
            winner: WinnerView::from(outcome),
            bank: outcome.bank,
            payout: outcome.payout,
            commission: outcome.commission,
            draw_value: outcome.draw_value,
            reveal: outcome.reveal,
        }
    }
}

/// A table's currency. Every amount on the wire is in minor units: `10^decimals` per whole coin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyView {
    pub currency: String,
    pub decimals: u8,
    pub min_bet: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub user_id: String,
    pub balance: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsView {
    pub user_id: String,
    #[serde(flatten)]
    pub stats: PlayerStats,
}
