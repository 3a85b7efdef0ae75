use serde::{Deserialize, Serialize};
use std::fmt;

use crate::COMMITMENT_LEN;

/// Lifecycle phase of a round.
///
/// Rounds only move forward: `Open -> Locked -> Resolved`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// Stakes are accepted.
    Open,
    /// Betting closed, waiting for the draw.
    Locked,
    /// Outcome fixed and paid out.
    Resolved,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Open => "open",
            RoundPhase::Locked => "locked",
            RoundPhase::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single wager placed into a round's pool. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub user_id: String,
    /// Decorative tag; has no effect on odds.
    pub color_label: String,
    pub amount: u64,
    /// Position of the stake within its round, starting at zero.
    pub placed_at_sequence: u64,
}

/// The settled result of a round. Produced once and never recomputed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub winning_stake: Stake,
    /// Value drawn uniformly from `[0, bank)`.
    pub draw_value: u64,
    pub bank: u64,
    /// Amount credited to the winner (`bank - commission`).
    pub payout: u64,
    /// Amount credited to the house account.
    pub commission: u64,
    /// Pre-image of the round commitment, from which the draw was derived.
    #[serde(with = "crate::serde_hex")]
    pub reveal: [u8; COMMITMENT_LEN],
}

impl Outcome {
    /// Percentage of the bank the winning stake represented.
    pub fn winner_percent(&self) -> f64 {
        if self.bank == 0 {
            return 0.0;
        }
        100.0 * self.winning_stake.amount as f64 / self.bank as f64
    }
}

/// An archived round, read-only once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_id: u64,
    #[serde(with = "crate::serde_hex")]
    pub commit: [u8; COMMITMENT_LEN],
    pub stakes: Vec<Stake>,
    /// `None` when the round closed without participants and was voided.
    pub outcome: Option<Outcome>,
}

impl RoundRecord {
    pub fn is_voided(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Lifetime betting statistics for a single user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub games_played: u64,
    pub games_won: u64,
    pub total_wagered: u64,
    pub total_won: u64,
}
