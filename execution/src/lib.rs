//! Colorpot execution layer.
//!
//! This crate contains the pari-mutuel pool and the round-resolution engine: the [`Wallet`] ledger,
//! the [`Pool`] of stakes, the cumulative-weight [`resolver`], the [`Round`] state machine and the
//! [`Table`] that ties them to an archive, player stats and a commit-reveal draw chain.
//!
//! ## Invariants
//! - Conservation: an accepted bet moves exactly its amount from the wallet into the bank, and a
//!   resolved round hands the whole bank back out (winner plus house commission).
//! - Normalization: stake percentages are each stake's share of the whole bank and sum to 100.
//! - Fairness: the draw is uniform over `[0, bank)`, so a stake wins with probability
//!   `amount / bank`.
//! - Failing calls change nothing.
//!
//! The crate does no I/O and reads no clocks. Timed play is driven from outside through
//! [`round_scheduler`].
//!
//! ## Example
//! ```rust
//! use colorpot_execution::{HashChain, Table, TableConfig};
//!
//! let mut table = Table::new(TableConfig::default(), HashChain::from_secret([1u8; 32]));
//! table.deposit("alice", 100).unwrap();
//! table.deposit("bob", 100).unwrap();
//! table.place_bet("alice", 30, Some("red")).unwrap();
//! table.place_bet("bob", 70, Some("black")).unwrap();
//! table.lock_round().unwrap();
//!
//! let resolution = table.resolve_round().unwrap();
//! assert_eq!(resolution.payout, 100);
//! assert_eq!(table.wallet().total(), 200);
//! ```

mod error;
mod pool;
pub mod resolver;
pub mod rng_pipeline;
mod round;
pub mod round_scheduler;
mod stats;
mod table;
mod units;
mod wallet;

#[cfg(test)]
mod fairness_tests;

pub use error::EngineError;
pub use pool::Pool;
pub use rng_pipeline::{
    compute_commit, replay_draw, verify_commit_reveal, verify_record, CommitRevealError,
    CommitRevealPair, HashChain,
};
pub use round::{PayoutRule, Round};
pub use round_scheduler::{PhaseConfig, RoundScheduler, ScheduledAction, TransitionResult};
pub use stats::StatsBook;
pub use table::{normalize_amount, validate_color_label, validate_user_id, Table, TableConfig};
pub use units::parse_units;
pub use wallet::Wallet;
