//! The table: one wallet, one active round, and everything derived from past rounds.
//!
//! A [`Table`] is the unit callers serialize on. Every method either applies completely or returns
//! an [`EngineError`] with nothing changed.

use std::collections::BTreeMap;

use colorpot_types::api::{ResolutionView, SnapshotView};
use colorpot_types::api::CurrencyView;
use colorpot_types::{
    PlayerStats, RoundPhase, RoundRecord, Stake, DEFAULT_CURRENCY, DEFAULT_HOUSE_ACCOUNT,
    DEFAULT_MIN_BET, DEFAULT_PALETTE, MAX_COLOR_LABEL_LENGTH, MAX_COMMISSION_BPS,
    MAX_CURRENCY_CODE_LENGTH, MAX_CURRENCY_DECIMALS, MAX_HISTORY_PAGE, MAX_USER_ID_LENGTH,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::rng_pipeline::HashChain;
use crate::stats::StatsBook;
use crate::{EngineError, PayoutRule, Round, Wallet};

/// Table behavior, fixed for the table's lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableConfig {
    /// Currency code, also the table's key in the service.
    pub currency: String,
    /// Decimal places of the currency. Every amount below is in minor units.
    pub decimals: u8,
    /// Smallest accepted stake.
    pub min_bet: u64,
    /// House share of each bank in basis points. Zero means winner takes all.
    pub commission_bps: u64,
    /// Wallet entry credited with the commission.
    pub house_account: String,
    /// Labels picked from when a bet carries no color.
    pub palette: Vec<String>,
    /// Credited once when a user first joins.
    pub starting_balance: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            decimals: 0,
            min_bet: DEFAULT_MIN_BET,
            commission_bps: 0,
            house_account: DEFAULT_HOUSE_ACCOUNT.to_string(),
            palette: DEFAULT_PALETTE.iter().map(|label| label.to_string()).collect(),
            starting_balance: 0,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !is_currency_code(&self.currency) {
            return Err("currency must be 1-16 lowercase ascii letters or digits");
        }
        if self.decimals > MAX_CURRENCY_DECIMALS {
            return Err("decimals exceeds the maximum");
        }
        if self.min_bet == 0 {
            return Err("min_bet must be greater than zero");
        }
        if self.commission_bps > MAX_COMMISSION_BPS {
            return Err("commission_bps exceeds the maximum");
        }
        if validate_user_id(&self.house_account).is_err() {
            return Err("house_account is not a valid user id");
        }
        if self.palette.is_empty() {
            return Err("palette must contain at least one color");
        }
        if self
            .palette
            .iter()
            .any(|label| validate_color_label(label).is_err())
        {
            return Err("palette contains an invalid color label");
        }
        Ok(())
    }

    pub fn currency_view(&self) -> CurrencyView {
        CurrencyView {
            currency: self.currency.clone(),
            decimals: self.decimals,
            min_bet: self.min_bet,
        }
    }

    pub fn payout_rule(&self) -> PayoutRule {
        PayoutRule {
            commission_bps: self.commission_bps,
            house_account: self.house_account.clone(),
        }
    }
}

/// Convert a caller-supplied amount into whole minor units.
///
/// Non-finite, non-positive, fractional and out-of-range values fail with
/// [`EngineError::InvalidAmount`] carrying `min`.
pub fn normalize_amount(raw: f64, min: u64) -> Result<u64, EngineError> {
    if !raw.is_finite() || raw <= 0.0 || raw.fract() != 0.0 || raw >= u64::MAX as f64 {
        return Err(EngineError::InvalidAmount { min });
    }
    let amount = raw as u64;
    if amount < min {
        return Err(EngineError::InvalidAmount { min });
    }
    Ok(amount)
}

pub fn validate_user_id(user_id: &str) -> Result<(), EngineError> {
    if user_id.is_empty()
        || user_id.len() > MAX_USER_ID_LENGTH
        || user_id.chars().any(|c| c.is_control() || c.is_whitespace())
    {
        return Err(EngineError::InvalidUserId);
    }
    Ok(())
}

fn is_currency_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CURRENCY_CODE_LENGTH
        && code
            .bytes()
            .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit())
}

pub fn validate_color_label(label: &str) -> Result<(), EngineError> {
    if label.trim().is_empty()
        || label.len() > MAX_COLOR_LABEL_LENGTH
        || label.chars().any(char::is_control)
    {
        return Err(EngineError::InvalidColorLabel);
    }
    Ok(())
}

#[derive(Debug)]
pub struct Table {
    config: TableConfig,
    rule: PayoutRule,
    chain: HashChain,
    wallet: Wallet,
    round: Round,
    archive: BTreeMap<u64, RoundRecord>,
    stats: StatsBook,
    color_rng: StdRng,
}

impl Table {
    /// Fresh table with an empty wallet, opening round 1.
    pub fn new(config: TableConfig, chain: HashChain) -> Self {
        Self::restore(config, chain, Wallet::new(), Vec::new())
    }

    /// Rebuild a table from persisted balances and archived rounds.
    ///
    /// Stats are recomputed from the archive and the next round continues after the highest
    /// archived id.
    pub fn restore(
        config: TableConfig,
        chain: HashChain,
        wallet: Wallet,
        records: Vec<RoundRecord>,
    ) -> Self {
        let mut stats = StatsBook::new();
        let mut archive = BTreeMap::new();
        for record in records {
            if let Some(outcome) = &record.outcome {
                stats.record(&record.stakes, outcome);
            }
            archive.insert(record.round_id, record);
        }
        let next_id = archive.keys().next_back().map_or(1, |id| id + 1);
        let round = Round::new(next_id, chain.generate(next_id));
        info!(
            currency = %config.currency,
            round_id = next_id,
            users = wallet.len(),
            archived = archive.len(),
            "table ready"
        );

        Self {
            rule: config.payout_rule(),
            config,
            chain,
            wallet,
            round,
            archive,
            stats,
            color_rng: StdRng::from_entropy(),
        }
    }

    /// Replace the generator used for server-assigned colors.
    pub fn with_color_rng(mut self, rng: StdRng) -> Self {
        self.color_rng = rng;
        self
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn round_id(&self) -> u64 {
        self.round.id()
    }

    pub fn phase(&self) -> RoundPhase {
        self.round.phase()
    }

    pub fn current_stakes(&self) -> &[Stake] {
        self.round.pool().stakes()
    }

    /// Register a user, crediting `starting_balance` the first time. Returns the balance.
    pub fn join(&mut self, user_id: &str) -> Result<u64, EngineError> {
        validate_user_id(user_id)?;
        if self.wallet.contains(user_id) {
            return Ok(self.wallet.balance(user_id));
        }
        self.wallet.credit(user_id, self.config.starting_balance)?;
        self.wallet.open(user_id);
        info!(user_id, balance = self.config.starting_balance, "user joined");
        Ok(self.wallet.balance(user_id))
    }

    /// Stake `amount` on the active round. Without a label one is drawn from the palette.
    pub fn place_bet(
        &mut self,
        user_id: &str,
        amount: u64,
        color_label: Option<&str>,
    ) -> Result<Stake, EngineError> {
        validate_user_id(user_id)?;
        if amount < self.config.min_bet {
            return Err(EngineError::InvalidAmount {
                min: self.config.min_bet,
            });
        }
        let label = match color_label {
            Some(label) => {
                validate_color_label(label)?;
                label.to_string()
            }
            None => self.pick_color(),
        };
        self.round
            .place_bet(&mut self.wallet, user_id, amount, &label)
            .cloned()
    }

    fn pick_color(&mut self) -> String {
        let index = self.color_rng.gen_range(0..self.config.palette.len());
        self.config.palette[index].clone()
    }

    pub fn snapshot(&self) -> SnapshotView {
        self.round.snapshot()
    }

    pub fn lock_round(&mut self) -> Result<(), EngineError> {
        self.round.lock()
    }

    /// Resolve the locked round, pay out and archive it.
    pub fn resolve_round(&mut self) -> Result<ResolutionView, EngineError> {
        let outcome = self.round.resolve(&mut self.wallet, &self.rule)?.clone();
        self.stats.record(self.round.pool().stakes(), &outcome);
        self.archive.insert(self.round.id(), self.round.record());
        Ok(ResolutionView::new(self.round.id(), &outcome))
    }

    /// Open the next round once the current one has resolved. Returns the new round id.
    pub fn next_round(&mut self) -> Result<u64, EngineError> {
        if self.round.phase() != RoundPhase::Resolved {
            return Err(EngineError::InvalidState {
                phase: self.round.phase(),
                action: "advance",
            });
        }
        Ok(self.open_next())
    }

    /// Close a locked round that drew no stakes and open the next one.
    pub fn void_round(&mut self) -> Result<u64, EngineError> {
        if self.round.phase() != RoundPhase::Locked || !self.round.pool().is_empty() {
            return Err(EngineError::InvalidState {
                phase: self.round.phase(),
                action: "void",
            });
        }
        warn!(
            currency = %self.config.currency,
            round_id = self.round.id(),
            "round voided without participants"
        );
        self.archive.insert(self.round.id(), self.round.record());
        Ok(self.open_next())
    }

    fn open_next(&mut self) -> u64 {
        let id = self.round.id() + 1;
        self.round = Round::new(id, self.chain.generate(id));
        info!(currency = %self.config.currency, round_id = id, "round opened");
        id
    }

    pub fn balance(&self, user_id: &str) -> u64 {
        self.wallet.balance(user_id)
    }

    /// Balance with any stake in the unresolved round added back.
    ///
    /// This is what survives a restart: an interrupted round is refunded.
    pub fn settled_balance(&self, user_id: &str) -> u64 {
        let balance = self.wallet.balance(user_id);
        if self.round.phase() == RoundPhase::Resolved {
            return balance;
        }
        balance.saturating_add(self.round.pool().staked_by(user_id))
    }

    /// Credit external funds. Returns the new balance.
    pub fn deposit(&mut self, user_id: &str, amount: u64) -> Result<u64, EngineError> {
        validate_user_id(user_id)?;
        if amount == 0 {
            return Err(EngineError::InvalidAmount { min: 1 });
        }
        self.wallet.credit(user_id, amount)?;
        info!(currency = %self.config.currency, user_id, amount, "deposit credited");
        Ok(self.wallet.balance(user_id))
    }

    pub fn stats(&self, user_id: &str) -> PlayerStats {
        self.stats.get(user_id)
    }

    pub fn round(&self, round_id: u64) -> Result<&RoundRecord, EngineError> {
        self.archive
            .get(&round_id)
            .ok_or(EngineError::UnknownRound(round_id))
    }

    /// Most recent archived rounds, newest first.
    pub fn recent_rounds(&self, limit: usize) -> Vec<&RoundRecord> {
        self.archive
            .values()
            .rev()
            .take(limit.min(MAX_HISTORY_PAGE))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng_pipeline::verify_record;
    use colorpot_types::COMMITMENT_LEN;

    fn table(config: TableConfig) -> Table {
        Table::new(config, HashChain::from_secret([11u8; COMMITMENT_LEN]))
            .with_color_rng(StdRng::seed_from_u64(5))
    }

    fn funded_table() -> Table {
        let mut table = table(TableConfig::default());
        table.deposit("alice", 100).unwrap();
        table.deposit("bob", 100).unwrap();
        table
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TableConfig::default().validate().is_ok());
        let bad = TableConfig {
            commission_bps: MAX_COMMISSION_BPS + 1,
            ..TableConfig::default()
        };
        assert!(bad.validate().is_err());
        let empty_palette = TableConfig {
            palette: Vec::new(),
            ..TableConfig::default()
        };
        assert!(empty_palette.validate().is_err());
    }

    #[test]
    fn test_currency_validation() {
        let ton = TableConfig {
            currency: "ton".into(),
            decimals: 2,
            min_bet: 10,
            ..TableConfig::default()
        };
        assert!(ton.validate().is_ok());
        assert_eq!(
            ton.currency_view(),
            CurrencyView {
                currency: "ton".into(),
                decimals: 2,
                min_bet: 10
            }
        );

        for code in ["", "TON", "t-o-n", "averyveryverylongcode"] {
            let bad = TableConfig {
                currency: code.into(),
                ..TableConfig::default()
            };
            assert!(bad.validate().is_err(), "{code:?}");
        }
        let too_precise = TableConfig {
            decimals: MAX_CURRENCY_DECIMALS + 1,
            ..TableConfig::default()
        };
        assert!(too_precise.validate().is_err());
    }

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount(5.0, 1), Ok(5));
        assert_eq!(normalize_amount(-5.0, 1), Err(EngineError::InvalidAmount { min: 1 }));
        assert_eq!(normalize_amount(0.0, 1), Err(EngineError::InvalidAmount { min: 1 }));
        assert_eq!(normalize_amount(2.5, 1), Err(EngineError::InvalidAmount { min: 1 }));
        assert_eq!(
            normalize_amount(f64::NAN, 1),
            Err(EngineError::InvalidAmount { min: 1 })
        );
        assert_eq!(
            normalize_amount(f64::INFINITY, 1),
            Err(EngineError::InvalidAmount { min: 1 })
        );
        assert_eq!(normalize_amount(5.0, 10), Err(EngineError::InvalidAmount { min: 10 }));
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let mut table = table(TableConfig::default());
        table.deposit("carol", 30).unwrap();
        let err = table.place_bet("carol", 50, Some("red")).unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientFunds {
                balance: 30,
                required: 50
            }
        );
        assert_eq!(table.balance("carol"), 30);
        assert!(table.snapshot().entries.is_empty());
    }

    #[test]
    fn test_min_bet_enforced() {
        let mut table = table(TableConfig {
            min_bet: 10,
            ..TableConfig::default()
        });
        table.deposit("alice", 100).unwrap();
        assert_eq!(
            table.place_bet("alice", 9, None),
            Err(EngineError::InvalidAmount { min: 10 })
        );
        assert!(table.place_bet("alice", 10, None).is_ok());
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut table = funded_table();
        assert_eq!(table.place_bet("", 10, None), Err(EngineError::InvalidUserId));
        assert_eq!(
            table.place_bet("alice", 10, Some("   ")),
            Err(EngineError::InvalidColorLabel)
        );
        assert_eq!(
            table.place_bet("alice", 10, Some("x".repeat(MAX_COLOR_LABEL_LENGTH + 1).as_str())),
            Err(EngineError::InvalidColorLabel)
        );
        assert_eq!(table.balance("alice"), 100);
    }

    #[test]
    fn test_color_assigned_from_palette() {
        let mut table = funded_table();
        for _ in 0..10 {
            let stake = table.place_bet("alice", 1, None).unwrap();
            assert!(DEFAULT_PALETTE.contains(&stake.color_label.as_str()));
        }
        let stake = table.place_bet("bob", 1, Some("violet")).unwrap();
        assert_eq!(stake.color_label, "violet");
    }

    #[test]
    fn test_join_credits_starting_balance_once() {
        let mut table = table(TableConfig {
            starting_balance: 50,
            ..TableConfig::default()
        });
        assert_eq!(table.join("dave"), Ok(50));
        table.place_bet("dave", 20, None).unwrap();
        assert_eq!(table.join("dave"), Ok(30));
        assert_eq!(table.join("bad id"), Err(EngineError::InvalidUserId));
    }

    #[test]
    fn test_full_round_lifecycle() {
        let mut table = funded_table();
        assert_eq!(table.round_id(), 1);
        table.place_bet("alice", 30, Some("red")).unwrap();
        table.place_bet("bob", 70, Some("black")).unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.bank, 100);
        assert_eq!(snapshot.entries[0].percent, 30.0);
        assert_eq!(snapshot.entries[1].percent, 70.0);

        table.lock_round().unwrap();
        let resolution = table.resolve_round().unwrap();
        assert_eq!(resolution.round_id, 1);
        assert_eq!(resolution.bank, 100);
        assert_eq!(resolution.payout, 100);
        assert_eq!(table.wallet().total(), 200);

        let record = table.round(1).unwrap();
        assert_eq!(verify_record(record), Ok(()));
        assert_eq!(table.stats("alice").games_played, 1);
        assert_eq!(table.stats(&resolution.winner.user_id).games_won, 1);

        assert_eq!(table.next_round(), Ok(2));
        assert_eq!(table.phase(), RoundPhase::Open);
        assert_eq!(table.snapshot().bank, 0);
    }

    #[test]
    fn test_double_resolve_rejected() {
        let mut table = funded_table();
        table.place_bet("alice", 10, None).unwrap();
        table.lock_round().unwrap();
        let first = table.resolve_round().unwrap();
        assert_eq!(
            table.resolve_round(),
            Err(EngineError::InvalidState {
                phase: RoundPhase::Resolved,
                action: "resolve"
            })
        );
        let archived = table.round(1).unwrap().outcome.as_ref().unwrap();
        assert_eq!(archived.draw_value, first.draw_value);
        assert_eq!(table.stats("alice").games_played, 1);
    }

    #[test]
    fn test_empty_round_has_no_participants() {
        let mut table = funded_table();
        table.lock_round().unwrap();
        assert_eq!(table.resolve_round(), Err(EngineError::NoParticipants));
        assert_eq!(table.phase(), RoundPhase::Locked);
        assert_eq!(table.balance("alice"), 100);
        assert_eq!(table.balance("bob"), 100);
    }

    #[test]
    fn test_void_only_empty_locked_round() {
        let mut table = funded_table();
        assert!(table.void_round().is_err());

        table.lock_round().unwrap();
        assert_eq!(table.void_round(), Ok(2));
        assert!(table.round(1).unwrap().is_voided());

        table.place_bet("alice", 5, None).unwrap();
        table.lock_round().unwrap();
        assert_eq!(
            table.void_round(),
            Err(EngineError::InvalidState {
                phase: RoundPhase::Locked,
                action: "void"
            })
        );
    }

    #[test]
    fn test_next_round_requires_resolution() {
        let mut table = funded_table();
        assert_eq!(
            table.next_round(),
            Err(EngineError::InvalidState {
                phase: RoundPhase::Open,
                action: "advance"
            })
        );
    }

    #[test]
    fn test_settled_balance_includes_open_stakes() {
        let mut table = funded_table();
        table.place_bet("alice", 40, None).unwrap();
        assert_eq!(table.balance("alice"), 60);
        assert_eq!(table.settled_balance("alice"), 100);

        table.lock_round().unwrap();
        assert_eq!(table.settled_balance("alice"), 100);
        table.resolve_round().unwrap();
        assert_eq!(table.settled_balance("alice"), table.balance("alice"));
    }

    #[test]
    fn test_commission_credited_to_house() {
        let mut table = table(TableConfig {
            commission_bps: 500,
            ..TableConfig::default()
        });
        table.deposit("alice", 100).unwrap();
        table.deposit("bob", 100).unwrap();
        table.place_bet("alice", 100, None).unwrap();
        table.place_bet("bob", 100, None).unwrap();
        table.lock_round().unwrap();

        let resolution = table.resolve_round().unwrap();
        assert_eq!(resolution.commission, 10);
        assert_eq!(resolution.payout, 190);
        assert_eq!(table.balance(DEFAULT_HOUSE_ACCOUNT), 10);
        assert_eq!(table.wallet().total(), 200);
    }

    #[test]
    fn test_deposit_validation() {
        let mut table = table(TableConfig::default());
        assert_eq!(table.deposit("alice", 0), Err(EngineError::InvalidAmount { min: 1 }));
        assert_eq!(table.deposit("alice", 7), Ok(7));
        assert_eq!(table.deposit("alice", u64::MAX), Err(EngineError::BalanceOverflow));
        assert_eq!(table.balance("alice"), 7);
    }

    #[test]
    fn test_history_queries() {
        let mut table = funded_table();
        for _ in 0..3 {
            table.place_bet("alice", 1, None).unwrap();
            table.lock_round().unwrap();
            table.resolve_round().unwrap();
            table.next_round().unwrap();
        }
        assert_eq!(table.round(9), Err(EngineError::UnknownRound(9)));
        let recent: Vec<u64> = table.recent_rounds(2).iter().map(|r| r.round_id).collect();
        assert_eq!(recent, vec![3, 2]);
        assert_eq!(table.recent_rounds(usize::MAX).len(), 3);
    }

    #[test]
    fn test_restore_continues_after_archive() {
        let mut table = funded_table();
        table.place_bet("alice", 10, None).unwrap();
        table.lock_round().unwrap();
        table.resolve_round().unwrap();
        table.next_round().unwrap();
        table.place_bet("bob", 25, None).unwrap();

        let balances: Vec<(String, u64)> = ["alice", "bob"]
            .iter()
            .map(|user| (user.to_string(), table.settled_balance(user)))
            .collect();
        let records: Vec<RoundRecord> = table.recent_rounds(10).into_iter().cloned().collect();

        let restored = Table::restore(
            TableConfig::default(),
            HashChain::from_secret([11u8; COMMITMENT_LEN]),
            Wallet::from_balances(balances),
            records,
        );
        assert_eq!(restored.round_id(), 2);
        assert_eq!(restored.phase(), RoundPhase::Open);
        assert_eq!(restored.wallet().total(), 200);
        assert_eq!(restored.stats("alice"), table.stats("alice"));
        assert_eq!(restored.snapshot().commit, table.snapshot().commit);
    }
}
