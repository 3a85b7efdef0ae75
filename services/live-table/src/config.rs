use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use colorpot_execution::{parse_units, PhaseConfig, TableConfig};
use colorpot_types::COMMITMENT_LEN;
use commonware_utils::from_hex_formatted;

#[derive(Parser, Debug)]
#[command(author, version, about = "Colorpot live table service")]
pub struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, env = "COLORPOT_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(short, long, env = "COLORPOT_PORT", default_value_t = 9123)]
    pub port: u16,

    /// Betting window in milliseconds.
    #[arg(long, env = "COLORPOT_BETTING_MS", default_value_t = 30_000)]
    pub betting_ms: u64,

    /// Delay between closing bets and drawing the winner.
    #[arg(long, env = "COLORPOT_LOCK_MS", default_value_t = 3_000)]
    pub lock_ms: u64,

    /// How long a result stays up before the next round opens.
    #[arg(long, env = "COLORPOT_PAYOUT_MS", default_value_t = 8_000)]
    pub payout_ms: u64,

    /// Scheduler tick interval in milliseconds.
    #[arg(long, env = "COLORPOT_TICK_MS", default_value_t = 250)]
    pub tick_ms: u64,

    /// Disable the scheduler; rounds advance only through the admin endpoints.
    #[arg(long, env = "COLORPOT_MANUAL_ROUNDS", default_value_t = false)]
    pub manual_rounds: bool,

    /// Tables to run, one per currency, as `code:decimals:min_bet[:starting_balance]`.
    /// Amounts here are whole coins (`0.1`); the tables count minor units.
    #[arg(
        long = "currency",
        env = "COLORPOT_CURRENCIES",
        value_delimiter = ',',
        default_value = "stars:0:10,ton:2:0.1"
    )]
    pub currencies: Vec<String>,

    /// House commission in basis points (0 = winner takes all).
    #[arg(long, env = "COLORPOT_COMMISSION_BPS", default_value_t = 0)]
    pub commission_bps: u64,

    #[arg(long, env = "COLORPOT_HOUSE_ACCOUNT", default_value = "house")]
    pub house_account: String,

    /// Comma-separated labels assigned to bets placed without a color.
    #[arg(
        long,
        env = "COLORPOT_PALETTE",
        value_delimiter = ',',
        default_value = "red,black,green"
    )]
    pub palette: Vec<String>,

    /// Path to SQLite database for balances and round history (disabled when omitted).
    #[arg(long, env = "COLORPOT_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Token required by admin endpoints. Admin access is refused when unset.
    #[arg(long, env = "COLORPOT_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Token the host platform presents on player requests (`x-platform-token`). Player
    /// requests are trusted as-is when unset.
    #[arg(long, env = "COLORPOT_PLATFORM_TOKEN")]
    pub platform_token: Option<String>,

    /// Hex master secret for the draw chains (random when omitted).
    #[arg(long, env = "COLORPOT_MASTER_SECRET")]
    pub master_secret: Option<String>,

    /// Capacity of the broadcast channel feeding WebSocket clients.
    #[arg(long, env = "COLORPOT_EVENT_BUFFER", default_value_t = 1024)]
    pub event_buffer: usize,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub addr: SocketAddr,
    pub phases: PhaseConfig,
    pub tick: Duration,
    pub manual_rounds: bool,
    pub tables: Vec<TableConfig>,
    pub db_path: Option<PathBuf>,
    pub admin_token: Option<String>,
    pub platform_token: Option<String>,
    pub master_secret: Option<[u8; COMMITMENT_LEN]>,
    pub event_buffer: usize,
}

impl Args {
    pub fn into_config(self) -> anyhow::Result<ServiceConfig> {
        let phases = PhaseConfig::new(self.betting_ms, self.lock_ms, self.payout_ms);
        phases.validate().map_err(anyhow::Error::msg)?;
        if self.tick_ms == 0 {
            bail!("tick_ms must be greater than zero");
        }

        let shared = TableConfig {
            commission_bps: self.commission_bps,
            house_account: self.house_account,
            palette: self
                .palette
                .into_iter()
                .map(|label| label.trim().to_string())
                .filter(|label| !label.is_empty())
                .collect(),
            ..TableConfig::default()
        };
        let tables = self
            .currencies
            .iter()
            .map(|spec| parse_currency(spec, &shared))
            .collect::<anyhow::Result<Vec<_>>>()?;
        if tables.is_empty() {
            bail!("at least one currency is required");
        }
        let mut seen = BTreeSet::new();
        for table in &tables {
            if !seen.insert(table.currency.as_str()) {
                bail!("currency {} configured twice", table.currency);
            }
        }

        let master_secret = self
            .master_secret
            .as_deref()
            .map(parse_master_secret)
            .transpose()?;

        Ok(ServiceConfig {
            addr: SocketAddr::new(self.host, self.port),
            phases,
            tick: Duration::from_millis(self.tick_ms),
            manual_rounds: self.manual_rounds,
            tables,
            db_path: self.db_path,
            admin_token: self.admin_token.filter(|token| !token.is_empty()),
            platform_token: self.platform_token.filter(|token| !token.is_empty()),
            master_secret,
            event_buffer: self.event_buffer.max(1),
        })
    }
}

fn parse_currency(spec: &str, shared: &TableConfig) -> anyhow::Result<TableConfig> {
    let fields: Vec<&str> = spec.split(':').map(str::trim).collect();
    let (code, decimals, min_bet, starting_balance) = match fields.as_slice() {
        [code, decimals, min_bet] => (*code, *decimals, *min_bet, "0"),
        [code, decimals, min_bet, starting_balance] => {
            (*code, *decimals, *min_bet, *starting_balance)
        }
        _ => bail!("currency {spec:?} must be code:decimals:min_bet[:starting_balance]"),
    };
    let decimals: u8 = decimals
        .parse()
        .with_context(|| format!("invalid decimals for {code}"))?;
    let units = |raw: &str, field: &str| {
        parse_units(raw, decimals).with_context(|| format!("invalid {field} for {code}: {raw}"))
    };

    let table = TableConfig {
        currency: code.to_string(),
        decimals,
        min_bet: units(min_bet, "min_bet")?,
        starting_balance: units(starting_balance, "starting_balance")?,
        ..shared.clone()
    };
    table
        .validate()
        .map_err(|err| anyhow::anyhow!("{code}: {err}"))?;
    Ok(table)
}

fn parse_master_secret(raw: &str) -> anyhow::Result<[u8; COMMITMENT_LEN]> {
    let bytes = from_hex_formatted(raw).context("master secret is not valid hex")?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        anyhow::anyhow!(
            "master secret must be {COMMITMENT_LEN} bytes, got {}",
            bytes.len()
        )
    })
}
