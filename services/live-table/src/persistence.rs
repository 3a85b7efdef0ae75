//! SQLite store for settled balances and archived rounds, keyed by currency.
//!
//! Writes are queued to a dedicated worker thread so table mutations never wait on disk. The
//! queue is unbounded: a dropped balance write would break conservation after a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::Context;
use colorpot_types::RoundRecord;
use rusqlite::{params, Connection};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

enum PersistRequest {
    Balances {
        currency: String,
        balances: Vec<(String, u64)>,
    },
    /// Balances and the archived round, committed together.
    Settlement {
        currency: String,
        balances: Vec<(String, u64)>,
        record: RoundRecord,
    },
    Shutdown,
}

/// State of one table recovered at startup.
#[derive(Debug, Default, PartialEq)]
pub struct PersistedTable {
    pub balances: Vec<(String, u64)>,
    pub rounds: Vec<RoundRecord>,
}

#[derive(Clone)]
pub struct TablePersistence {
    sender: mpsc::UnboundedSender<PersistRequest>,
}

impl TablePersistence {
    pub fn load_and_start_sqlite(
        path: &Path,
    ) -> anyhow::Result<(Self, BTreeMap<String, PersistedTable>, JoinHandle<()>)> {
        let conn = Connection::open(path).context("open table persistence db")?;
        init_schema_sqlite(&conn)?;

        let mut persisted: BTreeMap<String, PersistedTable> = BTreeMap::new();
        for (currency, user_id, balance) in load_balances_sqlite(&conn)? {
            persisted
                .entry(currency)
                .or_default()
                .balances
                .push((user_id, balance));
        }
        for (currency, record) in load_rounds_sqlite(&conn)? {
            persisted.entry(currency).or_default().rounds.push(record);
        }
        drop(conn);
        for (currency, table) in &persisted {
            info!(
                path = %path.display(),
                %currency,
                balances = table.balances.len(),
                rounds = table.rounds.len(),
                "loaded table state"
            );
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let path = path.to_path_buf();
        let worker = std::thread::spawn(move || {
            persistence_worker(path, receiver);
        });

        Ok((Self { sender }, persisted, worker))
    }

    pub fn persist_balances(&self, currency: &str, balances: Vec<(String, u64)>) {
        if balances.is_empty() {
            return;
        }
        self.send(PersistRequest::Balances {
            currency: currency.to_string(),
            balances,
        });
    }

    pub fn persist_settlement(
        &self,
        currency: &str,
        balances: Vec<(String, u64)>,
        record: RoundRecord,
    ) {
        self.send(PersistRequest::Settlement {
            currency: currency.to_string(),
            balances,
            record,
        });
    }

    /// Ask the worker to stop once every earlier request is written.
    pub fn shutdown(&self) {
        self.send(PersistRequest::Shutdown);
    }

    fn send(&self, request: PersistRequest) {
        if self.sender.send(request).is_err() {
            warn!("table persistence worker stopped; dropping write");
        }
    }
}

// Balances are decimal TEXT: SQLite integers are signed and wallets hold any u64.
fn init_schema_sqlite(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         CREATE TABLE IF NOT EXISTS balances (
             currency TEXT NOT NULL,
             user_id TEXT NOT NULL,
             balance TEXT NOT NULL,
             PRIMARY KEY (currency, user_id)
         );
         CREATE TABLE IF NOT EXISTS rounds (
             currency TEXT NOT NULL,
             round_id INTEGER NOT NULL,
             record_json TEXT NOT NULL,
             PRIMARY KEY (currency, round_id)
         );",
    )
    .context("init table persistence schema")?;
    Ok(())
}

fn load_balances_sqlite(conn: &Connection) -> anyhow::Result<Vec<(String, String, u64)>> {
    let mut stmt = conn
        .prepare("SELECT currency, user_id, balance FROM balances ORDER BY currency, user_id")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut balances = Vec::new();
    for row in rows {
        let (currency, user_id, balance) = row?;
        let balance = balance
            .parse::<u64>()
            .with_context(|| format!("invalid {currency} balance stored for {user_id}"))?;
        balances.push((currency, user_id, balance));
    }
    Ok(balances)
}

fn load_rounds_sqlite(conn: &Connection) -> anyhow::Result<Vec<(String, RoundRecord)>> {
    let mut stmt = conn
        .prepare("SELECT currency, record_json FROM rounds ORDER BY currency, round_id ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut rounds = Vec::new();
    for row in rows {
        let (currency, json) = row?;
        let record: RoundRecord =
            serde_json::from_str(&json).context("decode round record for persistence")?;
        rounds.push((currency, record));
    }
    Ok(rounds)
}

fn write_balances(
    conn: &Connection,
    currency: &str,
    balances: &[(String, u64)],
) -> anyhow::Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO balances (currency, user_id, balance) VALUES (?, ?, ?)",
    )?;
    for (user_id, balance) in balances {
        stmt.execute(params![currency, user_id, balance.to_string()])?;
    }
    Ok(())
}

fn apply_request(conn: &mut Connection, request: &PersistRequest) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    match request {
        PersistRequest::Balances { currency, balances } => {
            write_balances(&tx, currency, balances)?;
        }
        PersistRequest::Settlement {
            currency,
            balances,
            record,
        } => {
            write_balances(&tx, currency, balances)?;
            let round_id =
                i64::try_from(record.round_id).context("round id exceeds storage range")?;
            let json = serde_json::to_string(record).context("encode round record")?;
            tx.execute(
                "INSERT OR REPLACE INTO rounds (currency, round_id, record_json) VALUES (?, ?, ?)",
                params![currency, round_id, json],
            )?;
        }
        PersistRequest::Shutdown => {}
    }
    tx.commit()?;
    Ok(())
}

fn persistence_worker(path: PathBuf, mut receiver: mpsc::UnboundedReceiver<PersistRequest>) {
    let mut conn = match Connection::open(&path) {
        Ok(conn) => conn,
        Err(err) => {
            error!("Table persistence open failed: {err}");
            return;
        }
    };

    if let Err(err) = init_schema_sqlite(&conn) {
        error!("Table persistence init failed: {err}");
        return;
    }

    while let Some(request) = receiver.blocking_recv() {
        if matches!(request, PersistRequest::Shutdown) {
            break;
        }
        if let Err(err) = apply_request(&mut conn, &request) {
            error!("Table persistence write failed: {err:#}");
        }
    }
    info!("table persistence worker stopped");
}
