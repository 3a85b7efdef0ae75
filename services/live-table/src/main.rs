use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use colorpot_execution::{HashChain, RoundScheduler, Table, TransitionResult, Wallet};
use rand::rngs::OsRng;
use tokio::time;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod http;
mod persistence;
mod protocol;
mod ws;

use app::AppState;
use config::{Args, ServiceConfig};
use persistence::{PersistedTable, TablePersistence};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::healthz))
        .route("/tables", get(http::list_tables))
        .route("/tables/:currency/snapshot", get(http::get_snapshot))
        .route("/tables/:currency/balance/:user_id", get(http::get_balance))
        .route("/tables/:currency/stats/:user_id", get(http::get_stats))
        .route("/tables/:currency/rounds", get(http::list_rounds))
        .route("/tables/:currency/rounds/:round_id", get(http::get_round))
        .route("/tables/:currency/bet", post(http::place_bet))
        .route("/tables/:currency/deposit", post(http::deposit))
        .route("/tables/:currency/round/lock", post(http::lock_round))
        .route("/tables/:currency/round/resolve", post(http::resolve_round))
        .route("/tables/:currency/round/next", post(http::next_round))
        .route("/tables/:currency/round/void", post(http::void_round))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Walks one table's active round through its timed phases.
///
/// Admin endpoints may move the table between ticks; the driver restarts the phase timer whenever
/// it sees the round or phase change under it.
async fn run_round_driver(
    state: AppState,
    currency: String,
    scheduler: RoundScheduler,
    tick: std::time::Duration,
) {
    let started = Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;

    let Ok(mut position) = state.position(&currency) else {
        warn!(%currency, "no table for round driver");
        return;
    };
    let mut ends_at = scheduler.phase_end_time(position.1, now_ms());
    let mut interval = time::interval(tick);

    loop {
        interval.tick().await;
        let now = now_ms();

        let Ok(current) = state.position(&currency) else {
            return;
        };
        if current != position {
            position = current;
            ends_at = scheduler.phase_end_time(position.1, now);
        }

        let TransitionResult::Apply { action, .. } =
            scheduler.check_transition(position.1, ends_at, now)
        else {
            continue;
        };
        match state.apply(&currency, action) {
            Ok(_) => {
                if let Ok(current) = state.position(&currency) {
                    position = current;
                }
                ends_at = scheduler.phase_end_time(position.1, now);
            }
            Err(err) => {
                warn!(%currency, ?action, code = err.code(), %err, "scheduled transition failed");
                // Retry on the next phase boundary instead of every tick.
                ends_at = scheduler.phase_end_time(position.1, now);
            }
        }
    }
}

fn build_tables(
    config: &ServiceConfig,
    mut persisted: BTreeMap<String, PersistedTable>,
) -> Vec<Table> {
    let master = match config.master_secret {
        Some(secret) => HashChain::from_secret(secret),
        None => HashChain::random(&mut OsRng),
    };
    let tables = config
        .tables
        .iter()
        .map(|table| {
            let restored = persisted.remove(&table.currency).unwrap_or_default();
            Table::restore(
                table.clone(),
                master.for_table(&table.currency),
                Wallet::from_balances(restored.balances),
                restored.rounds,
            )
        })
        .collect();
    for currency in persisted.keys() {
        warn!(%currency, "stored table has no configured currency; leaving it untouched");
    }
    tables
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Args::parse().into_config().context("invalid configuration")?;

    let (persistence, persisted, worker) = match &config.db_path {
        Some(path) => {
            let (persistence, persisted, worker) = TablePersistence::load_and_start_sqlite(path)
                .with_context(|| format!("load table state from {}", path.display()))?;
            (Some(persistence), persisted, Some(worker))
        }
        None => (None, BTreeMap::new(), None),
    };

    let tables = build_tables(&config, persisted);
    let state = AppState::new(
        tables,
        persistence.clone(),
        config.admin_token.clone(),
        config.platform_token.clone(),
        config.event_buffer,
    );

    let mut drivers = Vec::new();
    if config.manual_rounds {
        info!("manual rounds enabled; scheduler disabled");
    } else {
        for table in &config.tables {
            drivers.push(tokio::spawn(run_round_driver(
                state.clone(),
                table.currency.clone(),
                RoundScheduler::new(config.phases),
                config.tick,
            )));
        }
    }

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("bind {}", config.addr))?;
    info!(addr = %config.addr, "live table service listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve live table")?;

    for driver in drivers {
        driver.abort();
    }
    if let (Some(persistence), Some(worker)) = (persistence, worker) {
        persistence.shutdown();
        tokio::task::spawn_blocking(move || worker.join())
            .await
            .context("join persistence worker")?
            .map_err(|_| anyhow::anyhow!("persistence worker panicked"))?;
    }
    Ok(())
}
