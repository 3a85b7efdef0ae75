//! Shared service state.
//!
//! The service runs one [`Table`] per currency. Every mutation goes through [`AppState`], which
//! holds that table's lock for the whole operation, then publishes the new snapshot and queues
//! the settled balances it touched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use colorpot_execution::{EngineError, ScheduledAction, Table};
use colorpot_types::api::{CurrencyView, ResolutionView, SnapshotView};
use colorpot_types::{RoundPhase, Stake};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::persistence::TablePersistence;
use crate::protocol::{OutboundEvent, Scoped};

struct Desk {
    table: Mutex<Table>,
    snapshots: watch::Sender<SnapshotView>,
}

impl Desk {
    /// A panic while holding the lock cannot leave the table half-applied, so poisoning is
    /// ignored.
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct AppState {
    desks: Arc<BTreeMap<String, Desk>>,
    events: broadcast::Sender<OutboundEvent>,
    persistence: Option<TablePersistence>,
    admin_token: Option<String>,
    platform_token: Option<String>,
}

impl AppState {
    pub fn new(
        tables: Vec<Table>,
        persistence: Option<TablePersistence>,
        admin_token: Option<String>,
        platform_token: Option<String>,
        event_buffer: usize,
    ) -> Self {
        let desks: BTreeMap<String, Desk> = tables
            .into_iter()
            .map(|table| {
                let currency = table.currency().to_string();
                let (snapshots, _) = watch::channel(table.snapshot());
                let desk = Desk {
                    table: Mutex::new(table),
                    snapshots,
                };
                (currency, desk)
            })
            .collect();
        let (events, _) = broadcast::channel(event_buffer);
        Self {
            desks: Arc::new(desks),
            events,
            persistence,
            admin_token,
            platform_token,
        }
    }

    fn desk(&self, currency: &str) -> Result<&Desk, EngineError> {
        self.desks
            .get(currency)
            .ok_or_else(|| EngineError::UnknownCurrency(currency.to_string()))
    }

    pub fn table(&self, currency: &str) -> Result<MutexGuard<'_, Table>, EngineError> {
        Ok(self.desk(currency)?.lock())
    }

    pub fn currencies(&self) -> Vec<CurrencyView> {
        self.desks
            .values()
            .map(|desk| desk.lock().config().currency_view())
            .collect()
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    pub fn platform_token(&self) -> Option<&str> {
        self.platform_token.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.events.subscribe()
    }

    /// Last published snapshot. Never observes a half-applied bet.
    pub fn snapshot(&self, currency: &str) -> Result<SnapshotView, EngineError> {
        Ok(self.desk(currency)?.snapshots.borrow().clone())
    }

    /// Last published snapshot of every table, tagged with its currency.
    pub fn snapshots(&self) -> Vec<Scoped<SnapshotView>> {
        self.desks
            .iter()
            .map(|(currency, desk)| Scoped::new(currency, desk.snapshots.borrow().clone()))
            .collect()
    }

    /// Current `(round_id, phase)`.
    pub fn position(&self, currency: &str) -> Result<(u64, RoundPhase), EngineError> {
        let snapshot = self.desk(currency)?.snapshots.borrow();
        Ok((snapshot.round_id, snapshot.phase))
    }

    fn publish(&self, desk: &Desk, table: &Table) {
        let snapshot = table.snapshot();
        desk.snapshots.send_replace(snapshot.clone());
        // No subscribers is fine.
        let _ = self
            .events
            .send(OutboundEvent::State(Scoped::new(table.currency(), snapshot)));
    }

    fn persist_users<'a>(&self, table: &Table, users: impl IntoIterator<Item = &'a str>) {
        if let Some(persistence) = &self.persistence {
            persistence.persist_balances(table.currency(), settled(table, users));
        }
    }

    pub fn join(&self, currency: &str, user_id: &str) -> Result<u64, EngineError> {
        let mut table = self.table(currency)?;
        let balance = table.join(user_id)?;
        self.persist_users(&table, [user_id]);
        Ok(balance)
    }

    pub fn place_bet(
        &self,
        currency: &str,
        user_id: &str,
        amount: u64,
        color_label: Option<&str>,
    ) -> Result<(Stake, u64), EngineError> {
        let desk = self.desk(currency)?;
        let mut table = desk.lock();
        let stake = table.place_bet(user_id, amount, color_label)?;
        self.publish(desk, &table);
        Ok((stake, table.balance(user_id)))
    }

    pub fn deposit(&self, currency: &str, user_id: &str, amount: u64) -> Result<u64, EngineError> {
        let mut table = self.table(currency)?;
        let balance = table.deposit(user_id, amount)?;
        self.persist_users(&table, [user_id]);
        Ok(balance)
    }

    pub fn lock_round(&self, currency: &str) -> Result<SnapshotView, EngineError> {
        let desk = self.desk(currency)?;
        let mut table = desk.lock();
        table.lock_round()?;
        self.publish(desk, &table);
        Ok(table.snapshot())
    }

    pub fn resolve_round(&self, currency: &str) -> Result<ResolutionView, EngineError> {
        let desk = self.desk(currency)?;
        let mut table = desk.lock();
        let resolution = table.resolve_round()?;

        if let Some(persistence) = &self.persistence {
            let house = table.config().house_account.clone();
            let users: BTreeSet<&str> = table
                .current_stakes()
                .iter()
                .map(|stake| stake.user_id.as_str())
                .chain([house.as_str()])
                .collect();
            let record = table.round(resolution.round_id)?.clone();
            persistence.persist_settlement(currency, settled(&table, users), record);
        }

        self.publish(desk, &table);
        let _ = self.events.send(OutboundEvent::Result(Scoped::new(
            currency,
            resolution.clone(),
        )));
        Ok(resolution)
    }

    pub fn next_round(&self, currency: &str) -> Result<SnapshotView, EngineError> {
        let desk = self.desk(currency)?;
        let mut table = desk.lock();
        table.next_round()?;
        self.publish(desk, &table);
        Ok(table.snapshot())
    }

    pub fn void_round(&self, currency: &str) -> Result<SnapshotView, EngineError> {
        let desk = self.desk(currency)?;
        let mut table = desk.lock();
        let voided = table.round_id();
        table.void_round()?;
        if let Some(persistence) = &self.persistence {
            persistence.persist_settlement(currency, Vec::new(), table.round(voided)?.clone());
        }
        self.publish(desk, &table);
        Ok(table.snapshot())
    }

    /// Apply a scheduler action. A resolve with no participants voids the round instead.
    pub fn apply(&self, currency: &str, action: ScheduledAction) -> Result<RoundPhase, EngineError> {
        debug!(currency, ?action, "scheduled transition");
        let snapshot = match action {
            ScheduledAction::Lock => self.lock_round(currency)?,
            ScheduledAction::Resolve => match self.resolve_round(currency) {
                Ok(_) => self.snapshot(currency)?,
                Err(EngineError::NoParticipants) => self.void_round(currency)?,
                Err(err) => return Err(err),
            },
            ScheduledAction::NextRound => self.next_round(currency)?,
        };
        Ok(snapshot.phase)
    }
}

fn settled<'a>(table: &Table, users: impl IntoIterator<Item = &'a str>) -> Vec<(String, u64)> {
    users
        .into_iter()
        .map(|user| (user.to_string(), table.settled_balance(user)))
        .collect()
}
