//! In-memory calendar database.
//!
//! Each connection works on a private copy of the tables; commit publishes the
//! copy, rollback drops it. Backs the test suite and callers that embed the
//! batch without PostgreSQL.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::debug;

use super::{CalendarStore, StoreConnector};
use crate::merge::{apply_plan, plan_merge};
use crate::models::{CalendarDay, MergeSummary, ScheduledEvent, StagedHoliday};
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
struct Tables {
    schema_ready: bool,
    calendar: BTreeMap<NaiveDate, String>,
    holidays: BTreeMap<NaiveDate, String>,
    events: BTreeMap<i32, ScheduledEvent>,
    next_event_id: i32,
    calendar_staging: Vec<CalendarDay>,
    holiday_staging: Vec<StagedHoliday>,
}

/// Shared handle to the committed state.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    committed: Arc<Mutex<Tables>>,
    reachable: Arc<AtomicBool>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            committed: Arc::new(Mutex::new(Tables {
                next_event_id: 1,
                ..Tables::default()
            })),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { db: self.clone() }
    }

    /// Make subsequent connection attempts fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Committed calendar master, date to weekday label.
    pub fn calendar(&self) -> BTreeMap<NaiveDate, String> {
        self.tables().calendar.clone()
    }

    /// Committed holiday master, date to holiday name.
    pub fn holidays(&self) -> BTreeMap<NaiveDate, String> {
        self.tables().holidays.clone()
    }

    pub fn events(&self) -> Vec<ScheduledEvent> {
        self.tables().events.values().cloned().collect()
    }

    pub fn holiday_staging(&self) -> Vec<StagedHoliday> {
        self.tables().holiday_staging.clone()
    }

    pub fn schema_ready(&self) -> bool {
        self.tables().schema_ready
    }

    /// Write a calendar row directly, bypassing reconciliation.
    pub fn put_calendar_row(&self, date: NaiveDate, weekday: impl Into<String>) {
        let mut tables = self.tables();
        tables.schema_ready = true;
        tables.calendar.insert(date, weekday.into());
    }

    /// Write a holiday row directly, bypassing reconciliation.
    pub fn put_holiday_row(&self, date: NaiveDate, holiday_name: impl Into<String>) {
        let mut tables = self.tables();
        tables.schema_ready = true;
        tables.holidays.insert(date, holiday_name.into());
    }

    /// Insert an event the way the event handlers do. The date must already
    /// exist in the calendar master.
    pub fn add_event(
        &self,
        date: NaiveDate,
        event_name: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<i32> {
        let mut tables = self.tables();
        if !tables.calendar.contains_key(&date) {
            return Err(Error::Reconciliation(format!(
                "event_t.date {} violates foreign key to calendar_m",
                date
            )));
        }

        let event_id = tables.next_event_id;
        tables.next_event_id += 1;
        tables.events.insert(
            event_id,
            ScheduledEvent {
                event_id,
                date,
                event_name: event_name.into(),
                event_detail: None,
                user_id: Some(user_id.into()),
                user_name: None,
            },
        );
        Ok(event_id)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryConnector {
    db: MemoryDatabase,
}

impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self) -> Result<MemoryStore> {
        if !self.db.reachable.load(Ordering::SeqCst) {
            return Err(Error::Connection("memory database is unreachable".to_string()));
        }
        let snapshot = self.db.tables().clone();
        Ok(MemoryStore {
            db: self.db.clone(),
            tx: snapshot,
        })
    }
}

/// A transaction over a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryStore {
    db: MemoryDatabase,
    tx: Tables,
}

impl MemoryStore {
    fn require_schema(&self) -> Result<()> {
        if self.tx.schema_ready {
            Ok(())
        } else {
            Err(Error::Reconciliation("staging tables do not exist".to_string()))
        }
    }
}

impl CalendarStore for MemoryStore {
    async fn ensure_schema(&mut self) -> Result<()> {
        self.tx.schema_ready = true;
        Ok(())
    }

    async fn stage_calendar<I>(&mut self, days: I) -> Result<u64>
    where
        I: IntoIterator<Item = CalendarDay>,
    {
        self.require_schema()?;
        self.tx.calendar_staging.clear();
        self.tx.calendar_staging.extend(days);
        Ok(self.tx.calendar_staging.len() as u64)
    }

    async fn merge_calendar(&mut self) -> Result<MergeSummary> {
        self.require_schema()?;
        let staged = self
            .tx
            .calendar_staging
            .iter()
            .map(|day| (day.date, day.weekday.to_string()));
        let plan = plan_merge(staged, &self.tx.calendar);
        debug!(updates = plan.updates.len(), inserts = plan.inserts.len(), "Calendar merge planned");
        Ok(apply_plan(plan, &mut self.tx.calendar))
    }

    async fn stage_holidays(&mut self, rows: &[StagedHoliday]) -> Result<u64> {
        if !self.tx.schema_ready {
            return Err(Error::Import("holiday staging table does not exist".to_string()));
        }
        self.tx.holiday_staging = rows.to_vec();
        Ok(rows.len() as u64)
    }

    async fn merge_holidays(&mut self) -> Result<MergeSummary> {
        self.require_schema()?;
        let staged = self
            .tx
            .holiday_staging
            .iter()
            .map(|row| (row.date, row.holiday_name.clone()));
        let plan = plan_merge(staged, &self.tx.holidays);
        debug!(updates = plan.updates.len(), inserts = plan.inserts.len(), "Holiday merge planned");
        Ok(apply_plan(plan, &mut self.tx.holidays))
    }

    async fn commit(self) -> Result<()> {
        *self.db.tables() = self.tx;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
