//! Persistence seam for the batch.
//!
//! A [`CalendarStore`] is one open transaction against the calendar database.
//! Nothing it writes is visible to other connections until [`CalendarStore::commit`];
//! both `commit` and `rollback` consume the store and release its connection.

pub mod memory;
pub mod postgres;

use crate::models::{CalendarDay, MergeSummary, StagedHoliday};
use crate::Result;

pub use memory::{MemoryConnector, MemoryDatabase, MemoryStore};
pub use postgres::{PgConnector, PgStore};

/// Opens a [`CalendarStore`] transaction.
#[allow(async_fn_in_trait)]
pub trait StoreConnector {
    type Store: CalendarStore;

    /// Fails with [`crate::Error::Connection`] when the database is unreachable.
    async fn connect(&self) -> Result<Self::Store>;
}

#[allow(async_fn_in_trait)]
pub trait CalendarStore: Sized {
    /// Create the master, event and staging tables if they do not exist.
    async fn ensure_schema(&mut self) -> Result<()>;

    /// Replace the calendar staging contents with `days`.
    async fn stage_calendar<I>(&mut self, days: I) -> Result<u64>
    where
        I: IntoIterator<Item = CalendarDay>;

    /// Merge calendar staging into the calendar master.
    async fn merge_calendar(&mut self) -> Result<MergeSummary>;

    /// Replace the holiday staging contents with `rows`, keeping their order.
    async fn stage_holidays(&mut self, rows: &[StagedHoliday]) -> Result<u64>;

    /// Merge holiday staging into the holiday master. When staging holds the
    /// same date more than once, the row staged last wins.
    async fn merge_holidays(&mut self) -> Result<MergeSummary>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
