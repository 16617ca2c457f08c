//! Shared library for the My Schedule App calendar initialization batch.
//!
//! Generates the calendar master over a date range, imports the holiday
//! dataset, and reconciles both into the calendar database in one transaction.

pub mod batch;
pub mod calendar;
pub mod config;
pub mod dataset;
pub mod db;
pub mod error;
pub mod holiday;
pub mod merge;
pub mod models;
pub mod secrets;
pub mod store;

pub use batch::{BatchPlan, BatchReport, BatchStage, InitBatch};
pub use calendar::{DateRange, DateSequence};
pub use config::Config;
pub use dataset::{DatasetFetcher, LocalDirFetcher, S3Fetcher};
pub use error::{Error, Result};
pub use models::{
    BatchStatus, BlobLocator, CalendarDay, InitDbRequest, InitDbResponse, MergeSummary,
    ScheduledEvent, StagedHoliday,
};
pub use secrets::{get_database_credentials, get_secret, DatabaseCredentials};
pub use store::{CalendarStore, MemoryDatabase, PgConnector, StoreConnector};
