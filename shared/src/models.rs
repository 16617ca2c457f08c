//! Shared data models.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One generated calendar date with its weekday label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub weekday: &'static str,
}

impl CalendarDay {
    /// The date rendered as `YYYY-MM-DD`.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.date_string(), self.weekday)
    }
}

/// A holiday row as read from the imported dataset, before reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedHoliday {
    pub date: NaiveDate,
    pub holiday_name: String,
}

impl StagedHoliday {
    pub fn new(date: NaiveDate, holiday_name: impl Into<String>) -> Self {
        Self {
            date,
            holiday_name: holiday_name.into(),
        }
    }
}

/// A user's scheduled event. Written by the event handlers; the batch only
/// guarantees the calendar rows it references survive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event_id: i32,
    pub date: NaiveDate,
    pub event_name: String,
    pub event_detail: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

/// Row counts produced by one merge of staged data into a master table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub updated: u64,
    pub inserted: u64,
}

impl MergeSummary {
    pub fn is_noop(&self) -> bool {
        self.updated == 0 && self.inserted == 0
    }
}

/// Location of an object in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobLocator {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Invocation payload. Every field falls back to configuration.
#[derive(Debug, Default, Deserialize)]
pub struct InitDbRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bucket: Option<String>,
    pub object_key: Option<String>,
}

/// Terminal status reported to the invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

/// Invocation result: `{status, message}`.
#[derive(Debug, Serialize)]
pub struct InitDbResponse {
    pub status: BatchStatus,
    pub message: Option<String>,
}

impl InitDbResponse {
    pub fn success() -> Self {
        Self {
            status: BatchStatus::Success,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: BatchStatus::Error,
            message: Some(message.into()),
        }
    }
}
