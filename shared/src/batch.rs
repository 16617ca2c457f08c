//! The calendar initialization batch.
//!
//! One run:
//! 1. Connects and opens a transaction
//! 2. Ensures the schema exists
//! 3. Reconciles the calendar master over the requested range
//! 4. Downloads the holiday dataset and stages it
//! 5. Reconciles the holiday master
//! 6. Commits
//!
//! Any failure rolls the transaction back and the connection is released on
//! every path. Every step is idempotent, so the invoker may simply run the
//! batch again after a failure.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::calendar::{reconcile_calendar, DateRange};
use crate::dataset::DatasetFetcher;
use crate::holiday::{import_holidays, reconcile_holidays};
use crate::models::{BlobLocator, InitDbRequest, InitDbResponse, MergeSummary};
use crate::store::{CalendarStore, StoreConnector};
use crate::{Config, Error, Result};

/// Progress of a batch run. `Committed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    NotStarted,
    Connected,
    SchemaReady,
    CalendarReconciled,
    HolidayImported,
    HolidayReconciled,
    Committed,
    Failed,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::NotStarted => "not_started",
            BatchStage::Connected => "connected",
            BatchStage::SchemaReady => "schema_ready",
            BatchStage::CalendarReconciled => "calendar_reconciled",
            BatchStage::HolidayImported => "holiday_imported",
            BatchStage::HolidayReconciled => "holiday_reconciled",
            BatchStage::Committed => "committed",
            BatchStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What one run should do.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub range: DateRange,
    pub dataset: BlobLocator,
    pub local_path: PathBuf,
}

impl BatchPlan {
    /// Resolve an invocation against configuration. Without explicit dates the
    /// range is `[today, today + calendar_range_days]`.
    pub fn resolve(config: &Config, request: &InitDbRequest, today: NaiveDate) -> Result<Self> {
        let start = request.start_date.unwrap_or(today);
        let range = match request.end_date {
            Some(end) => DateRange::new(start, end)?,
            None => DateRange::following(start, config.calendar_range_days)?,
        };

        Ok(Self {
            range,
            dataset: BlobLocator {
                bucket: request
                    .bucket
                    .clone()
                    .unwrap_or_else(|| config.data_bucket.clone()),
                key: request
                    .object_key
                    .clone()
                    .unwrap_or_else(|| config.holiday_object_key.clone()),
            },
            local_path: config.holiday_local_path.clone(),
        })
    }
}

/// Outcome of a run, for operators.
#[derive(Debug)]
pub struct BatchReport {
    /// Terminal stage: `Committed` or `Failed`.
    pub stage: BatchStage,
    /// Last stage completed before the failure.
    pub failed_after: Option<BatchStage>,
    pub calendar: MergeSummary,
    pub holidays_staged: u64,
    pub holidays: MergeSummary,
    pub error: Option<Error>,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            stage: BatchStage::NotStarted,
            failed_after: None,
            calendar: MergeSummary::default(),
            holidays_staged: 0,
            holidays: MergeSummary::default(),
            error: None,
        }
    }

    fn advance(&mut self, stage: BatchStage) {
        info!(stage = %stage, "Batch stage reached");
        self.stage = stage;
    }

    fn fail(&mut self, err: Error) {
        error!(
            stage = %self.stage,
            kind = err.kind(),
            retryable = err.is_retryable(),
            "Batch failed: {}",
            err
        );
        // Nothing from a failed run is committed.
        self.calendar = MergeSummary::default();
        self.holidays_staged = 0;
        self.holidays = MergeSummary::default();
        self.failed_after = Some(self.stage);
        self.stage = BatchStage::Failed;
        self.error = Some(err);
    }

    pub fn is_success(&self) -> bool {
        self.stage == BatchStage::Committed
    }

    /// Operator-facing description of the outcome.
    pub fn message(&self) -> String {
        match (&self.error, self.failed_after) {
            (Some(err), Some(stage)) => format!("failed after {}: {}", stage, err),
            (Some(err), None) => err.to_string(),
            _ => format!(
                "calendar {} updated / {} inserted, holidays {} staged / {} updated / {} inserted",
                self.calendar.updated,
                self.calendar.inserted,
                self.holidays_staged,
                self.holidays.updated,
                self.holidays.inserted
            ),
        }
    }

    /// Invoker-facing response. Failure detail stays in the logs.
    pub fn to_response(&self) -> InitDbResponse {
        if self.is_success() {
            InitDbResponse::success()
        } else {
            InitDbResponse::error("Internal server error")
        }
    }
}

/// Runs the batch against injected collaborators.
#[derive(Debug, Clone)]
pub struct InitBatch<C, F> {
    connector: C,
    fetcher: F,
}

impl<C, F> InitBatch<C, F>
where
    C: StoreConnector,
    F: DatasetFetcher,
{
    pub fn new(connector: C, fetcher: F) -> Self {
        Self { connector, fetcher }
    }

    pub async fn run(&self, plan: &BatchPlan) -> BatchReport {
        let mut report = BatchReport::new();
        info!(
            "Starting calendar initialization for {} to {} with {}",
            plan.range.start(),
            plan.range.end(),
            plan.dataset
        );

        let mut store = match self.connector.connect().await {
            Ok(store) => store,
            Err(e) => {
                report.fail(e);
                return report;
            }
        };
        report.advance(BatchStage::Connected);

        let outcome = self.run_steps(&mut store, plan, &mut report).await;
        match outcome {
            Ok(()) => match store.commit().await {
                Ok(()) => {
                    report.advance(BatchStage::Committed);
                    info!("Calendar initialization complete: {}", report.message());
                }
                Err(e) => report.fail(e),
            },
            Err(e) => {
                if let Err(rollback_err) = store.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                report.fail(e);
            }
        }

        report
    }

    async fn run_steps(
        &self,
        store: &mut C::Store,
        plan: &BatchPlan,
        report: &mut BatchReport,
    ) -> Result<()> {
        store.ensure_schema().await?;
        report.advance(BatchStage::SchemaReady);

        report.calendar = reconcile_calendar(store, plan.range).await?;
        report.advance(BatchStage::CalendarReconciled);

        self.fetcher.fetch(&plan.dataset, &plan.local_path).await?;
        report.holidays_staged = import_holidays(store, &plan.local_path).await?;
        report.advance(BatchStage::HolidayImported);

        report.holidays = reconcile_holidays(store).await?;
        report.advance(BatchStage::HolidayReconciled);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LocalDirFetcher;
    use crate::models::{CalendarDay, StagedHoliday};
    use crate::store::{MemoryConnector, MemoryDatabase, MemoryStore};
    use tempfile::TempDir;

    const BUCKET: &str = "schedule-data";
    const KEY: &str = "holiday-data.csv";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        dir: TempDir,
        db: MemoryDatabase,
    }

    impl Fixture {
        fn new(dataset: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join(BUCKET)).unwrap();
            let fixture = Self {
                dir,
                db: MemoryDatabase::new(),
            };
            fixture.write_dataset(dataset);
            fixture
        }

        fn write_dataset(&self, dataset: &str) {
            std::fs::write(self.dir.path().join(BUCKET).join(KEY), dataset).unwrap();
        }

        fn plan(&self, start: NaiveDate, end: NaiveDate) -> BatchPlan {
            BatchPlan {
                range: DateRange::new(start, end).unwrap(),
                dataset: BlobLocator {
                    bucket: BUCKET.to_string(),
                    key: KEY.to_string(),
                },
                local_path: self.dir.path().join("tmp").join(KEY),
            }
        }

        fn batch(&self) -> InitBatch<MemoryConnector, LocalDirFetcher> {
            InitBatch::new(self.db.connector(), LocalDirFetcher::new(self.dir.path()))
        }
    }

    const DATASET: &str = "date,holiday_name\n2025-01-01,New Year\n2025-02-11,Founding Day\n";

    #[tokio::test]
    async fn test_full_run_commits() {
        let fixture = Fixture::new(DATASET);
        fixture.db.put_holiday_row(ymd(2025, 1, 1), "Old Name");

        let report = fixture
            .batch()
            .run(&fixture.plan(ymd(2025, 1, 1), ymd(2025, 2, 28)))
            .await;

        assert!(report.is_success(), "{}", report.message());
        assert_eq!(report.stage, BatchStage::Committed);
        assert_eq!(report.calendar, MergeSummary { updated: 0, inserted: 59 });
        assert_eq!(report.holidays_staged, 2);
        assert_eq!(report.holidays, MergeSummary { updated: 1, inserted: 1 });
        assert!(fixture.db.schema_ready());
        assert_eq!(fixture.db.calendar()[&ymd(2025, 2, 11)], "Tue");
        assert_eq!(fixture.db.holidays()[&ymd(2025, 1, 1)], "New Year");
        assert_eq!(report.to_response().status, crate::models::BatchStatus::Success);
    }

    #[tokio::test]
    async fn test_rerun_converges_without_changes() {
        let fixture = Fixture::new(DATASET);
        let plan = fixture.plan(ymd(2025, 1, 1), ymd(2025, 3, 31));

        fixture.batch().run(&plan).await;
        let calendar = fixture.db.calendar();
        let holidays = fixture.db.holidays();
        let report = fixture.batch().run(&plan).await;

        assert!(report.is_success());
        assert!(report.calendar.is_noop());
        assert!(report.holidays.is_noop());
        assert_eq!(fixture.db.calendar(), calendar);
        assert_eq!(fixture.db.holidays(), holidays);
    }

    #[tokio::test]
    async fn test_malformed_dataset_rolls_back_everything() {
        let fixture = Fixture::new("date,holiday_name\n2025-01-01,New Year\nnot-a-date,Oops\n");
        fixture.db.put_holiday_row(ymd(2024, 1, 1), "New Year");

        let report = fixture
            .batch()
            .run(&fixture.plan(ymd(2025, 1, 1), ymd(2025, 1, 31)))
            .await;

        assert_eq!(report.stage, BatchStage::Failed);
        assert_eq!(report.failed_after, Some(BatchStage::CalendarReconciled));
        assert!(matches!(report.error, Some(Error::Import(_))));
        assert!(report.calendar.is_noop());
        // calendar work done earlier in the run is rolled back too
        assert!(fixture.db.calendar().is_empty());
        assert_eq!(fixture.db.holidays().len(), 1);

        let response = report.to_response();
        assert_eq!(response.message.as_deref(), Some("Internal server error"));
    }

    #[tokio::test]
    async fn test_empty_dataset_rolls_back() {
        let fixture = Fixture::new("");
        fixture.db.put_holiday_row(ymd(2025, 1, 1), "New Year");
        let holidays_before = fixture.db.holidays();

        let report = fixture
            .batch()
            .run(&fixture.plan(ymd(2025, 1, 1), ymd(2025, 1, 3)))
            .await;

        assert_eq!(report.stage, BatchStage::Failed);
        assert_eq!(report.failed_after, Some(BatchStage::CalendarReconciled));
        assert!(matches!(report.error, Some(Error::Import(_))));
        assert_eq!(report.holidays_staged, 0);
        assert!(fixture.db.calendar().is_empty());
        assert_eq!(fixture.db.holidays(), holidays_before);
    }

    #[tokio::test]
    async fn test_missing_dataset_fails() {
        let fixture = Fixture::new(DATASET);
        std::fs::remove_file(fixture.dir.path().join(BUCKET).join(KEY)).unwrap();

        let report = fixture
            .batch()
            .run(&fixture.plan(ymd(2025, 1, 1), ymd(2025, 1, 2)))
            .await;

        assert!(matches!(report.error, Some(Error::Import(_))));
        assert!(fixture.db.calendar().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_database_reported() {
        let fixture = Fixture::new(DATASET);
        fixture.db.set_reachable(false);

        let report = fixture
            .batch()
            .run(&fixture.plan(ymd(2025, 1, 1), ymd(2025, 1, 2)))
            .await;

        assert_eq!(report.failed_after, Some(BatchStage::NotStarted));
        let err = report.error.as_ref().unwrap();
        assert!(err.is_retryable());
        assert!(report.message().starts_with("failed after not_started"));
    }

    #[tokio::test]
    async fn test_referenced_calendar_rows_preserved() {
        let fixture = Fixture::new(DATASET);
        let plan = fixture.plan(ymd(2025, 1, 1), ymd(2025, 1, 31));
        fixture.batch().run(&plan).await;

        let event_id = fixture.db.add_event(ymd(2025, 1, 15), "Dentist", "user-1").unwrap();
        fixture.db.put_calendar_row(ymd(2025, 1, 15), "Sun");

        let later = fixture.plan(ymd(2025, 1, 10), ymd(2025, 2, 10));
        let report = fixture.batch().run(&later).await;

        assert!(report.is_success());
        assert_eq!(report.calendar, MergeSummary { updated: 1, inserted: 10 });
        let calendar = fixture.db.calendar();
        assert_eq!(calendar[&ymd(2025, 1, 15)], "Wed");
        assert!(calendar.contains_key(&ymd(2025, 1, 1)));
        let events = fixture.db.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, event_id);
        assert!(calendar.contains_key(&events[0].date));
    }

    /// Applies the holiday merge, then fails as if a later statement had.
    struct FailingConnector(MemoryConnector);

    struct FailingStore(MemoryStore);

    impl StoreConnector for FailingConnector {
        type Store = FailingStore;

        async fn connect(&self) -> Result<FailingStore> {
            Ok(FailingStore(self.0.connect().await?))
        }
    }

    impl CalendarStore for FailingStore {
        async fn ensure_schema(&mut self) -> Result<()> {
            self.0.ensure_schema().await
        }

        async fn stage_calendar<I>(&mut self, days: I) -> Result<u64>
        where
            I: IntoIterator<Item = CalendarDay>,
        {
            self.0.stage_calendar(days).await
        }

        async fn merge_calendar(&mut self) -> Result<MergeSummary> {
            self.0.merge_calendar().await
        }

        async fn stage_holidays(&mut self, rows: &[StagedHoliday]) -> Result<u64> {
            self.0.stage_holidays(rows).await
        }

        async fn merge_holidays(&mut self) -> Result<MergeSummary> {
            self.0.merge_holidays().await?;
            Err(Error::Reconciliation(
                "duplicate key value violates unique constraint \"holiday_m_pkey\"".to_string(),
            ))
        }

        async fn commit(self) -> Result<()> {
            self.0.commit().await
        }

        async fn rollback(self) -> Result<()> {
            self.0.rollback().await
        }
    }

    #[tokio::test]
    async fn test_failure_mid_merge_leaves_pre_run_state() {
        let fixture = Fixture::new(DATASET);
        fixture.db.put_calendar_row(ymd(2025, 1, 1), "Sun");
        fixture.db.put_holiday_row(ymd(2025, 1, 1), "Old Name");
        let calendar_before = fixture.db.calendar();
        let holidays_before = fixture.db.holidays();

        let batch = InitBatch::new(
            FailingConnector(fixture.db.connector()),
            LocalDirFetcher::new(fixture.dir.path()),
        );
        let plan = fixture.plan(ymd(2025, 1, 1), ymd(2025, 1, 31));
        let report = batch.run(&plan).await;

        assert_eq!(report.failed_after, Some(BatchStage::HolidayImported));
        assert!(matches!(report.error, Some(Error::Reconciliation(_))));
        assert_eq!(fixture.db.calendar(), calendar_before);
        assert_eq!(fixture.db.holidays(), holidays_before);
        assert!(fixture.db.holiday_staging().is_empty());

        // a plain retry converges
        let report = fixture.batch().run(&plan).await;
        assert!(report.is_success());
        assert_eq!(fixture.db.calendar()[&ymd(2025, 1, 1)], "Wed");
        assert_eq!(fixture.db.holidays()[&ymd(2025, 1, 1)], "New Year");
    }

    #[test]
    fn test_plan_defaults_to_configured_span() {
        let config = Config::from_lookup(|key| {
            let value = match key {
                "DATABASE_HOST" => Some("db"),
                "DATABASE_SECRET_ARN" => Some("arn"),
                "DATA_BUCKET" => Some(BUCKET),
                _ => None,
            };
            value.map(str::to_string)
        })
        .unwrap();

        let plan = BatchPlan::resolve(&config, &InitDbRequest::default(), ymd(2025, 12, 1)).unwrap();
        assert_eq!(plan.range.start(), ymd(2025, 12, 1));
        assert_eq!(plan.range.end(), ymd(2026, 12, 1));
        assert_eq!(plan.range.len(), 366);
        assert_eq!(plan.dataset.to_string(), "s3://schedule-data/holiday-data.csv");

        let request = InitDbRequest {
            start_date: Some(ymd(2025, 12, 5)),
            end_date: Some(ymd(2025, 12, 1)),
            ..InitDbRequest::default()
        };
        let err = BatchPlan::resolve(&config, &request, ymd(2025, 12, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidRange(_)));
    }
}
