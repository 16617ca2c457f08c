//! PostgreSQL calendar store.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool};
use sqlx::{Postgres, QueryBuilder, Transaction};
use tracing::debug;

use super::{CalendarStore, StoreConnector};
use crate::db::create_pool;
use crate::models::{CalendarDay, MergeSummary, StagedHoliday};
use crate::{Error, Result};

/// Rows per multi-row INSERT; keeps bind parameters well under the protocol limit.
const INSERT_CHUNK: usize = 1_000;

const SCHEMA: &[(&str, &str)] = &[
    (
        "calendar_m",
        r#"
        CREATE TABLE IF NOT EXISTS calendar_m (
            date DATE NOT NULL PRIMARY KEY,
            weekday VARCHAR(50) NOT NULL DEFAULT ''
        )
        "#,
    ),
    (
        "holiday_m",
        r#"
        CREATE TABLE IF NOT EXISTS holiday_m (
            date DATE NOT NULL PRIMARY KEY,
            holiday_name VARCHAR(50) NOT NULL
        )
        "#,
    ),
    (
        "event_t",
        r#"
        CREATE TABLE IF NOT EXISTS event_t (
            event_id SERIAL PRIMARY KEY,
            date DATE NOT NULL REFERENCES calendar_m (date) ON UPDATE NO ACTION ON DELETE NO ACTION,
            event_name VARCHAR(200) NOT NULL,
            event_detail TEXT NULL,
            user_id VARCHAR(200) NULL,
            user_name VARCHAR(200) NULL
        )
        "#,
    ),
    (
        "event_t_date_idx",
        "CREATE INDEX IF NOT EXISTS event_t_date_idx ON event_t (date)",
    ),
    (
        "wk_calendar",
        r#"
        CREATE TABLE IF NOT EXISTS wk_calendar (
            date DATE NOT NULL,
            weekday VARCHAR(50) NOT NULL
        )
        "#,
    ),
    (
        "wk_holiday_calendar",
        r#"
        CREATE TABLE IF NOT EXISTS wk_holiday_calendar (
            seq BIGINT NOT NULL,
            date DATE NOT NULL,
            holiday_name VARCHAR(50) NOT NULL
        )
        "#,
    ),
];

const UPDATE_CALENDAR: &str = r#"
    UPDATE calendar_m AS m
    SET weekday = w.weekday
    FROM wk_calendar AS w
    WHERE m.date = w.date
    AND m.weekday <> w.weekday
"#;

const INSERT_CALENDAR: &str = r#"
    INSERT INTO calendar_m (date, weekday)
    SELECT DISTINCT ON (w.date) w.date, w.weekday
    FROM wk_calendar AS w
    LEFT JOIN calendar_m AS m ON m.date = w.date
    WHERE m.date IS NULL
    ORDER BY w.date
"#;

// The working set keeps one row per date: the one staged last.
const UPDATE_HOLIDAYS: &str = r#"
    WITH latest AS (
        SELECT DISTINCT ON (date) date, holiday_name
        FROM wk_holiday_calendar
        ORDER BY date, seq DESC
    )
    UPDATE holiday_m AS m
    SET holiday_name = l.holiday_name
    FROM latest AS l
    WHERE m.date = l.date
    AND m.holiday_name <> l.holiday_name
"#;

const INSERT_HOLIDAYS: &str = r#"
    WITH latest AS (
        SELECT DISTINCT ON (date) date, holiday_name
        FROM wk_holiday_calendar
        ORDER BY date, seq DESC
    )
    INSERT INTO holiday_m (date, holiday_name)
    SELECT l.date, l.holiday_name
    FROM latest AS l
    LEFT JOIN holiday_m AS m ON m.date = l.date
    WHERE m.date IS NULL
"#;

/// Opens [`PgStore`] transactions.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions, connect_timeout: Duration) -> Self {
        Self {
            options,
            connect_timeout,
        }
    }
}

impl StoreConnector for PgConnector {
    type Store = PgStore;

    async fn connect(&self) -> Result<PgStore> {
        let pool = create_pool(self.options.clone(), self.connect_timeout).await?;
        let begun = pool.begin().await;
        match begun {
            Ok(tx) => Ok(PgStore { pool, tx }),
            Err(e) => {
                pool.close().await;
                Err(Error::Connection(format!("Failed to begin transaction: {}", e)))
            }
        }
    }
}

/// One transaction on a dedicated pool. If dropped without `commit` or
/// `rollback`, sqlx rolls the transaction back.
pub struct PgStore {
    pool: PgPool,
    tx: Transaction<'static, Postgres>,
}

impl PgStore {
    async fn execute(&mut self, sql: &str) -> std::result::Result<u64, sqlx::Error> {
        let result = sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }
}

impl CalendarStore for PgStore {
    async fn ensure_schema(&mut self) -> Result<()> {
        for (name, ddl) in SCHEMA {
            debug!("Ensuring {}", name);
            self.execute(ddl)
                .await
                .map_err(|e| Error::Schema(format!("Failed to create {}: {}", name, e)))?;
        }
        Ok(())
    }

    async fn stage_calendar<I>(&mut self, days: I) -> Result<u64>
    where
        I: IntoIterator<Item = CalendarDay>,
    {
        let stage_err = |e: sqlx::Error| Error::Reconciliation(format!("Failed to stage calendar: {}", e));

        self.execute("TRUNCATE TABLE wk_calendar").await.map_err(stage_err)?;

        let mut days = days.into_iter();
        let mut staged = 0;
        loop {
            let chunk: Vec<CalendarDay> = days.by_ref().take(INSERT_CHUNK).collect();
            if chunk.is_empty() {
                break;
            }

            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO wk_calendar (date, weekday) ");
            builder.push_values(&chunk, |mut row, day| {
                row.push_bind(day.date).push_bind(day.weekday);
            });
            staged += builder
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(stage_err)?
                .rows_affected();
        }

        Ok(staged)
    }

    async fn merge_calendar(&mut self) -> Result<MergeSummary> {
        let updated = self
            .execute(UPDATE_CALENDAR)
            .await
            .map_err(|e| Error::Reconciliation(format!("Failed to update calendar_m: {}", e)))?;
        let inserted = self
            .execute(INSERT_CALENDAR)
            .await
            .map_err(|e| Error::Reconciliation(format!("Failed to insert into calendar_m: {}", e)))?;

        Ok(MergeSummary { updated, inserted })
    }

    async fn stage_holidays(&mut self, rows: &[StagedHoliday]) -> Result<u64> {
        let stage_err = |e: sqlx::Error| Error::Import(format!("Failed to stage holidays: {}", e));

        self.execute("TRUNCATE TABLE wk_holiday_calendar")
            .await
            .map_err(stage_err)?;

        let mut staged = 0;
        for (chunk_index, chunk) in rows.chunks(INSERT_CHUNK).enumerate() {
            let base = (chunk_index * INSERT_CHUNK) as i64;
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO wk_holiday_calendar (seq, date, holiday_name) ",
            );
            builder.push_values(chunk.iter().enumerate(), |mut row, (offset, holiday)| {
                row.push_bind(base + offset as i64)
                    .push_bind(holiday.date)
                    .push_bind(holiday.holiday_name.clone());
            });
            staged += builder
                .build()
                .execute(&mut *self.tx)
                .await
                .map_err(stage_err)?
                .rows_affected();
        }

        Ok(staged)
    }

    async fn merge_holidays(&mut self) -> Result<MergeSummary> {
        let updated = self
            .execute(UPDATE_HOLIDAYS)
            .await
            .map_err(|e| Error::Reconciliation(format!("Failed to update holiday_m: {}", e)))?;
        let inserted = self
            .execute(INSERT_HOLIDAYS)
            .await
            .map_err(|e| Error::Reconciliation(format!("Failed to insert into holiday_m: {}", e)))?;

        Ok(MergeSummary { updated, inserted })
    }

    async fn commit(self) -> Result<()> {
        let result = self.tx.commit().await;
        self.pool.close().await;
        result.map_err(|e| Error::Reconciliation(format!("Commit failed: {}", e)))
    }

    async fn rollback(self) -> Result<()> {
        let result = self.tx.rollback().await;
        self.pool.close().await;
        result.map_err(|e| Error::Connection(format!("Rollback failed: {}", e)))
    }
}
