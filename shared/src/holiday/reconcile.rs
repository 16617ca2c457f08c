//! Merges staged holidays into the holiday master.

use tracing::info;

use crate::models::MergeSummary;
use crate::store::CalendarStore;
use crate::Result;

/// Update holidays whose name changed and insert the ones the master lacks.
///
/// Staged dates that appear more than once resolve to the row staged last.
/// Holidays missing from the import stay in the master.
pub async fn reconcile_holidays<S: CalendarStore>(store: &mut S) -> Result<MergeSummary> {
    let summary = store.merge_holidays().await?;
    info!(
        "Holidays merged: {} updated, {} inserted",
        summary.updated, summary.inserted
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StagedHoliday;
    use crate::store::{MemoryDatabase, StoreConnector};
    use chrono::NaiveDate;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn run(db: &MemoryDatabase, rows: &[StagedHoliday]) -> MergeSummary {
        let mut store = db.connector().connect().await.unwrap();
        store.ensure_schema().await.unwrap();
        store.stage_holidays(rows).await.unwrap();
        let summary = reconcile_holidays(&mut store).await.unwrap();
        store.commit().await.unwrap();
        summary
    }

    #[tokio::test]
    async fn test_update_and_insert() {
        let db = MemoryDatabase::new();
        db.put_holiday_row(ymd(2025, 1, 1), "Old Name");
        db.put_holiday_row(ymd(2024, 11, 23), "Labor Thanksgiving Day");

        let summary = run(
            &db,
            &[
                StagedHoliday::new(ymd(2025, 1, 1), "New Year"),
                StagedHoliday::new(ymd(2025, 2, 11), "Founding Day"),
            ],
        )
        .await;

        assert_eq!(summary, MergeSummary { updated: 1, inserted: 1 });
        let holidays = db.holidays();
        assert_eq!(holidays.len(), 3);
        assert_eq!(holidays[&ymd(2025, 1, 1)], "New Year");
        assert_eq!(holidays[&ymd(2025, 2, 11)], "Founding Day");
        assert_eq!(holidays[&ymd(2024, 11, 23)], "Labor Thanksgiving Day");
    }

    #[tokio::test]
    async fn test_holidays_absent_from_import_kept() {
        let db = MemoryDatabase::new();
        db.put_holiday_row(ymd(2020, 7, 24), "Sports Day");

        run(&db, &[]).await;

        assert_eq!(db.holidays()[&ymd(2020, 7, 24)], "Sports Day");
    }

    #[tokio::test]
    async fn test_conflicting_names_last_row_wins() {
        let db = MemoryDatabase::new();
        run(
            &db,
            &[
                StagedHoliday::new(ymd(2025, 5, 6), "Substitute Holiday"),
                StagedHoliday::new(ymd(2025, 5, 6), "Children's Day (observed)"),
            ],
        )
        .await;

        assert_eq!(db.holidays()[&ymd(2025, 5, 6)], "Children's Day (observed)");
    }

    #[tokio::test]
    async fn test_repeated_import_is_noop() {
        let db = MemoryDatabase::new();
        let rows = [StagedHoliday::new(ymd(2025, 1, 1), "New Year")];

        run(&db, &rows).await;
        let summary = run(&db, &rows).await;

        assert!(summary.is_noop());
        assert_eq!(db.holidays().len(), 1);
    }
}
