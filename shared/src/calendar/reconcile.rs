//! Brings the calendar master in line with a generated date range.

use tracing::info;

use super::DateRange;
use crate::models::MergeSummary;
use crate::store::CalendarStore;
use crate::Result;

/// Stage every date of `range` and merge it into the calendar master.
///
/// Rows whose weekday disagrees with the generated one are corrected, missing
/// dates are inserted, and nothing outside the range is touched. Running it
/// twice with the same range leaves the second run with nothing to do.
pub async fn reconcile_calendar<S: CalendarStore>(store: &mut S, range: DateRange) -> Result<MergeSummary> {
    let staged = store.stage_calendar(range.days()).await?;
    info!(
        "Staged {} calendar days from {} to {}",
        staged,
        range.start(),
        range.end()
    );

    let summary = store.merge_calendar().await?;
    info!(
        "Calendar merged: {} updated, {} inserted",
        summary.updated, summary.inserted
    );

    Ok(summary)
}
