//! Reads the delimited holiday dataset into the staging table.
//!
//! The dataset is a header row followed by `date,holiday_name` rows. Any
//! malformed row aborts the whole import; nothing is staged from a file that
//! does not parse completely.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::StagedHoliday;
use crate::store::CalendarStore;
use crate::{Error, Result};

/// Width of `holiday_m.holiday_name`.
pub const MAX_HOLIDAY_NAME_CHARS: usize = 50;

/// Parse the dataset, skipping the header and dropping exact repeats.
/// Rows keep their file order.
pub fn read_holidays<R: Read>(source: R) -> Result<Vec<StagedHoliday>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(source);

    let header = reader
        .byte_headers()
        .map_err(|e| Error::Import(e.to_string()))?;
    if header.is_empty() {
        return Err(Error::Import("dataset has no header row".to_string()));
    }

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| Error::Import(e.to_string()))?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() != 2 {
            return Err(Error::Import(format!(
                "line {}: expected 2 fields, found {}",
                line,
                record.len()
            )));
        }

        let field = |i: usize| {
            std::str::from_utf8(&record[i])
                .map_err(|e| Error::Import(format!("line {}: field {} is not UTF-8: {}", line, i + 1, e)))
        };
        let raw_date = field(0)?;
        let holiday_name = field(1)?;

        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| Error::Import(format!("line {}: invalid date {:?}: {}", line, raw_date, e)))?;

        if holiday_name.chars().count() > MAX_HOLIDAY_NAME_CHARS {
            return Err(Error::Import(format!(
                "line {}: holiday name longer than {} characters",
                line, MAX_HOLIDAY_NAME_CHARS
            )));
        }

        let row = StagedHoliday::new(date, holiday_name);
        if seen.insert(row.clone()) {
            rows.push(row);
        } else {
            debug!("Skipping repeated row on line {}", line);
        }
    }

    Ok(rows)
}

/// Read the dataset at `path` and replace the holiday staging contents with it.
pub async fn import_holidays<S: CalendarStore>(store: &mut S, path: &Path) -> Result<u64> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::Import(format!("Failed to read {}: {}", path.display(), e)))?;

    let rows = read_holidays(bytes.as_slice())?;
    let staged = store.stage_holidays(&rows).await?;
    info!("Staged {} holiday rows from {}", staged, path.display());

    Ok(staged)
}
