//! Inclusive date ranges and the lazy day-by-day sequence over them.

use std::iter::FusedIterator;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::CalendarDay;
use crate::{Error, Result};

/// Weekday labels indexed by days from Monday.
pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Longest range a single batch will materialize, in days.
pub const MAX_RANGE_DAYS: i64 = 3_660;

/// Label for the proleptic Gregorian weekday of `date`.
pub fn weekday_label(date: NaiveDate) -> &'static str {
    WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize]
}

/// An inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }

        let days = (end - start).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(Error::InvalidRange(format!(
                "{} days requested, at most {} allowed",
                days, MAX_RANGE_DAYS
            )));
        }

        Ok(Self { start, end })
    }

    /// `[start, start + days]`, so `days + 1` dates in total.
    pub fn following(start: NaiveDate, days: u32) -> Result<Self> {
        let end = start
            .checked_add_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| Error::InvalidRange(format!("{} days after {} overflows", days, start)))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of dates in the range.
    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// A fresh sequence over the range. Each call starts again from `start`.
    pub fn days(&self) -> DateSequence {
        DateSequence {
            next: Some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for DateRange {
    type Item = CalendarDay;
    type IntoIter = DateSequence;

    fn into_iter(self) -> Self::IntoIter {
        self.days()
    }
}

/// Ascending sequence of [`CalendarDay`]s, one per date.
#[derive(Debug, Clone)]
pub struct DateSequence {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateSequence {
    type Item = CalendarDay;

    fn next(&mut self) -> Option<Self::Item> {
        let date = self.next?;
        self.next = date.succ_opt().filter(|next| *next <= self.end);
        Some(CalendarDay {
            date,
            weekday: weekday_label(date),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .map_or(0, |next| ((self.end - next).num_days() + 1) as usize);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DateSequence {}

impl FusedIterator for DateSequence {}
