//! Calendar generation and reconciliation against `calendar_m`.

pub mod reconcile;
pub mod sequence;

pub use reconcile::reconcile_calendar;
pub use sequence::{weekday_label, DateRange, DateSequence, MAX_RANGE_DAYS, WEEKDAY_LABELS};
