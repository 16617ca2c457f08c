//! Holiday dataset import and reconciliation against `holiday_m`.

pub mod import;
pub mod reconcile;

pub use import::{import_holidays, read_holidays, MAX_HOLIDAY_NAME_CHARS};
pub use reconcile::reconcile_holidays;
