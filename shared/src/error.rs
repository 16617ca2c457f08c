//! Error types for the calendar initialization batch.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while initializing the calendar store.
#[derive(Error, Debug)]
pub enum Error {
    /// The database could not be reached or a transaction could not be opened
    #[error("Connection error: {0}")]
    Connection(String),

    /// Start date after end date, or a range longer than the supported maximum
    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    /// Holiday dataset unreadable or malformed
    #[error("Import error: {0}")]
    Import(String),

    /// A staging or merge statement failed
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// DDL failure while ensuring the schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),
}

impl Error {
    /// Whether re-invoking the whole batch may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Aws(_))
    }

    /// Stable tag used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Connection(_) => "connection",
            Error::InvalidRange(_) => "invalid_range",
            Error::Import(_) => "import",
            Error::Reconciliation(_) => "reconciliation",
            Error::Schema(_) => "schema",
            Error::Config(_) => "config",
            Error::Aws(_) => "aws",
        }
    }
}
