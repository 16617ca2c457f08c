//! Database connection management.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

use crate::{Config, DatabaseCredentials, Error, Result};

/// Connection options for the calendar database.
pub fn connect_options(config: &Config, credentials: &DatabaseCredentials) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .database(&config.db_name)
        .username(&credentials.username)
        .password(&credentials.password)
}

/// Create a single-connection pool. The batch runs one transaction at a time,
/// so a second connection would only sit idle.
pub async fn create_pool(options: PgConnectOptions, connect_timeout: Duration) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(connect_timeout)
        .connect_with(options)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    Ok(pool)
}
