//! Configuration management for the init batch.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database host
    pub db_host: String,
    /// Database port
    pub db_port: u16,
    /// Database name
    pub db_name: String,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: String,
    /// AWS region
    pub aws_region: String,
    /// Bucket holding the holiday dataset
    pub data_bucket: String,
    /// Object key of the holiday dataset
    pub holiday_object_key: String,
    /// Where the dataset is written before import
    pub holiday_local_path: PathBuf,
    /// Number of days after the start date covered by the default range
    pub calendar_range_days: u32,
    /// Upper bound on establishing the database connection
    pub connect_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| Error::Config(format!("{} not set", key)))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            db_host: required("DATABASE_HOST")?,
            db_port: parse_var(&lookup, "DATABASE_PORT", 5432)?,
            db_name: or_default("DATABASE_NAME", "my_schedule_app"),
            db_secret_arn: required("DATABASE_SECRET_ARN")?,
            aws_region: or_default("AWS_REGION", "ap-northeast-1"),
            data_bucket: required("DATA_BUCKET")?,
            holiday_object_key: or_default("HOLIDAY_OBJECT_KEY", "holiday-data.csv"),
            holiday_local_path: PathBuf::from(or_default(
                "HOLIDAY_LOCAL_PATH",
                "/tmp/holiday-data.csv",
            )),
            calendar_range_days: parse_var(&lookup, "CALENDAR_RANGE_DAYS", 365)?,
            connect_timeout: Duration::from_secs(parse_var(&lookup, "DB_CONNECT_TIMEOUT_SECS", 5)?),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} has invalid value {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
