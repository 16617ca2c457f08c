//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;

use crate::{Error, Result};

/// Database credentials from Secrets Manager.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

impl DatabaseCredentials {
    /// Parse the JSON secret string written by RDS-managed secrets. Host, port
    /// and database name come from [`crate::Config`]; extra keys are ignored.
    pub fn from_secret_string(secret: &str) -> Result<Self> {
        serde_json::from_str(secret)
            .map_err(|e| Error::Aws(format!("Failed to parse database credentials: {}", e)))
    }
}

/// Get a secret value from Secrets Manager.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    response
        .secret_string()
        .map(str::to_string)
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))
}

/// Get database credentials from Secrets Manager.
pub async fn get_database_credentials(
    client: &SecretsClient,
    secret_arn: &str,
) -> Result<DatabaseCredentials> {
    let secret_string = get_secret(client, secret_arn).await?;
    DatabaseCredentials::from_secret_string(&secret_string)
}
