//! Init DB Lambda - Builds the calendar and holiday masters.
//!
//! Invoked on deployment and on a schedule. Each invocation:
//! 1. Resolves the date range and dataset location from the payload and environment
//! 2. Fetches database credentials from Secrets Manager
//! 3. Runs the initialization batch in a single transaction
//!
//! The response is `{status, message}`; failure detail is only logged.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::Client as SecretsClient;
use chrono::Utc;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use shared::db::connect_options;
use shared::{
    get_database_credentials, BatchPlan, Config, InitBatch, InitDbRequest, InitDbResponse,
    PgConnector, S3Fetcher,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    config: Config,
    secrets_client: SecretsClient,
    fetcher: S3Fetcher,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()))
            .load()
            .await;

        Ok(Self {
            secrets_client: SecretsClient::new(&aws_config),
            fetcher: S3Fetcher::new(aws_sdk_s3::Client::new(&aws_config)),
            config,
        })
    }
}

fn internal_error(stage: &str, err: &shared::Error) -> InitDbResponse {
    error!(kind = err.kind(), "Init DB failed during {}: {}", stage, err);
    InitDbResponse::error("Internal server error")
}

async fn handler(
    state: Arc<AppState>,
    event: LambdaEvent<InitDbRequest>,
) -> Result<InitDbResponse, Error> {
    let today = Utc::now().date_naive();
    let plan = match BatchPlan::resolve(&state.config, &event.payload, today) {
        Ok(plan) => plan,
        Err(e) => return Ok(internal_error("planning", &e)),
    };

    let credentials =
        match get_database_credentials(&state.secrets_client, &state.config.db_secret_arn).await {
            Ok(credentials) => credentials,
            Err(e) => return Ok(internal_error("credential lookup", &e)),
        };

    let connector = PgConnector::new(
        connect_options(&state.config, &credentials),
        state.config.connect_timeout,
    );
    let report = InitBatch::new(connector, state.fetcher.clone())
        .run(&plan)
        .await;

    if report.is_success() {
        info!("Init DB succeeded: {}", report.message());
    } else {
        error!("Init DB failed: {}", report.message());
    }

    Ok(report.to_response())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
