//! `smctl` subcommands.

pub mod migrate;
pub mod sync;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use stockmirror_api::config::{ConfigError, get_database_url};
use stockmirror_api::db::RepositoryError;
use stockmirror_api::services::auth::AuthError;
use stockmirror_api::services::reconcile::ReconcileError;

/// Errors surfaced by any command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    Invalid(String),
}

fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();
    Ok(get_database_url("STOCKMIRROR_DATABASE_URL")?)
}

/// Connect with the API's pool settings.
async fn connect() -> Result<PgPool, CliError> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(stockmirror_api::db::create_pool(&url).await?)
}
