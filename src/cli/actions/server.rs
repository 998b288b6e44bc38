use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use url::Url;

use crate::api::{self, AppState};
use crate::security::SecurityConfig;
use crate::store::{postgres, Stores};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub login_failed_limit: i32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the database is unreachable, a
/// migration fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = Url::parse(&args.dsn).context("Invalid database connection string")?;
    if dsn.scheme() != "postgres" && dsn.scheme() != "postgresql" {
        return Err(anyhow!("Unsupported DSN scheme: {}", dsn.scheme()));
    }

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.as_str())
        .await
        .context("Failed to connect to database")?;

    postgres::migrate(&pool).await?;

    let config = SecurityConfig::new().with_login_failed_limit(args.login_failed_limit);
    info!(
        port = args.port,
        brute_force_limit = args.login_failed_limit,
        "Starting server"
    );

    let stores = Stores::postgres(pool);
    let state = AppState::new(&stores, config)?;
    api::serve(args.port, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_postgres_dsn() {
        let err = execute(Args {
            port: 0,
            dsn: "mysql://localhost/konto".to_string(),
            login_failed_limit: 5,
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Unsupported DSN scheme"));
    }

    #[tokio::test]
    async fn rejects_malformed_dsn() {
        let err = execute(Args {
            port: 0,
            dsn: "not a url".to_string(),
            login_failed_limit: 5,
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid database connection string"));
    }
}
