use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

use crate::config::{Config, Secrets};

pub mod transactions;

pub use transactions::PostgresTransactionStore;

/// Opens the shared pool against the consensus store and verifies
/// reachability before handing it out.
pub async fn create_pool(config: &Config, secrets: &Secrets) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&secrets.db_user)
        .password(&secrets.db_password)
        .database(&config.db_database)
        .ssl_mode(PgSslMode::Disable);

    let pool = PgPoolOptions::new()
        .max_connections(25)
        .min_connections(5)
        .max_lifetime(Duration::from_secs(300))
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!(
        host = %config.db_host,
        port = config.db_port,
        database = %config.db_database,
        "database connection established"
    );

    Ok(pool)
}
