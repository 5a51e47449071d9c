use crate::config::DatabaseConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Build a single-connection pool that connects on first use.
///
/// Nothing is opened here, so a run that stops before loading never touches
/// the database.
pub fn connect_lazy(config: &DatabaseConfig) -> PgPool {
    pool_options().connect_lazy_with(config.connect_options())
}

/// Build a single-connection pool and open the connection now.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = pool_options().connect_with(config.connect_options()).await?;
    log::debug!("db: connected to {}:{}/{}", config.host, config.port, config.database);
    Ok(pool)
}
