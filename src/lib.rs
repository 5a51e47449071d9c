pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod extract;
pub mod loader;
pub mod nvdb;
pub mod pipeline;
pub mod report;
pub mod table;

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info,sqlx=warn"))
            .format_timestamp(None)
            .init();
    });
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use sqlx::PgPool;

    pub use database::{TestDatabase, TestDatabaseError};

    /// Helpers for creating the tables that are not produced by the loader.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Create `nvdb.hendelser` partitioned by year, with a default partition.
        pub async fn create_hendelser_table(&self) -> Result<(), sqlx::Error> {
            sqlx::query("CREATE SCHEMA IF NOT EXISTS nvdb")
                .execute(self.pool)
                .await?;
            sqlx::query(
                r#"CREATE TABLE nvdb.hendelser (
                       veglenkesekvensid BIGINT,
                       relativ_posisjon DOUBLE PRECISION,
                       vegvedlikehold TEXT,
                       rand_float DOUBLE PRECISION,
                       year INTEGER NOT NULL
                   ) PARTITION BY RANGE (year)"#,
            )
            .execute(self.pool)
            .await?;
            sqlx::query("CREATE TABLE nvdb.hendelser_default PARTITION OF nvdb.hendelser DEFAULT")
                .execute(self.pool)
                .await?;
            Ok(())
        }

        /// Row count of `namespace.table`; both names must be trusted.
        pub async fn count_rows(&self, namespace: &str, table: &str) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\".\"{}\"", namespace, table))
                .fetch_one(self.pool)
                .await
        }
    }

    pub mod database {
        use crate::config::DatabaseConfig;
        use sqlx::PgPool;
        use sqlx::postgres::PgPoolOptions;
        use testcontainers::core::error::TestcontainersError;
        use testcontainers::{ContainerAsync, runners::AsyncRunner};
        use testcontainers_modules::postgres::Postgres;
        use thiserror::Error;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Disposable PostgreSQL server for integration tests.
        pub struct TestDatabase {
            pool: PgPool,
            config: DatabaseConfig,
            _container: ContainerAsync<Postgres>,
        }

        impl TestDatabase {
            /// Start a fresh Postgres container and connect to it.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;
                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;

                let config = DatabaseConfig {
                    user: "postgres".to_string(),
                    password: "postgres".to_string(),
                    host,
                    port,
                    database: "postgres".to_string(),
                };
                let pool = PgPoolOptions::new()
                    .max_connections(2)
                    .connect_with(config.connect_options())
                    .await?;

                Ok(Self {
                    pool,
                    config,
                    _container: container,
                })
            }

            /// Like [`TestDatabase::new`], but returns `None` when no container
            /// runtime is available so the calling test can skip.
            pub async fn start_or_skip() -> Option<Self> {
                match Self::new().await {
                    Ok(db) => Some(db),
                    Err(err) => {
                        eprintln!("skipping database test: {}", err);
                        None
                    }
                }
            }

            pub fn pool(&self) -> &PgPool {
                &self.pool
            }

            /// Connection settings pointing at the container.
            pub fn config(&self) -> &DatabaseConfig {
                &self.config
            }

            /// Close pool connections and stop the container.
            pub async fn close(self) {
                self.pool.close().await;
            }
        }
    }
}
