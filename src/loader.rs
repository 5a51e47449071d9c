//! Bulk loading of columnar tables into PostgreSQL.
//!
//! Rows are written in batches of [`BATCH_SIZE`] with one
//! `INSERT ... SELECT * FROM UNNEST(...)` per batch. Each batch commits on its
//! own, so a failure part way through leaves the earlier batches in place.

use crate::table::Column;
use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

pub const BATCH_SIZE: usize = 1000;

const MAX_IDENTIFIER_LEN: usize = 63;

pub type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A columnar table that can be written by [`load`].
pub trait Loadable {
    /// Column names and types, in bind order.
    fn columns(&self) -> &'static [Column];

    fn row_count(&self) -> usize;

    /// Bind one array parameter per column for the rows in `rows`.
    fn bind_batch<'q>(&self, query: PgQuery<'q>, rows: Range<usize>) -> PgQuery<'q>;
}

/// What to do with an existing target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Insert into the existing table.
    Append,
    /// Drop and recreate the table before inserting.
    #[default]
    Replace,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Append => write!(f, "append"),
            ConflictPolicy::Replace => write!(f, "replace"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("failed to prepare {namespace}.{table}: {source}")]
    Prepare {
        namespace: String,
        table: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to load {namespace}.{table} after {rows_committed} committed rows: {source}")]
    Batch {
        namespace: String,
        table: String,
        rows_committed: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl LoadError {
    /// Rows that were committed before the failure.
    pub fn rows_committed(&self) -> usize {
        match self {
            LoadError::Batch { rows_committed, .. } => *rows_committed,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_written: usize,
    pub batches: usize,
}

/// Validate `name` as a PostgreSQL identifier and double-quote it.
///
/// Accepts ASCII letters, digits and underscores, not starting with a digit,
/// up to 63 bytes.
pub fn quote_ident(name: &str) -> Result<String, LoadError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(format!("\"{}\"", name))
    } else {
        Err(LoadError::InvalidIdentifier(name.to_string()))
    }
}

fn create_table_sql(qualified: &str, columns: &[Column]) -> Result<String, LoadError> {
    let definitions = columns
        .iter()
        .map(|column| {
            quote_ident(column.name)
                .map(|name| format!("{} {}", name, column.column_type.sql_name()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format!("CREATE TABLE {} ({})", qualified, definitions.join(", ")))
}

fn insert_sql(qualified: &str, columns: &[Column]) -> Result<String, LoadError> {
    let names = columns
        .iter()
        .map(|column| quote_ident(column.name))
        .collect::<Result<Vec<_>, _>>()?;
    let arrays: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("${}::{}", index + 1, column.column_type.array_cast()))
        .collect();

    Ok(format!(
        "INSERT INTO {} ({}) SELECT * FROM UNNEST({})",
        qualified,
        names.join(", "),
        arrays.join(", ")
    ))
}

/// Write `data` to `namespace.target` under `policy`.
///
/// # Arguments
/// * `pool` - PostgreSQL connection pool
/// * `data` - Table to write
/// * `target` - Target table name
/// * `namespace` - Target schema, created if absent
/// * `policy` - Whether to append or to drop and recreate the table first
///
/// # Returns
/// Rows written and batches committed. A table with no rows returns an empty
/// report without touching the database.
pub async fn load<T: Loadable + ?Sized>(
    pool: &PgPool,
    data: &T,
    target: &str,
    namespace: &str,
    policy: ConflictPolicy,
) -> Result<LoadReport, LoadError> {
    let schema = quote_ident(namespace)?;
    let qualified = format!("{}.{}", schema, quote_ident(target)?);
    let insert = insert_sql(&qualified, data.columns())?;

    let total = data.row_count();
    if total == 0 {
        log::info!("loader: no rows for {}.{}, skipping", namespace, target);
        return Ok(LoadReport::default());
    }

    let prepare_err = |source: sqlx::Error| LoadError::Prepare {
        namespace: namespace.to_string(),
        table: target.to_string(),
        source,
    };

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await
        .map_err(prepare_err)?;

    if policy == ConflictPolicy::Replace {
        let create = create_table_sql(&qualified, data.columns())?;
        let mut tx = pool.begin().await.map_err(prepare_err)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", qualified))
            .execute(&mut *tx)
            .await
            .map_err(prepare_err)?;
        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .map_err(prepare_err)?;
        tx.commit().await.map_err(prepare_err)?;
        log::debug!("loader: recreated {}.{}", namespace, target);
    }

    let mut report = LoadReport::default();
    for start in (0..total).step_by(BATCH_SIZE) {
        let rows = start..(start + BATCH_SIZE).min(total);
        let size = rows.len();

        data.bind_batch(sqlx::query(&insert), rows)
            .execute(pool)
            .await
            .map_err(|source| LoadError::Batch {
                namespace: namespace.to_string(),
                table: target.to_string(),
                rows_committed: report.rows_written,
                source,
            })?;

        report.rows_written += size;
        report.batches += 1;
        log::trace!(
            "loader: batch {} committed ({}/{} rows)",
            report.batches,
            report.rows_written,
            total
        );
    }

    log::info!(
        "loader: wrote {} rows to {}.{} in {} batches ({})",
        report.rows_written,
        namespace,
        target,
        report.batches,
        policy
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{self, ColumnType, FARTSGRENSE_COLUMNS};
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use std::time::Duration;

    fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(9)
            .username("nobody")
            .database("nowhere");
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy_with(options)
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("nvdb").unwrap(), "\"nvdb\"");
        assert_eq!(quote_ident("vegobjekter_fartsgrense").unwrap(), "\"vegobjekter_fartsgrense\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("1table").is_err());
        assert!(quote_ident("drop table; --").is_err());
        assert!(quote_ident("with\"quote").is_err());
        assert!(quote_ident(&"a".repeat(64)).is_err());
        assert!(quote_ident(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_insert_sql_uses_unnest_with_casts() {
        let columns = [
            Column::new("id", ColumnType::BigInt),
            Column::new("name", ColumnType::Text),
            Column::new("at", ColumnType::Timestamp),
        ];
        let sql = insert_sql("\"nvdb\".\"t\"", &columns).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"nvdb\".\"t\" (\"id\", \"name\", \"at\") \
             SELECT * FROM UNNEST($1::bigint[], $2::text[], $3::timestamp[])"
        );
    }

    #[test]
    fn test_create_table_sql_declares_every_column() {
        let qualified = "\"nvdb\".\"vegobjekter_fartsgrense\"";
        let sql = create_table_sql(qualified, FARTSGRENSE_COLUMNS).unwrap();
        assert!(sql.starts_with("CREATE TABLE \"nvdb\".\"vegobjekter_fartsgrense\" ("));
        assert!(sql.contains("\"nvdb_id\" BIGINT"));
        assert!(sql.contains("\"startdato\" TIMESTAMP"));
        assert!(sql.contains("\"fartsgrense\" DOUBLE PRECISION"));
        assert_eq!(sql.matches(", ").count(), FARTSGRENSE_COLUMNS.len() - 1);
    }

    #[test]
    fn test_policy_display() {
        assert_eq!(ConflictPolicy::Append.to_string(), "append");
        assert_eq!(ConflictPolicy::Replace.to_string(), "replace");
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Replace);
    }

    #[tokio::test]
    async fn test_zero_row_load_does_no_io() {
        let pool = unreachable_pool();
        let empty = table::build(&[]);

        for policy in [ConflictPolicy::Append, ConflictPolicy::Replace] {
            let report = load(&pool, &empty, "vegobjekter_fartsgrense", "nvdb", policy)
                .await
                .unwrap();
            assert_eq!(report, LoadReport::default());
        }
    }

    #[tokio::test]
    async fn test_invalid_identifier_rejected_before_io() {
        let pool = unreachable_pool();
        let empty = table::build(&[]);
        let err = load(&pool, &empty, "bad name", "nvdb", ConflictPolicy::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidIdentifier(name) if name == "bad name"));
    }

    #[tokio::test]
    async fn test_unreachable_database_reports_prepare_error() {
        let pool = unreachable_pool();
        let data = table::build(&[serde_json::json!({ "id": 1 })]);
        let err = load(&pool, &data, "vegobjekter_fartsgrense", "nvdb", ConflictPolicy::Replace)
            .await
            .unwrap_err();
        match err {
            LoadError::Prepare { namespace, table, .. } => {
                assert_eq!(namespace, "nvdb");
                assert_eq!(table, "vegobjekter_fartsgrense");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
