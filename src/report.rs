//! Read-side checks and the speed-limit/event join report.

use crate::loader::{LoadError, quote_ident};
use crate::table::NormalizedRow;
use sqlx::PgPool;
use std::collections::BTreeMap;
use thiserror::Error;

const SAMPLE_SIZE: i64 = 5;

/// Failures while reading back loaded tables.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Speed-limit objects joined with maintenance events on road link sequence.
pub const JOIN_QUERY: &str = r#"SELECT vf.nvdb_id, vf.veglenkesekvensid, vf.vegkategori,
       vf.fartsgrense, h.relativ_posisjon, h.vegvedlikehold, h.year
FROM nvdb.vegobjekter_fartsgrense vf
INNER JOIN nvdb.hendelser h ON vf.veglenkesekvensid = h.veglenkesekvensid"#;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JoinedEvent {
    pub nvdb_id: Option<i64>,
    pub veglenkesekvensid: Option<i64>,
    pub vegkategori: Option<String>,
    pub fartsgrense: Option<f64>,
    pub relativ_posisjon: Option<f64>,
    pub vegvedlikehold: Option<String>,
    pub year: Option<i32>,
}

/// Row count and a short sample of a loaded road-object table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub row_count: i64,
    pub sample: Vec<NormalizedRow>,
}

/// Long name for a road category code; unknown codes are returned as given.
pub fn vegkategori_name(code: &str) -> &str {
    match code {
        "E" => "Europaveg",
        "F" => "Fylkesveg",
        "K" => "Kommunal veg",
        "P" => "Privat veg",
        "R" => "Riksveg",
        "S" => "Skogsveg",
        other => other,
    }
}

pub async fn joined_events(pool: &PgPool) -> Result<Vec<JoinedEvent>, ReportError> {
    let rows = sqlx::query_as::<_, JoinedEvent>(JOIN_QUERY)
        .fetch_all(pool)
        .await?;
    log::info!("report: join returned {} rows", rows.len());
    Ok(rows)
}

/// Events per (year, category long name). Rows missing either are skipped.
pub fn counts_per_year_category(events: &[JoinedEvent]) -> BTreeMap<(i32, String), usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        let (Some(year), Some(code)) = (event.year, event.vegkategori.as_deref()) else {
            continue;
        };
        *counts
            .entry((year, vegkategori_name(code).to_string()))
            .or_insert(0) += 1;
    }
    counts
}

pub fn render_counts(counts: &BTreeMap<(i32, String), usize>) -> String {
    if counts.is_empty() {
        return "no joined events\n".to_string();
    }

    let width = counts
        .keys()
        .map(|(_, name)| name.chars().count())
        .max()
        .unwrap_or(0)
        .max("vegkategori".len());

    let mut out = format!("{:<6} {:<width$} {:>8}\n", "year", "vegkategori", "events");
    for ((year, name), count) in counts {
        out.push_str(&format!("{:<6} {:<width$} {:>8}\n", year, name, count));
    }
    out
}

/// Count rows in `namespace.table` and fetch a sample when there are any.
///
/// Names are validated before any query is sent.
pub async fn check_table(
    pool: &PgPool,
    namespace: &str,
    table: &str,
) -> Result<TableSummary, ReportError> {
    let invalid = |_: LoadError| ReportError::InvalidTable(format!("{}.{}", namespace, table));
    let qualified = format!(
        "{}.{}",
        quote_ident(namespace).map_err(invalid)?,
        quote_ident(table).map_err(invalid)?
    );

    let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", qualified))
        .fetch_one(pool)
        .await?;
    log::info!("report: found {} rows in {}.{}", row_count, namespace, table);

    if row_count == 0 {
        return Ok(TableSummary {
            row_count,
            sample: Vec::new(),
        });
    }

    let sample = sqlx::query_as::<_, NormalizedRow>(&format!(
        "SELECT * FROM {} LIMIT {}",
        qualified, SAMPLE_SIZE
    ))
    .fetch_all(pool)
    .await?;

    Ok(TableSummary { row_count, sample })
}
