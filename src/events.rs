//! Road maintenance events (`hendelser`) loaded from CSV.
//!
//! The target table is partitioned by `year`, so a file without a `year`
//! column is rejected before anything is written.

use crate::error::PipelineError;
use crate::loader::{self, ConflictPolicy, LoadReport, Loadable, PgQuery};
use crate::table::{Column, ColumnType};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use sqlx::PgPool;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const HENDELSER_TABLE: &str = "hendelser";

pub const DEFAULT_CSV_PATH: &str = "sql/hendelser.csv";

const YEAR_COLUMN: &str = "year";

pub const HENDELSER_COLUMNS: &[Column] = &[
    Column::new("veglenkesekvensid", ColumnType::BigInt),
    Column::new("relativ_posisjon", ColumnType::Double),
    Column::new("vegvedlikehold", ColumnType::Text),
    Column::new("rand_float", ColumnType::Double),
    Column::new("year", ColumnType::Integer),
];

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("event file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to open event file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse event CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("event CSV has no `year` column; cannot load into partitioned table")]
    MissingYearColumn,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(default)]
    veglenkesekvensid: Option<i64>,
    #[serde(default)]
    relativ_posisjon: Option<f64>,
    #[serde(default)]
    vegvedlikehold: Option<String>,
    #[serde(default)]
    rand_float: Option<f64>,
    year: i32,
}

/// Events in columnar form, ready for [`loader::load`].
///
/// Rows are only added through [`read_events`], one value per column at a
/// time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    veglenkesekvensids: Vec<Option<i64>>,
    relative_posisjoner: Vec<Option<f64>>,
    vegvedlikehold: Vec<Option<String>>,
    rand_floats: Vec<Option<f64>>,
    years: Vec<i32>,
}

impl EventTable {
    pub fn veglenkesekvensids(&self) -> &[Option<i64>] {
        &self.veglenkesekvensids
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    fn push(&mut self, record: EventRecord) {
        self.veglenkesekvensids.push(record.veglenkesekvensid);
        self.relative_posisjoner.push(record.relativ_posisjon);
        self.vegvedlikehold.push(record.vegvedlikehold);
        self.rand_floats.push(record.rand_float);
        self.years.push(record.year);
    }
}

impl Loadable for EventTable {
    fn columns(&self) -> &'static [Column] {
        HENDELSER_COLUMNS
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn bind_batch<'q>(&self, query: PgQuery<'q>, rows: Range<usize>) -> PgQuery<'q> {
        query
            .bind(self.veglenkesekvensids[rows.clone()].to_vec())
            .bind(self.relative_posisjoner[rows.clone()].to_vec())
            .bind(self.vegvedlikehold[rows.clone()].to_vec())
            .bind(self.rand_floats[rows.clone()].to_vec())
            .bind(self.years[rows].to_vec())
    }
}

/// Parse events from CSV with a header row.
///
/// Columns are matched by name after trimming the header row; unknown columns
/// are ignored and empty fields are read as null. Every row needs a `year`.
pub fn read_events<R: Read>(input: R) -> Result<EventTable, EventsError> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(input);

    let headers = reader.headers()?;
    log::debug!("events: csv columns {:?}", headers.iter().collect::<Vec<_>>());
    if !headers.iter().any(|header| header == YEAR_COLUMN) {
        return Err(EventsError::MissingYearColumn);
    }

    let mut table = EventTable::default();
    for record in reader.deserialize::<EventRecord>() {
        table.push(record?);
    }
    Ok(table)
}

pub fn read_events_file(path: &Path) -> Result<EventTable, EventsError> {
    if !path.exists() {
        return Err(EventsError::NotFound(path.to_path_buf()));
    }
    let table = read_events(File::open(path)?)?;
    log::info!("events: read {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Read `path` and append its rows to `namespace.hendelser`.
///
/// File problems are reported before the database is touched.
pub async fn load_events(
    pool: &PgPool,
    path: &Path,
    namespace: &str,
) -> Result<LoadReport, PipelineError> {
    let table = read_events_file(path)?;
    let report =
        loader::load(pool, &table, HENDELSER_TABLE, namespace, ConflictPolicy::Append).await?;
    Ok(report)
}
