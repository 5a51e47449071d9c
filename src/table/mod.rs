//! Columnar table of speed-limit road objects.
//!
//! Records are first split into raw JSON columns, one entry per record, and
//! each column is then coerced to its declared type. Rows keep input order.

pub mod coerce;
pub mod schema;

use crate::extract::{self, paths, resolve};
use crate::loader::{Loadable, PgQuery};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::ops::Range;

pub use schema::{Column, ColumnType};

/// Name of the road-object property holding the speed limit.
pub const FARTSGRENSE_PROPERTY: &str = "fartsgrense";

pub const FARTSGRENSE_COLUMNS: &[Column] = &[
    Column::new("nvdb_id", ColumnType::BigInt),
    Column::new("vegkategori", ColumnType::Text),
    Column::new("fylke", ColumnType::BigInt),
    Column::new("kommune", ColumnType::BigInt),
    Column::new("veglenkesekvensid", ColumnType::BigInt),
    Column::new("startdato", ColumnType::Timestamp),
    Column::new("sist_modifisert", ColumnType::Timestamp),
    Column::new("geometri_wkt", ColumnType::Text),
    Column::new("fartsgrense", ColumnType::Double),
];

/// One normalized road object, as stored in `vegobjekter_fartsgrense`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct NormalizedRow {
    pub nvdb_id: Option<i64>,
    pub vegkategori: Option<String>,
    pub fylke: Option<i64>,
    pub kommune: Option<i64>,
    pub veglenkesekvensid: Option<i64>,
    pub startdato: Option<NaiveDateTime>,
    pub sist_modifisert: Option<NaiveDateTime>,
    pub geometri_wkt: Option<String>,
    pub fartsgrense: Option<f64>,
}

/// Normalized road objects in parallel vectors, one per column.
///
/// Only [`build`] creates non-empty tables, so every column has `len()`
/// entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FartsgrenseTable {
    nvdb_ids: Vec<Option<i64>>,
    vegkategorier: Vec<Option<String>>,
    fylker: Vec<Option<i64>>,
    kommuner: Vec<Option<i64>>,
    veglenkesekvensids: Vec<Option<i64>>,
    startdatoer: Vec<Option<NaiveDateTime>>,
    sist_modifisert: Vec<Option<NaiveDateTime>>,
    geometri_wkt: Vec<Option<String>>,
    fartsgrenser: Vec<Option<f64>>,
}

impl FartsgrenseTable {
    pub fn nvdb_ids(&self) -> &[Option<i64>] {
        &self.nvdb_ids
    }

    pub fn vegkategorier(&self) -> &[Option<String>] {
        &self.vegkategorier
    }

    pub fn veglenkesekvensids(&self) -> &[Option<i64>] {
        &self.veglenkesekvensids
    }

    pub fn fartsgrenser(&self) -> &[Option<f64>] {
        &self.fartsgrenser
    }

    pub fn len(&self) -> usize {
        self.nvdb_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nvdb_ids.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<NormalizedRow> {
        if index >= self.len() {
            return None;
        }
        Some(NormalizedRow {
            nvdb_id: self.nvdb_ids[index],
            vegkategori: self.vegkategorier[index].clone(),
            fylke: self.fylker[index],
            kommune: self.kommuner[index],
            veglenkesekvensid: self.veglenkesekvensids[index],
            startdato: self.startdatoer[index],
            sist_modifisert: self.sist_modifisert[index],
            geometri_wkt: self.geometri_wkt[index].clone(),
            fartsgrense: self.fartsgrenser[index],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = NormalizedRow> + '_ {
        (0..self.len()).filter_map(|index| self.row(index))
    }
}

/// Uncoerced values borrowed from the source records.
#[derive(Default)]
struct RawColumns<'a> {
    nvdb_id: Vec<Option<&'a Value>>,
    vegkategori: Vec<Option<&'a Value>>,
    fylke: Vec<Option<&'a Value>>,
    kommune: Vec<Option<&'a Value>>,
    veglenkesekvensid: Vec<Option<&'a Value>>,
    startdato: Vec<Option<&'a Value>>,
    sist_modifisert: Vec<Option<&'a Value>>,
    geometri_wkt: Vec<Option<&'a Value>>,
    fartsgrense: Vec<Option<&'a Value>>,
}

impl<'a> RawColumns<'a> {
    fn push(&mut self, record: &'a Value) {
        self.nvdb_id.push(resolve(record, paths::ID));
        self.vegkategori.push(resolve(record, paths::VEGKATEGORI));
        self.fylke.push(resolve(record, paths::FYLKE));
        self.kommune.push(resolve(record, paths::KOMMUNE));
        self.veglenkesekvensid
            .push(resolve(record, paths::VEGLENKESEKVENSID));
        self.startdato.push(resolve(record, paths::STARTDATO));
        self.sist_modifisert
            .push(resolve(record, paths::SIST_MODIFISERT));
        self.geometri_wkt.push(resolve(record, paths::GEOMETRI_WKT));
        self.fartsgrense
            .push(extract::extract_property(record, FARTSGRENSE_PROPERTY));
    }
}

fn typed<T>(raw: &[Option<&Value>], coerce: fn(Option<&Value>) -> Option<T>) -> Vec<Option<T>> {
    raw.iter().map(|value| coerce(*value)).collect()
}

/// Normalize road objects into a [`FartsgrenseTable`], one row per record.
pub fn build(records: &[Value]) -> FartsgrenseTable {
    let mut raw = RawColumns::default();
    for record in records {
        raw.push(record);
    }

    let table = FartsgrenseTable {
        nvdb_ids: typed(&raw.nvdb_id, coerce::integer),
        vegkategorier: typed(&raw.vegkategori, coerce::text),
        fylker: typed(&raw.fylke, coerce::integer),
        kommuner: typed(&raw.kommune, coerce::integer),
        veglenkesekvensids: typed(&raw.veglenkesekvensid, coerce::integer),
        startdatoer: typed(&raw.startdato, coerce::timestamp),
        sist_modifisert: typed(&raw.sist_modifisert, coerce::timestamp),
        geometri_wkt: typed(&raw.geometri_wkt, coerce::text),
        fartsgrenser: typed(&raw.fartsgrense, coerce::numeric),
    };

    log::debug!("table: built {} rows from {} records", table.len(), records.len());
    table
}

impl Loadable for FartsgrenseTable {
    fn columns(&self) -> &'static [Column] {
        FARTSGRENSE_COLUMNS
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn bind_batch<'q>(&self, query: PgQuery<'q>, rows: Range<usize>) -> PgQuery<'q> {
        query
            .bind(self.nvdb_ids[rows.clone()].to_vec())
            .bind(self.vegkategorier[rows.clone()].to_vec())
            .bind(self.fylker[rows.clone()].to_vec())
            .bind(self.kommuner[rows.clone()].to_vec())
            .bind(self.veglenkesekvensids[rows.clone()].to_vec())
            .bind(self.startdatoer[rows.clone()].to_vec())
            .bind(self.sist_modifisert[rows.clone()].to_vec())
            .bind(self.geometri_wkt[rows.clone()].to_vec())
            .bind(self.fartsgrenser[rows].to_vec())
    }
}
