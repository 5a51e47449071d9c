//! Field extraction from NVDB road objects.
//!
//! Road objects arrive as untyped JSON where any level may be missing. Paths
//! are described as a slice of [`Step`]s and resolved with [`lookup`], which
//! separates an expected miss (`Ok(None)`) from a node of the wrong kind
//! (`Err(ShapeError)`). The public extractors log shape errors and treat them
//! as missing, so they never fail.
//!
//! Multi-valued location fields (`fylker`, `kommuner`, `vegsystemreferanser`,
//! `stedfestinger`) only contribute their first element.

use crate::table::coerce;
use log::warn;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Key(&'a str),
    Index(usize),
}

impl Step<'_> {
    fn expects(&self) -> &'static str {
        match self {
            Step::Key(_) => "object",
            Step::Index(_) => "array",
        }
    }

    fn apply<'v>(&self, node: &'v Value) -> Result<Option<&'v Value>, &'static str> {
        match (self, node) {
            (Step::Key(key), Value::Object(map)) => Ok(map.get(*key)),
            (Step::Index(index), Value::Array(items)) => Ok(items.get(*index)),
            (_, other) => Err(kind(other)),
        }
    }
}

impl fmt::Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(key) => write!(f, ".{}", key),
            Step::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// A path segment was present but not the container the path expects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected} at `{at}`, found {found}")]
pub struct ShapeError {
    pub at: String,
    pub expected: &'static str,
    pub found: &'static str,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(path: &[Step<'_>]) -> String {
    std::iter::once("$".to_string())
        .chain(path.iter().map(ToString::to_string))
        .collect()
}

/// Resolve `path` against `value`.
///
/// Stops at the first absent segment. JSON `null` anywhere along the path,
/// including the leaf, counts as absent.
pub fn lookup<'v>(value: &'v Value, path: &[Step<'_>]) -> Result<Option<&'v Value>, ShapeError> {
    path.iter()
        .enumerate()
        .try_fold(Some(value), |current, (depth, step)| match current {
            None | Some(Value::Null) => Ok(None),
            Some(node) => step.apply(node).map_err(|found| ShapeError {
                at: render(&path[..depth]),
                expected: step.expects(),
                found,
            }),
        })
        .map(|found| found.filter(|leaf| !leaf.is_null()))
}

/// Paths into an NVDB v3 road object.
pub mod paths {
    use super::Step::{self, Index, Key};

    pub const ID: &[Step<'static>] = &[Key("id")];
    pub const VEGKATEGORI: &[Step<'static>] = &[
        Key("lokasjon"),
        Key("vegsystemreferanser"),
        Index(0),
        Key("vegsystem"),
        Key("vegkategori"),
    ];
    pub const FYLKE: &[Step<'static>] = &[Key("lokasjon"), Key("fylker"), Index(0)];
    pub const KOMMUNE: &[Step<'static>] = &[Key("lokasjon"), Key("kommuner"), Index(0)];
    pub const VEGLENKESEKVENSID: &[Step<'static>] = &[
        Key("lokasjon"),
        Key("stedfestinger"),
        Index(0),
        Key("veglenkesekvensid"),
    ];
    pub const STARTDATO: &[Step<'static>] = &[Key("metadata"), Key("startdato")];
    pub const SIST_MODIFISERT: &[Step<'static>] = &[Key("metadata"), Key("sist_modifisert")];
    pub const GEOMETRI_WKT: &[Step<'static>] = &[Key("geometri"), Key("wkt")];
    pub const EGENSKAPER: &[Step<'static>] = &[Key("egenskaper")];
}

fn object_label(record: &Value) -> String {
    record
        .get("id")
        .map(ToString::to_string)
        .unwrap_or_else(|| "<no id>".to_string())
}

/// Like [`lookup`], but a shape mismatch is logged and reported as missing.
pub fn resolve<'v>(record: &'v Value, path: &[Step<'_>]) -> Option<&'v Value> {
    match lookup(record, path) {
        Ok(found) => found,
        Err(err) => {
            warn!("extract: object {}: {}", object_label(record), err);
            None
        }
    }
}

/// The `veglenkesekvensid` of the object's first placement.
pub fn extract_veglenke(record: &Value) -> Option<i64> {
    coerce::integer(resolve(record, paths::VEGLENKESEKVENSID))
}

/// Value of the first property whose `navn` equals `name`, ignoring case.
pub fn extract_property<'v>(record: &'v Value, name: &str) -> Option<&'v Value> {
    let properties = resolve(record, paths::EGENSKAPER)?;
    let Some(properties) = properties.as_array() else {
        warn!(
            "extract: object {}: expected array at `$.egenskaper`, found {}",
            object_label(record),
            kind(properties)
        );
        return None;
    };

    properties
        .iter()
        .enumerate()
        .find(|(index, property)| match property_name(property, *index) {
            Ok(navn) => eq_ignore_case(navn, name),
            Err(err) => {
                warn!("extract: object {}: {}", object_label(record), err);
                false
            }
        })
        .and_then(|(_, property)| property.get("verdi"))
        .filter(|verdi| !verdi.is_null())
}

/// The `navn` of the property at `egenskaper[index]`.
fn property_name(property: &Value, index: usize) -> Result<&str, ShapeError> {
    let at = |suffix: &str| format!("$.egenskaper[{}]{}", index, suffix);
    match lookup(property, &[Step::Key("navn")]) {
        Ok(Some(Value::String(navn))) => Ok(navn.as_str()),
        Ok(other) => Err(ShapeError {
            at: at(".navn"),
            expected: "string",
            found: other.map_or("nothing", kind),
        }),
        Err(err) => Err(ShapeError { at: at(""), ..err }),
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
