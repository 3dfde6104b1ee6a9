use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{RowValue, ValidationError};
use crate::types::{Cell, Column};

static GRINDER_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+|-").expect("grinder separator pattern is valid"));

/// Inclusive range of valid grind settings for one grinder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GrindRange {
    pub min: i64,
    pub max: i64,
}

/// Configuration key for a grinder name: lowercase, with each whitespace run
/// or hyphen replaced by `_` ("Baratza Encore-ESP" → "baratza_encore_esp")
pub fn grinder_key(grinder: &str) -> String {
    GRINDER_SEPARATORS
        .replace_all(&grinder.to_lowercase(), "_")
        .into_owned()
}

pub fn lookup_grind_range(
    grinder: &str,
    ranges: &BTreeMap<String, GrindRange>,
) -> Result<GrindRange, ValidationError> {
    let key = grinder_key(grinder);
    ranges
        .get(&key)
        .copied()
        .ok_or_else(|| ValidationError::UnknownGrinder {
            grinder: grinder.to_string(),
            key,
        })
}

fn coerce_integer(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(v) => Some(*v),
        Cell::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
        Cell::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Check a column of grind settings against `[min, max]`.
///
/// Values that are not integers are coerced first; if any value cannot be
/// coerced the non-integer rows are reported and no range check is made.
pub fn validate_grind_settings(settings: &Column, min: i64, max: i64) -> Result<(), ValidationError> {
    let already_integers = settings.values().iter().all(|c| matches!(c, Cell::Int(_)));

    let coerced: Vec<(usize, &Cell, Option<i64>)> = settings
        .iter()
        .map(|(row, cell)| (row, cell, coerce_integer(cell)))
        .collect();

    if !already_integers {
        let non_integers: Vec<RowValue> = coerced
            .iter()
            .filter(|(_, _, value)| value.is_none())
            .map(|(row, cell, _)| RowValue::new(*row, cell.to_string()))
            .collect();
        if !non_integers.is_empty() {
            return Err(ValidationError::NonInteger {
                column: settings.name().to_string(),
                values: non_integers,
            });
        }
    }

    let out_of_range: Vec<RowValue> = coerced
        .iter()
        .filter_map(|(row, _, value)| match value {
            Some(v) if *v < min || *v > max => Some(RowValue::new(*row, v.to_string())),
            _ => None,
        })
        .collect();

    if out_of_range.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            column: settings.name().to_string(),
            min,
            max,
            values: out_of_range,
        })
    }
}
