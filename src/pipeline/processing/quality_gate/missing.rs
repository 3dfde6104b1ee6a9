use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

use super::{MissingColumnValues, ValidationError};
use crate::constants::{TIMESTAMP_FORMAT, UNKNOWN_TIME};
use crate::types::{Batch, Cell};

/// Render a seconds-since-epoch cell in the configured time zone
pub fn render_timestamp(cell: Option<&Cell>, time_zone: Tz) -> String {
    let seconds = match cell {
        Some(Cell::Int(v)) => Some(*v),
        Some(Cell::Float(v)) if v.is_finite() => Some(v.trunc() as i64),
        Some(Cell::Text(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    seconds
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .map(|dt| dt.with_timezone(&time_zone).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// Fail when any required column holds a null value.
///
/// Each offending row is reported together with its brew time, read from
/// `timestamp_column`, so the entry can be found in the app.
pub fn check_missing<S: AsRef<str>>(
    batch: &Batch,
    required_columns: &[S],
    timestamp_column: &str,
    time_zone: Tz,
) -> Result<(), ValidationError> {
    if batch.is_empty() {
        debug!("Empty batch, nothing to check for missing values");
        return Ok(());
    }

    let timestamps = batch.column(timestamp_column);
    let mut violations = Vec::new();

    for name in required_columns {
        let name = name.as_ref();
        let column = batch
            .column(name)
            .ok_or_else(|| ValidationError::MissingColumn {
                column: name.to_string(),
            })?;

        let positions: Vec<usize> = column
            .values()
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_null())
            .map(|(position, _)| position)
            .collect();
        if positions.is_empty() {
            continue;
        }

        let rows = positions.iter().map(|p| column.index()[*p]).collect();
        let times = positions
            .iter()
            .map(|p| render_timestamp(timestamps.and_then(|t| t.get(*p)), time_zone))
            .collect();

        violations.push(MissingColumnValues {
            column: name.to_string(),
            rows,
            timestamps: times,
        });
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingValues {
            columns: violations,
        })
    }
}
