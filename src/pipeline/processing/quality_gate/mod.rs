//! Batch validators for brewing logs.
//!
//! Every check evaluates the whole column and reports all offending rows in a
//! single [`ValidationError`], so one failed run lists everything that needs
//! fixing in the app export.

mod grind;
mod missing;
mod scores;
mod text;

pub use grind::{grinder_key, lookup_grind_range, validate_grind_settings, GrindRange};
pub use missing::{check_missing, render_timestamp};
pub use scores::{check_score_range, check_scores};
pub use text::{validate_text, DimensionVocabulary, Vocabulary};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::BatchError;

/// One offending cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowValue {
    pub row: usize,
    pub value: String,
}

impl RowValue {
    pub fn new<S: Into<String>>(row: usize, value: S) -> Self {
        Self {
            row,
            value: value.into(),
        }
    }
}

/// Extra note segments found in one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraTokens {
    pub row: usize,
    pub values: Vec<String>,
}

/// Missing values found in one required column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingColumnValues {
    pub column: String,
    pub rows: Vec<usize>,
    pub timestamps: Vec<String>,
}

impl fmt::Display for MissingColumnValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Column \"{}\" contains missing value(s) in row(s) {:?}: {:?}",
            self.column, self.rows, self.timestamps
        )
    }
}

/// Broad class of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The batch does not have the expected shape
    Structural,
    /// A cell holds a value the pipeline refuses to load
    DataQuality,
    /// Configuration lacks an entry the batch needs
    Configuration,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Column \"{column}\" is missing from the batch")]
    MissingColumn { column: String },

    #[error(
        "Column \"{column}\" contains more values than expected in row(s): {}",
        format_extra_tokens(.rows)
    )]
    ExtraNoteTokens {
        column: String,
        rows: Vec<ExtraTokens>,
    },

    #[error("{}", format_missing(.columns))]
    MissingValues { columns: Vec<MissingColumnValues> },

    #[error("A brew score was not submitted in column \"{column}\" row(s): {rows:?}")]
    Unscored { column: String, rows: Vec<usize> },

    #[error(
        "Column \"{column}\" contains scores outside the valid range of [{min}, {max}] in row(s): {}",
        format_row_values(.values)
    )]
    ScoreOutOfRange {
        column: String,
        min: f64,
        max: f64,
        values: Vec<RowValue>,
    },

    #[error("{}", format_invalid_text(.column, .format_error, .values))]
    InvalidText {
        column: String,
        format_error: bool,
        values: Vec<RowValue>,
    },

    #[error(
        "Column \"{column}\" contains non-integer values in row(s): {}",
        format_row_values(.values)
    )]
    NonInteger {
        column: String,
        values: Vec<RowValue>,
    },

    #[error(
        "Column \"{column}\" contains values outside the valid range of [{min}, {max}] in row(s): {}",
        format_row_values(.values)
    )]
    OutOfRange {
        column: String,
        min: i64,
        max: i64,
        values: Vec<RowValue>,
    },

    #[error("Grind settings range not set for grinder \"{grinder}\" (expected config key \"{key}\")")]
    UnknownGrinder { grinder: String, key: String },

    #[error("No vocabulary configured for descriptor dimension \"{dimension}\"")]
    UnknownDimension { dimension: String },

    #[error(transparent)]
    Shape(#[from] BatchError),
}

impl ValidationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::MissingColumn { .. }
            | ValidationError::ExtraNoteTokens { .. }
            | ValidationError::Shape(_) => ErrorCategory::Structural,
            ValidationError::UnknownGrinder { .. } | ValidationError::UnknownDimension { .. } => {
                ErrorCategory::Configuration
            }
            _ => ErrorCategory::DataQuality,
        }
    }
}

fn format_row_values(values: &[RowValue]) -> String {
    let pairs: Vec<String> = values
        .iter()
        .map(|v| format!("{}: {:?}", v.row, v.value))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn format_extra_tokens(rows: &[ExtraTokens]) -> String {
    let pairs: Vec<String> = rows
        .iter()
        .map(|r| format!("{}: {:?}", r.row, r.values))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

fn format_missing(columns: &[MissingColumnValues]) -> String {
    columns
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", \n")
}

fn format_invalid_text(column: &str, format_error: &bool, values: &[RowValue]) -> String {
    let mut messages = Vec::new();
    if *format_error {
        messages.push(format!("Column \"{column}\" contains invalid text!"));
    }
    if !values.is_empty() {
        messages.push(format!(
            "Column \"{column}\" contains invalid values in row(s): {}",
            format_row_values(values)
        ));
    }
    messages.join(", \n")
}
