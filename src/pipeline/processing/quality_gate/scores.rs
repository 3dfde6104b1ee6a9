use super::{RowValue, ValidationError};
use crate::types::Column;

/// Fail for every row where a brew score was not submitted (score = 0)
pub fn check_scores(scores: &Column) -> Result<(), ValidationError> {
    let unscored: Vec<usize> = scores
        .iter()
        .filter(|(_, cell)| cell.to_f64() == Some(0.0))
        .map(|(row, _)| row)
        .collect();

    if unscored.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Unscored {
            column: scores.name().to_string(),
            rows: unscored,
        })
    }
}

/// Fail for every non-null score that is not a number within `[min, max]`
pub fn check_score_range(scores: &Column, min: f64, max: f64) -> Result<(), ValidationError> {
    let invalid: Vec<RowValue> = scores
        .iter()
        .filter(|(_, cell)| !cell.is_null())
        .filter(|(_, cell)| !cell.to_f64().is_some_and(|v| v >= min && v <= max))
        .map(|(row, cell)| RowValue::new(row, cell.to_string()))
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::ScoreOutOfRange {
            column: scores.name().to_string(),
            min,
            max,
            values: invalid,
        })
    }
}
