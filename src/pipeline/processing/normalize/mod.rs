//! Turns a raw log batch into a validated one.
//!
//! `normalize` runs a fixed sequence of reshaping and validation steps and
//! stops at the first failing step. A batch that comes out of it is safe to
//! persist; re-normalizing it returns the same batch.

mod identifiers;
mod schema;

pub use identifiers::IdentifierLookup;
pub use schema::{DescriptorCheck, NoteField, ScoreRange, SourceSchema, UnitSuffix};

use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::pipeline::processing::parser::parse_notes;
use crate::pipeline::processing::quality_gate::{
    check_missing, check_score_range, check_scores, lookup_grind_range, validate_grind_settings,
    validate_text, ExtraTokens, GrindRange, ValidationError, Vocabulary,
};
use crate::types::{Batch, Cell, Column};

/// Everything the normalizer needs to know about one source
#[derive(Debug, Clone, Copy)]
pub struct ValidationRules<'a> {
    pub schema: &'a SourceSchema,
    pub vocabulary: &'a Vocabulary,
    pub grind_ranges: &'a BTreeMap<String, GrindRange>,
    pub time_zone: Tz,
}

/// A batch that passed every normalization step.
///
/// Only `normalize` can build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedBatch(Batch);

impl ValidatedBatch {
    pub fn batch(&self) -> &Batch {
        &self.0
    }

    pub fn into_inner(self) -> Batch {
        self.0
    }

    pub fn num_rows(&self) -> usize {
        self.0.num_rows()
    }
}

/// Reshape and validate a raw batch, in order:
///
/// 1. strip unit suffixes
/// 2. expand the notes column into its attribute columns
/// 3. missing values in required columns
/// 4. brew scores
/// 5. descriptive text against the vocabulary
/// 6. grind settings per grinder
/// 7. identifier → name substitution
pub fn normalize(
    batch: Batch,
    rules: &ValidationRules<'_>,
    lookup: &IdentifierLookup,
) -> Result<ValidatedBatch, ValidationError> {
    let schema = rules.schema;
    let mut batch = batch;

    // Nothing to check, including an export with no header line
    if batch.is_empty() {
        info!("No log rows to validate");
        return Ok(ValidatedBatch(batch));
    }

    strip_units(&mut batch, schema);
    expand_notes(&mut batch, schema)?;

    check_missing(
        &batch,
        &schema.required_columns,
        &schema.timestamp_column,
        rules.time_zone,
    )?;

    let scores = require(&batch, &schema.score_column)?;
    check_scores(scores)?;
    if let Some(range) = schema.score_range {
        check_score_range(scores, range.min, range.max)?;
    }

    for check in &schema.descriptor_checks {
        check_descriptors(&batch, check, rules.vocabulary)?;
    }

    check_grind_settings(&batch, schema, rules.grind_ranges)?;

    resolve_identifiers(&mut batch, &schema.identifier_columns, lookup)?;

    info!("✅ Validated {} log rows", batch.num_rows());
    Ok(ValidatedBatch(batch))
}

fn require<'b>(batch: &'b Batch, name: &str) -> Result<&'b Column, ValidationError> {
    batch.column(name).ok_or_else(|| ValidationError::MissingColumn {
        column: name.to_string(),
    })
}

fn strip_units(batch: &mut Batch, schema: &SourceSchema) {
    for unit in &schema.unit_columns {
        let Some(column) = batch.column_mut(&unit.column) else {
            debug!("Unit column {} not in batch, skipping", unit.column);
            continue;
        };
        column.map_values(|cell| match cell {
            Cell::Text(s) => match s.strip_suffix(unit.suffix.as_str()) {
                Some(stripped) => Cell::text(stripped.trim_end()),
                None => cell.clone(),
            },
            other => other.clone(),
        });
    }
}

fn expand_notes(batch: &mut Batch, schema: &SourceSchema) -> Result<(), ValidationError> {
    let Some(notes_column) = schema.notes_column.as_deref() else {
        return Ok(());
    };
    let field_columns = schema.note_columns();

    let Some(position) = batch.position(notes_column) else {
        if let Some(absent) = field_columns.iter().find(|c| batch.column(c).is_none()) {
            debug!("Note attribute column {} is absent too", absent);
            return Err(ValidationError::MissingColumn {
                column: notes_column.to_string(),
            });
        }
        debug!("Notes already expanded, skipping note parsing");
        return Ok(());
    };

    let labels = schema.note_labels();
    let notes = &batch.columns()[position];
    let mut values: Vec<Vec<Cell>> = vec![Vec::with_capacity(notes.len()); field_columns.len()];
    let mut extra_rows = Vec::new();

    for (row, cell) in notes.iter() {
        let tokens = if cell.is_null() {
            Vec::new()
        } else {
            parse_notes(&cell.to_string(), &labels)
        };

        for (i, column_values) in values.iter_mut().enumerate() {
            let value = match tokens.get(i) {
                Some(token) if !token.is_empty() => Cell::text(token.as_str()),
                _ => Cell::Null,
            };
            column_values.push(value);
        }

        let extra: Vec<String> = tokens
            .iter()
            .skip(field_columns.len())
            .filter(|t| !t.is_empty())
            .cloned()
            .collect();
        if !extra.is_empty() {
            extra_rows.push(ExtraTokens { row, values: extra });
        }
    }

    if !extra_rows.is_empty() {
        return Err(ValidationError::ExtraNoteTokens {
            column: notes_column.to_string(),
            rows: extra_rows,
        });
    }

    let index = notes.index().to_vec();
    let replacements = field_columns
        .iter()
        .zip(values)
        .map(|(name, column_values)| Column::with_index(*name, index.clone(), column_values))
        .collect::<Result<Vec<_>, _>>()?;
    batch.splice_column(position, replacements)?;
    Ok(())
}

fn check_descriptors(
    batch: &Batch,
    check: &DescriptorCheck,
    vocabulary: &Vocabulary,
) -> Result<(), ValidationError> {
    let (adverbs, adjectives) = vocabulary.dimension(&check.dimension)?;
    let column = require(batch, &check.column)?;
    let checked = if check.exempt_values.is_empty() {
        column.clone()
    } else {
        column.filter(|cell| {
            !cell
                .as_text()
                .is_some_and(|text| check.exempt_values.iter().any(|v| v == text))
        })
    };
    validate_text(&checked, adverbs, adjectives)
}

fn check_grind_settings(
    batch: &Batch,
    schema: &SourceSchema,
    ranges: &BTreeMap<String, GrindRange>,
) -> Result<(), ValidationError> {
    let grinders = require(batch, &schema.grinder_column)?;
    let settings = require(batch, &schema.grind_column)?;

    let mut seen: Vec<&Cell> = Vec::new();
    for cell in grinders.values() {
        if !cell.is_null() && !seen.contains(&cell) {
            seen.push(cell);
        }
    }

    for grinder in seen {
        let name = grinder.to_string();
        info!("Validating grind setting values for grinder {}", name);
        let range = lookup_grind_range(&name, ranges)?;
        let mask: Vec<bool> = grinders.values().iter().map(|c| c == grinder).collect();
        validate_grind_settings(&settings.select(&mask), range.min, range.max)?;
    }
    Ok(())
}

fn resolve_identifiers(
    batch: &mut Batch,
    columns: &[String],
    lookup: &IdentifierLookup,
) -> Result<(), ValidationError> {
    for name in columns {
        let column = batch
            .column_mut(name)
            .ok_or_else(|| ValidationError::MissingColumn {
                column: name.to_string(),
            })?;
        column.map_values(|cell| lookup.resolve(cell));
    }
    Ok(())
}
