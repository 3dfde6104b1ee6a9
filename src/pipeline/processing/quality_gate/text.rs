use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{RowValue, ValidationError};
use crate::types::{Cell, Column};

/// Closed vocabularies for the descriptive note columns
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vocabulary {
    /// Adverbs shared by every dimension unless a dimension overrides them
    pub adverbs: Vec<String>,
    #[serde(default)]
    pub dimensions: BTreeMap<String, DimensionVocabulary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DimensionVocabulary {
    #[serde(default)]
    pub adverbs: Option<Vec<String>>,
    pub adjectives: Vec<String>,
}

impl Vocabulary {
    /// Adverb and adjective lists for one dimension (e.g. "flavor")
    pub fn dimension(&self, name: &str) -> Result<(&[String], &[String]), ValidationError> {
        let dimension = self
            .dimensions
            .get(name)
            .ok_or_else(|| ValidationError::UnknownDimension {
                dimension: name.to_string(),
            })?;
        let adverbs = dimension.adverbs.as_deref().unwrap_or(self.adverbs.as_slice());
        Ok((adverbs, dimension.adjectives.as_slice()))
    }
}

/// Validate a column of "<adverb> <adjective>" descriptions.
///
/// The first word must be a known adverb and the second, when present, a
/// known adjective; a lone adverb is accepted for older one-word entries. Any
/// further word is invalid. A non-empty column where no entry has two words is
/// reported as a column-level format error.
pub fn validate_text<A, B>(
    notes: &Column,
    adverbs: &[A],
    adjectives: &[B],
) -> Result<(), ValidationError>
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let adverbs: BTreeSet<&str> = adverbs.iter().map(|a| a.as_ref()).collect();
    let adjectives: BTreeSet<&str> = adjectives.iter().map(|a| a.as_ref()).collect();

    let mut seen = 0usize;
    let mut has_multi_word = false;
    let mut invalid: BTreeMap<usize, String> = BTreeMap::new();

    for (row, cell) in notes.iter() {
        if cell.is_null() {
            continue;
        }
        seen += 1;

        let text = match cell {
            Cell::Text(s) => s.clone(),
            other => other.to_string(),
        };
        let words: Vec<&str> = text.split(' ').collect();
        if words.len() >= 2 {
            has_multi_word = true;
        }

        let bad_adverb = !adverbs.contains(words[0]);
        let bad_adjective = words.get(1).is_some_and(|w| !adjectives.contains(w));
        let extra_words = words.len() > 2;

        if bad_adverb || bad_adjective || extra_words {
            invalid.entry(row).or_insert(text);
        }
    }

    let format_error = seen > 0 && !has_multi_word;
    if !format_error && invalid.is_empty() {
        return Ok(());
    }

    Err(ValidationError::InvalidText {
        column: notes.name().to_string(),
        format_error,
        values: invalid
            .into_iter()
            .map(|(row, value)| RowValue::new(row, value))
            .collect(),
    })
}
