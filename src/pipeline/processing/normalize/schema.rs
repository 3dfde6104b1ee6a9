use serde::Deserialize;

/// Column layout and check list for one log source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSchema {
    /// Seconds-since-epoch column used to label rows in error reports
    pub timestamp_column: String,
    pub score_column: String,
    #[serde(default)]
    pub score_range: Option<ScoreRange>,
    /// Composite "a / b / c" column expanded into `note_fields`
    #[serde(default)]
    pub notes_column: Option<String>,
    #[serde(default)]
    pub note_fields: Vec<NoteField>,
    #[serde(default)]
    pub unit_columns: Vec<UnitSuffix>,
    /// User-input columns that must never be missing
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub descriptor_checks: Vec<DescriptorCheck>,
    pub grinder_column: String,
    pub grind_column: String,
    /// Columns holding comma-separated UUIDs to be replaced by names
    #[serde(default)]
    pub identifier_columns: Vec<String>,
}

impl SourceSchema {
    pub fn note_labels(&self) -> Vec<&str> {
        self.note_fields
            .iter()
            .filter_map(|f| f.label.as_deref())
            .collect()
    }

    pub fn note_columns(&self) -> Vec<&str> {
        self.note_fields.iter().map(|f| f.column.as_str()).collect()
    }
}

/// One positional attribute of the notes column
#[derive(Debug, Clone, Deserialize)]
pub struct NoteField {
    pub column: String,
    /// Label prefix typed in the app, e.g. "Bean:"
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitSuffix {
    pub column: String,
    pub suffix: String,
}

/// Controlled-vocabulary check of one descriptive column
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorCheck {
    pub column: String,
    /// Vocabulary dimension, e.g. "flavor" or "balance"
    pub dimension: String,
    /// Literal values that skip the check entirely (e.g. "Balanced")
    #[serde(default)]
    pub exempt_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}
