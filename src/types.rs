use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single value in a tabular batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn text<S: Into<String>>(value: S) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the cell; text is parsed leniently (surrounding whitespace ignored)
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Null => None,
        }
    }

    /// Convert a JSON value from an export into a cell
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Int(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Column \"{column}\" has {found} values but the batch has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Column \"{0}\" already exists in the batch")]
    DuplicateColumn(String),

    #[error("Column \"{0}\" does not exist in the batch")]
    UnknownColumn(String),
}

/// A named column of cells. Each value carries the row index it had when the
/// batch was loaded, so filtered columns still report source rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    index: Vec<usize>,
    values: Vec<Cell>,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, values: Vec<Cell>) -> Self {
        let index = (0..values.len()).collect();
        Self {
            name: name.into(),
            index,
            values,
        }
    }

    /// Build a column that keeps an existing row index
    pub fn with_index<S: Into<String>>(
        name: S,
        index: Vec<usize>,
        values: Vec<Cell>,
    ) -> Result<Self, BatchError> {
        let name = name.into();
        if index.len() != values.len() {
            return Err(BatchError::LengthMismatch {
                column: name,
                expected: index.len(),
                found: values.len(),
            });
        }
        Ok(Self {
            name,
            index,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn get(&self, position: usize) -> Option<&Cell> {
        self.values.get(position)
    }

    /// Iterate `(row, cell)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Cell)> + '_ {
        self.index.iter().copied().zip(self.values.iter())
    }

    /// Keep only the cells matching `keep`, preserving their row index
    pub fn filter<F>(&self, keep: F) -> Column
    where
        F: Fn(&Cell) -> bool,
    {
        let (index, values) = self
            .iter()
            .filter(|(_, cell)| keep(*cell))
            .map(|(row, cell)| (row, cell.clone()))
            .unzip();
        Column {
            name: self.name.clone(),
            index,
            values,
        }
    }

    /// Keep the cells whose position is set in `mask`
    pub fn select(&self, mask: &[bool]) -> Column {
        let (index, values) = self
            .iter()
            .zip(mask.iter())
            .filter(|(_, keep)| **keep)
            .map(|((row, cell), _)| (row, cell.clone()))
            .unzip();
        Column {
            name: self.name.clone(),
            index,
            values,
        }
    }

    pub fn map_values<F>(&mut self, f: F)
    where
        F: Fn(&Cell) -> Cell,
    {
        for cell in self.values.iter_mut() {
            *cell = f(cell);
        }
    }
}

/// An ordered set of equal-length columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    columns: Vec<Column>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, BatchError> {
        let mut batch = Self::new();
        for column in columns {
            batch.push_column(column)?;
        }
        Ok(batch)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), BatchError> {
        self.check_insert(&column, None)?;
        self.columns.push(column);
        Ok(())
    }

    /// Replace the column at `position` with `replacements`, in order
    pub fn splice_column(
        &mut self,
        position: usize,
        replacements: Vec<Column>,
    ) -> Result<(), BatchError> {
        let removed = self
            .columns
            .get(position)
            .map(|c| c.name.clone())
            .ok_or_else(|| BatchError::UnknownColumn(format!("#{position}")))?;
        for (i, column) in replacements.iter().enumerate() {
            self.check_insert(column, Some(&removed))?;
            if replacements[..i].iter().any(|c| c.name == column.name) {
                return Err(BatchError::DuplicateColumn(column.name.clone()));
            }
        }
        self.columns.splice(position..=position, replacements);
        Ok(())
    }

    /// Cells of one row, in column order
    pub fn row(&self, position: usize) -> Vec<&Cell> {
        self.columns
            .iter()
            .filter_map(|c| c.values.get(position))
            .collect()
    }

    fn check_insert(&self, column: &Column, replacing: Option<&str>) -> Result<(), BatchError> {
        if self
            .columns
            .iter()
            .any(|c| c.name == column.name && Some(c.name.as_str()) != replacing)
        {
            return Err(BatchError::DuplicateColumn(column.name.clone()));
        }
        let others = self
            .columns
            .iter()
            .find(|c| Some(c.name.as_str()) != replacing);
        if let Some(existing) = others {
            if existing.len() != column.len() {
                return Err(BatchError::LengthMismatch {
                    column: column.name.clone(),
                    expected: existing.len(),
                    found: column.len(),
                });
            }
        }
        Ok(())
    }
}
