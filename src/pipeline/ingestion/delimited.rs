use csv::ReaderBuilder;
use tracing::debug;

use crate::error::Result;
use crate::types::{Batch, Cell, Column};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Read a headered delimited table into a batch.
///
/// Each column is typed from its non-empty cells: all integers gives an
/// integer column, all numbers a float column, anything else text. Empty cells
/// are null.
pub fn read_batch(bytes: &[u8], delimiter: u8) -> Result<Batch> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches(BYTE_ORDER_MARK) } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (column, field) in raw.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }
    debug!("Read {} rows with columns {:?}", raw.first().map(Vec::len).unwrap_or(0), headers);

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, fields)| Column::new(name, infer_cells(&fields)))
        .collect();
    Ok(Batch::from_columns(columns)?)
}

fn infer_cells(fields: &[String]) -> Vec<Cell> {
    let present = || fields.iter().map(|f| f.trim()).filter(|f| !f.is_empty());

    if present().all(|f| f.parse::<i64>().is_ok()) {
        return fields
            .iter()
            .map(|f| f.trim().parse::<i64>().map(Cell::Int).unwrap_or(Cell::Null))
            .collect();
    }
    if present().all(|f| f.parse::<f64>().is_ok()) {
        return fields
            .iter()
            .map(|f| f.trim().parse::<f64>().map(Cell::Float).unwrap_or(Cell::Null))
            .collect();
    }
    fields
        .iter()
        .map(|f| if f.trim().is_empty() { Cell::Null } else { Cell::text(f.as_str()) })
        .collect()
}
