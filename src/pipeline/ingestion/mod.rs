// Source decoding: turns the downloaded export into raw batches

pub mod beanconqueror;
pub mod delimited;

use serde::Deserialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::pipeline::processing::normalize::IdentifierLookup;
use crate::types::Batch;

/// How the exported log file is laid out
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceFormat {
    /// Headered text table, e.g. the coffee.guru export (`;`-separated)
    Delimited { delimiter: char },
    /// ZIP archive holding the Beanconqueror JSON database
    BeanconquerorExport { archive_member: String },
}

/// Everything decoded from one export
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// The log batch handed to the normalizer
    pub logs: Batch,
    /// Source tables persisted as-is, keyed by table name suffix
    pub raw_tables: Vec<(String, Batch)>,
    pub lookup: IdentifierLookup,
}

pub fn extract(format: &SourceFormat, bytes: &[u8]) -> Result<Extraction> {
    let extraction = match format {
        SourceFormat::Delimited { delimiter } => {
            let delimiter = u8::try_from(*delimiter)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| {
                    PipelineError::Config(format!("delimiter {delimiter:?} is not a single ASCII character"))
                })?;
            Extraction {
                logs: delimited::read_batch(bytes, delimiter)?,
                ..Extraction::default()
            }
        }
        SourceFormat::BeanconquerorExport { archive_member } => {
            let export = beanconqueror::read_archive(bytes, archive_member)?;
            Extraction {
                logs: export.logs,
                raw_tables: export.tables,
                lookup: export.lookup,
            }
        }
    };
    info!(
        "📥 Decoded {} log rows and {} raw tables",
        extraction.logs.num_rows(),
        extraction.raw_tables.len()
    );
    Ok(extraction)
}
