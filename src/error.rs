use thiserror::Error;

use crate::pipeline::processing::quality_gate::ValidationError;
use crate::types::BatchError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Delimited file could not be read: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive could not be read: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Shape(#[from] BatchError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File \"{name}\" not found in Box folder {folder_id}")]
    FileNotFound { name: String, folder_id: String },

    #[error("Box API error ({status}): {message}")]
    Storage { status: u16, message: String },

    #[error("Slack notification failed ({status}): {message}")]
    Notify { status: u16, message: String },

    #[error("Malformed export: {0}")]
    Source(String),

    #[error("Environment variable {name} is not set")]
    Env { name: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
