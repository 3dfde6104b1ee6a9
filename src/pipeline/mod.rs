// Brewing log pipeline: ingestion, processing, storage and the run driver

pub mod ingestion;
pub mod notifications;
pub mod pipeline;
pub mod processing;
pub mod storage;

pub use pipeline::{Pipeline, PipelineResult, RunOptions};
