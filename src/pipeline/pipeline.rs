use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::app::ports::{FileStorePort, NotifierPort, UploadOutcome};
use crate::config::{Config, SourceConfig};
use crate::error::{PipelineError, Result};
use crate::logging::LogFile;
use crate::pipeline::ingestion::extract;
use crate::pipeline::notifications::{failure_message, new_log_file_message, success_message};
use crate::pipeline::processing::normalize::normalize;
use crate::pipeline::storage::{sha256_hex, LogDatabase, RunRecord};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Rename the export in Box once it is loaded, so the next export keeps
    /// the plain file name
    pub rename_source_file: bool,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub source: String,
    pub file_name: String,
    pub datestamp: String,
    pub sha256: String,
    pub rows_loaded: usize,
    pub raw_tables: Vec<String>,
    pub renamed_to: Option<String>,
}

/// Loads one source's export into the log database
pub struct Pipeline {
    config: Config,
    source_name: String,
    store: Box<dyn FileStorePort>,
    notifier: Box<dyn NotifierPort>,
    log_file: Option<LogFile>,
}

impl Pipeline {
    pub fn new<S: Into<String>>(
        config: Config,
        source_name: S,
        store: Box<dyn FileStorePort>,
        notifier: Box<dyn NotifierPort>,
    ) -> Result<Self> {
        let source_name = source_name.into();
        config.source(Some(&source_name))?;
        Ok(Self {
            config,
            source_name,
            store,
            notifier,
            log_file: None,
        })
    }

    /// Upload this log file to the source's Box folder when the run ends
    pub fn with_log_file(mut self, log_file: LogFile) -> Self {
        self.log_file = Some(log_file);
        self
    }

    /// Run once. Failures are reported through the notifier before being
    /// returned; the log file is uploaded whatever the outcome.
    #[instrument(skip(self, options), fields(source = %self.source_name))]
    pub fn run(&mut self, options: &RunOptions) -> Result<PipelineResult> {
        let log_file = self.log_file.take();
        let (_, source) = self.config.source(Some(&self.source_name))?;
        let datestamp = self.config.datestamp()?;

        let _archiver = LogArchiver {
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            log_file,
            folder_id: &source.folder_id,
            file_id: &source.log_file_id,
            datestamp: &datestamp,
        };

        info!("🚀 Starting pipeline for {}", self.source_name);
        match self.execute(source, &datestamp, options) {
            Ok(result) => {
                info!("✅ Pipeline finished running!");
                Ok(result)
            }
            Err(e) => {
                error!("Pipeline failed with error: {}", e);
                let message = failure_message(
                    &datestamp,
                    &self.config.db_name.display().to_string(),
                    &source.target_table,
                    &e.to_string(),
                );
                if let Err(notify_error) = self.notifier.send(&message) {
                    warn!("Failed to send failure notification: {}", notify_error);
                }
                Err(e)
            }
        }
    }

    fn execute(&self, source: &SourceConfig, datestamp: &str, options: &RunOptions) -> Result<PipelineResult> {
        let time_zone = self.config.time_zone()?;
        let file_name = source.remote_file_name(&Utc::now().with_timezone(&time_zone));

        info!("📡 Fetching {} from Box folder {}", file_name, source.folder_id);
        let file_id = self.store.find_file_id(&source.folder_id, &file_name)?;
        let bytes = self.store.download(&file_id)?;
        let sha256 = sha256_hex(&bytes);

        let extraction = extract(&source.format, &bytes)?;

        let mut db = LogDatabase::open(&self.config.db_name)?;
        db.run_script(&source.read_create_script()?)?;
        if let Some(previous) = db.find_run_by_checksum(&sha256)? {
            info!("This export was already loaded on {}, merging again", previous);
        }

        let mut raw_tables = Vec::new();
        if let Some(prefix) = &source.raw_table_prefix {
            for (name, batch) in &extraction.raw_tables {
                let table = format!("{prefix}{name}");
                db.replace_table(&table, batch)?;
                raw_tables.push(table);
            }
        }

        info!("🔧 Validating {} log rows", extraction.logs.num_rows());
        let rules = self.config.validation_rules(source)?;
        let validated = normalize(extraction.logs, &rules, &extraction.lookup)?;

        let run = RunRecord {
            run_at: self.config.run_timestamp()?,
            source: self.source_name.clone(),
            file_name: file_name.clone(),
            sha256: sha256.clone(),
            row_count: validated.num_rows(),
        };
        let rows_loaded = db.load_validated(
            &source.staging_table,
            &validated,
            &source.read_insert_script()?,
            &run,
        )?;

        let renamed_to = if options.rename_source_file {
            let new_name = source.renamed_file_name(&file_name, datestamp);
            self.store.rename(&file_id, &new_name)?;
            Some(new_name)
        } else {
            None
        };

        self.notifier.send(&success_message(
            datestamp,
            &self.config.db_name.display().to_string(),
            &source.target_table,
            rows_loaded,
        ))?;

        Ok(PipelineResult {
            source: self.source_name.clone(),
            file_name,
            datestamp: datestamp.to_string(),
            sha256,
            rows_loaded,
            raw_tables,
            renamed_to,
        })
    }
}

/// Uploads the run log to Box when dropped, so the upload happens on success,
/// on error and while unwinding from a panic
struct LogArchiver<'a> {
    store: &'a dyn FileStorePort,
    notifier: &'a dyn NotifierPort,
    log_file: Option<LogFile>,
    folder_id: &'a str,
    file_id: &'a str,
    datestamp: &'a str,
}

impl LogArchiver<'_> {
    fn upload(&self, log_file: &LogFile) -> Result<()> {
        let path = log_file.current_path().ok_or_else(|| {
            PipelineError::Config(format!("log file {} not found", log_file.file_name()))
        })?;
        let bytes = std::fs::read(&path)?;

        info!("Updating existing log file {} in Box folder {}", self.file_id, self.folder_id);
        let outcome = self.store.upload_or_replace(
            self.folder_id,
            Some(self.file_id),
            log_file.file_name(),
            bytes,
        )?;

        if let UploadOutcome::Created { file_id } = outcome {
            warn!(
                "Log file missing from folder {}, uploaded as new file {}",
                self.folder_id, file_id
            );
            let message = new_log_file_message(self.datestamp, log_file.file_name(), self.folder_id, &file_id);
            self.notifier.send(&message)?;
        }
        Ok(())
    }
}

impl Drop for LogArchiver<'_> {
    fn drop(&mut self) {
        let Some(mut log_file) = self.log_file.take() else {
            return;
        };
        log_file.flush();
        if let Err(e) = self.upload(&log_file) {
            error!("Failed to upload log file {}: {}", log_file.file_name(), e);
        }
    }
}
