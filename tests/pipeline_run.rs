use anyhow::Result;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};
use zip::write::FileOptions;
use zip::ZipWriter;

use brew_logs::app::ports::{FileStorePort, NotifierPort, UploadOutcome};
use brew_logs::config::Config;
use brew_logs::error::PipelineError;
use brew_logs::logging::LogFile;
use brew_logs::pipeline::storage::LogDatabase;
use brew_logs::pipeline::{Pipeline, RunOptions};

const GURU_FOLDER: &str = "111111111";
const GURU_LOG_FILE_ID: &str = "222222222";
const BEANS_FOLDER: &str = "333333333";

#[derive(Debug, Clone)]
struct StoredFile {
    folder_id: String,
    name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct StoreState {
    files: HashMap<String, StoredFile>,
    next_id: u64,
    renames: Vec<(String, String)>,
    uploads: Vec<(String, UploadOutcome)>,
}

#[derive(Clone, Default)]
struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    fn put(&self, id: &str, folder_id: &str, name: &str, bytes: &[u8]) {
        self.state.lock().unwrap().files.insert(
            id.to_string(),
            StoredFile {
                folder_id: folder_id.to_string(),
                name: name.to_string(),
                bytes: bytes.to_vec(),
            },
        );
    }

    fn file(&self, id: &str) -> Option<StoredFile> {
        self.state.lock().unwrap().files.get(id).cloned()
    }
}

impl FileStorePort for FakeStore {
    fn find_file_id(&self, folder_id: &str, name: &str) -> brew_logs::error::Result<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .iter()
            .find(|(_, f)| f.folder_id == folder_id && f.name == name)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| PipelineError::FileNotFound {
                name: name.to_string(),
                folder_id: folder_id.to_string(),
            })
    }

    fn download(&self, file_id: &str) -> brew_logs::error::Result<Vec<u8>> {
        self.file(file_id)
            .map(|f| f.bytes)
            .ok_or_else(|| PipelineError::Storage {
                status: 404,
                message: format!("no file {file_id}"),
            })
    }

    fn upload_or_replace(
        &self,
        folder_id: &str,
        file_id: Option<&str>,
        name: &str,
        bytes: Vec<u8>,
    ) -> brew_logs::error::Result<UploadOutcome> {
        let mut state = self.state.lock().unwrap();
        let outcome = match file_id.filter(|id| state.files.contains_key(*id)) {
            Some(id) => UploadOutcome::Replaced {
                file_id: id.to_string(),
            },
            None => {
                state.next_id += 1;
                UploadOutcome::Created {
                    file_id: format!("new-{}", state.next_id),
                }
            }
        };
        state.files.insert(
            outcome.file_id().to_string(),
            StoredFile {
                folder_id: folder_id.to_string(),
                name: name.to_string(),
                bytes,
            },
        );
        state.uploads.push((name.to_string(), outcome.clone()));
        Ok(outcome)
    }

    fn rename(&self, file_id: &str, new_name: &str) -> brew_logs::error::Result<()> {
        let mut state = self.state.lock().unwrap();
        let file = state.files.get_mut(file_id).ok_or_else(|| PipelineError::Storage {
            status: 404,
            message: format!("no file {file_id}"),
        })?;
        file.name = new_name.to_string();
        state.renames.push((file_id.to_string(), new_name.to_string()));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl FakeNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotifierPort for FakeNotifier {
    fn send(&self, text: &str) -> brew_logs::error::Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    config: Config,
    store: FakeStore,
    notifier: FakeNotifier,
}

impl Harness {
    fn new() -> Result<Self> {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
        let dir = tempdir()?;
        let mut config = Config::load(manifest.join("config/config.example.toml"))?;
        config.db_name = dir.path().join("coffee_logs.db");
        for source in config.sources.values_mut() {
            source.date_suffix = None;
            source.create_script = manifest.join(&source.create_script);
            source.insert_script = manifest.join(&source.insert_script);
        }

        let store = FakeStore::default();
        store.put(GURU_LOG_FILE_ID, GURU_FOLDER, "coffee_logs.log", b"previous runs\n");

        Ok(Self {
            dir,
            config,
            store,
            notifier: FakeNotifier::default(),
        })
    }

    fn log_file(&self, name: &str) -> Result<LogFile> {
        let log_dir = self.dir.path().join("logs");
        std::fs::create_dir_all(&log_dir)?;
        std::fs::write(log_dir.join(name), "Pipeline finished running!\n")?;
        Ok(LogFile::new(log_dir, name))
    }

    fn db_path(&self) -> PathBuf {
        self.config.db_name.clone()
    }

    fn run(&self, source: &str, log_name: &str, options: RunOptions) -> Result<brew_logs::error::Result<brew_logs::pipeline::PipelineResult>> {
        let mut pipeline = Pipeline::new(
            self.config.clone(),
            source,
            Box::new(self.store.clone()),
            Box::new(self.notifier.clone()),
        )?
        .with_log_file(self.log_file(log_name)?);
        Ok(pipeline.run(&options))
    }
}

const GURU_EXPORT: &str = "Timestamp;Score (out of 5);Coffee;Note\n\
    1709280000;4;18 g;Bean: Guji / Grinder: Baratza Encore / Grind: 18 / Flavor: Very Sweet / Balance: Balanced\n\
    1709366400;5;16 g;Bean: Huila / Grinder: Baratza Encore / Grind: 20 / Flavor: Slightly Fruity / Balance: Slightly Heavy\n";

#[test]
fn test_successful_run_loads_renames_and_reports() -> Result<()> {
    let harness = Harness::new()?;
    harness.store.put("export-1", GURU_FOLDER, "coffee_logs.csv", GURU_EXPORT.as_bytes());

    let result = harness.run("coffee_guru", "coffee_logs.log", RunOptions { rename_source_file: true })??;
    assert_eq!(result.rows_loaded, 2);
    assert_eq!(result.file_name, "coffee_logs.csv");

    let db = LogDatabase::open(harness.db_path())?;
    assert_eq!(db.count_rows("coffee_logs")?, 2);
    assert_eq!(db.count_rows("coffee_logs_tmp")?, 2);
    assert!(db.find_run_by_checksum(&result.sha256)?.is_some());

    let renamed = harness.store.file("export-1").map(|f| f.name);
    assert_eq!(renamed, result.renamed_to);
    assert_eq!(
        renamed,
        Some(format!("coffee_logs_{}.csv", result.datestamp))
    );

    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("SUCCESS"));
    assert!(messages[0].contains("coffee_logs"));

    let log = harness.store.file(GURU_LOG_FILE_ID).map(|f| f.bytes);
    assert_eq!(log, Some(b"Pipeline finished running!\n".to_vec()));
    Ok(())
}

#[test]
fn test_rerun_does_not_duplicate_rows() -> Result<()> {
    let harness = Harness::new()?;
    harness.store.put("export-1", GURU_FOLDER, "coffee_logs.csv", GURU_EXPORT.as_bytes());

    harness.run("coffee_guru", "coffee_logs.log", RunOptions::default())??;
    harness.run("coffee_guru", "coffee_logs.log", RunOptions::default())??;

    let db = LogDatabase::open(harness.db_path())?;
    assert_eq!(db.count_rows("coffee_logs")?, 2);
    assert!(harness.store.state.lock().unwrap().renames.is_empty());
    Ok(())
}

#[test]
fn test_validation_failure_is_reported_and_log_still_uploaded() -> Result<()> {
    let harness = Harness::new()?;
    let export = GURU_EXPORT.replace("1709366400;5;", "1709366400;0;");
    harness.store.put("export-1", GURU_FOLDER, "coffee_logs.csv", export.as_bytes());

    let err = harness
        .run("coffee_guru", "coffee_logs.log", RunOptions { rename_source_file: true })?
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));

    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("FAIL"));
    assert!(messages[0].contains("coffee_logs"));
    assert!(messages[0].contains("A brew score was not submitted"));

    let db = LogDatabase::open(harness.db_path())?;
    assert_eq!(db.count_rows("coffee_logs")?, 0);
    assert_eq!(
        harness.store.file("export-1").map(|f| f.name),
        Some("coffee_logs.csv".to_string())
    );

    let uploads = harness.store.state.lock().unwrap().uploads.clone();
    assert_eq!(
        uploads,
        vec![(
            "coffee_logs.log".to_string(),
            UploadOutcome::Replaced {
                file_id: GURU_LOG_FILE_ID.to_string()
            }
        )]
    );
    Ok(())
}

#[test]
fn test_failed_merge_leaves_no_ledger_entry() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.store.put("export-1", GURU_FOLDER, "coffee_logs.csv", GURU_EXPORT.as_bytes());

    let broken_insert = harness.dir.path().join("broken_insert.sql");
    std::fs::write(&broken_insert, "INSERT INTO coffee_logs SELECT * FROM no_such_table;")?;
    if let Some(source) = harness.config.sources.get_mut("coffee_guru") {
        source.insert_script = broken_insert;
    }

    let err = harness
        .run("coffee_guru", "coffee_logs.log", RunOptions::default())?
        .unwrap_err();
    assert!(matches!(err, PipelineError::Database(_)));

    let db = LogDatabase::open(harness.db_path())?;
    assert_eq!(db.count_rows("pipeline_runs")?, 0);
    assert_eq!(db.find_run_by_checksum(&brew_logs::pipeline::storage::sha256_hex(GURU_EXPORT.as_bytes()))?, None);
    assert!(harness.notifier.messages()[0].contains("FAIL"));
    Ok(())
}

#[test]
fn test_missing_export_fails_the_run() -> Result<()> {
    let harness = Harness::new()?;
    let err = harness
        .run("coffee_guru", "coffee_logs.log", RunOptions::default())?
        .unwrap_err();
    assert!(matches!(err, PipelineError::FileNotFound { .. }));
    assert!(harness.notifier.messages()[0].contains("coffee_logs.csv"));
    Ok(())
}

#[test]
fn test_beanconqueror_run_keeps_raw_tables_and_reports_new_log_file() -> Result<()> {
    let harness = Harness::new()?;
    let export = serde_json::json!({
        "BEANS": [{ "name": "Guji", "roaster": "Onyx", "beanMix": "SINGLE_ORIGIN",
                    "config": { "uuid": "bean-1", "unix_timestamp": 1_700_000_000 } }],
        "MILL": [{ "name": "Baratza Encore", "config": { "uuid": "mill-1", "unix_timestamp": 1_700_000_000 } }],
        "PREPARATION": [{ "name": "Chemex", "type": "CHEMEX", "tools": [],
                          "config": { "uuid": "prep-1", "unix_timestamp": 1_700_000_000 } }],
        "BREWS": [{
            "bean": "bean-1", "mill": "mill-1", "method_of_preparation": "prep-1",
            "grind_size": "25", "brew_temperature": 94, "rating": 4,
            "note": "Flavor: Very Nutty / Balance: Balanced",
            "method_of_preparation_tools": [],
            "config": { "uuid": "brew-1", "unix_timestamp": 1_700_100_000 }
        }]
    });
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("Beanconqueror.json", FileOptions::default())?;
    writer.write_all(export.to_string().as_bytes())?;
    let archive = writer.finish()?.into_inner();
    harness.store.put("export-2", BEANS_FOLDER, "Beanconqueror.zip", &archive);

    let result = harness.run("beanconqueror", "beanconqueror_logs.log", RunOptions::default())??;
    assert_eq!(result.rows_loaded, 1);
    assert_eq!(
        result.raw_tables,
        vec![
            "beanconqueror_beans",
            "beanconqueror_grinders",
            "beanconqueror_methods",
            "beanconqueror_method_tools",
            "beanconqueror_brews"
        ]
    );

    let db = LogDatabase::open(harness.db_path())?;
    assert_eq!(db.count_rows("beanconqueror_logs")?, 1);
    assert_eq!(db.count_rows("beanconqueror_brews")?, 1);

    // The configured log file id does not exist in this folder, so a new file
    // is created and its id is sent through the notifier
    let messages = harness.notifier.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("SUCCESS"));
    assert!(messages[1].contains("with new file ID: new-1"));
    Ok(())
}
