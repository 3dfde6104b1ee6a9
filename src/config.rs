use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    BOX_API_BASE, BOX_TOKEN_URL, BOX_UPLOAD_BASE, DEFAULT_LOG_DIRECTORY, DEFAULT_REQUEST_TIMEOUT_SECS,
    LEDGER_TIMESTAMP_FORMAT, SLACK_WEBHOOK_BASE, TIMESTAMP_FORMAT,
};
use crate::error::{PipelineError, Result};
use crate::pipeline::ingestion::SourceFormat;
use crate::pipeline::processing::normalize::{SourceSchema, ValidationRules};
use crate::pipeline::processing::quality_gate::{GrindRange, Vocabulary};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IANA name, e.g. "America/New_York"
    pub time_zone: String,
    pub db_name: PathBuf,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub default_source: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(rename = "box")]
    pub box_api: BoxConfig,
    pub slack: SlackConfig,
    pub descriptors: Vocabulary,
    /// Keyed by normalized grinder name (see `grinder_key`)
    #[serde(default)]
    pub grind_setting_ranges: BTreeMap<String, GrindRange>,
    pub sources: BTreeMap<String, SourceConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Rotated files to keep; unlimited when unset
    #[serde(default)]
    pub max_files: Option<usize>,
    /// Overrides the default filter when RUST_LOG is unset
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            rotation: LogRotation::default(),
            max_files: None,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoxConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Environment variable holding the client secret
    #[serde(default)]
    pub client_secret_env: Option<String>,
    pub enterprise_id: String,
    /// User the service account acts as (`As-User`)
    pub user_id: String,
    #[serde(default = "default_box_api_base")]
    pub api_base: String,
    #[serde(default = "default_box_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_box_token_url")]
    pub token_url: String,
}

impl BoxConfig {
    pub fn client_secret(&self) -> Result<String> {
        resolve_secret(
            self.client_secret.as_deref(),
            self.client_secret_env.as_deref(),
            "box.client_secret",
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub webhook_token: Option<String>,
    #[serde(default)]
    pub webhook_token_env: Option<String>,
    #[serde(default = "default_slack_webhook_base")]
    pub webhook_base: String,
}

impl SlackConfig {
    pub fn webhook_url(&self) -> Result<String> {
        let token = resolve_secret(
            self.webhook_token.as_deref(),
            self.webhook_token_env.as_deref(),
            "slack.webhook_token",
        )?;
        Ok(format!(
            "{}/{}",
            self.webhook_base.trim_end_matches('/'),
            token.trim_start_matches('/')
        ))
    }
}

/// One exported log file and where its rows go
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub format: SourceFormat,
    /// Box folder holding the export and the run log
    pub folder_id: String,
    pub file_name: String,
    /// strftime pattern inserted before the extension, e.g. "_%d%m%Y"
    #[serde(default)]
    pub date_suffix: Option<String>,
    pub log_file_id: String,
    pub log_file_name: String,
    pub create_script: PathBuf,
    pub insert_script: PathBuf,
    pub staging_table: String,
    pub target_table: String,
    /// When set, every raw export table is stored as `<prefix><table>`
    #[serde(default)]
    pub raw_table_prefix: Option<String>,
    pub schema: SourceSchema,
}

impl SourceConfig {
    /// Name of the export in Box on the given day
    pub fn remote_file_name<T: TimeZone>(&self, now: &DateTime<T>) -> String
    where
        T::Offset: std::fmt::Display,
    {
        match &self.date_suffix {
            Some(pattern) => insert_before_extension(&self.file_name, &now.format(pattern).to_string()),
            None => self.file_name.clone(),
        }
    }

    /// Name the export is given once loaded, so the next export does not clash
    pub fn renamed_file_name(&self, remote_name: &str, datestamp: &str) -> String {
        insert_before_extension(remote_name, &format!("_{datestamp}"))
    }

    pub fn read_create_script(&self) -> Result<String> {
        read_script(&self.create_script)
    }

    pub fn read_insert_script(&self) -> Result<String> {
        read_script(&self.insert_script)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.time_zone()?;
        if config.sources.is_empty() {
            return Err(PipelineError::Config("no [sources] configured".to_string()));
        }
        Ok(config)
    }

    pub fn time_zone(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| PipelineError::Config(format!("invalid time_zone '{}': {}", self.time_zone, e)))
    }

    /// Select a source by name, falling back to `default_source`, then to the
    /// only configured source
    pub fn source(&self, name: Option<&str>) -> Result<(&str, &SourceConfig)> {
        let name = match name.or(self.default_source.as_deref()) {
            Some(name) => name,
            None if self.sources.len() == 1 => self.sources.keys().next().map(String::as_str).unwrap_or_default(),
            None => {
                return Err(PipelineError::Config(format!(
                    "several sources configured ({}); pass --source or set default_source",
                    self.sources.keys().cloned().collect::<Vec<_>>().join(", ")
                )))
            }
        };
        self.sources
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| PipelineError::Config(format!("unknown source '{name}'")))
    }

    pub fn validation_rules<'a>(&'a self, source: &'a SourceConfig) -> Result<ValidationRules<'a>> {
        Ok(ValidationRules {
            schema: &source.schema,
            vocabulary: &self.descriptors,
            grind_ranges: &self.grind_setting_ranges,
            time_zone: self.time_zone()?,
        })
    }

    /// Current time rendered as the run datestamp
    pub fn datestamp(&self) -> Result<String> {
        Ok(Utc::now()
            .with_timezone(&self.time_zone()?)
            .format(TIMESTAMP_FORMAT)
            .to_string())
    }

    /// Current time as a run ledger key
    pub fn run_timestamp(&self) -> Result<String> {
        Ok(Utc::now()
            .with_timezone(&self.time_zone()?)
            .format(LEDGER_TIMESTAMP_FORMAT)
            .to_string())
    }
}

fn resolve_secret(value: Option<&str>, env_name: Option<&str>, key: &str) -> Result<String> {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        return Ok(value.to_string());
    }
    match env_name {
        Some(name) => std::env::var(name).map_err(|_| PipelineError::Env {
            name: name.to_string(),
        }),
        None => Err(PipelineError::Config(format!("{key} is not configured"))),
    }
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("Failed to read SQL script '{}': {}", path.display(), e)))
}

fn insert_before_extension(name: &str, insert: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], insert, &name[dot..]),
        _ => format!("{name}{insert}"),
    }
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIRECTORY)
}

fn default_box_api_base() -> String {
    BOX_API_BASE.to_string()
}

fn default_box_upload_base() -> String {
    BOX_UPLOAD_BASE.to_string()
}

fn default_box_token_url() -> String {
    BOX_TOKEN_URL.to_string()
}

fn default_slack_webhook_base() -> String {
    SLACK_WEBHOOK_BASE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> Config {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.example.toml");
        Config::load(path).unwrap()
    }

    #[test]
    fn test_example_config_parses() {
        let config = example();
        assert_eq!(config.time_zone().unwrap(), chrono_tz::America::New_York);
        assert_eq!(config.sources.len(), 2);

        let (name, guru) = config.source(Some("coffee_guru")).unwrap();
        assert_eq!(name, "coffee_guru");
        assert_eq!(guru.format, SourceFormat::Delimited { delimiter: ';' });
        assert_eq!(guru.schema.note_fields.len(), 5);

        let (_, beans) = config.source(Some("beanconqueror")).unwrap();
        assert_eq!(beans.schema.identifier_columns, vec!["method_of_preparation_tools"]);
        assert!(config.descriptors.dimension("balance").is_ok());
    }

    #[test]
    fn test_default_source_is_used() {
        let config = example();
        let (name, _) = config.source(None).unwrap();
        assert_eq!(Some(name), config.default_source.as_deref());
        assert!(config.source(Some("espresso")).is_err());
    }

    #[test]
    fn test_file_names() {
        let config = example();
        let (_, guru) = config.source(Some("coffee_guru")).unwrap();
        let day = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(guru.remote_file_name(&day), "coffee_logs_01032024.csv");
        assert_eq!(
            guru.renamed_file_name("coffee_logs.csv", "2024-03-01 08:15AM"),
            "coffee_logs_2024-03-01 08:15AM.csv"
        );
        assert_eq!(insert_before_extension("export", "_x"), "export_x");
    }

    #[test]
    fn test_invalid_time_zone_is_rejected() {
        let content = std::fs::read_to_string(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.example.toml"),
        )
        .unwrap()
        .replace("America/New_York", "Mars/Olympus_Mons");
        assert!(matches!(
            Config::from_toml_str(&content),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_secret_resolution() {
        assert_eq!(resolve_secret(Some("abc"), None, "k").unwrap(), "abc");
        assert!(matches!(
            resolve_secret(None, Some("BREW_LOGS_TEST_UNSET_SECRET"), "k"),
            Err(PipelineError::Env { .. })
        ));
        assert!(matches!(resolve_secret(None, None, "k"), Err(PipelineError::Config(_))));
    }
}
