/// Default location of the TOML configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Format of the run datestamp and of brew times in error reports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M%p";

/// Run ledger key; sorts chronologically as text
pub const LEDGER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendered in place of a brew time that cannot be read
pub const UNKNOWN_TIME: &str = "unknown time";

// Logging
pub const DEFAULT_LOG_FILTER: &str = "brew_logs=info";
pub const DEFAULT_LOG_DIRECTORY: &str = "logs";

// HTTP
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = "brew_logs/0.1";

// Box API endpoints
pub const BOX_API_BASE: &str = "https://api.box.com/2.0";
pub const BOX_UPLOAD_BASE: &str = "https://upload.box.com/api/2.0";
pub const BOX_TOKEN_URL: &str = "https://api.box.com/oauth2/token";

/// Slack incoming webhooks; the token path is appended
pub const SLACK_WEBHOOK_BASE: &str = "https://hooks.slack.com/services";

/// Ledger of successful loads, kept in the log database
pub const RUN_LEDGER_TABLE: &str = "pipeline_runs";
