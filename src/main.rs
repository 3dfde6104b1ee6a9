use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;

use brew_logs::app::ports::NotifierPort;
use brew_logs::config::Config;
use brew_logs::constants::DEFAULT_CONFIG_PATH;
use brew_logs::infra::{build_client, BoxFileStore, SlackNotifier};
use brew_logs::logging::init_logging;
use brew_logs::pipeline::notifications::failure_message;
use brew_logs::pipeline::{Pipeline, RunOptions};

#[derive(Parser)]
#[command(name = "brew_logs")]
#[command(about = "Validate exported coffee brewing logs and load them into SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Source to load (a [sources.<name>] table); defaults to default_source
    #[arg(long)]
    source: Option<String>,

    /// Rename the log file saved in Box at the end of the pipeline to avoid
    /// having duplicate file names
    #[arg(long)]
    rename_log_file: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let (source_name, source) = config.source(cli.source.as_deref())?;
    let source_name = source_name.to_string();
    let target_table = source.target_table.clone();

    let log_file = init_logging(&config.logging, &source.log_file_name)?;

    let client = build_client(Duration::from_secs(config.request_timeout_secs))?;
    let notifier = SlackNotifier::new(client.clone(), config.slack.webhook_url()?);

    let store = match BoxFileStore::connect(client, &config.box_api) {
        Ok(store) => store,
        Err(e) => {
            error!("Box authentication failed: {}", e);
            let message = failure_message(
                &config.datestamp()?,
                &config.db_name.display().to_string(),
                &target_table,
                &e.to_string(),
            );
            if let Err(notify_error) = notifier.send(&message) {
                error!("Failed to send failure notification: {}", notify_error);
            }
            return Err(e.into());
        }
    };

    let options = RunOptions {
        rename_source_file: cli.rename_log_file,
    };
    Pipeline::new(config, source_name, Box::new(store), Box::new(notifier))?
        .with_log_file(log_file)
        .run(&options)?;
    Ok(())
}
