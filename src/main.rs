use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use threads_poster::{
    config::{load_env_file, Settings, TelegramSettings},
    notify::TelegramNotifier,
    poster::{report_configuration_error, Poster, RunReport},
    utils::init_logger,
};
use tracing::info;

/// Post a random PNG from an OCI bucket to Threads.
#[derive(Debug, Parser)]
#[command(name = "threads-poster", version, about)]
struct Cli {
    /// Dotenv file to merge into the environment instead of `./.env`
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logger();

    // Every call is awaited in sequence; one thread is all the pipeline needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let report = runtime.block_on(run(cli));
    info!(success = report.success, "Run finished");
    Ok(ExitCode::from(report.exit_code() as u8))
}

async fn run(cli: Cli) -> RunReport {
    let settings = match load_env_file(cli.env_file.as_deref()).and_then(|_| Settings::from_env()) {
        Ok(settings) => settings,
        Err(e) => {
            let notifier = TelegramNotifier::new(&TelegramSettings::from_env());
            return report_configuration_error(&notifier, &e).await;
        }
    };

    let notifier = TelegramNotifier::new(&settings.telegram);
    let poster = Poster::new(settings, notifier);
    poster.run_with_oci().await
}
