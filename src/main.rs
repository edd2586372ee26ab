//! runx - self-deploying Ruby application launcher
//!
//! Entry point: deploys the bundled runtime and launches the application.

use runx::cli::{self, Invocation, RunContext};
use runx::config::{ConfigManager, LogConfig, LogFormat};
use runx::error::RunxResult;
use runx::ui;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => exit_code(code),
        Err(e) => {
            ui::output::error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RunxResult<i32> {
    let invocation = Invocation::from_args(std::env::args_os());

    cli::dispatch(invocation, || async {
        let config = ConfigManager::new().load().await?;
        init_logging(&config.log);
        debug!("Loaded configuration: {:?}", config);
        RunContext::from_config(&config)
    })
    .await
}

/// Initialize logging on stderr; stdout belongs to the application
fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_new(&log.filter).unwrap_or_else(|_| EnvFilter::new("runx=warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    match log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Exit codes outside 0..=255 cannot be reported faithfully; they fail
fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}
