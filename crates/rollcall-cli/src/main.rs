//! rollcall - a terminal admin client for the voter/student roster API.
//!
//! Log in once, then list the roster or upload a CSV. Session tokens are kept
//! between runs and renewed automatically when the server rejects them.

mod commands;
mod console;

use std::io;
use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{App, Command, USAGE};
use rollcall_core::Config;

/// Log file written inside the data directory
const LOG_FILE: &str = "rollcall.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file when dropped.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let log_dir = config.data_dir().ok();
    let guard = init_tracing(log_dir.as_deref());
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!(?command, "rollcall starting");

    let succeeded = match command {
        Command::Help => {
            println!("{}", USAGE);
            true
        }
        command => {
            let mut app = App::new(config)?;
            app.run(command).await?
        }
    };

    info!(succeeded, "rollcall finished");
    drop(guard);

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
