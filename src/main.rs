//! Mineralpedia - crawl mineral entries and download their images.

use std::process::ExitCode;

use clap::Parser;

use mineralpedia::cli::{self, Cli};
use mineralpedia::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging needs the log file path, so it is set up after argument parsing
    if let Err(e) = logging::init(&cli.log_options()) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::from(1);
    }

    let code = match cli::run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("{} {:#}", console::style("✗").red(), e);
            cli::exit_code(&e)
        }
    };

    tracing::info!(status = code, "Program exited with status {}", code);
    ExitCode::from(code)
}
