//! CLI entry point for the USDT reconciliation report.
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli::run()
//!     ↓
//! config → explorer → fetcher → normalize → report / charts
//! ```

use usdt_reconciliation::{cli, observability};
use tracing::error;

#[tokio::main]
async fn main() {
    // RUST_LOG sets filter directives, LOG_JSON=true switches the console to
    // JSON, LOG_FILE adds a daily-rotated JSON file.
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        drop(guard);
        std::process::exit(1);
    }
}
