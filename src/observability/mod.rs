//! Structured logging.
//!
//! Logs go through `tracing`. The subscriber is installed once at startup by
//! the binary and is controlled by three environment variables:
//!
//! ```bash
//! # Filter directives (default: usdt_reconciliation=info,warn)
//! RUST_LOG=usdt_reconciliation=debug usdt-reconciliation report
//!
//! # JSON console output for log shipping
//! LOG_JSON=true usdt-reconciliation report
//!
//! # Additionally write JSON logs to a daily-rotated file
//! LOG_FILE=./logs/reconciliation.log usdt-reconciliation report
//! ```
//!
//! ```no_run
//! use usdt_reconciliation::observability;
//!
//! // Keep the guard alive for the whole run, or buffered file logs are lost.
//! let _guard = observability::init_tracing(None, None, false)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "usdt_reconciliation=info,warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level`; with neither, [`DEFAULT_FILTER`] applies.
/// When `log_file` is set, a second JSON layer writes to a daily-rotated file
/// through a non-blocking writer whose guard is returned. Drop the guard only
/// at shutdown.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = if let Ok(filter) = std::env::var("RUST_LOG") {
        EnvFilter::new(filter)
    } else if let Some(level) = log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(DEFAULT_FILTER)
    };

    // Console output goes to stderr so stdout stays clean for --json.
    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let mut guard = None;
    let file_layer = if let Some(ref path) = log_file {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;

        let file_appender = tracing_appender::rolling::daily(
            directory,
            path.file_name()
                .unwrap_or_else(|| OsStr::new("reconciliation.log")),
        );
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        Some(
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}

/// Test subscriber writing through the test harness at DEBUG.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    use tracing_subscriber::fmt::format::FmtSpan;

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}
