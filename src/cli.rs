//! Command-line interface for the USDT reconciliation report.
//!
//! # Commands
//!
//! - `report`: fetch transfers, write the workbook, print a preview
//! - `config`: show the resolved configuration without fetching
//!
//! # Example
//!
//! ```bash
//! # Default report: 5 pages, newest first
//! usdt-reconciliation report
//!
//! # Large transfers only, with charts
//! usdt-reconciliation report --min-value 100000 --charts-dir ./charts
//!
//! # Machine-readable output
//! usdt-reconciliation report --json > report.json
//! ```

use crate::cache::{CachedFetcher, FetchCache};
use crate::charts::{
    fee_series, fund_flow, render_fee_svg, render_fund_flow_svg, FeePoint, FundFlow,
    DEFAULT_TOP_N,
};
use crate::config::Config;
use crate::error::{ReconError, ReconResult};
use crate::explorer::{ExplorerClient, SortOrder};
use crate::fetcher::{FetchParams, DEFAULT_END_BLOCK, DEFAULT_MAX_PAGES};
use crate::normalize::TransferRecord;
use crate::report::{
    generate_report, preview, DisplayRow, ReportSummary, REPORT_FILE_NAME, REPORT_MIME_TYPE,
};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the fund-flow chart inside `--charts-dir`.
pub const FUND_FLOW_CHART: &str = "fund_flow.svg";

/// File name of the fee chart inside `--charts-dir`.
pub const FEE_CHART: &str = "fee_trend.svg";

/// On-chain USDT reconciliation reports
#[derive(Parser, Debug)]
#[command(name = "usdt-reconciliation")]
#[command(about = "Fetch USDT transfers from a block explorer and export a reconciliation report")]
#[command(long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch transfers and export the reconciliation workbook
    Report(ReportArgs),

    /// Show the resolved configuration
    Config,
}

/// Options of the `report` command.
#[derive(Args, Debug, Clone, PartialEq)]
struct ReportArgs {
    /// Drop transfers below this amount (USDT); 0 keeps everything
    #[arg(long, default_value = "0", value_parser = parse_min_value)]
    min_value: f64,

    /// Maximum pages of 100 transfers to fetch
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_PAGES,
        value_parser = clap::value_parser!(u32).range(1..=10)
    )]
    max_pages: u32,

    /// Rows shown in the terminal preview
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(5..=50))]
    preview_rows: u32,

    /// Addresses per fund-flow panel
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=100))]
    top_n: u32,

    /// First block of the range
    #[arg(long, default_value_t = 0)]
    start_block: u64,

    /// Last block of the range
    #[arg(long, default_value_t = DEFAULT_END_BLOCK)]
    end_block: u64,

    /// Result ordering
    #[arg(long, value_enum, default_value_t = SortOrder::Desc)]
    sort: SortOrder,

    /// Workbook path
    #[arg(short, long, default_value = REPORT_FILE_NAME)]
    output: PathBuf,

    /// Also write fund_flow.svg and fee_trend.svg into this directory
    #[arg(long)]
    charts_dir: Option<PathBuf>,

    /// Print JSON to stdout instead of the coloured preview
    #[arg(long)]
    json: bool,
}

impl ReportArgs {
    fn fetch_params(&self) -> FetchParams {
        FetchParams {
            start_block: self.start_block,
            end_block: self.end_block,
            max_pages: self.max_pages,
            min_value: Some(self.min_value),
            sort: self.sort,
            ..FetchParams::default()
        }
    }

    fn preview_rows(&self) -> usize {
        usize::try_from(self.preview_rows).unwrap_or(usize::MAX)
    }

    fn top_n(&self) -> usize {
        usize::try_from(self.top_n).unwrap_or(DEFAULT_TOP_N)
    }
}

fn parse_min_value(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("must be a non-negative number, got {raw}"));
    }
    Ok(value)
}

/// JSON document printed by `report --json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    output: String,
    mime_type: &'static str,
    summary: ReportSummary,
    preview: Vec<DisplayRow<'a>>,
    fund_flow: FundFlow,
    fee_series: Vec<FeePoint>,
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be resolved
/// - The explorer request fails
/// - The workbook or charts cannot be written
pub async fn run() -> ReconResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report(args) => run_report_command(&args).await,
        Commands::Config => run_config_command(),
    }
}

async fn run_report_command(args: &ReportArgs) -> ReconResult<()> {
    let config = Config::load()?;
    info!(
        chain_id = config.chain_id(),
        key_source = %config.key_source(),
        "Configuration resolved"
    );

    let fetcher = CachedFetcher::new(ExplorerClient::new(&config)?, FetchCache::default());
    let records = fetcher.fetch(&args.fetch_params()).await?;

    if records.is_empty() {
        warn!(min_value = args.min_value, "No transfers matched");
        println!(
            "{}",
            "No transfers found. Try lowering --min-value or raising --max-pages."
                .yellow()
                .bold()
        );
        return Ok(());
    }

    let workbook = generate_report(&records)?;
    write_file(&args.output, &workbook)?;
    info!(path = %args.output.display(), rows = records.len(), "Workbook written");

    let flow = fund_flow(&records, args.top_n());
    let fees = fee_series(&records);

    if let Some(dir) = &args.charts_dir {
        write_charts(dir, &flow, &fees)?;
    }

    let summary = ReportSummary::from_records(&records);

    if args.json {
        let document = JsonReport {
            output: args.output.display().to_string(),
            mime_type: REPORT_MIME_TYPE,
            summary,
            preview: preview(&records, args.preview_rows()),
            fund_flow: flow,
            fee_series: fees,
        };
        println!("{}", render_json(&document)?);
    } else {
        print_preview(&records, args.preview_rows());
        print_summary(&summary, &args.output, args.charts_dir.as_deref());
    }

    Ok(())
}

fn render_json(document: &JsonReport<'_>) -> ReconResult<String> {
    serde_json::to_string_pretty(document)
        .map_err(|e| ReconError::export("Cannot serialize JSON report", Some(Box::new(e))))
}

fn run_config_command() -> ReconResult<()> {
    let config = Config::load()?;

    println!("{}", "Resolved configuration".cyan().bold());
    println!("  {} {}", "Chain ID:".dimmed(), config.chain_id().to_string().yellow());
    println!("  {} {}", "API key:".dimmed(), config.masked_api_key());
    println!("  {} {}", "Key source:".dimmed(), config.key_source());
    println!("  {} {}", "Explorer:".dimmed(), config.base_url());

    Ok(())
}

/// Write both SVG charts into `dir`, creating it if needed.
fn write_charts(dir: &Path, flow: &FundFlow, fees: &[FeePoint]) -> ReconResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        ReconError::export(
            format!("Cannot create charts directory {}", dir.display()),
            Some(Box::new(e)),
        )
    })?;

    write_file(&dir.join(FUND_FLOW_CHART), render_fund_flow_svg(flow)?.as_bytes())?;
    write_file(&dir.join(FEE_CHART), render_fee_svg(fees)?.as_bytes())?;
    info!(dir = %dir.display(), "Charts written");
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> ReconResult<()> {
    std::fs::write(path, contents).map_err(|e| {
        ReconError::export(format!("Cannot write {}", path.display()), Some(Box::new(e)))
    })
}

/// Print the first `rows` records as a table.
fn print_preview(records: &[TransferRecord], rows: usize) {
    println!(
        "{}",
        format!("Preview (first {} of {})", rows.min(records.len()), records.len())
            .cyan()
            .bold()
    );
    println!(
        "{}",
        format!(
            "{:<25}  {:<42}  {:<42}  {:>18}  {:>12}  {}",
            "Time",
            "Sender (From)",
            "Receiver (To)",
            "Amount (USDT)",
            "Fee (ETH)",
            "Transaction Hash"
        )
        .bold()
    );

    for row in preview(records, rows) {
        println!("{}", format_preview_line(&row));
    }
    println!();
}

fn format_preview_line(row: &DisplayRow<'_>) -> String {
    format!(
        "{}  {:<42}  {:<42}  {}  {}  {}",
        row.time.dimmed(),
        row.sender.red(),
        row.receiver.green(),
        format!("{:>18.2}", row.amount).yellow(),
        format!("{:>12.6}", row.fee).blue(),
        row.tx_hash
    )
}

fn print_summary(summary: &ReportSummary, output: &Path, charts_dir: Option<&Path>) {
    println!("{}", "Summary".cyan().bold());
    println!("  {} {}", "Transfers:".dimmed(), summary.transfer_count.to_string().yellow());
    println!("  {} {:.2} USDT", "Total amount:".dimmed(), summary.total_amount);
    println!("  {} {:.2} USDT", "Average amount:".dimmed(), summary.average_amount);
    println!("  {} {:.6} ETH", "Total fees:".dimmed(), summary.total_fee);
    println!("{} Workbook saved to {}", "✅".green(), output.display());
    if let Some(dir) = charts_dir {
        println!("{} Charts saved to {}", "📊".cyan(), dir.display());
    }
}
