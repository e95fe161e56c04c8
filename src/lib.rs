//! # USDT Reconciliation
//!
//! On-chain reconciliation reports for USDT transfers on Ethereum, built from
//! block-explorer data (Etherscan API v2).
//!
//! The crate fetches paginated token-transfer logs for the USDT contract,
//! normalizes raw fixed-point values into human units, and exports the result
//! as a spreadsheet and charts.
//!
//! ## Architecture
//!
//! 1. **Config** ([`config`]) - API key and chain id from a secrets file or the environment
//! 2. **Explorer** ([`explorer`]) - one HTTP request per page, typed envelope
//! 3. **Fetcher** ([`fetcher`]) - pagination loop and stop conditions
//! 4. **Normalize** ([`normalize`]) - exact decimal shift on `U256`
//! 5. **Cache** ([`cache`]) - five-minute memoization of identical fetches
//! 6. **Report** ([`report`]) - `.xlsx` workbook, preview rows, summary
//! 7. **Charts** ([`charts`]) - fund-flow and fee-trend data plus SVG rendering
//!
//! ## Quick Start
//!
//! ```bash
//! export ETHERSCAN_API_KEY_Reconciliation=your_key_here
//! cargo run --release -- report --min-value 10000 --charts-dir ./charts
//! ```
//!
//! ### Using as a Library
//!
//! ```rust,no_run
//! use usdt_reconciliation::{
//!     config::Config, explorer::ExplorerClient, fetcher::{fetch_transfers, FetchParams},
//!     report::generate_report,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let client = ExplorerClient::new(&config)?;
//!
//!     let records = fetch_transfers(&client, &FetchParams::default()).await?;
//!     let workbook = generate_report(&records)?;
//!     std::fs::write("report.xlsx", workbook)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`error::ReconResult<T>`](error::ReconResult).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod charts;
pub mod cli;
pub mod config;
pub mod error;
pub mod explorer;
pub mod fetcher;
pub mod normalize;
pub mod observability;
pub mod report;
