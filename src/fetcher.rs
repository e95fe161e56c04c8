//! Paginated USDT transfer fetching.
//!
//! This is the core of the report: walk the explorer's pages in order,
//! normalize and filter each page, and decide after every page whether to
//! continue.
//!
//! # Stop conditions
//!
//! | Condition | Outcome |
//! |---|---|
//! | Non-200 response or transport failure | [`ReconError::FetchError`], nothing returned |
//! | Non-success status, message "no records found" | stop, return accumulated records |
//! | Non-success status, any other message | [`ReconError::FetchError`], nothing returned |
//! | Successful page with no rows | stop |
//! | Fewer rows than `page_size` | stop after keeping this page |
//! | `max_pages` reached | stop |
//!
//! Otherwise the fetcher sleeps `inter_page_delay` and requests the next
//! page. Pages are requested strictly one after another.
//!
//! # Example
//!
//! ```no_run
//! use usdt_reconciliation::config::Config;
//! use usdt_reconciliation::explorer::ExplorerClient;
//! use usdt_reconciliation::fetcher::{fetch_transfers, FetchParams};
//! use usdt_reconciliation::error::ReconResult;
//!
//! # async fn example() -> ReconResult<()> {
//! let config = Config::load()?;
//! let client = ExplorerClient::new(&config)?;
//! let params = FetchParams {
//!     min_value: Some(1_000.0),
//!     max_pages: 3,
//!     ..FetchParams::default()
//! };
//! let records = fetch_transfers(&client, &params).await?;
//! println!("{} transfers", records.len());
//! # Ok(())
//! # }
//! ```

use crate::error::{ReconError, ReconResult};
use crate::explorer::{ExplorerClient, PageQuery, SortOrder};
use crate::normalize::{transform_page, TransferRecord};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Rows requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Page budget per fetch.
pub const DEFAULT_MAX_PAGES: u32 = 5;

/// Upper block bound used when none is given.
pub const DEFAULT_END_BLOCK: u64 = 99_999_999;

/// Pause between consecutive page requests.
pub const DEFAULT_INTER_PAGE_DELAY: Duration = Duration::from_millis(200);

/// Arguments of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchParams {
    /// First block of the range (inclusive)
    pub start_block: u64,
    /// Last block of the range (inclusive)
    pub end_block: u64,
    /// Rows per page
    pub page_size: u32,
    /// Maximum number of pages to request
    pub max_pages: u32,
    /// Drop records whose amount is below this value
    pub min_value: Option<f64>,
    /// Result ordering
    pub sort: SortOrder,
    /// Pause between pages
    pub inter_page_delay: Duration,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            start_block: 0,
            end_block: DEFAULT_END_BLOCK,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            min_value: None,
            sort: SortOrder::Desc,
            inter_page_delay: DEFAULT_INTER_PAGE_DELAY,
        }
    }
}

impl FetchParams {
    /// Check the parameters before any request is made.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if:
    /// - `page_size` or `max_pages` is zero
    /// - `start_block` is after `end_block`
    /// - `min_value` is negative or not finite
    pub fn validate(&self) -> ReconResult<()> {
        if self.page_size == 0 {
            return Err(ReconError::config("page_size must be at least 1", None));
        }
        if self.max_pages == 0 {
            return Err(ReconError::config("max_pages must be at least 1", None));
        }
        if self.start_block > self.end_block {
            return Err(ReconError::config(
                format!(
                    "start_block {} is after end_block {}",
                    self.start_block, self.end_block
                ),
                None,
            ));
        }
        if let Some(min) = self.min_value {
            if !min.is_finite() || min < 0.0 {
                return Err(ReconError::config(
                    format!("min_value must be a non-negative number, got {min}"),
                    None,
                ));
            }
        }
        Ok(())
    }

    /// Effective filter: a threshold of zero filters nothing.
    #[must_use]
    pub fn effective_min_value(&self) -> Option<f64> {
        self.min_value.filter(|min| *min > 0.0)
    }

    fn page_query(&self, page: u32) -> PageQuery {
        PageQuery {
            page,
            offset: self.page_size,
            start_block: self.start_block,
            end_block: self.end_block,
            sort: self.sort,
        }
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The explorer answered "no records found"
    NoRecordsMessage,
    /// A successful page contained no rows
    EmptyPage,
    /// A page returned fewer rows than requested
    ShortPage,
    /// `max_pages` pages were fetched
    PageBudgetExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRecordsMessage => write!(f, "no records found"),
            Self::EmptyPage => write!(f, "empty page"),
            Self::ShortPage => write!(f, "short page"),
            Self::PageBudgetExhausted => write!(f, "page budget exhausted"),
        }
    }
}

/// Records plus pagination bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Filtered records in explorer order
    pub records: Vec<TransferRecord>,
    /// Number of HTTP requests issued
    pub pages_fetched: u32,
    /// Why the loop ended
    pub stop_reason: StopReason,
}

/// Fetch, normalize and filter USDT transfers.
///
/// # Errors
///
/// Returns an error if the parameters are invalid, any page fails at the
/// transport or API level, or a row cannot be normalized. No partial
/// results are returned on error.
pub async fn fetch_transfers(
    client: &ExplorerClient,
    params: &FetchParams,
) -> ReconResult<Vec<TransferRecord>> {
    fetch_pages(client, params).await.map(|outcome| outcome.records)
}

/// Like [`fetch_transfers`], also reporting how pagination ended.
///
/// # Errors
///
/// Same as [`fetch_transfers`].
#[instrument(skip(client), fields(chain_id = client.chain_id()))]
pub async fn fetch_pages(
    client: &ExplorerClient,
    params: &FetchParams,
) -> ReconResult<FetchOutcome> {
    params.validate()?;
    let min_value = params.effective_min_value();

    let mut records = Vec::new();
    let mut stop_reason = StopReason::PageBudgetExhausted;
    let mut pages_fetched = 0;

    for page in 1..=params.max_pages {
        let envelope = client.token_transfers_page(&params.page_query(page)).await?;
        pages_fetched = page;

        if !envelope.is_success() {
            if envelope.is_no_records() {
                warn!(page, "Explorer reported no records found, stopping");
                stop_reason = StopReason::NoRecordsMessage;
                break;
            }
            return Err(ReconError::fetch(
                Some(200),
                format!("Explorer error: {}", envelope.error_message()),
            ));
        }

        let rows = envelope.into_rows()?;
        if rows.is_empty() {
            debug!(page, "Empty page, stopping");
            stop_reason = StopReason::EmptyPage;
            break;
        }

        let kept = transform_page(&rows, min_value)?;
        debug!(page, rows = rows.len(), kept = kept.len(), "Page normalized");
        records.extend(kept);

        let page_size = usize::try_from(params.page_size).unwrap_or(usize::MAX);
        if rows.len() < page_size {
            stop_reason = StopReason::ShortPage;
            break;
        }

        if page < params.max_pages && !params.inter_page_delay.is_zero() {
            tokio::time::sleep(params.inter_page_delay).await;
        }
    }

    info!(
        records = records.len(),
        pages = pages_fetched,
        stop_reason = %stop_reason,
        "Transfer fetch complete"
    );

    Ok(FetchOutcome {
        records,
        pages_fetched,
        stop_reason,
    })
}
