//! Block-explorer access for USDT token transfers.
//!
//! This module wraps the Etherscan-compatible `account/tokentx` endpoint.
//!
//! # Components
//!
//! - **Wire types** ([`types`]): the JSON envelope and raw transfer rows
//! - **HTTP client** ([`client`]): one GET per page with a fixed timeout
//!
//! ```text
//! ┌──────────────────────┐     GET ?module=account&action=tokentx&page=N
//! │    ExplorerClient    │ ─────────────────────────────────────────────▶ explorer
//! │  (api key, chain id) │ ◀───────────────────────────────────────────── {status,message,result}
//! └──────────────────────┘
//!            │ ApiEnvelope
//!            ▼
//!     fetcher (pagination)
//! ```

pub mod client;
pub mod types;

// Re-export commonly used types
pub use client::{ExplorerClient, REQUEST_TIMEOUT};
pub use types::{ApiEnvelope, PageQuery, RawTransfer, SortOrder, USDT_CONTRACT};
