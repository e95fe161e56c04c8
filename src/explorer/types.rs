//! Wire types for the explorer `account/tokentx` endpoint.
//!
//! The explorer answers every page with the same envelope:
//!
//! ```text
//! { "status": "1", "message": "OK", "result": [ { "from": ..., "value": ... }, ... ] }
//! { "status": "0", "message": "No records found", "result": [] }
//! { "status": "0", "message": "NOTOK", "result": "Invalid API Key" }
//! ```
//!
//! Numeric row fields arrive as decimal strings and are left untouched here;
//! conversion happens in [`crate::normalize`].

use crate::error::{ReconError, ReconResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// USDT (Tether USD) token contract on Ethereum mainnet.
pub const USDT_CONTRACT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

/// Explorer message that marks the end of data rather than a failure.
pub const NO_RECORDS_MESSAGE: &str = "no records found";

/// Result ordering requested from the explorer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

impl SortOrder {
    /// Query-string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page request parameters (everything except credentials and chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u32,
    /// Rows per page
    pub offset: u32,
    /// First block of the range (inclusive)
    pub start_block: u64,
    /// Last block of the range (inclusive)
    pub end_block: u64,
    /// Result ordering
    pub sort: SortOrder,
}

/// One raw token-transfer row as returned by the explorer.
///
/// Only the fields the report needs are decoded; anything else in the row
/// is ignored. Missing numeric fields default to `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransfer {
    /// Sender address
    #[serde(default)]
    pub from: String,
    /// Receiver address
    #[serde(default)]
    pub to: String,
    /// Token amount in base units (decimal string)
    #[serde(default = "zero")]
    pub value: String,
    /// Transaction hash
    #[serde(default)]
    pub hash: String,
    /// Block timestamp, unix seconds (decimal string)
    #[serde(default = "zero")]
    pub time_stamp: String,
    /// Gas price in wei (decimal string)
    #[serde(default = "zero")]
    pub gas_price: String,
    /// Gas used by the whole transaction (decimal string)
    #[serde(default = "zero")]
    pub gas_used: String,
}

fn zero() -> String {
    "0".to_string()
}

/// Response envelope shared by all explorer endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    /// `"1"` on success; kept loose because some deployments send numbers or booleans
    #[serde(default)]
    pub status: Value,
    /// Human-readable status message
    #[serde(default)]
    pub message: Option<String>,
    /// Rows on success, sometimes a reason string on failure
    #[serde(default)]
    pub result: Value,
}

impl ApiEnvelope {
    /// Whether the explorer reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        match &self.status {
            Value::String(s) => s == "1",
            Value::Number(n) => n.as_u64() == Some(1),
            Value::Bool(b) => *b,
            _ => false,
        }
    }

    /// Whether the message is the benign end-of-data signal.
    ///
    /// Matches "no records found" after trimming, ignoring case.
    #[must_use]
    pub fn is_no_records(&self) -> bool {
        self.message
            .as_deref()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(NO_RECORDS_MESSAGE))
    }

    /// Message to surface for a non-success envelope.
    ///
    /// Etherscan puts the actual failure reason in `result` when it is a string.
    #[must_use]
    pub fn error_message(&self) -> String {
        let message = self
            .message
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("unknown error");

        match &self.result {
            Value::String(reason) if !reason.is_empty() => format!("{message} ({reason})"),
            _ => message.to_string(),
        }
    }

    /// Decode the rows of a successful page.
    ///
    /// A null or missing `result` is an empty page.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if `result` is not an array of row objects.
    pub fn into_rows(self) -> ReconResult<Vec<RawTransfer>> {
        match self.result {
            Value::Null => Ok(Vec::new()),
            Value::Array(_) => serde_json::from_value(self.result).map_err(|e| {
                ReconError::decoding(
                    "Explorer rows do not match the transfer schema",
                    Some(Box::new(e)),
                )
            }),
            other => Err(ReconError::decoding(
                format!("Expected an array of transfers, got: {other}"),
                None,
            )),
        }
    }
}
