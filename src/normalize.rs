//! Normalization of raw explorer rows into reconciliation records.
//!
//! Raw rows carry integer fixed-point strings. This module performs the
//! decimal shift exactly on 256-bit integers and only converts the final
//! decimal text to `f64`:
//!
//! ```text
//! amount = value / 10^6                    (USDT has 6 decimals)
//! fee    = gasPrice * gasUsed / 10^18      (native unit, e.g. ETH)
//! ```
//!
//! The fee belongs to the whole transaction, so every transfer log emitted
//! by one transaction carries the same fee.
//!
//! # Example
//!
//! ```
//! use usdt_reconciliation::explorer::RawTransfer;
//! use usdt_reconciliation::normalize::normalize;
//!
//! let raw = RawTransfer {
//!     from: "0xaaa".to_string(),
//!     to: "0xbbb".to_string(),
//!     value: "1500000".to_string(),
//!     hash: "0xhash".to_string(),
//!     time_stamp: "1700000000".to_string(),
//!     gas_price: "20000000000".to_string(),
//!     gas_used: "21000".to_string(),
//! };
//!
//! let record = normalize(&raw).unwrap();
//! assert_eq!(record.amount, 1.5);
//! assert!((record.fee - 0.00042).abs() < 1e-12);
//! ```

use crate::error::{ReconError, ReconResult};
use crate::explorer::RawTransfer;
use alloy::primitives::U256;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// USDT decimals.
pub const TOKEN_DECIMALS: u8 = 6;

/// Native currency decimals (wei → ETH).
pub const NATIVE_DECIMALS: u8 = 18;

/// One normalized token transfer.
///
/// Records are created only by [`normalize`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRecord {
    /// Sender address, as returned by the explorer
    pub from_address: String,
    /// Receiver address, as returned by the explorer
    pub to_address: String,
    /// Token amount in whole USDT
    pub amount: f64,
    /// Transaction hash (shared by all transfers in one transaction)
    pub tx_hash: String,
    /// Block time, UTC
    pub timestamp: DateTime<Utc>,
    /// Transaction fee in the native unit
    pub fee: f64,
}

impl TransferRecord {
    /// Timestamp in ISO-8601 form with an explicit UTC offset.
    ///
    /// ```
    /// # use usdt_reconciliation::normalize::TransferRecord;
    /// # use chrono::DateTime;
    /// # let record = TransferRecord {
    /// #     from_address: String::new(), to_address: String::new(), amount: 0.0,
    /// #     tx_hash: String::new(), timestamp: DateTime::from_timestamp(0, 0).unwrap(), fee: 0.0,
    /// # };
    /// assert_eq!(record.timestamp_iso(), "1970-01-01T00:00:00+00:00");
    /// ```
    #[must_use]
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
    }
}

/// Convert one raw explorer row into a [`TransferRecord`].
///
/// # Errors
///
/// Returns a decoding error if a numeric field is not a decimal integer,
/// the gas product overflows 256 bits, or the timestamp is out of range.
pub fn normalize(raw: &RawTransfer) -> ReconResult<TransferRecord> {
    let value = parse_uint("value", &raw.value)?;
    let gas_price = parse_uint("gasPrice", &raw.gas_price)?;
    let gas_used = parse_uint("gasUsed", &raw.gas_used)?;

    let fee_wei = gas_price.checked_mul(gas_used).ok_or_else(|| {
        ReconError::decoding(
            format!(
                "Fee overflow for {}: gasPrice {} * gasUsed {}",
                raw.hash, raw.gas_price, raw.gas_used
            ),
            None,
        )
    })?;

    Ok(TransferRecord {
        from_address: raw.from.clone(),
        to_address: raw.to.clone(),
        amount: shift_decimals(value, TOKEN_DECIMALS)?,
        tx_hash: raw.hash.clone(),
        timestamp: parse_timestamp(&raw.time_stamp)?,
        fee: shift_decimals(fee_wei, NATIVE_DECIMALS)?,
    })
}

/// Normalize a page of rows and drop those below `min_value`.
///
/// Row order is preserved.
///
/// # Errors
///
/// Propagates the first [`normalize`] failure.
pub fn transform_page(
    rows: &[RawTransfer],
    min_value: Option<f64>,
) -> ReconResult<Vec<TransferRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    for raw in rows {
        let record = normalize(raw)?;
        if min_value.is_some_and(|min| record.amount < min) {
            continue;
        }
        records.push(record);
    }
    Ok(records)
}

fn parse_uint(field: &str, raw: &str) -> ReconResult<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ReconError::decoding(
            format!("{field} is not a decimal integer: '{raw}'"),
            None,
        ));
    }

    U256::from_str_radix(trimmed, 10)
        .map_err(|e| ReconError::decoding(format!("{field} '{raw}' out of range: {e}"), None))
}

fn parse_timestamp(raw: &str) -> ReconResult<DateTime<Utc>> {
    let secs = raw.trim().parse::<i64>().map_err(|e| {
        ReconError::decoding(
            format!("timeStamp is not an integer: '{raw}'"),
            Some(Box::new(e)),
        )
    })?;

    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ReconError::decoding(format!("timeStamp {secs} out of range"), None))
}

/// Exact fixed-point shift, then a single conversion to `f64`.
fn shift_decimals(value: U256, decimals: u8) -> ReconResult<f64> {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = value / scale;
    let frac = (value % scale).to_string();
    let padding = "0".repeat(usize::from(decimals).saturating_sub(frac.len()));

    let text = format!("{whole}.{padding}{frac}");
    text.parse::<f64>().map_err(|e| {
        ReconError::decoding(format!("Cannot represent {text} as f64"), Some(Box::new(e)))
    })
}
