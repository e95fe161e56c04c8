//! Reconciliation report generation.
//!
//! Turns the normalized record list into:
//! - an in-memory `.xlsx` workbook ([`generate_report`])
//! - a human-labeled display view ([`DisplayRow`], [`preview`])
//! - headline metrics ([`ReportSummary`])
//!
//! None of these mutate the records they are given.
//!
//! # Example
//!
//! ```
//! use usdt_reconciliation::report::generate_report;
//! use usdt_reconciliation::error::ReconError;
//!
//! let result = generate_report(&[]);
//! assert!(matches!(result, Err(ReconError::EmptyExportError)));
//! ```

use crate::error::{ReconError, ReconResult};
use crate::normalize::TransferRecord;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use tracing::info;

/// Default download file name.
pub const REPORT_FILE_NAME: &str = "onchain_reconciliation_report.xlsx";

/// MIME type of the workbook.
pub const REPORT_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "USDT_Transfers";

/// Column labels, in output order.
pub const COLUMNS: [&str; 6] = [
    "Time",
    "Sender (From)",
    "Receiver (To)",
    "Amount (USDT)",
    "Fee (ETH)",
    "Transaction Hash",
];

const COLUMN_WIDTHS: [f64; 6] = [26.0, 44.0, 44.0, 16.0, 14.0, 68.0];

/// One record under its report labels, borrowed from the source record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow<'a> {
    /// ISO-8601 UTC time
    #[serde(rename = "Time")]
    pub time: String,
    /// Sender address
    #[serde(rename = "Sender (From)")]
    pub sender: &'a str,
    /// Receiver address
    #[serde(rename = "Receiver (To)")]
    pub receiver: &'a str,
    /// Amount in USDT
    #[serde(rename = "Amount (USDT)")]
    pub amount: f64,
    /// Transaction fee in ETH
    #[serde(rename = "Fee (ETH)")]
    pub fee: f64,
    /// Transaction hash
    #[serde(rename = "Transaction Hash")]
    pub tx_hash: &'a str,
}

impl<'a> From<&'a TransferRecord> for DisplayRow<'a> {
    fn from(record: &'a TransferRecord) -> Self {
        Self {
            time: record.timestamp_iso(),
            sender: &record.from_address,
            receiver: &record.to_address,
            amount: record.amount,
            fee: record.fee,
            tx_hash: &record.tx_hash,
        }
    }
}

/// Display view of every record.
#[must_use]
pub fn display_rows(records: &[TransferRecord]) -> Vec<DisplayRow<'_>> {
    records.iter().map(DisplayRow::from).collect()
}

/// Display view of the first `rows` records.
#[must_use]
pub fn preview(records: &[TransferRecord], rows: usize) -> Vec<DisplayRow<'_>> {
    records.iter().take(rows).map(DisplayRow::from).collect()
}

/// Headline metrics of a record list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Number of transfers
    pub transfer_count: usize,
    /// Sum of amounts (USDT)
    pub total_amount: f64,
    /// Mean amount (USDT), zero for an empty list
    pub average_amount: f64,
    /// Sum of fees (ETH); transactions with several transfers count once per transfer
    pub total_fee: f64,
}

impl ReportSummary {
    /// Compute the summary.
    #[must_use]
    pub fn from_records(records: &[TransferRecord]) -> Self {
        let total_amount: f64 = records.iter().map(|r| r.amount).sum();
        let total_fee: f64 = records.iter().map(|r| r.fee).sum();

        #[allow(clippy::cast_precision_loss)]
        let average_amount = if records.is_empty() {
            0.0
        } else {
            total_amount / records.len() as f64
        };

        Self {
            transfer_count: records.len(),
            total_amount,
            average_amount,
            total_fee,
        }
    }
}

/// Build the workbook in memory.
///
/// The workbook has one sheet, a bold header row with [`COLUMNS`], and one
/// row per record. Amounts and fees are written as numbers.
///
/// # Errors
///
/// Returns [`ReconError::EmptyExportError`] for an empty list, or an export
/// error if the workbook cannot be written.
pub fn generate_report(records: &[TransferRecord]) -> ReconResult<Vec<u8>> {
    if records.is_empty() {
        return Err(ReconError::EmptyExportError);
    }

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let amount_format = Format::new().set_num_format("#,##0.000000");
    let fee_format = Format::new().set_num_format("0.000000000");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, (label, width)) in (0u16..).zip(COLUMNS.iter().zip(COLUMN_WIDTHS)) {
        worksheet.write_string_with_format(0, col, *label, &header)?;
        worksheet.set_column_width(col, width)?;
    }

    for (row, record) in (1u32..).zip(records) {
        worksheet.write_string(row, 0, record.timestamp_iso())?;
        worksheet.write_string(row, 1, &record.from_address)?;
        worksheet.write_string(row, 2, &record.to_address)?;
        worksheet.write_number_with_format(row, 3, record.amount, &amount_format)?;
        worksheet.write_number_with_format(row, 4, record.fee, &fee_format)?;
        worksheet.write_string(row, 5, &record.tx_hash)?;
    }

    let buffer = workbook.save_to_buffer()?;
    info!(
        rows = records.len(),
        bytes = buffer.len(),
        "Reconciliation workbook generated"
    );
    Ok(buffer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn record(from: &str, amount: f64, fee: f64) -> TransferRecord {
        TransferRecord {
            from_address: from.to_string(),
            to_address: "0xreceiver".to_string(),
            amount,
            tx_hash: format!("0xhash_{from}"),
            timestamp: DateTime::from_timestamp(1_704_067_200, 0).unwrap(),
            fee,
        }
    }

    #[test]
    fn test_empty_export_fails() {
        assert!(matches!(generate_report(&[]), Err(ReconError::EmptyExportError)));
    }

    #[test]
    fn test_report_is_xlsx_zip() {
        let records = vec![record("0xa", 10.0, 0.001), record("0xb", 2.5, 0.002)];
        let bytes = generate_report(&records).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_report_does_not_touch_records() {
        let records = vec![record("0xa", 10.0, 0.001)];
        let before = records.clone();
        generate_report(&records).unwrap();
        assert_eq!(records, before);
    }

    #[test]
    fn test_display_row_labels_and_order() {
        let records = vec![record("0xa", 10.0, 0.001)];
        let rows = display_rows(&records);
        let json = serde_json::to_value(&rows[0]).unwrap();

        for label in COLUMNS {
            assert!(json.get(label).is_some(), "missing column {label}");
        }
        assert_eq!(rows[0].time, "2024-01-01T00:00:00+00:00");
        assert_eq!(rows[0].sender, "0xa");
        assert_eq!(rows[0].tx_hash, "0xhash_0xa");
    }

    #[test]
    fn test_preview_limits_rows() {
        let records: Vec<_> = (0..20).map(|i| record(&format!("0x{i}"), 1.0, 0.0)).collect();
        assert_eq!(preview(&records, 5).len(), 5);
        assert_eq!(preview(&records, 50).len(), 20);
        assert_eq!(preview(&records, 5)[0].sender, "0x0");
    }

    #[test]
    fn test_summary_metrics() {
        let records = vec![
            record("0xa", 10.0, 0.5),
            record("0xb", 20.0, 0.25),
            record("0xc", 30.0, 0.25),
        ];
        let summary = ReportSummary::from_records(&records);
        assert_eq!(summary.transfer_count, 3);
        assert_eq!(summary.total_amount, 60.0);
        assert_eq!(summary.average_amount, 20.0);
        assert_eq!(summary.total_fee, 1.0);
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = ReportSummary::from_records(&[]);
        assert_eq!(summary.transfer_count, 0);
        assert_eq!(summary.average_amount, 0.0);
    }
}
