//! End-to-end export: mock explorer → records → workbook and charts on disk.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::float_cmp)]

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use mockito::{Matcher, Server};
use serde_json::json;
use std::io::{Cursor, Read};
use std::time::Duration;
use usdt_reconciliation::charts::{fee_series, fund_flow, render_fee_svg, render_fund_flow_svg};
use usdt_reconciliation::config::Config;
use usdt_reconciliation::error::ReconError;
use usdt_reconciliation::explorer::ExplorerClient;
use usdt_reconciliation::fetcher::{fetch_transfers, FetchParams};
use usdt_reconciliation::observability::init_test_tracing;
use usdt_reconciliation::report::{generate_report, ReportSummary, COLUMNS, SHEET_NAME};

/// Three transfers in two transactions; the shared hash carries one fee.
fn explorer_body() -> String {
    json!({
        "status": "1",
        "message": "OK",
        "result": [
            {
                "timeStamp": "1704067300", "hash": "0xaaa", "from": "0xalice", "to": "0xbob",
                "value": "2500000000", "gasPrice": "10000000000", "gasUsed": "60000"
            },
            {
                "timeStamp": "1704067200", "hash": "0xbbb", "from": "0xcarol", "to": "0xbob",
                "value": "1000000", "gasPrice": "30000000000", "gasUsed": "100000"
            },
            {
                "timeStamp": "1704067200", "hash": "0xbbb", "from": "0xcarol", "to": "0xdave",
                "value": "4000000", "gasPrice": "30000000000", "gasUsed": "100000"
            }
        ]
    })
    .to_string()
}

async fn fetch_sample() -> Vec<usdt_reconciliation::normalize::TransferRecord> {
    init_test_tracing();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v2/api")
        .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(explorer_body())
        .create_async()
        .await;

    let config = Config::new("test-key", 1, format!("{}/v2/api", server.url()));
    let client = ExplorerClient::new(&config).unwrap();
    let params = FetchParams {
        inter_page_delay: Duration::ZERO,
        ..FetchParams::default()
    };
    fetch_transfers(&client, &params).await.unwrap()
}

#[tokio::test]
async fn test_workbook_written_to_disk() {
    let records = fetch_sample().await;
    assert_eq!(records.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("onchain_reconciliation_report.xlsx");
    std::fs::write(&path, generate_report(&records).unwrap()).unwrap();

    let mut magic = [0u8; 4];
    std::fs::File::open(&path)
        .unwrap()
        .read_exact(&mut magic)
        .unwrap();
    assert_eq!(&magic, b"PK\x03\x04");
}

#[tokio::test]
async fn test_workbook_layout_reads_back() {
    let records = fetch_sample().await;
    let bytes = generate_report(&records).unwrap();

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    assert_eq!(workbook.sheet_names(), vec![SHEET_NAME.to_string()]);

    let sheet = workbook.worksheet_range(SHEET_NAME).unwrap();
    assert_eq!(sheet.height(), records.len() + 1);
    assert_eq!(sheet.width(), COLUMNS.len());

    let header: Vec<String> = sheet
        .rows()
        .next()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(header, COLUMNS.map(String::from).to_vec());

    let first = &records[0];
    let cell = |col: u32| sheet.get_value((1, col)).cloned();
    assert_eq!(cell(0), Some(Data::String(first.timestamp_iso())));
    assert_eq!(cell(1), Some(Data::String(first.from_address.clone())));
    assert_eq!(cell(2), Some(Data::String(first.to_address.clone())));
    assert_eq!(cell(3), Some(Data::Float(first.amount)));
    assert_eq!(cell(4), Some(Data::Float(first.fee)));
    assert_eq!(cell(5), Some(Data::String(first.tx_hash.clone())));
}

#[tokio::test]
async fn test_transaction_fee_repeats_per_transfer() {
    let records = fetch_sample().await;

    // 30 gwei * 100,000 gas = 0.003 ETH on both logs of 0xbbb
    assert_eq!(records[1].tx_hash, records[2].tx_hash);
    assert_eq!(records[1].fee, records[2].fee);
    assert!((records[1].fee - 0.003).abs() < 1e-12);

    let summary = ReportSummary::from_records(&records);
    assert_eq!(summary.transfer_count, 3);
    assert!((summary.total_amount - 2505.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_charts_from_fetched_records() {
    let records = fetch_sample().await;

    let flow = fund_flow(&records, 10);
    assert_eq!(flow.top_receivers[0].address, "0xbob");
    assert!((flow.top_receivers[0].amount - 2501.0).abs() < 1e-9);
    assert_eq!(flow.top_senders[0].address, "0xalice");

    let fees = fee_series(&records);
    assert_eq!(fees.len(), 3);
    assert!(fees.windows(2).all(|w| w[0].time <= w[1].time));

    let dir = tempfile::tempdir().unwrap();
    let flow_path = dir.path().join("fund_flow.svg");
    std::fs::write(&flow_path, render_fund_flow_svg(&flow).unwrap()).unwrap();
    std::fs::write(dir.path().join("fee_trend.svg"), render_fee_svg(&fees).unwrap()).unwrap();

    let svg = std::fs::read_to_string(&flow_path).unwrap();
    assert!(svg.starts_with("<svg") || svg.starts_with("<?xml"));
}

#[test]
fn test_empty_record_list_cannot_be_exported() {
    let err = generate_report(&[]).unwrap_err();
    assert!(matches!(err, ReconError::EmptyExportError));
    assert_eq!(err.to_string(), "No records to export");
}
