//! Chart data and SVG rendering.
//!
//! Two views over the record list:
//!
//! - **Fund flow**: total amount per receiver and per sender, top N of each,
//!   drawn as paired horizontal bar panels
//! - **Fee trend**: per-transfer fee over time, ascending, drawn as a line
//!   with point markers
//!
//! The aggregation functions return plain serializable data; rendering is a
//! separate step so the same data can be emitted as JSON.

use crate::error::{ReconError, ReconResult};
use crate::normalize::TransferRecord;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use plotters::coord::ranged1d::{IntoSegmentedCoord, SegmentValue};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Default number of addresses per fund-flow panel.
pub const DEFAULT_TOP_N: usize = 10;

const FUND_FLOW_SIZE: (u32, u32) = (1400, 600);
const FEE_CHART_SIZE: (u32, u32) = (1400, 400);

const RECEIVER_COLOR: RGBColor = RGBColor(0x2e, 0xcc, 0x71);
const SENDER_COLOR: RGBColor = RGBColor(0xe7, 0x4c, 0x3c);
const FEE_COLOR: RGBColor = RGBColor(0x34, 0x98, 0xdb);
const GRID_COLOR: RGBColor = RGBColor(0xd3, 0xd3, 0xd3);

/// Aggregated amount for one address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressTotal {
    /// Address as reported by the explorer
    pub address: String,
    /// Summed amount (USDT)
    pub amount: f64,
}

/// Top receivers and senders by total amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundFlow {
    /// Requested panel size
    pub top_n: usize,
    /// Largest receivers, descending
    pub top_receivers: Vec<AddressTotal>,
    /// Largest senders, descending
    pub top_senders: Vec<AddressTotal>,
}

/// One point of the fee trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeePoint {
    /// Block time
    pub time: DateTime<Utc>,
    /// Fee of the enclosing transaction (ETH)
    pub fee: f64,
}

/// Aggregate amounts per receiver and per sender and keep the top `top_n`.
///
/// Ties are broken by address so the output is deterministic.
#[must_use]
pub fn fund_flow(records: &[TransferRecord], top_n: usize) -> FundFlow {
    FundFlow {
        top_n,
        top_receivers: top_by_amount(
            records.iter().map(|r| (r.to_address.as_str(), r.amount)),
            top_n,
        ),
        top_senders: top_by_amount(
            records.iter().map(|r| (r.from_address.as_str(), r.amount)),
            top_n,
        ),
    }
}

fn top_by_amount<'a>(
    pairs: impl Iterator<Item = (&'a str, f64)>,
    top_n: usize,
) -> Vec<AddressTotal> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for (address, amount) in pairs {
        *totals.entry(address).or_insert(0.0) += amount;
    }

    let mut ranked: Vec<AddressTotal> = totals
        .into_iter()
        .map(|(address, amount)| AddressTotal {
            address: address.to_string(),
            amount,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.address.cmp(&b.address))
    });
    ranked.truncate(top_n);
    ranked
}

/// Fee per record ordered by time, oldest first.
///
/// Records sharing a timestamp keep their input order.
#[must_use]
pub fn fee_series(records: &[TransferRecord]) -> Vec<FeePoint> {
    let mut points: Vec<FeePoint> = records
        .iter()
        .map(|r| FeePoint {
            time: r.timestamp,
            fee: r.fee,
        })
        .collect();
    points.sort_by_key(|p| p.time);
    points
}

/// Render the fund-flow panels as an SVG document.
///
/// # Errors
///
/// Returns a chart error if drawing fails.
pub fn render_fund_flow_svg(flow: &FundFlow) -> ReconResult<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FUND_FLOW_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;
        let root = root
            .titled(
                &format!("Fund Flow - Top {} Receivers / Senders", flow.top_n),
                ("sans-serif", 24),
            )
            .map_err(draw_error)?;

        let panels = root.split_evenly((1, 2));
        if let [receivers, senders] = panels.as_slice() {
            draw_bar_panel(receivers, "Top Receivers", &flow.top_receivers, RECEIVER_COLOR)?;
            draw_bar_panel(senders, "Top Senders", &flow.top_senders, SENDER_COLOR)?;
        }

        root.present().map_err(draw_error)?;
    }
    Ok(svg)
}

fn draw_bar_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    title: &str,
    entries: &[AddressTotal],
    color: RGBColor,
) -> ReconResult<()> {
    let slots = entries.len().max(1);
    let max_amount = entries.iter().map(|e| e.amount).fold(0.0_f64, f64::max);
    let x_max = if max_amount > 0.0 { max_amount * 1.05 } else { 1.0 };

    // Largest entry sits in the top slot.
    let slot_of = |index: usize| slots - 1 - index;
    let label_for = |slot: &SegmentValue<usize>| match slot {
        SegmentValue::CenterOf(s) | SegmentValue::Exact(s) => slots
            .checked_sub(s + 1)
            .and_then(|index| entries.get(index))
            .map(|e| short_address(&e.address))
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    };

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(130)
        .build_cartesian_2d(0.0..x_max, (0..slots).into_segmented())
        .map_err(draw_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .bold_line_style(&GRID_COLOR)
        .x_desc("Amount (USDT)")
        .y_desc("Address")
        .y_labels(slots)
        .y_label_formatter(&label_for)
        .draw()
        .map_err(draw_error)?;

    chart
        .draw_series(entries.iter().enumerate().map(|(index, entry)| {
            let slot = slot_of(index);
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(slot)),
                    (entry.amount, SegmentValue::Exact(slot + 1)),
                ],
                color.filled(),
            );
            bar.set_margin(4, 4, 0, 0);
            bar
        }))
        .map_err(draw_error)?;

    Ok(())
}

/// Render the fee trend as an SVG document.
///
/// # Errors
///
/// Returns a chart error if drawing fails.
pub fn render_fee_svg(points: &[FeePoint]) -> ReconResult<String> {
    let (start, end) = time_bounds(points);
    let max_fee = points.iter().map(|p| p.fee).fold(0.0_f64, f64::max);
    let y_max = if max_fee > 0.0 { max_fee * 1.1 } else { 1.0 };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FEE_CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Fee Trend", ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(100)
            .build_cartesian_2d(start..end, 0.0..y_max)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .bold_line_style(&GRID_COLOR)
            .x_desc("Time (UTC)")
            .y_desc("Fee (ETH)")
            .x_label_formatter(&|t: &DateTime<Utc>| t.format("%m-%d %H:%M").to_string())
            .y_label_formatter(&|v: &f64| format!("{v:.6}"))
            .draw()
            .map_err(draw_error)?;

        chart
            .draw_series(LineSeries::new(
                points.iter().map(|p| (p.time, p.fee)),
                FEE_COLOR.stroke_width(1),
            ))
            .map_err(draw_error)?;

        chart
            .draw_series(
                points
                    .iter()
                    .map(|p| Circle::new((p.time, p.fee), 3, FEE_COLOR.filled())),
            )
            .map_err(draw_error)?;

        root.present().map_err(draw_error)?;
    }
    Ok(svg)
}

/// Time axis range; never empty.
fn time_bounds(points: &[FeePoint]) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = points.first().map_or(DateTime::UNIX_EPOCH, |p| p.time);
    let end = points.last().map_or(start, |p| p.time);
    if end > start {
        (start, end)
    } else {
        (start, start + ChronoDuration::minutes(1))
    }
}

/// `0x1234…abcd` form for axis labels.
fn short_address(address: &str) -> String {
    if address.len() <= 14 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}

fn draw_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> ReconError {
    ReconError::chart(err.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn record(from: &str, to: &str, amount: f64, ts: i64, fee: f64) -> TransferRecord {
        TransferRecord {
            from_address: from.to_string(),
            to_address: to.to_string(),
            amount,
            tx_hash: format!("0x{ts}"),
            timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
            fee,
        }
    }

    fn sample() -> Vec<TransferRecord> {
        vec![
            record("0xs1", "0xr1", 100.0, 1_700_000_300, 0.003),
            record("0xs2", "0xr2", 50.0, 1_700_000_100, 0.001),
            record("0xs1", "0xr2", 75.0, 1_700_000_200, 0.002),
            record("0xs3", "0xr3", 10.0, 1_700_000_100, 0.004),
        ]
    }

    #[test]
    fn test_fund_flow_aggregates_and_ranks() {
        let flow = fund_flow(&sample(), 10);

        let receivers: Vec<(&str, f64)> = flow
            .top_receivers
            .iter()
            .map(|t| (t.address.as_str(), t.amount))
            .collect();
        assert_eq!(receivers, vec![("0xr2", 125.0), ("0xr1", 100.0), ("0xr3", 10.0)]);

        assert_eq!(flow.top_senders[0].address, "0xs1");
        assert_eq!(flow.top_senders[0].amount, 175.0);
    }

    #[test]
    fn test_fund_flow_truncates_to_top_n() {
        let flow = fund_flow(&sample(), 2);
        assert_eq!(flow.top_receivers.len(), 2);
        assert_eq!(flow.top_senders.len(), 2);
        assert_eq!(flow.top_n, 2);
    }

    #[test]
    fn test_fund_flow_ties_break_by_address() {
        let records = vec![
            record("0xb", "0xr", 5.0, 1, 0.0),
            record("0xa", "0xr", 5.0, 2, 0.0),
        ];
        let flow = fund_flow(&records, 10);
        assert_eq!(flow.top_senders[0].address, "0xa");
        assert_eq!(flow.top_senders[1].address, "0xb");
    }

    #[test]
    fn test_fee_series_sorted_and_stable() {
        let records = sample();
        let points = fee_series(&records);

        let fees: Vec<f64> = points.iter().map(|p| p.fee).collect();
        assert_eq!(fees, vec![0.001, 0.004, 0.002, 0.003]);
        assert!(points.windows(2).all(|w| w[0].time <= w[1].time));

        // Input untouched
        assert_eq!(records[0].fee, 0.003);
    }

    #[test]
    fn test_render_fund_flow_svg() {
        let svg = render_fund_flow_svg(&fund_flow(&sample(), 10)).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Top Receivers"));
        assert!(svg.contains("Top Senders"));
    }

    #[test]
    fn test_render_fee_svg() {
        let svg = render_fee_svg(&fee_series(&sample())).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Fee Trend"));
    }

    #[test]
    fn test_render_handles_empty_input() {
        assert!(render_fund_flow_svg(&fund_flow(&[], 10)).is_ok());
        assert!(render_fee_svg(&[]).is_ok());
    }

    #[test]
    fn test_time_bounds_never_empty() {
        let single = [FeePoint {
            time: DateTime::from_timestamp(100, 0).unwrap(),
            fee: 0.1,
        }];
        let (start, end) = time_bounds(&single);
        assert!(end > start);
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            "0xdac1…1ec7"
        );
        assert_eq!(short_address("0xabc"), "0xabc");
    }
}
