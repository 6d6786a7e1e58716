//! Export — JSON and CSV artifacts for scan results.
//!
//! - **JSON**: the full `ScanReport` (summary, outcome counts, every signal
//!   with its pattern, snapshot, triggers and score breakdown)
//! - **CSV**: one flat row per signal for spreadsheets and downstream tools
//!
//! NaN indicator values are written as `null` in JSON and as empty cells in CSV.

use std::path::Path;

use anyhow::{Context, Result};
use nshape_core::Signal;

use crate::scanner::ScanReport;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_signals_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScanReport to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: stock_id, signal_date, score, the five score components, A/B/C
/// dates and prices, rise_pct, retr_pct, the two leg-exception flags,
/// bars_since_c, close, rsi,
/// volume_ratio, the three trigger flags, fingerprint.
pub fn export_signals_csv(signals: &[Signal]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "stock_id",
        "signal_date",
        "score",
        "retr_score",
        "vol_score",
        "early_score",
        "ma_score",
        "health_score",
        "a_date",
        "a_price",
        "b_date",
        "b_price",
        "c_date",
        "c_price",
        "rise_pct",
        "retr_pct",
        "ab_is_exception",
        "bc_is_exception",
        "bars_since_c",
        "close",
        "rsi",
        "volume_ratio",
        "break_yesterday_high",
        "ema_volume_cross",
        "rsi_strong",
        "fingerprint",
    ])?;

    for s in signals {
        let p = s.pattern();
        let score = s.score();
        let snap = s.snapshot();
        let trig = s.triggers();
        wtr.write_record([
            s.stock_id().to_string(),
            s.signal_date().to_string(),
            score.total.to_string(),
            format!("{:.2}", score.retr_score),
            format!("{:.2}", score.vol_score),
            format!("{:.2}", score.early_score),
            format!("{:.2}", score.ma_score),
            format!("{:.2}", score.health_score),
            p.a.date.to_string(),
            format!("{:.4}", p.a.price),
            p.b.date.to_string(),
            format!("{:.4}", p.b.price),
            p.c.date.to_string(),
            format!("{:.4}", p.c.price),
            format!("{:.4}", p.rise_pct),
            format!("{:.4}", p.retr_pct),
            p.ab_is_exception.to_string(),
            p.bc_is_exception.to_string(),
            s.bars_since_c().to_string(),
            format!("{:.4}", snap.close),
            num(snap.rsi, 2),
            num(snap.volume_ratio, 3),
            trig.break_yesterday_high.to_string(),
            trig.ema_volume_cross.to_string(),
            trig.rsi_strong.to_string(),
            s.fingerprint().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Fixed precision, NaN as an empty cell.
fn num(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{value:.decimals$}")
    }
}

// ─── File output ────────────────────────────────────────────────────

/// Write `report` to `path`: CSV for a `.csv` extension, JSON otherwise.
pub fn write_report(report: &ScanReport, path: &Path) -> Result<()> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let body = if is_csv {
        export_signals_csv(&report.signals)?
    } else {
        export_signals_json(report)?
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}
