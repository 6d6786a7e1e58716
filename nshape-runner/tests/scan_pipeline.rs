//! End-to-end runner tests: CSV files on disk → scan/replay → export.

use std::path::Path;

use chrono::NaiveDate;
use nshape_core::{CooldownStore, MemoryCooldownStore, ScanParameters};
use nshape_runner::{
    export_signals_csv, export_signals_json, load_universe_dir, write_report, ScanConfig,
    Scanner, Universe,
};
use proptest::prelude::*;

// ── Fixtures ─────────────────────────────────────────────────────────

/// Flat at 100, slide to 80, rally to 120, pull back to 100, then rise.
/// C is confirmed on bar 204.
fn n_shape_closes(extra: usize) -> Vec<f64> {
    let mut closes = vec![100.0; 150];
    closes.extend((1..=20).map(|k| 100.0 - k as f64));
    closes.extend((1..=20).map(|k| 80.0 + 2.0 * k as f64));
    closes.extend((1..=10).map(|k| 120.0 - 2.0 * k as f64));
    closes.extend((1..=5 + extra).map(|k| 100.0 + 2.0 * k as f64));
    closes
}

fn date(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(i as i64)
}

fn write_csv(dir: &Path, stock_id: &str, closes: &[f64]) {
    let mut body = String::from("date,open,high,low,close,volume\n");
    for (i, c) in closes.iter().enumerate() {
        body.push_str(&format!(
            "{},{},{},{},{},1000\n",
            date(i),
            c,
            c * 1.005,
            c * 0.995,
            c
        ));
    }
    std::fs::write(dir.join(format!("{stock_id}.csv")), body).unwrap();
}

fn universe_dir(extra: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "600000", &n_shape_closes(extra));
    write_csv(dir.path(), "600001", &n_shape_closes(extra));
    write_csv(dir.path(), "FLAT", &vec![50.0; 230]);
    std::fs::write(dir.path().join("BROKEN.csv"), "date,open\n2023-01-02,1\n").unwrap();
    dir
}

// ── Scan ─────────────────────────────────────────────────────────────

#[test]
fn scan_date_finds_both_n_shapes() {
    let dir = universe_dir(0);
    let universe = load_universe_dir(dir.path()).unwrap();
    assert_eq!(universe.len(), 3);
    assert_eq!(universe.skipped.len(), 1);

    let scanner = Scanner::new(&ScanConfig::default()).unwrap();
    let store = MemoryCooldownStore::new();
    let report = scanner.scan_date(&universe, date(204), &store);

    assert_eq!(report.evaluations, 3);
    assert_eq!(report.signal_count(), 2);
    assert_eq!(report.outcome("emitted"), 2);
    assert_eq!(report.outcome("no_pattern"), 1);
    let ids: Vec<&str> = report.signals.iter().map(|s| s.stock_id()).collect();
    assert_eq!(ids, vec!["600000", "600001"]);
    assert_eq!(store.last_signal_date("600000"), Some(date(204)));
    assert_eq!(
        report.params_hash,
        ScanParameters::default().params_hash().to_string()
    );
}

#[test]
fn min_score_filters_output() {
    let dir = universe_dir(0);
    let universe = load_universe_dir(dir.path()).unwrap();
    let config = ScanConfig {
        min_score: Some(100),
        ..ScanConfig::default()
    };
    let scanner = Scanner::new(&config).unwrap();
    let report = scanner.scan_date(&universe, date(204), &MemoryCooldownStore::new());

    assert!(report.signals.is_empty());
    assert_eq!(report.outcome("below_min_score"), 2);
}

// ── Replay ───────────────────────────────────────────────────────────

#[test]
fn replay_respects_cooldown() {
    let dir = universe_dir(25);
    let universe = load_universe_dir(dir.path()).unwrap();
    let scanner = Scanner::new(&ScanConfig::default()).unwrap();

    let report = scanner
        .replay(&universe, date(150), date(229), &MemoryCooldownStore::new())
        .unwrap();

    // Bars 204..=229 all qualify; with a 20-day cooldown only 204 and 224 emit.
    let per_stock: Vec<NaiveDate> = report
        .signals
        .iter()
        .filter(|s| s.stock_id() == "600000")
        .map(|s| s.signal_date())
        .collect();
    assert_eq!(per_stock, vec![date(204), date(224)]);
    assert_eq!(report.signal_count(), 4);
    assert_eq!(report.outcome("cooling_down"), 2 * 24);

    // sorted by (date, stock)
    let keys: Vec<(NaiveDate, &str)> = report
        .signals
        .iter()
        .map(|s| (s.signal_date(), s.stock_id()))
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn parallel_and_sequential_reports_match() {
    let dir = universe_dir(25);
    let universe = load_universe_dir(dir.path()).unwrap();

    let run = |threads| {
        let config = ScanConfig {
            threads: Some(threads),
            ..ScanConfig::default()
        };
        let scanner = Scanner::new(&config).unwrap();
        let report = scanner
            .replay(&universe, date(150), date(229), &MemoryCooldownStore::new())
            .unwrap();
        export_signals_json(&report).unwrap()
    };

    assert_eq!(run(1), run(4));
}

// ── Export ───────────────────────────────────────────────────────────

#[test]
fn csv_export_has_one_row_per_signal() {
    let dir = universe_dir(0);
    let universe = load_universe_dir(dir.path()).unwrap();
    let scanner = Scanner::new(&ScanConfig::default()).unwrap();
    let report = scanner.scan_date(&universe, date(204), &MemoryCooldownStore::new());

    let csv = export_signals_csv(&report.signals).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("stock_id,signal_date,score,"));
    assert!(lines[0].contains(",retr_pct,ab_is_exception,bc_is_exception,bars_since_c,"));
    assert!(lines[1].starts_with("600000,2023-07-25,"));
    assert!(lines[1].contains(",true,"));
}

#[test]
fn write_report_picks_format_from_extension() {
    let dir = universe_dir(0);
    let universe = load_universe_dir(dir.path()).unwrap();
    let scanner = Scanner::new(&ScanConfig::default()).unwrap();
    let report = scanner.scan_date(&universe, date(204), &MemoryCooldownStore::new());

    let out = tempfile::tempdir().unwrap();
    let json_path = out.path().join("nested/report.json");
    let csv_path = out.path().join("signals.csv");
    write_report(&report, &json_path).unwrap();
    write_report(&report, &csv_path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["signals"].as_array().unwrap().len(), 2);
    assert_eq!(json["outcomes"]["emitted"], 2);
    assert_eq!(json["signals"][0]["stock_id"], "600000");
    assert_eq!(json["signals"][0]["pattern"]["ab_is_exception"], false);
    assert_eq!(json["signals"][0]["pattern"]["bc_is_exception"], false);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3);
}

// ── Properties ───────────────────────────────────────────────────────

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.06..0.06_f64, 60..160).prop_map(|rets| {
        let mut c = 20.0;
        rets.into_iter()
            .map(|r| {
                c = (c * (1.0 + r)).max(1.0);
                c
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Worker count never changes what a replay reports.
    #[test]
    fn replay_is_schedule_independent(a in arb_closes(), b in arb_closes(), c in arb_closes()) {
        let mut universe = Universe::default();
        for (id, closes) in [("A", a), ("B", b), ("C", c)] {
            let bars = closes
                .iter()
                .enumerate()
                .map(|(i, &close)| nshape_core::Bar {
                    date: date(i),
                    open: close,
                    high: close * 1.01,
                    low: close * 0.99,
                    close,
                    volume: 500 + (i as u64 * 31) % 700,
                })
                .collect();
            universe.insert(id, bars);
        }

        let run = |threads| {
            let scanner = Scanner::new(&ScanConfig {
                threads: Some(threads),
                ..ScanConfig::default()
            })
            .unwrap();
            let report = scanner
                .replay(&universe, date(0), date(200), &MemoryCooldownStore::new())
                .unwrap();
            export_signals_json(&report).unwrap()
        };
        prop_assert_eq!(run(1), run(3));
    }
}
