//! nshape runner — scan orchestration on top of `nshape-core`.
//!
//! This crate provides:
//! - CSV bar loading, one file per stock
//! - TOML scan configuration
//! - Parallel single-date scans and date-range replays (rayon)
//! - JSON and CSV export of scan results

pub mod config;
pub mod data_loader;
pub mod export;
pub mod scanner;

pub use config::{ConfigError, ScanConfig};
pub use data_loader::{load_bars_csv, load_universe_dir, LoadError, Universe};
pub use export::{export_signals_csv, export_signals_json, write_report};
pub use scanner::{ScanError, ScanReport, Scanner};
