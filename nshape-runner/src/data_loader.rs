//! Bar loading from CSV files.
//!
//! One file per stock, named `<stock_id>.csv`, with a header row:
//!
//! ```text
//! date,open,high,low,close,volume
//! 2024-01-02,10.50,10.80,10.40,10.75,1234500
//! ```
//!
//! Prices must already be forward-adjusted. Rows must be in ascending date
//! order; a file that is out of order or holds an insane bar is rejected as a
//! whole. Within a universe directory, a bad file is logged and skipped so one
//! stock never aborts the scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use nshape_core::domain::{validate_series, Bar, SeriesError, StockId};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {source}")]
    Series {
        path: PathBuf,
        #[source]
        source: SeriesError,
    },

    #[error("{path}: file holds no bars")]
    Empty { path: PathBuf },

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// One CSV row. Volume is read as a float since vendors often write `1234.0`.
#[derive(Debug, Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<CsvBar> for Bar {
    fn from(row: CsvBar) -> Self {
        Bar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            // NaN and negatives land on 0, i.e. suspended
            volume: row.volume.max(0.0).round() as u64,
        }
    }
}

/// Bars for every loaded stock, keyed by stock id.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub series: BTreeMap<StockId, Vec<Bar>>,
    /// Stocks whose file failed to load, with the reason.
    pub skipped: Vec<(StockId, String)>,
}

impl Universe {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn insert(&mut self, stock_id: impl Into<StockId>, bars: Vec<Bar>) {
        self.series.insert(stock_id.into(), bars);
    }

    /// Most recent bar date across all stocks.
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series
            .values()
            .filter_map(|bars| bars.last().map(|b| b.date))
            .max()
    }
}

/// Load and validate one stock's bars.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    for row in reader.deserialize::<CsvBar>() {
        bars.push(Bar::from(row.map_err(csv_err)?));
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    validate_series(&bars).map_err(|source| LoadError::Series {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bars)
}

/// Load every `*.csv` in `dir`. The file stem is the stock id.
///
/// Only a missing or unreadable directory is an error; bad files end up in
/// `Universe::skipped`.
pub fn load_universe_dir(dir: &Path) -> Result<Universe, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::NotADirectory(dir.to_path_buf()));
    }
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut universe = Universe::default();
    for path in paths {
        let Some(stock_id) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping {}: file name is not valid UTF-8", path.display());
            continue;
        };
        match load_bars_csv(&path) {
            Ok(bars) => universe.insert(stock_id, bars),
            Err(e) => {
                warn!("Skipping {}: {}", stock_id, e);
                universe.skipped.push((stock_id.to_string(), e.to_string()));
            }
        }
    }

    info!(
        "Loaded {} stocks from {} ({} skipped)",
        universe.len(),
        dir.display(),
        universe.skipped.len()
    );
    Ok(universe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    const HEADER: &str = "date,open,high,low,close,volume\n";

    #[test]
    fn loads_well_formed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "600000.csv",
            &format!(
                "{HEADER}2024-01-02,10.0,10.5,9.8,10.2,1000\n2024-01-03, 10.2 ,10.9,10.1,10.8,1500.0\n"
            ),
        );
        let bars = load_bars_csv(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[1].open, 10.2);
        assert_eq!(bars[1].volume, 1500);
    }

    #[test]
    fn out_of_order_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "x.csv",
            &format!("{HEADER}2024-01-03,10,11,9,10,1\n2024-01-02,10,11,9,10,1\n"),
        );
        assert!(matches!(
            load_bars_csv(&path),
            Err(LoadError::Series {
                source: SeriesError::OutOfOrder { index: 1, .. },
                ..
            })
        ));
    }

    #[test]
    fn header_only_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "x.csv", HEADER);
        assert!(matches!(load_bars_csv(&path), Err(LoadError::Empty { .. })));
    }

    #[test]
    fn bad_number_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "x.csv", &format!("{HEADER}2024-01-02,ten,11,9,10,1\n"));
        assert!(matches!(load_bars_csv(&path), Err(LoadError::Csv { .. })));
    }

    #[test]
    fn universe_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "AAA.csv", &format!("{HEADER}2024-01-02,10,11,9,10,1\n"));
        write(dir.path(), "BBB.csv", &format!("{HEADER}2024-01-02,10,9,11,10,1\n"));
        write(dir.path(), "notes.txt", "ignored");

        let universe = load_universe_dir(dir.path()).unwrap();
        assert_eq!(universe.len(), 1);
        assert!(universe.series.contains_key("AAA"));
        assert_eq!(universe.skipped.len(), 1);
        assert_eq!(universe.skipped[0].0, "BBB");
        assert_eq!(
            universe.last_date(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            load_universe_dir(&missing),
            Err(LoadError::NotADirectory(_))
        ));
    }
}
