//! Parallel scan driver.
//!
//! Fans stocks out over a private rayon pool. Each worker walks its own
//! stock's evaluation dates in order, slicing the bars so that evaluation at
//! date t only ever sees bars up to t. The cooldown store is the only shared
//! state. Results are sorted by (signal_date, stock_id), so the report does
//! not depend on how work was scheduled.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use nshape_core::domain::Bar;
use nshape_core::{CooldownStore, ParamError, Signal, SignalEmitter};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::data_loader::Universe;

/// Outcome label for stocks with no bar on an evaluation date.
pub const NO_BAR: &str = "no_bar";
/// Outcome label for signals dropped by `min_score`.
pub const BELOW_MIN_SCORE: &str = "below_min_score";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan parameters: {0}")]
    Params(#[from] ParamError),

    #[error("build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("start date {start} is after end date {end}")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Summary of one scan or replay.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub params_hash: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Stocks in the universe.
    pub stocks: usize,
    /// (stock, date) pairs evaluated.
    pub evaluations: usize,
    /// Count per outcome label, e.g. `no_pattern`, `emitted`.
    pub outcomes: BTreeMap<&'static str, usize>,
    /// Sorted by (signal_date, stock_id).
    pub signals: Vec<Signal>,
}

impl ScanReport {
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn outcome(&self, label: &str) -> usize {
        self.outcomes.get(label).copied().unwrap_or(0)
    }
}

/// Per-stock partial result, merged after the parallel pass.
#[derive(Default)]
struct StockRun {
    evaluations: usize,
    outcomes: BTreeMap<&'static str, usize>,
    signals: Vec<Signal>,
}

pub struct Scanner {
    emitter: SignalEmitter,
    min_score: Option<u8>,
    pool: rayon::ThreadPool,
    threads: usize,
}

impl Scanner {
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let emitter = SignalEmitter::new(config.params.clone())?;
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("nshape-scan-{i}"));
        if let Some(n) = config.threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        let threads = pool.current_num_threads();
        Ok(Self {
            emitter,
            min_score: config.min_score,
            pool,
            threads,
        })
    }

    pub fn emitter(&self) -> &SignalEmitter {
        &self.emitter
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Evaluate every stock that traded on `date`.
    pub fn scan_date(
        &self,
        universe: &Universe,
        date: NaiveDate,
        store: &dyn CooldownStore,
    ) -> ScanReport {
        let report = self.run(universe, date, date, store, true);
        info!(
            "Scan {}: {} stocks, {} signals ({} no bar)",
            date,
            report.stocks,
            report.signal_count(),
            report.outcome(NO_BAR)
        );
        report
    }

    /// Evaluate every trading day of every stock in `[start, end]`, in date
    /// order per stock, sharing one cooldown store across the whole range.
    pub fn replay(
        &self,
        universe: &Universe,
        start: NaiveDate,
        end: NaiveDate,
        store: &dyn CooldownStore,
    ) -> Result<ScanReport, ScanError> {
        if start > end {
            return Err(ScanError::DateRange { start, end });
        }
        let report = self.run(universe, start, end, store, false);
        info!(
            "Replay {}..={}: {} stocks, {} evaluations, {} signals",
            start,
            end,
            report.stocks,
            report.evaluations,
            report.signal_count()
        );
        Ok(report)
    }

    fn run(
        &self,
        universe: &Universe,
        start: NaiveDate,
        end: NaiveDate,
        store: &dyn CooldownStore,
        single_date: bool,
    ) -> ScanReport {
        let runs: Vec<StockRun> = self.pool.install(|| {
            universe
                .series
                .par_iter()
                .map(|(stock_id, bars)| self.scan_stock(stock_id, bars, start, end, store, single_date))
                .collect()
        });

        let mut report = ScanReport {
            params_hash: self.emitter.params().params_hash().to_string(),
            start,
            end,
            stocks: universe.len(),
            evaluations: 0,
            outcomes: BTreeMap::new(),
            signals: Vec::new(),
        };
        for run in runs {
            report.evaluations += run.evaluations;
            for (label, n) in run.outcomes {
                *report.outcomes.entry(label).or_default() += n;
            }
            report.signals.extend(run.signals);
        }
        report.signals.sort_by(|a, b| {
            a.signal_date()
                .cmp(&b.signal_date())
                .then_with(|| a.stock_id().cmp(b.stock_id()))
        });
        report
    }

    fn scan_stock(
        &self,
        stock_id: &str,
        bars: &[Bar],
        start: NaiveDate,
        end: NaiveDate,
        store: &dyn CooldownStore,
        single_date: bool,
    ) -> StockRun {
        let mut run = StockRun::default();
        let from = bars.partition_point(|b| b.date < start);
        let to = bars.partition_point(|b| b.date <= end);

        if single_date && from == to {
            debug!("{} has no bar on {}", stock_id, start);
            *run.outcomes.entry(NO_BAR).or_default() += 1;
            return run;
        }

        for t in from..to {
            run.evaluations += 1;
            let evaluation = self.emitter.evaluate_detailed(stock_id, &bars[..=t], store);
            let label = evaluation.label();
            match evaluation.signal() {
                Some(signal) if self.below_min_score(&signal) => {
                    *run.outcomes.entry(BELOW_MIN_SCORE).or_default() += 1;
                }
                Some(signal) => {
                    *run.outcomes.entry(label).or_default() += 1;
                    run.signals.push(signal);
                }
                None => *run.outcomes.entry(label).or_default() += 1,
            }
        }
        run
    }

    fn below_min_score(&self, signal: &Signal) -> bool {
        self.min_score
            .is_some_and(|min| signal.score().total < min)
    }
}
