//! Signal emitter — runs the full pipeline for one stock at its last bar.
//!
//! Pipeline: indicators → ZigZag → pattern → triggers → score → cooldown.
//! The first four stages are pure and live in `detect`; `evaluate` adds the
//! cooldown check against the injected store and records emissions.

use chrono::NaiveDate;
use tracing::debug;

use crate::cooldown::CooldownStore;
use crate::domain::{Bar, Signal};
use crate::indicators::IndicatorSeries;
use crate::params::{ParamError, ScanParameters};
use crate::pattern::{LegSeries, PatternMatcher, PatternRejection};
use crate::scoring::ScoreBreakdown;
use crate::trigger::TriggerFlags;
use crate::zigzag::ZigZag;

/// Outcome of evaluating one stock. Only `Emitted` carries a signal; every
/// other variant is a normal "no signal today".
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Emitted(Signal),
    InsufficientHistory { have: usize, need: usize },
    NoPattern(PatternRejection),
    NoTrigger,
    CoolingDown {
        last_signal: NaiveDate,
        bars_elapsed: usize,
    },
}

impl Evaluation {
    pub fn signal(self) -> Option<Signal> {
        match self {
            Self::Emitted(signal) => Some(signal),
            _ => None,
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, Self::Emitted(_))
    }

    /// Short outcome name for summaries and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Emitted(_) => "emitted",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::NoPattern(_) => "no_pattern",
            Self::NoTrigger => "no_trigger",
            Self::CoolingDown { .. } => "cooling_down",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalEmitter {
    params: ScanParameters,
    matcher: PatternMatcher,
}

impl SignalEmitter {
    /// Validates `params`. An invalid set is fatal for the whole scan.
    pub fn new(params: ScanParameters) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self {
            matcher: PatternMatcher::from_params(&params),
            params,
        })
    }

    pub fn params(&self) -> &ScanParameters {
        &self.params
    }

    /// Evaluate `bars` at its last bar and return the signal, if any.
    pub fn evaluate(
        &self,
        stock_id: &str,
        bars: &[Bar],
        store: &dyn CooldownStore,
    ) -> Option<Signal> {
        self.evaluate_detailed(stock_id, bars, store).signal()
    }

    /// Like `evaluate`, but reports why no signal was emitted.
    pub fn evaluate_detailed(
        &self,
        stock_id: &str,
        bars: &[Bar],
        store: &dyn CooldownStore,
    ) -> Evaluation {
        let signal = match self.detect(stock_id, bars) {
            Evaluation::Emitted(signal) => signal,
            other => return other,
        };

        if let Some(last_signal) = store.last_signal_date(stock_id) {
            let bars_elapsed = trading_days_after(bars, last_signal);
            if bars_elapsed < self.params.cooldown_days {
                debug!(
                    "{} cooling down: {} bars since signal on {}",
                    stock_id, bars_elapsed, last_signal
                );
                return Evaluation::CoolingDown {
                    last_signal,
                    bars_elapsed,
                };
            }
        }

        store.record_signal(stock_id, signal.signal_date());
        Evaluation::Emitted(signal)
    }

    /// The pure half of the pipeline: everything except cooldown.
    ///
    /// Never returns `CoolingDown`.
    pub fn detect(&self, stock_id: &str, bars: &[Bar]) -> Evaluation {
        let need = self.params.min_history();
        if bars.len() < need {
            debug!("{} has {} bars, needs {}", stock_id, bars.len(), need);
            return Evaluation::InsufficientHistory {
                have: bars.len(),
                need,
            };
        }
        let t = bars.len() - 1;

        let series = IndicatorSeries::compute(bars, &self.params);
        let zigzag = ZigZag::for_series(&self.params, bars, &series.atr);
        let points = zigzag.extract(bars, &series.atr);
        let legs = LegSeries::new(bars, &series);
        let pattern = match self.matcher.match_latest_detailed(&points, &legs, t) {
            Ok(pattern) => pattern,
            Err(reason) => {
                debug!(
                    "{} no pattern on {} ({} turning points): {:?}",
                    stock_id,
                    bars[t].date,
                    points.len(),
                    reason
                );
                return Evaluation::NoPattern(reason);
            }
        };

        let snapshot = series.snapshot_at(bars, t);
        let triggers = TriggerFlags::evaluate(&snapshot, self.params.volume_threshold);
        if !triggers.any() {
            debug!(
                "{} pattern C={} but no trigger on {}",
                stock_id, pattern.c.date, bars[t].date
            );
            return Evaluation::NoTrigger;
        }

        let bars_since_c = t - pattern.c.index;
        let score = ScoreBreakdown::compute(&pattern, &snapshot, bars_since_c, &self.params);
        debug!(
            "{} signal on {} score {} triggers {:?}",
            stock_id,
            bars[t].date,
            score.total,
            triggers.fired()
        );

        Evaluation::Emitted(Signal::new(
            stock_id,
            bars[t].date,
            bars_since_c,
            pattern,
            snapshot,
            triggers,
            score,
        ))
    }
}

/// Bars dated after `since`, up to and including the last bar.
fn trading_days_after(bars: &[Bar], since: NaiveDate) -> usize {
    bars.iter().rev().take_while(|b| b.date > since).count()
}
