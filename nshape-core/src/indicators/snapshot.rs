//! Indicator series for one evaluation and the snapshot taken at the evaluation bar.

use serde::Serialize;

use super::{volume_sma, Atr, Ema, Indicator, Rsi, VolumeRatio};
use crate::domain::Bar;
use crate::params::ScanParameters;

/// Every indicator series the pipeline needs, aligned with the bar slice.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub ema_short: Vec<f64>,
    pub ema_long: Vec<f64>,
    pub rsi: Vec<f64>,
    pub atr: Vec<f64>,
    pub vol_sma: Vec<f64>,
    pub volume_ratio: Vec<f64>,
}

impl IndicatorSeries {
    pub fn compute(bars: &[Bar], params: &ScanParameters) -> Self {
        Self {
            ema_short: Ema::new(params.ema_len).compute(bars),
            ema_long: Ema::new(params.ema_long_len).compute(bars),
            rsi: Rsi::new(params.rsi_len).compute(bars),
            atr: Atr::new(params.atr_len).compute(bars),
            vol_sma: volume_sma(bars, params.vol_ma_len),
            volume_ratio: VolumeRatio::new(params.vol_ma_len).compute(bars),
        }
    }

    /// Sample every series at bar `t`. Out-of-range `t` yields an all-NaN snapshot.
    pub fn snapshot_at(&self, bars: &[Bar], t: usize) -> IndicatorSnapshot {
        let at = |series: &[f64]| series.get(t).copied().unwrap_or(f64::NAN);
        let Some(bar) = bars.get(t) else {
            return IndicatorSnapshot::empty();
        };
        let prev = t.checked_sub(1).and_then(|p| bars.get(p));
        let prev_close = prev.map_or(f64::NAN, |b| b.close);

        IndicatorSnapshot {
            close: bar.close,
            prev_close,
            prev_high: prev.map_or(f64::NAN, |b| b.high),
            ema_short: at(&self.ema_short),
            ema_long: at(&self.ema_long),
            rsi: at(&self.rsi),
            atr: at(&self.atr),
            vol_sma: at(&self.vol_sma),
            volume_ratio: at(&self.volume_ratio),
            day_return: (bar.close - prev_close) / prev_close,
        }
    }
}

/// Indicator values at the evaluation date t.
///
/// Every field is NaN when history is too short to compute it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub prev_close: f64,
    /// high at t-1
    pub prev_high: f64,
    /// EMA(ema_len), EMA5 by default.
    pub ema_short: f64,
    /// EMA(ema_long_len), EMA20 by default.
    pub ema_long: f64,
    pub rsi: f64,
    pub atr: f64,
    pub vol_sma: f64,
    pub volume_ratio: f64,
    /// close_t / close_{t-1} - 1
    pub day_return: f64,
}

impl IndicatorSnapshot {
    pub fn empty() -> Self {
        Self {
            close: f64::NAN,
            prev_close: f64::NAN,
            prev_high: f64::NAN,
            ema_short: f64::NAN,
            ema_long: f64::NAN,
            rsi: f64::NAN,
            atr: f64::NAN,
            vol_sma: f64::NAN,
            volume_ratio: f64::NAN,
            day_return: f64::NAN,
        }
    }
}
