//! Signal scoring.
//!
//! Five components add up to at most 100:
//!
//! | component | max | driven by |
//! |---|---|---|
//! | retr   | 40 | closeness of the retracement to 50% |
//! | vol    | 25 | volume ratio, capped |
//! | early  | 15 | bars since C, linear decay |
//! | ma     | 10 | close vs the short and long EMA |
//! | health | 10 | RSI band, minus a penalty for a blow-off day |
//!
//! Each component is clamped to its own range before summing, and NaN inputs
//! contribute zero.

use serde::Serialize;

use crate::domain::AbcPattern;
use crate::indicators::IndicatorSnapshot;
use crate::params::ScanParameters;

pub const RETR_MAX: f64 = 40.0;
pub const VOL_MAX: f64 = 25.0;
pub const EARLY_MAX: f64 = 15.0;
pub const MA_STEP: f64 = 5.0;
pub const HEALTH_MAX: f64 = 10.0;
/// Upper edge of the full-marks RSI band.
pub const HEALTH_STRONG_RSI: f64 = 70.0;
/// Above this RSI the health score fades out.
pub const HEALTH_WARM_RSI: f64 = 75.0;
/// Health score between the two edges.
pub const HEALTH_WARM: f64 = 5.0;

/// Same-day return above which the health score is docked.
pub const OVEREXTENDED_RETURN: f64 = 0.09;
pub const OVEREXTENDED_PENALTY: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub retr_score: f64,
    pub vol_score: f64,
    pub early_score: f64,
    pub ma_score: f64,
    pub health_score: f64,
    /// round(Σ components), clamped to [0, 100]
    pub total: u8,
}

impl ScoreBreakdown {
    pub fn compute(
        pattern: &AbcPattern,
        snapshot: &IndicatorSnapshot,
        bars_since_c: usize,
        params: &ScanParameters,
    ) -> Self {
        let retr_score = retr_score(pattern.retr_pct);
        let vol_score = vol_score(snapshot.volume_ratio, params.vol_cap_for_score);
        let early_score = early_score(bars_since_c, params.early_decay_bars);
        let ma_score = ma_score(snapshot);
        let health_score = health_score(snapshot.rsi, snapshot.day_return);

        let sum = retr_score + vol_score + early_score + ma_score + health_score;
        Self {
            retr_score,
            vol_score,
            early_score,
            ma_score,
            health_score,
            total: sum.round().clamp(0.0, 100.0) as u8,
        }
    }
}

/// 40 at a 50% retracement, falling linearly to 0 at 0% and 100%.
pub fn retr_score(retr_pct: f64) -> f64 {
    if retr_pct.is_nan() {
        return 0.0;
    }
    (RETR_MAX * (1.0 - (retr_pct - 0.5).abs() / 0.5)).clamp(0.0, RETR_MAX)
}

pub fn vol_score(volume_ratio: f64, cap: f64) -> f64 {
    if volume_ratio.is_nan() || cap <= 0.0 {
        return 0.0;
    }
    (VOL_MAX * volume_ratio.min(cap) / cap).clamp(0.0, VOL_MAX)
}

/// Full marks on the day C is confirmed, zero from `decay_bars` onwards.
pub fn early_score(bars_since_c: usize, decay_bars: usize) -> f64 {
    if decay_bars == 0 {
        return 0.0;
    }
    EARLY_MAX * (1.0 - bars_since_c as f64 / decay_bars as f64).max(0.0)
}

pub fn ma_score(snapshot: &IndicatorSnapshot) -> f64 {
    let mut score = 0.0;
    if snapshot.close >= snapshot.ema_short {
        score += MA_STEP;
    }
    if snapshot.close >= snapshot.ema_long {
        score += MA_STEP;
    }
    score
}

/// RSI band: 10 on [50, 70], 5 on (70, 75], then linear from 5 at 75 to 0
/// at 90. Below 50, linear from 10 at 50 to 0 at 30.
pub fn health_score(rsi: f64, day_return: f64) -> f64 {
    let base = if rsi.is_nan() {
        0.0
    } else if rsi > HEALTH_WARM_RSI {
        (HEALTH_WARM * (90.0 - rsi) / 15.0).max(0.0)
    } else if rsi > HEALTH_STRONG_RSI {
        HEALTH_WARM
    } else if rsi < 50.0 {
        (HEALTH_MAX * (rsi - 30.0) / 20.0).max(0.0)
    } else {
        HEALTH_MAX
    };

    if day_return > OVEREXTENDED_RETURN {
        (base - OVEREXTENDED_PENALTY).max(0.0)
    } else {
        base
    }
}
