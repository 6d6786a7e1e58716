//! Entry confirmations evaluated on the snapshot at t.

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSnapshot;

/// RSI level at or above which momentum counts as strong.
pub const RSI_STRONG_LEVEL: f64 = 50.0;

/// Boolean confirmations. Any one of them authorizes a signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFlags {
    /// close_t > high_{t-1}
    pub break_yesterday_high: bool,
    /// close_t > EMA_short and volume ratio above the threshold
    pub ema_volume_cross: bool,
    /// RSI_t >= 50
    pub rsi_strong: bool,
}

impl TriggerFlags {
    /// Every comparison against NaN is false, so missing history never fires.
    pub fn evaluate(snapshot: &IndicatorSnapshot, volume_threshold: f64) -> Self {
        Self {
            break_yesterday_high: snapshot.close > snapshot.prev_high,
            ema_volume_cross: snapshot.close > snapshot.ema_short
                && snapshot.volume_ratio > volume_threshold,
            rsi_strong: snapshot.rsi >= RSI_STRONG_LEVEL,
        }
    }

    pub fn any(&self) -> bool {
        self.break_yesterday_high || self.ema_volume_cross || self.rsi_strong
    }

    /// Names of the flags that fired, in declaration order.
    pub fn fired(&self) -> Vec<&'static str> {
        [
            ("break_yesterday_high", self.break_yesterday_high),
            ("ema_volume_cross", self.ema_volume_cross),
            ("rsi_strong", self.rsi_strong),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
        .collect()
    }
}
