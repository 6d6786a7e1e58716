//! Rolling volume ratio.
//!
//! ratio[i] = volume[i] / mean(volume[i-window..i])
//!
//! The mean excludes zero-volume (suspended) bars. The ratio is NaN when
//! fewer than `window` prior bars exist, when every prior bar in the window
//! was suspended, or when bar i itself was suspended.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct VolumeRatio {
    window: usize,
    name: String,
}

impl VolumeRatio {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "volume window must be >= 1");
        Self {
            window,
            name: format!("volume_ratio_{window}"),
        }
    }
}

impl Indicator for VolumeRatio {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let sma = volume_sma(bars, self.window);
        bars.iter()
            .zip(sma)
            .map(|(bar, avg)| {
                if bar.volume == 0 || avg.is_nan() {
                    f64::NAN
                } else {
                    bar.volume as f64 / avg
                }
            })
            .collect()
    }
}

/// Mean volume of the `window` bars before each bar, ignoring suspended bars.
pub fn volume_sma(bars: &[Bar], window: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 {
        return result;
    }

    for i in window..n {
        let (sum, count) = bars[i - window..i]
            .iter()
            .filter(|b| b.volume > 0)
            .fold((0.0, 0usize), |(s, c), b| (s + b.volume as f64, c + 1));
        if count > 0 {
            result[i] = sum / count as f64;
        }
    }

    result
}
