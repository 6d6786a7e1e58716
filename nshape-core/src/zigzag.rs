//! ZigZag turning-point extraction.
//!
//! Reduces the last `lookback` bars of a series to an alternating sequence of
//! peaks (bar highs) and troughs (bar lows). A candidate extremum is only
//! committed once price has moved away from it by the deviation threshold,
//! so the trailing candidate is never part of the output.
//!
//! The extractor keeps no state between calls. In percent mode the threshold
//! can follow volatility (`DynamicThreshold`); it is then fixed per call from
//! ATR at the last bar.

use crate::domain::{Bar, PointKind, TurningPoint};
use crate::params::{Deviation, DynamicThreshold, ScanParameters};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZigZag {
    deviation: Deviation,
    lookback: usize,
}

/// (bar index, price)
type Candidate = (usize, f64);

#[derive(Debug, Clone, Copy)]
enum State {
    /// No bar seen yet.
    Empty,
    /// Direction not locked: running max and min since the window start.
    Undetermined { max: Candidate, min: Candidate },
    SeekingPeak(Candidate),
    SeekingTrough(Candidate),
}

impl ZigZag {
    pub fn new(deviation: Deviation, lookback: usize) -> Self {
        Self {
            deviation,
            lookback,
        }
    }

    pub fn from_params(params: &ScanParameters) -> Self {
        Self::new(params.deviation(), params.lookback_bars)
    }

    /// Like `from_params`, with a dynamic percent threshold resolved at the
    /// last bar of `bars`.
    pub fn for_series(params: &ScanParameters, bars: &[Bar], atr: &[f64]) -> Self {
        match (params.deviation(), &params.dynamic_zigzag) {
            (Deviation::Percent(fixed), Some(dynamic)) => {
                let pct = bars
                    .len()
                    .checked_sub(1)
                    .and_then(|t| dynamic_threshold(bars, atr, t, dynamic))
                    .unwrap_or(fixed);
                Self::new(Deviation::Percent(pct), params.lookback_bars)
            }
            _ => Self::from_params(params),
        }
    }

    pub fn deviation(&self) -> Deviation {
        self.deviation
    }

    /// Extract turning points from the last `lookback` bars.
    ///
    /// `atr` must be aligned with `bars`; it is only read in ATR mode and a
    /// missing or NaN value means no commit can happen on that bar.
    /// Returned indices point into `bars`.
    pub fn extract(&self, bars: &[Bar], atr: &[f64]) -> Vec<TurningPoint> {
        let start = bars.len().saturating_sub(self.lookback);
        let mut points = Vec::new();
        let mut state = State::Empty;

        for i in start..bars.len() {
            let bar = &bars[i];
            if bar.high.is_nan() || bar.low.is_nan() {
                continue;
            }
            let atr_i = atr.get(i).copied().unwrap_or(f64::NAN);

            // Raise or lower the running candidates. Strict comparisons keep
            // the earliest bar on ties.
            state = match state {
                State::Empty => State::Undetermined {
                    max: (i, bar.high),
                    min: (i, bar.low),
                },
                State::Undetermined { mut max, mut min } => {
                    if bar.high > max.1 {
                        max = (i, bar.high);
                    }
                    if bar.low < min.1 {
                        min = (i, bar.low);
                    }
                    State::Undetermined { max, min }
                }
                State::SeekingPeak(cand) if bar.high > cand.1 => State::SeekingPeak((i, bar.high)),
                State::SeekingTrough(cand) if bar.low < cand.1 => {
                    State::SeekingTrough((i, bar.low))
                }
                other => other,
            };

            // A commit can expose an older candidate that this same bar has
            // already moved away from, so keep stepping until nothing commits.
            loop {
                let (next, committed) = self.step(state, bars, i, atr_i);
                state = next;
                match committed {
                    Some(point) => points.push(point),
                    None => break,
                }
            }
        }

        points
    }

    /// Try to commit the current candidate against bar `i`.
    fn step(
        &self,
        state: State,
        bars: &[Bar],
        i: usize,
        atr_i: f64,
    ) -> (State, Option<TurningPoint>) {
        let bar = &bars[i];
        match state {
            State::Empty => (state, None),
            State::Undetermined { max, min } => {
                let from_max = max.0 < i && self.reached_down(max.1, bar.low, atr_i);
                let from_min = min.0 < i && self.reached_up(min.1, bar.high, atr_i);
                if from_max && (!from_min || max.0 <= min.0) {
                    let next = lowest_low(bars, max.0 + 1, i);
                    (
                        State::SeekingTrough(next),
                        Some(point(bars, max, PointKind::Peak)),
                    )
                } else if from_min {
                    let next = highest_high(bars, min.0 + 1, i);
                    (
                        State::SeekingPeak(next),
                        Some(point(bars, min, PointKind::Trough)),
                    )
                } else {
                    (state, None)
                }
            }
            State::SeekingPeak(cand) => {
                if cand.0 < i && self.reached_down(cand.1, bar.low, atr_i) {
                    let next = lowest_low(bars, cand.0 + 1, i);
                    (
                        State::SeekingTrough(next),
                        Some(point(bars, cand, PointKind::Peak)),
                    )
                } else {
                    (state, None)
                }
            }
            State::SeekingTrough(cand) => {
                if cand.0 < i && self.reached_up(cand.1, bar.high, atr_i) {
                    let next = highest_high(bars, cand.0 + 1, i);
                    (
                        State::SeekingPeak(next),
                        Some(point(bars, cand, PointKind::Trough)),
                    )
                } else {
                    (state, None)
                }
            }
        }
    }

    /// Has price fallen from `from` to `to` by at least the threshold?
    fn reached_down(&self, from: f64, to: f64, atr: f64) -> bool {
        match self.deviation {
            Deviation::Percent(p) => from > 0.0 && (from - to) / from >= p,
            Deviation::Atr(k) => !atr.is_nan() && from - to >= k * atr,
        }
    }

    /// Has price risen from `from` to `to` by at least the threshold?
    fn reached_up(&self, from: f64, to: f64, atr: f64) -> bool {
        match self.deviation {
            Deviation::Percent(p) => from > 0.0 && (to - from) / from >= p,
            Deviation::Atr(k) => !atr.is_nan() && to - from >= k * atr,
        }
    }
}

/// ATR-scaled percent threshold at bar `t`.
///
/// Averages ATR/close over the `atr_smooth` bars ending at t, skipping bars
/// where either is missing. `None` when no bar in the window qualifies.
pub fn dynamic_threshold(
    bars: &[Bar],
    atr: &[f64],
    t: usize,
    params: &DynamicThreshold,
) -> Option<f64> {
    let from = (t + 1).saturating_sub(params.atr_smooth);
    let (sum, n) = (from..=t)
        .filter_map(|i| {
            let close = bars.get(i)?.close;
            let atr = *atr.get(i)?;
            (close > 0.0 && atr.is_finite()).then(|| atr / close)
        })
        .fold((0.0, 0usize), |(sum, n), pct| (sum + pct, n + 1));
    if n == 0 {
        return None;
    }
    let smoothed = sum / n as f64;
    Some((params.atr_multiplier * smoothed).clamp(params.zigzag_floor, params.zigzag_cap))
}

fn point(bars: &[Bar], cand: Candidate, kind: PointKind) -> TurningPoint {
    TurningPoint {
        index: cand.0,
        date: bars[cand.0].date,
        price: cand.1,
        kind,
    }
}

/// Earliest bar with the highest high in `from..=to`.
fn highest_high(bars: &[Bar], from: usize, to: usize) -> Candidate {
    let mut best = (to, bars[to].high);
    for (offset, bar) in bars[from..=to].iter().enumerate() {
        if bar.high > best.1 || (bar.high == best.1 && from + offset < best.0) {
            best = (from + offset, bar.high);
        }
    }
    best
}

/// Earliest bar with the lowest low in `from..=to`.
fn lowest_low(bars: &[Bar], from: usize, to: usize) -> Candidate {
    let mut best = (to, bars[to].low);
    for (offset, bar) in bars[from..=to].iter().enumerate() {
        if bar.low < best.1 || (bar.low == best.1 && from + offset < best.0) {
            best = (from + offset, bar.low);
        }
    }
    best
}
