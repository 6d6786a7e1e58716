//! Turning points and the ABC retracement leg built from them.

use chrono::NaiveDate;
use serde::Serialize;

/// Which side of the swing a turning point sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Peak,
    Trough,
}

/// A confirmed ZigZag extremum.
///
/// `index` points into the bar slice the extractor was given. Peaks carry the
/// bar high, troughs the bar low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TurningPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub kind: PointKind,
}

/// A validated trough (A) → peak (B) → trough (C) leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AbcPattern {
    pub a: TurningPoint,
    pub b: TurningPoint,
    pub c: TurningPoint,
    /// (B − A) / A
    pub rise_pct: f64,
    /// (B − C) / (B − A)
    pub retr_pct: f64,
    pub bars_ab: usize,
    pub bars_bc: usize,
    /// A→B was shorter than `min_bars_ab` and passed on the fast-rise exception.
    pub ab_is_exception: bool,
    /// B→C was shorter than `min_bars_bc` and passed on the quick-pullback exception.
    pub bc_is_exception: bool,
}

impl AbcPattern {
    /// Build the leg metrics from three turning points. Validation lives in
    /// `PatternMatcher::match_latest`; this only does the arithmetic.
    pub fn from_points(a: TurningPoint, b: TurningPoint, c: TurningPoint) -> Self {
        Self {
            a,
            b,
            c,
            rise_pct: rise_pct(a.price, b.price),
            retr_pct: retracement_pct(a.price, b.price, c.price),
            bars_ab: b.index - a.index,
            bars_bc: c.index - b.index,
            ab_is_exception: false,
            bc_is_exception: false,
        }
    }
}

/// Relative rise from `a` to `b`.
pub fn rise_pct(a: f64, b: f64) -> f64 {
    (b - a) / a
}

/// Share of the A→B rise given back by C. NaN for a flat or inverted leg.
pub fn retracement_pct(a: f64, b: f64, c: f64) -> f64 {
    let leg = b - a;
    if leg <= 0.0 {
        return f64::NAN;
    }
    (b - c) / leg
}
