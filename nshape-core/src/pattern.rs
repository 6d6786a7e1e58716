//! ABC pattern matching.
//!
//! Only the most recent trough → peak → trough triple is considered. If it
//! fails validation the stock has no pattern for this date, even when an older
//! triple in the window would have passed. Keeping to the latest triple keeps
//! matching O(turning points) and avoids reporting stale, overlapping legs.
//!
//! Leg-length exceptions, when `min_bars_ab` / `min_bars_bc` are set:
//! - A→B shorter than the minimum passes if the rise reaches
//!   `max(min_leg_pct, 1.8·ATR[B]/close[B])` and volume ratio at B is ≥ 1.5.
//! - B→C of exactly two bars passes if the retracement is within [0.30, 0.70]
//!   and volume ratio at C is ≥ 1.2.

use serde::{Deserialize, Serialize};

use crate::domain::{AbcPattern, Bar, PointKind, TurningPoint};
use crate::indicators::IndicatorSeries;
use crate::params::{Deviation, ScanParameters, TimeGuards};

pub const AB_EXCEPTION_ATR_MULT: f64 = 1.8;
pub const AB_EXCEPTION_VOLUME_RATIO: f64 = 1.5;
pub const BC_EXCEPTION_BARS: usize = 2;
pub const BC_EXCEPTION_RETR_MIN: f64 = 0.30;
pub const BC_EXCEPTION_RETR_MAX: f64 = 0.70;
pub const BC_EXCEPTION_VOLUME_RATIO: f64 = 1.2;

/// Why the latest triple was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternRejection {
    /// Fewer than three turning points.
    TooFewPoints,
    /// No trough with two predecessors.
    NoTriple,
    /// A → B rise below the minimum leg.
    InsufficientRise,
    /// B → C retracement outside [retr_min, retr_max].
    RetracementOutOfRange,
    /// C undercuts A beyond the tolerance.
    CBelowA,
    AbTooShort,
    AbTooLong,
    BcTooShort,
    BcTooLong,
    /// C is too far behind the evaluation bar.
    Stale,
}

/// Per-bar inputs the matcher reads, aligned with the bars the turning points
/// index into. Missing entries read as NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegSeries<'a> {
    pub bars: &'a [Bar],
    /// Read by the ATR-mode rise check and the A→B exception.
    pub atr: &'a [f64],
    /// Read by both leg exceptions.
    pub volume_ratio: &'a [f64],
}

impl<'a> LegSeries<'a> {
    pub fn new(bars: &'a [Bar], series: &'a IndicatorSeries) -> Self {
        Self {
            bars,
            atr: &series.atr,
            volume_ratio: &series.volume_ratio,
        }
    }

    fn atr_at(&self, i: usize) -> f64 {
        self.atr.get(i).copied().unwrap_or(f64::NAN)
    }

    fn volume_ratio_at(&self, i: usize) -> f64 {
        self.volume_ratio.get(i).copied().unwrap_or(f64::NAN)
    }

    fn close_at(&self, i: usize) -> f64 {
        self.bars.get(i).map_or(f64::NAN, |b| b.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatcher {
    deviation: Deviation,
    retr_min: f64,
    retr_max: f64,
    c_tol: f64,
    guards: TimeGuards,
}

impl PatternMatcher {
    pub fn from_params(params: &ScanParameters) -> Self {
        Self {
            deviation: params.deviation(),
            retr_min: params.retr_min,
            retr_max: params.retr_max,
            c_tol: params.c_tol,
            guards: params.guards,
        }
    }

    /// The latest triple if it passes, `None` otherwise.
    pub fn match_latest(
        &self,
        points: &[TurningPoint],
        series: &LegSeries<'_>,
        eval_index: usize,
    ) -> Option<AbcPattern> {
        self.match_latest_detailed(points, series, eval_index).ok()
    }

    /// Validate the most recent triple, reporting why it failed.
    ///
    /// `eval_index` is the bar being evaluated and is only read by the
    /// freshness guard.
    pub fn match_latest_detailed(
        &self,
        points: &[TurningPoint],
        series: &LegSeries<'_>,
        eval_index: usize,
    ) -> Result<AbcPattern, PatternRejection> {
        if points.len() < 3 {
            return Err(PatternRejection::TooFewPoints);
        }

        let k = points
            .iter()
            .rposition(|p| p.kind == PointKind::Trough)
            .filter(|&k| k >= 2)
            .ok_or(PatternRejection::NoTriple)?;
        let (a, b, c) = (points[k - 2], points[k - 1], points[k]);
        if a.kind != PointKind::Trough || b.kind != PointKind::Peak {
            return Err(PatternRejection::NoTriple);
        }

        let mut pattern = AbcPattern::from_points(a, b, c);

        let rise_ok = match self.deviation {
            Deviation::Percent(min_leg) => pattern.rise_pct >= min_leg,
            Deviation::Atr(k) => {
                let atr_b = series.atr_at(b.index);
                !atr_b.is_nan() && b.price - a.price >= k * atr_b
            }
        };
        if !rise_ok {
            return Err(PatternRejection::InsufficientRise);
        }

        // NaN (flat leg) fails the range check.
        if !(pattern.retr_pct >= self.retr_min && pattern.retr_pct <= self.retr_max) {
            return Err(PatternRejection::RetracementOutOfRange);
        }

        if c.price < a.price * (1.0 - self.c_tol) {
            return Err(PatternRejection::CBelowA);
        }

        self.check_guards(&mut pattern, series, eval_index)?;

        Ok(pattern)
    }

    fn check_guards(
        &self,
        p: &mut AbcPattern,
        series: &LegSeries<'_>,
        eval_index: usize,
    ) -> Result<(), PatternRejection> {
        let g = &self.guards;
        if g.min_bars_ab.is_some_and(|min| p.bars_ab < min) {
            if !(g.ab_exception && self.fast_rise(p, series)) {
                return Err(PatternRejection::AbTooShort);
            }
            p.ab_is_exception = true;
        }
        if g.max_bars_ab.is_some_and(|max| p.bars_ab > max) {
            return Err(PatternRejection::AbTooLong);
        }
        if g.min_bars_bc.is_some_and(|min| p.bars_bc < min) {
            if !(g.bc_exception && quick_pullback(p, series)) {
                return Err(PatternRejection::BcTooShort);
            }
            p.bc_is_exception = true;
        }
        if g.max_bars_bc.is_some_and(|max| p.bars_bc > max) {
            return Err(PatternRejection::BcTooLong);
        }
        if g
            .max_bars_from_c
            .is_some_and(|max| eval_index.saturating_sub(p.c.index) > max)
        {
            return Err(PatternRejection::Stale);
        }
        Ok(())
    }

    /// A→B rose by at least 1.8 ATR (as a fraction of close at B) and the
    /// minimum leg, on volume.
    fn fast_rise(&self, p: &AbcPattern, series: &LegSeries<'_>) -> bool {
        let b = p.b.index;
        let atr_pct = series.atr_at(b) / series.close_at(b).max(1e-9);
        if atr_pct.is_nan() {
            return false;
        }
        let min_leg = match self.deviation {
            Deviation::Percent(pct) => pct,
            Deviation::Atr(_) => 0.0,
        };
        p.rise_pct >= min_leg.max(AB_EXCEPTION_ATR_MULT * atr_pct)
            && series.volume_ratio_at(b) >= AB_EXCEPTION_VOLUME_RATIO
    }
}

/// Two-bar B→C with a moderate retracement, on volume.
fn quick_pullback(p: &AbcPattern, series: &LegSeries<'_>) -> bool {
    p.bars_bc == BC_EXCEPTION_BARS
        && (BC_EXCEPTION_RETR_MIN..=BC_EXCEPTION_RETR_MAX).contains(&p.retr_pct)
        && series.volume_ratio_at(p.c.index) >= BC_EXCEPTION_VOLUME_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tp(index: usize, price: f64, kind: PointKind) -> TurningPoint {
        TurningPoint {
            index,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Duration::days(index as i64),
            price,
            kind,
        }
    }

    fn abc(a: f64, b: f64, c: f64) -> Vec<TurningPoint> {
        vec![
            tp(10, a, PointKind::Trough),
            tp(20, b, PointKind::Peak),
            tp(26, c, PointKind::Trough),
        ]
    }

    fn matcher() -> PatternMatcher {
        PatternMatcher::from_params(&ScanParameters::default())
    }

    fn none() -> LegSeries<'static> {
        LegSeries::default()
    }

    #[test]
    fn worked_example_is_admitted() {
        let p = matcher().match_latest_detailed(&abc(165.30, 245.80, 192.50), &none(), 30).unwrap();
        assert!((p.retr_pct - 0.662_111_801_242_236).abs() < 1e-9);
        assert_eq!(p.bars_ab, 10);
        assert_eq!(p.bars_bc, 6);
    }

    #[test]
    fn rise_boundary_is_inclusive() {
        // rise = 0.10 exactly, retracement 0.5
        assert!(matcher().match_latest_detailed(&abc(100.0, 110.0, 105.0), &none(), 30).is_ok());
        // rise = 0.0999
        assert_eq!(
            matcher().match_latest_detailed(&abc(100.0, 109.99, 105.0), &none(), 30),
            Err(PatternRejection::InsufficientRise)
        );
    }

    #[test]
    fn retracement_bounds() {
        // retr = 0.2
        assert_eq!(
            matcher().match_latest_detailed(&abc(100.0, 150.0, 140.0), &none(), 30),
            Err(PatternRejection::RetracementOutOfRange)
        );
        // retr = 0.8
        assert_eq!(
            matcher().match_latest_detailed(&abc(100.0, 150.0, 110.0), &none(), 30),
            Err(PatternRejection::RetracementOutOfRange)
        );
        // retr = 0.3 and 0.7 both admitted
        assert!(matcher().match_latest_detailed(&abc(100.0, 150.0, 135.0), &none(), 30).is_ok());
        assert!(matcher().match_latest_detailed(&abc(100.0, 150.0, 115.0), &none(), 30).is_ok());
    }

    #[test]
    fn c_below_a_rejected_without_tolerance() {
        // retr = 1.0002 passes a widened range, leaving only the C check.
        let loose = PatternMatcher {
            retr_max: 1.1,
            ..matcher()
        };
        let points = abc(100.0, 150.0, 99.99);
        assert_eq!(
            loose.match_latest_detailed(&points, &none(), 30),
            Err(PatternRejection::CBelowA)
        );
        let tolerant = PatternMatcher {
            c_tol: 0.01,
            ..loose
        };
        assert!(tolerant.match_latest_detailed(&points, &none(), 30).is_ok());
    }

    #[test]
    fn only_latest_triple_is_evaluated() {
        // Older triple (idx 0..2) is valid; latest (idx 2..4) retraces too little.
        let points = vec![
            tp(0, 100.0, PointKind::Trough),
            tp(5, 150.0, PointKind::Peak),
            tp(9, 125.0, PointKind::Trough),
            tp(15, 200.0, PointKind::Peak),
            tp(20, 190.0, PointKind::Trough),
        ];
        assert_eq!(
            matcher().match_latest_detailed(&points, &none(), 25),
            Err(PatternRejection::RetracementOutOfRange)
        );
    }

    #[test]
    fn trailing_peak_is_skipped() {
        let mut points = abc(100.0, 150.0, 125.0);
        points.push(tp(30, 160.0, PointKind::Peak));
        let p = matcher().match_latest(&points, &none(), 32).unwrap();
        assert_eq!(p.c.index, 26);
    }

    #[test]
    fn too_few_points() {
        let points = vec![tp(0, 100.0, PointKind::Trough), tp(5, 150.0, PointKind::Peak)];
        assert_eq!(
            matcher().match_latest_detailed(&points, &none(), 10),
            Err(PatternRejection::TooFewPoints)
        );
    }

    #[test]
    fn no_triple_when_only_trough_is_too_early() {
        let points = vec![
            tp(0, 150.0, PointKind::Peak),
            tp(5, 100.0, PointKind::Trough),
            tp(9, 130.0, PointKind::Peak),
        ];
        assert_eq!(
            matcher().match_latest_detailed(&points, &none(), 10),
            Err(PatternRejection::NoTriple)
        );
    }

    #[test]
    fn atr_mode_rise_uses_atr_at_b() {
        let m = PatternMatcher::from_params(&ScanParameters::atr_mode());
        let points = abc(100.0, 112.0, 106.0);
        let with_atr = |atr_b: f64| {
            let mut atr = vec![f64::NAN; 30];
            atr[20] = atr_b;
            let series = LegSeries {
                atr: &atr,
                ..LegSeries::default()
            };
            m.match_latest_detailed(&points, &series, 30)
        };
        // 3 * 4 = 12 → exactly enough
        assert!(with_atr(4.0).is_ok());
        assert_eq!(with_atr(4.1), Err(PatternRejection::InsufficientRise));
        assert_eq!(with_atr(f64::NAN), Err(PatternRejection::InsufficientRise));
    }

    #[test]
    fn time_guards() {
        let params = ScanParameters {
            guards: TimeGuards {
                min_bars_ab: Some(3),
                max_bars_ab: Some(8),
                min_bars_bc: Some(2),
                max_bars_bc: Some(15),
                max_bars_from_c: Some(12),
                ..TimeGuards::default()
            },
            ..ScanParameters::default()
        };
        let m = PatternMatcher::from_params(&params);
        // bars_ab = 10 > 8
        assert_eq!(
            m.match_latest_detailed(&abc(100.0, 150.0, 125.0), &none(), 30),
            Err(PatternRejection::AbTooLong)
        );

        let relaxed = PatternMatcher::from_params(&ScanParameters {
            guards: TimeGuards {
                max_bars_from_c: Some(3),
                ..TimeGuards::default()
            },
            ..ScanParameters::default()
        });
        // C at 26, evaluation at 30 → 4 bars
        assert_eq!(
            relaxed.match_latest_detailed(&abc(100.0, 150.0, 125.0), &none(), 30),
            Err(PatternRejection::Stale)
        );
        assert!(relaxed.match_latest_detailed(&abc(100.0, 150.0, 125.0), &none(), 29).is_ok());
    }

    fn flat_bars(close: f64, n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        (0..n)
            .map(|i| Bar {
                date: base + chrono::Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn min_bars(ab: Option<usize>, bc: Option<usize>) -> PatternMatcher {
        PatternMatcher::from_params(&ScanParameters {
            guards: TimeGuards {
                min_bars_ab: ab,
                min_bars_bc: bc,
                ..TimeGuards::default()
            },
            ..ScanParameters::default()
        })
    }

    #[test]
    fn short_fast_rise_on_volume_is_an_exception() {
        // A→B in 2 bars, +30%, retracement 0.5
        let points = vec![
            tp(10, 100.0, PointKind::Trough),
            tp(12, 130.0, PointKind::Peak),
            tp(18, 115.0, PointKind::Trough),
        ];
        let bars = flat_bars(130.0, 30);
        let m = min_bars(Some(3), None);
        let run = |m: &PatternMatcher, atr_b: f64, vr_b: f64| {
            let mut atr = vec![f64::NAN; 30];
            let mut vr = vec![f64::NAN; 30];
            atr[12] = atr_b;
            vr[12] = vr_b;
            let series = LegSeries {
                bars: &bars,
                atr: &atr,
                volume_ratio: &vr,
            };
            m.match_latest_detailed(&points, &series, 20)
        };

        let p = run(&m, 2.0, 1.6).unwrap();
        assert!(p.ab_is_exception);
        assert!(!p.bc_is_exception);

        // not enough volume at B
        assert_eq!(run(&m, 2.0, 1.4), Err(PatternRejection::AbTooShort));
        // 1.8 * 30 / 130 ≈ 0.415 > 0.30 rise
        assert_eq!(run(&m, 30.0, 1.6), Err(PatternRejection::AbTooShort));
        assert_eq!(run(&m, f64::NAN, 1.6), Err(PatternRejection::AbTooShort));

        let strict = PatternMatcher {
            guards: TimeGuards {
                ab_exception: false,
                ..m.guards
            },
            ..m
        };
        assert_eq!(run(&strict, 2.0, 1.6), Err(PatternRejection::AbTooShort));
    }

    #[test]
    fn two_bar_pullback_on_volume_is_an_exception() {
        let m = min_bars(None, Some(3));
        let run = |m: &PatternMatcher, c: TurningPoint, vr_c: f64| {
            let points = vec![
                tp(10, 100.0, PointKind::Trough),
                tp(20, 150.0, PointKind::Peak),
                c,
            ];
            let mut vr = vec![f64::NAN; 30];
            vr[c.index] = vr_c;
            let series = LegSeries {
                volume_ratio: &vr,
                ..LegSeries::default()
            };
            m.match_latest_detailed(&points, &series, 25)
        };

        let p = run(&m, tp(22, 125.0, PointKind::Trough), 1.3).unwrap();
        assert!(p.bc_is_exception);
        assert!(!p.ab_is_exception);

        assert_eq!(
            run(&m, tp(22, 125.0, PointKind::Trough), 1.1),
            Err(PatternRejection::BcTooShort)
        );
        // one bar is never enough
        assert_eq!(
            run(&m, tp(21, 125.0, PointKind::Trough), 1.3),
            Err(PatternRejection::BcTooShort)
        );

        // retracement 0.75 passes a widened range but not the exception band
        let wide = PatternMatcher {
            retr_max: 0.8,
            ..m
        };
        assert_eq!(
            run(&wide, tp(22, 112.5, PointKind::Trough), 1.3),
            Err(PatternRejection::BcTooShort)
        );

        let strict = PatternMatcher {
            guards: TimeGuards {
                bc_exception: false,
                ..m.guards
            },
            ..m
        };
        assert_eq!(
            run(&strict, tp(22, 125.0, PointKind::Trough), 1.3),
            Err(PatternRejection::BcTooShort)
        );
    }

    #[test]
    fn legs_within_guards_are_not_exceptions() {
        let m = min_bars(Some(3), Some(3));
        let p = m.match_latest_detailed(&abc(100.0, 150.0, 125.0), &none(), 30).unwrap();
        assert!(!p.ab_is_exception);
        assert!(!p.bc_is_exception);
    }
}
