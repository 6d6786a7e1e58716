//! Scan parameters and their validation.
//!
//! `ScanParameters` is validated once, before any per-stock work starts. A bad
//! parameter set is fatal for the whole scan; everything downstream assumes a
//! validated set.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ParamsHash;

pub const DEFAULT_MIN_LEG_PCT: f64 = 0.10;
pub const DEFAULT_ATR_K: f64 = 3.0;

/// Errors raised by `ScanParameters::validate`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("min_leg_pct and atr_k are mutually exclusive; set exactly one")]
    ConflictingDeviation,

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("retr_min ({min}) must be below retr_max ({max})")]
    RetracementRange { min: f64, max: f64 },

    #[error("{name} must lie in [0, 1], got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },

    #[error("c_tol must lie in [0, 1), got {0}")]
    CTolerance(f64),

    #[error("{name} must be at least {min}, got {value}")]
    TooSmall {
        name: &'static str,
        min: usize,
        value: usize,
    },

    #[error("time guard {min_name} ({min}) exceeds {max_name} ({max})")]
    InvertedGuard {
        min_name: &'static str,
        max_name: &'static str,
        min: usize,
        max: usize,
    },

    #[error("dynamic_zigzag only applies in percent mode")]
    DynamicThresholdInAtrMode,

    #[error("zigzag_floor ({floor}) exceeds zigzag_cap ({cap})")]
    ThresholdBounds { floor: f64, cap: f64 },

    #[error("parse parameters TOML: {0}")]
    Parse(String),
}

/// Deviation threshold used by the ZigZag extractor and the rise check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deviation {
    /// Fixed fraction of the candidate extremum (0.10 = 10%).
    Percent(f64),
    /// Multiple of ATR at the bar being scanned, in price units.
    Atr(f64),
}

/// Optional bar-count guards on the ABC legs. All disabled by default.
///
/// When `min_bars_ab` / `min_bars_bc` are set, the two exception switches let
/// a short leg through if it is fast and volume confirms it (see
/// `PatternMatcher`). Accepted exceptions are flagged on the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeGuards {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bars_ab: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bars_ab: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bars_bc: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bars_bc: Option<usize>,
    /// Maximum bars between C and the evaluation date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bars_from_c: Option<usize>,
    pub ab_exception: bool,
    pub bc_exception: bool,
}

impl Default for TimeGuards {
    fn default() -> Self {
        Self {
            min_bars_ab: None,
            max_bars_ab: None,
            min_bars_bc: None,
            max_bars_bc: None,
            max_bars_from_c: None,
            ab_exception: true,
            bc_exception: true,
        }
    }
}

/// ATR-adaptive ZigZag threshold for percent mode.
///
/// At the evaluation bar t the threshold is
/// `clamp(atr_multiplier · mean(ATR/close over the last atr_smooth bars), zigzag_floor, zigzag_cap)`.
/// Without a usable ATR in the window the fixed `min_leg_pct` applies. Only
/// the ZigZag uses this value; the A→B rise check keeps `min_leg_pct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicThreshold {
    pub atr_multiplier: f64,
    pub atr_smooth: usize,
    pub zigzag_floor: f64,
    pub zigzag_cap: f64,
}

impl Default for DynamicThreshold {
    fn default() -> Self {
        Self {
            atr_multiplier: 0.8,
            atr_smooth: 5,
            zigzag_floor: 0.02,
            zigzag_cap: 0.05,
        }
    }
}

/// Parameters for one scan run.
///
/// `min_leg_pct` and `atr_k` select the deviation mode; at most one may be
/// set. When neither is set the scan runs in percent mode with
/// `DEFAULT_MIN_LEG_PCT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParameters {
    pub lookback_bars: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_leg_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atr_k: Option<f64>,
    pub retr_min: f64,
    pub retr_max: f64,
    pub c_tol: f64,
    pub ema_len: usize,
    pub ema_long_len: usize,
    pub rsi_len: usize,
    pub atr_len: usize,
    pub vol_ma_len: usize,
    /// Volume ratio that `ema_volume_cross` must exceed.
    pub volume_threshold: f64,
    pub vol_cap_for_score: f64,
    /// Bars after C over which `early_score` decays linearly to zero.
    pub early_decay_bars: usize,
    pub cooldown_days: usize,
    pub guards: TimeGuards,
    /// Percent mode only. `None` keeps the ZigZag at `min_leg_pct`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_zigzag: Option<DynamicThreshold>,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            lookback_bars: 200,
            min_leg_pct: Some(DEFAULT_MIN_LEG_PCT),
            atr_k: None,
            retr_min: 0.30,
            retr_max: 0.70,
            c_tol: 0.0,
            ema_len: 5,
            ema_long_len: 20,
            rsi_len: 14,
            atr_len: 14,
            vol_ma_len: 20,
            volume_threshold: 1.0,
            vol_cap_for_score: 3.0,
            early_decay_bars: 12,
            cooldown_days: 20,
            guards: TimeGuards::default(),
            dynamic_zigzag: None,
        }
    }
}

impl ScanParameters {
    /// Default parameters in ATR mode (`atr_k` = 3.0).
    pub fn atr_mode() -> Self {
        Self {
            min_leg_pct: None,
            atr_k: Some(DEFAULT_ATR_K),
            ..Self::default()
        }
    }

    /// The active deviation mode. Call after `validate`.
    pub fn deviation(&self) -> Deviation {
        match (self.min_leg_pct, self.atr_k) {
            (_, Some(k)) => Deviation::Atr(k),
            (Some(p), None) => Deviation::Percent(p),
            (None, None) => Deviation::Percent(DEFAULT_MIN_LEG_PCT),
        }
    }

    /// Bars needed before every indicator in the snapshot is defined at t.
    pub fn min_history(&self) -> usize {
        let mut needed = self
            .ema_len
            .max(self.ema_long_len)
            .max(self.rsi_len + 1)
            .max(self.vol_ma_len + 1);
        if let Deviation::Atr(_) = self.deviation() {
            needed = needed.max(self.atr_len + 1);
        }
        needed
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.min_leg_pct.is_some() && self.atr_k.is_some() {
            return Err(ParamError::ConflictingDeviation);
        }
        match self.deviation() {
            Deviation::Percent(p) => positive("min_leg_pct", p)?,
            Deviation::Atr(k) => positive("atr_k", k)?,
        }

        unit_range("retr_min", self.retr_min)?;
        unit_range("retr_max", self.retr_max)?;
        if self.retr_min >= self.retr_max {
            return Err(ParamError::RetracementRange {
                min: self.retr_min,
                max: self.retr_max,
            });
        }
        if !(0.0..1.0).contains(&self.c_tol) {
            return Err(ParamError::CTolerance(self.c_tol));
        }

        at_least("lookback_bars", 3, self.lookback_bars)?;
        at_least("ema_len", 1, self.ema_len)?;
        at_least("ema_long_len", 1, self.ema_long_len)?;
        at_least("rsi_len", 1, self.rsi_len)?;
        at_least("atr_len", 1, self.atr_len)?;
        at_least("vol_ma_len", 1, self.vol_ma_len)?;
        at_least("early_decay_bars", 1, self.early_decay_bars)?;

        if self.volume_threshold.is_nan() || self.volume_threshold < 0.0 {
            return Err(ParamError::Negative {
                name: "volume_threshold",
                value: self.volume_threshold,
            });
        }
        positive("vol_cap_for_score", self.vol_cap_for_score)?;

        let g = &self.guards;
        ordered("min_bars_ab", g.min_bars_ab, "max_bars_ab", g.max_bars_ab)?;
        ordered("min_bars_bc", g.min_bars_bc, "max_bars_bc", g.max_bars_bc)?;

        if let Some(d) = &self.dynamic_zigzag {
            if self.atr_k.is_some() {
                return Err(ParamError::DynamicThresholdInAtrMode);
            }
            positive("atr_multiplier", d.atr_multiplier)?;
            at_least("atr_smooth", 1, d.atr_smooth)?;
            positive("zigzag_floor", d.zigzag_floor)?;
            positive("zigzag_cap", d.zigzag_cap)?;
            if d.zigzag_floor > d.zigzag_cap {
                return Err(ParamError::ThresholdBounds {
                    floor: d.zigzag_floor,
                    cap: d.zigzag_cap,
                });
            }
        }

        Ok(())
    }

    /// Structural identity of this parameter set.
    pub fn params_hash(&self) -> ParamsHash {
        let json = serde_json::to_string(self).unwrap_or_default();
        ParamsHash::from_bytes(json.as_bytes())
    }

    /// Parse parameters from a TOML string (missing keys take defaults).
    pub fn from_toml(content: &str) -> Result<Self, ParamError> {
        toml::from_str(content).map_err(|e| ParamError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ParamError> {
        toml::to_string_pretty(self).map_err(|e| ParamError::Parse(e.to_string()))
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ParamError> {
    // NaN fails this comparison too.
    if value > 0.0 {
        Ok(())
    } else {
        Err(ParamError::NonPositive { name, value })
    }
}

fn unit_range(name: &'static str, value: f64) -> Result<(), ParamError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamError::OutOfUnitRange { name, value })
    }
}

fn at_least(name: &'static str, min: usize, value: usize) -> Result<(), ParamError> {
    if value >= min {
        Ok(())
    } else {
        Err(ParamError::TooSmall { name, min, value })
    }
}

fn ordered(
    min_name: &'static str,
    min: Option<usize>,
    max_name: &'static str,
    max: Option<usize>,
) -> Result<(), ParamError> {
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(ParamError::InvertedGuard {
            min_name,
            max_name,
            min: lo,
            max: hi,
        }),
        _ => Ok(()),
    }
}
