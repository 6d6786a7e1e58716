//! nshape core — N-shaped retracement signal detection on daily bars.
//!
//! This crate holds the pure signal engine:
//! - Domain types (bars, turning points, ABC patterns, signals)
//! - Indicator engine (EMA, Wilder RSI, ATR, volume ratio)
//! - ZigZag turning-point extraction in percent or ATR mode
//! - Latest-triple ABC pattern matching
//! - Trigger confirmations and the 0–100 score
//! - Signal emitter with an injected cooldown store
//!
//! Nothing here performs I/O. Loading bars and fanning out over a universe
//! lives in `nshape-runner`.

pub mod cooldown;
pub mod domain;
pub mod emitter;
pub mod indicators;
pub mod params;
pub mod pattern;
pub mod scoring;
pub mod trigger;
pub mod zigzag;

pub use cooldown::{CooldownStore, MemoryCooldownStore, NoCooldown};
pub use domain::{AbcPattern, Bar, PointKind, Signal, TurningPoint};
pub use emitter::{Evaluation, SignalEmitter};
pub use params::{Deviation, DynamicThreshold, ParamError, ScanParameters, TimeGuards};
pub use pattern::{LegSeries, PatternMatcher, PatternRejection};
pub use scoring::ScoreBreakdown;
pub use trigger::TriggerFlags;
pub use zigzag::ZigZag;
