//! Domain types for the N-shape scanner.

pub mod bar;
pub mod ids;
pub mod pattern;
pub mod signal;

pub use bar::{validate_series, Bar, SeriesError};
pub use ids::{ParamsHash, SignalFingerprint};
pub use pattern::{AbcPattern, PointKind, TurningPoint};
pub use signal::Signal;

/// Stock identifier (exchange ticker, e.g. "2330").
pub type StockId = String;
