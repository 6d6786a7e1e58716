use chrono::NaiveDate;
use serde::Serialize;

use super::{AbcPattern, SignalFingerprint};
use crate::indicators::IndicatorSnapshot;
use crate::scoring::ScoreBreakdown;
use crate::trigger::TriggerFlags;

/// An emitted entry signal. Immutable once built by the emitter.
///
/// NaN snapshot fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    stock_id: String,
    signal_date: NaiveDate,
    bars_since_c: usize,
    pattern: AbcPattern,
    snapshot: IndicatorSnapshot,
    triggers: TriggerFlags,
    score: ScoreBreakdown,
}

impl Signal {
    pub(crate) fn new(
        stock_id: &str,
        signal_date: NaiveDate,
        bars_since_c: usize,
        pattern: AbcPattern,
        snapshot: IndicatorSnapshot,
        triggers: TriggerFlags,
        score: ScoreBreakdown,
    ) -> Self {
        Self {
            stock_id: stock_id.to_string(),
            signal_date,
            bars_since_c,
            pattern,
            snapshot,
            triggers,
            score,
        }
    }

    pub fn stock_id(&self) -> &str {
        &self.stock_id
    }

    pub fn signal_date(&self) -> NaiveDate {
        self.signal_date
    }

    /// Trading days between C and the signal bar.
    pub fn bars_since_c(&self) -> usize {
        self.bars_since_c
    }

    pub fn pattern(&self) -> &AbcPattern {
        &self.pattern
    }

    pub fn snapshot(&self) -> &IndicatorSnapshot {
        &self.snapshot
    }

    pub fn triggers(&self) -> &TriggerFlags {
        &self.triggers
    }

    pub fn score(&self) -> &ScoreBreakdown {
        &self.score
    }

    /// BLAKE3 of the signal's JSON. Equal fingerprints mean bit-identical output.
    pub fn fingerprint(&self) -> SignalFingerprint {
        let json = serde_json::to_string(self).unwrap_or_default();
        SignalFingerprint::from_bytes(json.as_bytes())
    }
}
