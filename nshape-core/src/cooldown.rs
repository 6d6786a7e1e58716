//! Per-stock signal cooldown state.
//!
//! The store is injected into the emitter and lives for one scan run. It keeps
//! only the most recent signal date per stock.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;

/// Where the emitter looks up and records the last signal date of each stock.
///
/// Implementations must be safe to share across the scan's worker threads.
pub trait CooldownStore: Send + Sync {
    fn last_signal_date(&self, stock_id: &str) -> Option<NaiveDate>;

    /// Record an emission. Last write wins.
    fn record_signal(&self, stock_id: &str, date: NaiveDate);
}

/// In-memory store behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryCooldownStore {
    last: RwLock<HashMap<String, NaiveDate>>,
}

impl MemoryCooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.last.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.read().is_empty()
    }
}

impl CooldownStore for MemoryCooldownStore {
    fn last_signal_date(&self, stock_id: &str) -> Option<NaiveDate> {
        self.last.read().get(stock_id).copied()
    }

    fn record_signal(&self, stock_id: &str, date: NaiveDate) {
        self.last.write().insert(stock_id.to_string(), date);
    }
}

/// A store that never suppresses anything and forgets every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCooldown;

impl CooldownStore for NoCooldown {
    fn last_signal_date(&self, _stock_id: &str) -> Option<NaiveDate> {
        None
    }

    fn record_signal(&self, _stock_id: &str, _date: NaiveDate) {}
}
