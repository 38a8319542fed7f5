//! Per-symbol regime cache
//!
//! Each symbol owns its own mutex-guarded slot, so a read-modify-write for one
//! symbol is atomic while different symbols never wait on each other. The
//! outer map lock is only taken for writing when a symbol is first seen or
//! when entries are cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{Regime, Symbol};

/// Last regime returned for a symbol and when it was last confirmed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub regime: Regime,
    pub last_update: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(regime: Regime, last_update: DateTime<Utc>) -> Self {
        Self {
            regime,
            last_update,
        }
    }

    /// Seconds since the last update; negative if the clock went backwards
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_update).num_milliseconds() as f64 / 1000.0
    }
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// In-memory store keyed by symbol. Never persisted.
#[derive(Debug, Default)]
pub struct RegimeCache {
    slots: RwLock<HashMap<Symbol, Slot>>,
}

/// Read-only view of one tracked symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub regime: Regime,
    pub age_secs: i64,
}

/// Read-only view of the whole cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub tracked_symbols: usize,
    pub symbols: BTreeMap<Symbol, SymbolSummary>,
}

impl RegimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, symbol: &Symbol) -> Slot {
        {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(symbol) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(symbol.clone()).or_default())
    }

    /// Run `f` against the symbol's entry while holding that symbol's lock.
    ///
    /// This is the only way entries change outside of `clear`.
    pub fn update<R>(&self, symbol: &Symbol, f: impl FnOnce(&mut Option<CacheEntry>) -> R) -> R {
        let slot = self.slot(symbol);
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *entry)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<CacheEntry> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(symbol)?;
        let entry = *slot.lock().unwrap_or_else(PoisonError::into_inner);
        entry
    }

    /// Remove one symbol, or everything when `symbol` is `None`.
    /// Returns how many entries were removed.
    pub fn clear(&self, symbol: Option<&Symbol>) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        match symbol {
            Some(symbol) => slots
                .remove(symbol)
                .map(|slot| usize::from(is_occupied(&slot)))
                .unwrap_or(0),
            None => slots.drain().filter(|(_, slot)| is_occupied(slot)).count(),
        }
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| is_occupied(slot)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consistent snapshot of every populated entry
    pub fn entries(&self) -> Vec<(Symbol, CacheEntry)> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots
            .iter()
            .filter_map(|(symbol, slot)| {
                let entry = *slot.lock().unwrap_or_else(PoisonError::into_inner);
                entry.map(|e| (symbol.clone(), e))
            })
            .collect()
    }

    pub fn summary(&self, now: DateTime<Utc>) -> CacheSummary {
        let symbols: BTreeMap<Symbol, SymbolSummary> = self
            .entries()
            .into_iter()
            .map(|(symbol, entry)| {
                let age_secs = (now - entry.last_update).num_seconds().max(0);
                (
                    symbol,
                    SymbolSummary {
                        regime: entry.regime,
                        age_secs,
                    },
                )
            })
            .collect();

        CacheSummary {
            tracked_symbols: symbols.len(),
            symbols,
        }
    }
}

fn is_occupied(slot: &Slot) -> bool {
    slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
}
