//! Per-trade mutual exclusion.
//!
//! A transition reads the current status, checks its guard, writes and appends
//! an event. All four steps run while holding the lock for that trade id, so
//! two callers can never both pass a guard on a status one of them is about to
//! change. Different trade ids never share a lock.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct TradeLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TradeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // slots only the map still references are idle
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots.entry(key.to_string()).or_default().clone()
    }

    /// Runs `f` while owning `key`. Blocks behind any other holder of `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = self.slot(key);
        // a panic in a previous holder leaves no partial state behind: every
        // write goes through a single atomic batch
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Number of keys currently locked or waited on.
    pub fn tracked(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        slots.len()
    }
}
