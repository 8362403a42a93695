//! Tracker for named in-flight asynchronous operations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Tracks which named operations are currently in flight.
///
/// Elements register their validation runs here so consumers can observe a
/// `pending` state while asynchronous validators settle. Entries are
/// counted, so overlapping runs of the same operation stay pending until the
/// last one settles. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct Pending {
    counts: Arc<RwLock<HashMap<String, usize>>>,
}

impl Pending {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one run of an operation as in flight.
    pub fn add(&self, key: impl Into<String>) {
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        *counts.entry(key.into()).or_insert(0) += 1;
    }

    /// Mark one run of an operation as settled.
    pub fn kill(&self, key: &str) {
        let mut counts = self.counts.write().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = counts.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(key);
            }
        }
    }

    /// Settle an operation entirely, whatever its count.
    pub fn clear(&self, key: &str) {
        self.counts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Check whether a specific operation is in flight.
    pub fn is_pending(&self, key: &str) -> bool {
        self.counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    /// Check whether anything at all is in flight.
    pub fn is_any_pending(&self) -> bool {
        !self
            .counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}
