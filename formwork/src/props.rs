//! User-defined properties attached to elements.
//!
//! A property is either a plain [`Value`] (arbitrarily nested through
//! `Value::Map`/`Value::List`) or a derived cell: an explicit
//! current-value-plus-pending pair over an async compute closure. Reading is
//! always synchronous and returns the cached current value; `refresh` runs
//! the compute and settles the cell, making the asynchronous resolution
//! point explicit instead of a getter side effect.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;

use crate::value::Value;

/// Flat snapshot of current property values, handed to validators.
pub type PropsSnapshot = BTreeMap<String, Value>;

/// Async compute closure backing a derived property.
pub type DeriveFn = Arc<dyn Fn() -> BoxFuture<'static, Value> + Send + Sync>;

/// A derived property cell.
#[derive(Clone)]
pub struct DerivedProp {
    current: Arc<RwLock<Value>>,
    pending: Arc<AtomicBool>,
    compute: DeriveFn,
}

impl DerivedProp {
    fn new(compute: DeriveFn) -> Self {
        Self {
            current: Arc::new(RwLock::new(Value::Null)),
            pending: Arc::new(AtomicBool::new(false)),
            compute,
        }
    }

    /// The cached current value; `Value::Null` until the first `refresh`.
    pub fn current(&self) -> Value {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether a `refresh` is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Run the compute closure and settle the cell with its result.
    pub async fn refresh(&self) -> Value {
        self.pending.store(true, Ordering::SeqCst);
        let value = (self.compute)().await;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = value.clone();
        self.pending.store(false, Ordering::SeqCst);
        value
    }
}

#[derive(Clone)]
enum PropEntry {
    Plain(Value),
    Derived(DerivedProp),
}

/// Ordered name-to-property map owned by an element.
///
/// Cloning shares the underlying entries, so every handle onto one element
/// sees the same properties.
#[derive(Clone, Default)]
pub struct Props {
    entries: Arc<RwLock<Vec<(String, PropEntry)>>>,
}

impl Props {
    /// Create an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain property, replacing any existing entry of the same name.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.insert(name.into(), PropEntry::Plain(value));
    }

    /// Install a derived property, replacing any existing entry.
    pub fn derive(&self, name: impl Into<String>, compute: DeriveFn) {
        self.insert(name.into(), PropEntry::Derived(DerivedProp::new(compute)));
    }

    fn insert(&self, name: String, entry: PropEntry) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = entry;
        } else {
            entries.push((name, entry));
        }
    }

    /// Current value of a property; derived cells yield their cached value.
    pub fn get(&self, name: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, e)| match e {
                PropEntry::Plain(v) => v.clone(),
                PropEntry::Derived(cell) => cell.current(),
            })
    }

    /// Dotted-path lookup descending through `Value::Map` entries.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut parts = path.split('.');
        let head = parts.next()?;
        let mut current = self.get(head)?;

        for part in parts {
            current = current.as_map()?.get(part)?.clone();
        }

        Some(current)
    }

    /// The derived cell registered under a name, if any.
    pub fn derived(&self, name: &str) -> Option<DerivedProp> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .and_then(|(_, e)| match e {
                PropEntry::Derived(cell) => Some(cell.clone()),
                PropEntry::Plain(_) => None,
            })
    }

    /// Re-compute a derived property and return the settled value.
    ///
    /// Plain properties return their value unchanged.
    pub async fn refresh(&self, name: &str) -> Option<Value> {
        match self.derived(name) {
            Some(cell) => Some(cell.refresh().await),
            None => self.get(name),
        }
    }

    /// Flat snapshot of all current values, in declaration order.
    pub fn snapshot(&self) -> PropsSnapshot {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .map(|(n, e)| {
                let value = match e {
                    PropEntry::Plain(v) => v.clone(),
                    PropEntry::Derived(cell) => cell.current(),
                };
                (n.clone(), value)
            })
            .collect()
    }

    /// Whether any property exists under this name.
    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.iter().any(|(n, _)| n.as_str() == name)
    }
}
