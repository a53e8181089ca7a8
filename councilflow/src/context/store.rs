//! The write-once context store threaded through one pipeline run.

use super::ContextSnapshot;
use crate::errors::{DuplicateKeyError, MissingKeyError};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct StoreInner {
    values: HashMap<String, serde_json::Value>,
    // Insertion order, so snapshots reconstruct the run's provenance.
    order: Vec<String>,
}

/// A per-run, append-only key/value bag.
///
/// Keys are unique for the lifetime of a run: once written, a key is
/// immutable (`put` on an existing key is a `DuplicateKeyError`). The
/// store is owned by exactly one orchestrator run and never shared
/// across concurrent runs.
#[derive(Debug, Default)]
pub struct ContextStore {
    inner: RwLock<StoreInner>,
}

impl ContextStore {
    /// Creates a new empty context store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the store with the seed entries for a new run.
    ///
    /// Atomic: the whole batch is validated before the first insert, so
    /// a rejected seed leaves the store exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKeyError` if a seed key collides with another
    /// seed key or with an already-present entry.
    pub fn seed<I, K>(&self, entries: I) -> Result<(), DuplicateKeyError>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let entries: Vec<(String, serde_json::Value)> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let mut inner = self.inner.write();
        let mut batch: HashSet<&str> = HashSet::new();
        for (key, _) in &entries {
            if inner.values.contains_key(key) || !batch.insert(key) {
                return Err(DuplicateKeyError::new(key.clone()));
            }
        }
        for (key, value) in entries {
            inner.order.push(key.clone());
            inner.values.insert(key, value);
        }
        Ok(())
    }

    /// Returns the value for `key`.
    ///
    /// For a validated pipeline executed in order this never fails; a
    /// miss at run time is surfaced by the orchestrator as a defect.
    ///
    /// # Errors
    ///
    /// Returns `MissingKeyError` if the key is absent.
    pub fn get(&self, key: &str) -> Result<serde_json::Value, MissingKeyError> {
        self.inner
            .read()
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| MissingKeyError::new(key))
    }

    /// Returns the value for `key`, or `None` if absent.
    #[must_use]
    pub fn try_get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.read().values.get(key).cloned()
    }

    /// Inserts `key -> value`, enforcing write-once semantics.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateKeyError` if the key already exists.
    pub fn put(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), DuplicateKeyError> {
        let key = key.into();
        let mut inner = self.inner.write();

        if inner.values.contains_key(&key) {
            return Err(DuplicateKeyError::new(key));
        }

        inner.order.push(key.clone());
        inner.values.insert(key, value);
        Ok(())
    }

    /// Checks whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().values.contains_key(key)
    }

    /// Returns all keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().values.is_empty()
    }

    /// Returns an immutable, insertion-ordered copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        let inner = self.inner.read();
        let entries = inner
            .order
            .iter()
            .filter_map(|k| inner.values.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        ContextSnapshot::from_entries(entries)
    }
}
