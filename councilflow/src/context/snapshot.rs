//! Immutable, ordered snapshots of a run's context store.

use serde::{Deserialize, Serialize};

/// An immutable, insertion-ordered copy of a context store's entries.
///
/// Snapshots are what the audit sink persists and the report renderer
/// formats; they are detached from the live store and never mutate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextSnapshot {
    entries: Vec<(String, serde_json::Value)>,
}

impl ContextSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot from ordered entries.
    #[must_use]
    pub fn from_entries(entries: Vec<(String, serde_json::Value)>) -> Self {
        Self { entries }
    }

    /// Looks up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Checks whether a key is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns the keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(String, serde_json::Value)> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts the snapshot to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<'a> IntoIterator for &'a ContextSnapshot {
    type Item = &'a (String, serde_json::Value);
    type IntoIter = std::slice::Iter<'a, (String, serde_json::Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
