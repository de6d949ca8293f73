//! Content-addressed in-memory blob store.
//!
//! Shared by the message cache and the media asset store. Identical content
//! under the same purpose tag always maps to the same key, so duplicate
//! payloads are stored exactly once and a transport can reference them by
//! hash instead of re-sending bytes.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Compute the content key for a payload.
///
/// Lowercase hex SHA-256 over the purpose tag, a NUL separator, and the
/// payload. The purpose tag keeps keyspaces of different stores disjoint
/// even for byte-identical content.
#[must_use]
pub fn content_key(purpose: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(purpose.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

/// Content-addressed in-memory store shared across sessions.
///
/// Safe for concurrent `insert`/`get` from worker threads and HTTP handlers.
/// Inserting under a key that is already present is a no-op; readers never
/// observe a partially written entry.
pub struct ContentStore<T> {
    entries: DashMap<String, Arc<T>>,
}

impl<T> ContentStore<T> {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert a value under `key`, keeping the existing entry on duplicate
    /// insertion. Returns the stored value.
    pub fn insert(&self, key: impl Into<String>, value: T) -> Arc<T> {
        self.entries
            .entry(key.into())
            .or_insert_with(|| Arc::new(value))
            .clone()
    }

    /// Look up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).map(|entry| Arc::clone(&entry))
    }

    /// Whether an entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry. Returns true if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ContentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
