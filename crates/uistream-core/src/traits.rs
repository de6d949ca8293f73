//! Collaborator traits for external runtime services.
//!
//! The session runtime holds opaque handles to the state and uploaded-file
//! managers; their real implementations live outside this workspace. The
//! in-memory versions here back the demo app and tests.

use std::{
    collections::{HashMap, HashSet},
    sync::RwLock,
};

use serde_json::Value;

/// Per-session key-value state owned by an external state manager.
pub trait StateStore: Send + Sync {
    /// Read a state value.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a state value.
    fn set(&self, key: &str, value: Value);

    /// Remove a state value, returning it if present.
    fn remove(&self, key: &str) -> Option<Value>;
}

/// Uploaded-file manager owned by an external layer.
pub trait FileStore: Send + Sync {
    /// Track an uploaded file for a session.
    fn add_file(&self, session_id: &str, file_id: &str);

    /// Number of files tracked for a session.
    fn file_count(&self, session_id: &str) -> usize;

    /// Drop all files tracked for a session.
    fn remove_session_files(&self, session_id: &str);
}

/// In-memory state store for development and tests.
#[derive(Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStateStore {
    /// Create an empty state store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_owned(), value);
        }
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().ok()?.remove(key)
    }
}

/// In-memory uploaded-file tracker for development and tests.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, HashSet<String>>>,
}

impl MemoryFileStore {
    /// Create an empty file tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemoryFileStore {
    fn add_file(&self, session_id: &str, file_id: &str) {
        if let Ok(mut files) = self.files.write() {
            files
                .entry(session_id.to_owned())
                .or_default()
                .insert(file_id.to_owned());
        }
    }

    fn file_count(&self, session_id: &str) -> usize {
        self.files
            .read()
            .ok()
            .and_then(|files| files.get(session_id).map(HashSet::len))
            .unwrap_or(0)
    }

    fn remove_session_files(&self, session_id: &str) {
        if let Ok(mut files) = self.files.write() {
            files.remove(session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_state_store() {
        let store = MemoryStateStore::new();
        assert!(store.get("count").is_none());

        store.set("count", json!(3));
        assert_eq!(store.get("count"), Some(json!(3)));

        assert_eq!(store.remove("count"), Some(json!(3)));
        assert!(store.get("count").is_none());
    }

    #[test]
    fn test_memory_file_store() {
        let store = MemoryFileStore::new();
        store.add_file("s1", "upload-1");
        store.add_file("s1", "upload-2");
        store.add_file("s1", "upload-2");
        store.add_file("s2", "upload-3");

        assert_eq!(store.file_count("s1"), 2);
        assert_eq!(store.file_count("s2"), 1);

        store.remove_session_files("s1");
        assert_eq!(store.file_count("s1"), 0);
        assert_eq!(store.file_count("s2"), 1);
    }
}
