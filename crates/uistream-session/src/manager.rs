//! Session lifecycle tracking.

use std::{
    sync::Arc,
    time::SystemTime,
};

use dashmap::DashMap;
use uistream_core::{FileStore, StateStore};
use uuid::Uuid;

use crate::context::{OutputCallback, SessionContext};

struct SessionEntry {
    context: Arc<SessionContext>,
    created_at: SystemTime,
}

/// Tracks the live sessions of a running server.
///
/// Safe for concurrent access from transport and HTTP workers. Each session
/// owns exactly one context; removing the session drops the runtime's
/// reference so no further telemetry accumulates once the owning worker
/// lets go of its own handle.
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session with a generated identifier.
    pub fn create_session(
        &self,
        on_message: OutputCallback,
        state: Arc<dyn StateStore>,
        files: Arc<dyn FileStore>,
    ) -> Arc<SessionContext> {
        let session_id = Uuid::new_v4().to_string();
        let context = Arc::new(SessionContext::new(session_id, on_message, state, files));
        self.insert(Arc::clone(&context));
        context
    }

    /// Register an externally constructed session context.
    ///
    /// A context already registered under the same id is kept; the session
    /// owns exactly one context at a time.
    pub fn insert(&self, context: Arc<SessionContext>) -> Arc<SessionContext> {
        let entry = self
            .sessions
            .entry(context.session_id().to_owned())
            .or_insert_with(|| SessionEntry {
                context,
                created_at: SystemTime::now(),
            });
        Arc::clone(&entry.context)
    }

    /// Look up a session context by id.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionContext>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(&entry.context))
    }

    /// Creation time of a session.
    #[must_use]
    pub fn created_at(&self, session_id: &str) -> Option<SystemTime> {
        self.sessions.get(session_id).map(|entry| entry.created_at)
    }

    /// Remove a session on disconnect or timeout.
    ///
    /// Releases the session's uploaded files and drops the runtime's
    /// context reference. Returns true if the session existed.
    pub fn remove_session(&self, session_id: &str) -> bool {
        let Some((_, entry)) = self.sessions.remove(session_id) else {
            return false;
        };
        entry.context.files().remove_session_files(session_id);
        tracing::debug!(session_id, "session removed");
        true
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use uistream_core::{FileStore, MemoryFileStore, MemoryStateStore};

    use super::*;

    fn noop_callback() -> OutputCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_create_get_remove() {
        let manager = SessionManager::new();
        let ctx = manager.create_session(
            noop_callback(),
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryFileStore::new()),
        );

        let id = ctx.session_id().to_owned();
        assert_eq!(manager.len(), 1);
        assert!(manager.get(&id).is_some());
        assert!(manager.created_at(&id).is_some());

        assert!(manager.remove_session(&id));
        assert!(manager.get(&id).is_none());
        assert!(!manager.remove_session(&id));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_releases_session_files() {
        let manager = SessionManager::new();
        let files = Arc::new(MemoryFileStore::new());
        let ctx = manager.create_session(
            noop_callback(),
            Arc::new(MemoryStateStore::new()),
            Arc::clone(&files) as Arc<dyn FileStore>,
        );

        let id = ctx.session_id().to_owned();
        files.add_file(&id, "upload-1");
        assert_eq!(files.file_count(&id), 1);

        manager.remove_session(&id);
        assert_eq!(files.file_count(&id), 0);
    }

    #[test]
    fn test_insert_keeps_existing_context() {
        let manager = SessionManager::new();
        let make = |id: &str| {
            Arc::new(SessionContext::new(
                id,
                noop_callback(),
                Arc::new(MemoryStateStore::new()),
                Arc::new(MemoryFileStore::new()),
            ))
        };

        let first = manager.insert(make("dup"));
        let kept = manager.insert(make("dup"));
        assert!(Arc::ptr_eq(&first, &kept));
        assert_eq!(manager.len(), 1);
    }
}
