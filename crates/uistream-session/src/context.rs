//! Per-session execution context and dispatch ordering.
//!
//! A `SessionContext` carries everything a script run needs: the output
//! callback, handles to the external state and file managers, and the
//! run-scoped bookkeeping that must be wiped between runs. It is shared as
//! `Arc<SessionContext>` so the registry can hand it to worker threads, but
//! only one worker owns a run at a time; the interior lock exists for the
//! sharing, not for cross-worker mutation.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use thiserror::Error;
use uistream_core::{FileStore, StateStore, UiMessage};

use crate::telemetry::CallRecord;

/// Maximum call records kept per run.
///
/// Saturation is a deliberate cost cutoff, not a failure: once a run has
/// produced this many records, further instrumented calls are not recorded.
pub const CALL_RECORD_CAPACITY: usize = 200;

/// Sink for messages produced by a run. The transport layer supplies this at
/// session creation and owns actual delivery.
pub type OutputCallback = Arc<dyn Fn(UiMessage) + Send + Sync>;

/// Dispatch failure surfaced to the script author.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// A page-config message arrived after the run already produced output.
    #[error(
        "page configuration must be set at most once, as the first output of a run; \
         this run has already produced output"
    )]
    ConfigAfterOutput,
}

/// Position of a running cursor within an output container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorPosition {
    /// Index of the next element to write.
    pub index: u32,
}

/// State scoped to a single run. Rebuilt from scratch on every `reset`.
struct RunState {
    query_string: String,
    page_id: String,
    widget_ids: HashSet<String>,
    widget_user_keys: HashSet<String>,
    form_ids: HashSet<String>,
    cursors: HashMap<u32, CursorPosition>,
    group_stack: Vec<String>,
    call_records: Vec<CallRecord>,
    in_interceptor: bool,
    config_allowed: bool,
    script_started: bool,
}

impl RunState {
    fn new(query_string: String, page_id: String) -> Self {
        Self {
            query_string,
            page_id,
            widget_ids: HashSet::new(),
            widget_user_keys: HashSet::new(),
            form_ids: HashSet::new(),
            cursors: HashMap::new(),
            group_stack: Vec::new(),
            call_records: Vec::new(),
            in_interceptor: false,
            config_allowed: true,
            script_started: false,
        }
    }
}

/// Context for one session, reused across its runs.
pub struct SessionContext {
    session_id: String,
    on_message: OutputCallback,
    state: Arc<dyn StateStore>,
    files: Arc<dyn FileStore>,
    user_info: HashMap<String, Option<String>>,
    gather_stats: bool,
    run: Mutex<RunState>,
}

impl SessionContext {
    /// Create a context for a new session.
    ///
    /// Usage-stats gathering defaults to enabled; disable it with
    /// [`with_stats`](Self::with_stats) before sharing the context.
    pub fn new(
        session_id: impl Into<String>,
        on_message: OutputCallback,
        state: Arc<dyn StateStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            on_message,
            state,
            files,
            user_info: HashMap::new(),
            gather_stats: true,
            run: Mutex::new(RunState::new(String::new(), String::new())),
        }
    }

    /// Set the usage-stats policy. Immutable once the context is shared.
    #[must_use]
    pub fn with_stats(mut self, enabled: bool) -> Self {
        self.gather_stats = enabled;
        self
    }

    /// Attach user info supplied by the hosting layer.
    #[must_use]
    pub fn with_user_info(mut self, user_info: HashMap<String, Option<String>>) -> Self {
        self.user_info = user_info;
        self
    }

    /// The session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Whether usage-stats gathering is enabled for this session.
    #[must_use]
    pub const fn gather_stats(&self) -> bool {
        self.gather_stats
    }

    /// User info supplied by the hosting layer.
    #[must_use]
    pub const fn user_info(&self) -> &HashMap<String, Option<String>> {
        &self.user_info
    }

    /// Handle to the external session-state store.
    #[must_use]
    pub fn state(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.state)
    }

    /// Handle to the external uploaded-file manager.
    #[must_use]
    pub fn files(&self) -> Arc<dyn FileStore> {
        Arc::clone(&self.files)
    }

    fn run(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap()
    }

    /// Clear all run-scoped state and start a fresh run.
    ///
    /// Must be called exactly once at the start of each run, before any
    /// instrumented call executes. Re-enables page configuration.
    pub fn reset(&self, query_string: impl Into<String>, page_id: impl Into<String>) {
        *self.run() = RunState::new(query_string.into(), page_id.into());
    }

    /// Record that the script has produced its first content.
    ///
    /// Called once per run, after the first content-producing operation and
    /// before its output is dispatched.
    pub fn mark_run_started(&self) {
        self.run().script_started = true;
    }

    /// Whether the script has produced content this run.
    #[must_use]
    pub fn script_started(&self) -> bool {
        self.run().script_started
    }

    /// Whether a page-config message would still be accepted this run.
    #[must_use]
    pub fn config_allowed(&self) -> bool {
        self.run().config_allowed
    }

    /// Dispatch a message to the session's output callback.
    ///
    /// Enforces the ordering contract: at most one page-config message per
    /// run, and if present it precedes all content.
    ///
    /// # Errors
    /// `DispatchError::ConfigAfterOutput` if a page-config message arrives
    /// once configuration is locked for the run. Fatal to the run, not the
    /// session.
    pub fn dispatch(&self, msg: UiMessage) -> Result<(), DispatchError> {
        {
            let mut run = self.run();
            if msg.is_page_config() && !run.config_allowed {
                return Err(DispatchError::ConfigAfterOutput);
            }
            if msg.is_page_config() || (msg.is_delta() && run.script_started) {
                run.config_allowed = false;
            }
        }
        // Lock released before handing off: the callback belongs to the
        // transport and must be free to call back into this context.
        (self.on_message)(msg);
        Ok(())
    }

    /// Append a call record to the telemetry buffer.
    ///
    /// Silently drops the record once the buffer holds
    /// [`CALL_RECORD_CAPACITY`] entries.
    pub fn add_call_record(&self, record: CallRecord) {
        let mut run = self.run();
        if run.call_records.len() < CALL_RECORD_CAPACITY {
            run.call_records.push(record);
        }
    }

    /// Number of call records buffered this run.
    #[must_use]
    pub fn call_record_count(&self) -> usize {
        self.run().call_records.len()
    }

    /// Drain the telemetry buffer for upstream reporting.
    #[must_use]
    pub fn take_call_records(&self) -> Vec<CallRecord> {
        std::mem::take(&mut self.run().call_records)
    }

    /// Enter instrumented execution if telemetry should record this call.
    ///
    /// Returns false when stats are disabled, when already inside an
    /// instrumented call, or when the buffer is full; the caller then skips
    /// instrumentation entirely.
    pub(crate) fn try_begin_instrumented(&self) -> bool {
        if !self.gather_stats {
            return false;
        }
        let mut run = self.run();
        if run.in_interceptor || run.call_records.len() >= CALL_RECORD_CAPACITY {
            return false;
        }
        run.in_interceptor = true;
        true
    }

    /// Leave instrumented execution. Paired with `try_begin_instrumented`.
    pub(crate) fn end_instrumented(&self) {
        self.run().in_interceptor = false;
    }

    /// Register a widget id for this run. Returns true if it was fresh.
    pub fn register_widget_id(&self, widget_id: impl Into<String>) -> bool {
        self.run().widget_ids.insert(widget_id.into())
    }

    /// Register a user-supplied widget key. Returns true if it was fresh.
    pub fn register_widget_key(&self, key: impl Into<String>) -> bool {
        self.run().widget_user_keys.insert(key.into())
    }

    /// Register a form id. Returns true if it was fresh.
    pub fn register_form_id(&self, form_id: impl Into<String>) -> bool {
        self.run().form_ids.insert(form_id.into())
    }

    /// Number of widget ids seen this run.
    #[must_use]
    pub fn widget_id_count(&self) -> usize {
        self.run().widget_ids.len()
    }

    /// Cursor position for an output container.
    #[must_use]
    pub fn cursor(&self, container: u32) -> CursorPosition {
        self.run().cursors.get(&container).copied().unwrap_or_default()
    }

    /// Store the cursor position for an output container.
    pub fn set_cursor(&self, container: u32, position: CursorPosition) {
        self.run().cursors.insert(container, position);
    }

    /// Push an output group onto the active stack.
    pub fn push_output_group(&self, group_id: impl Into<String>) {
        self.run().group_stack.push(group_id.into());
    }

    /// Pop the innermost active output group.
    pub fn pop_output_group(&self) -> Option<String> {
        self.run().group_stack.pop()
    }

    /// The innermost active output group, if any.
    #[must_use]
    pub fn active_output_group(&self) -> Option<String> {
        self.run().group_stack.last().cloned()
    }

    /// Query string for the current run.
    #[must_use]
    pub fn query_string(&self) -> String {
        self.run().query_string.clone()
    }

    /// Page identifier for the current run.
    #[must_use]
    pub fn page_id(&self) -> String {
        self.run().page_id.clone()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("session_id", &self.session_id)
            .field("gather_stats", &self.gather_stats)
            .finish_non_exhaustive()
    }
}
