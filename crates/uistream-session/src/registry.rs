//! Explicit thread-to-context association.
//!
//! Propagation is never automatic: spawning a thread does not carry the
//! parent's context with it. A worker observes a context only after one is
//! attached for it, either by the worker itself ([`attach`]) or by the
//! parent naming the worker explicitly ([`attach_to`]). The sanctioned
//! pattern for handing session work to a new thread is
//! [`run_with_context`], which attaches on entry and detaches on exit.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::context::SessionContext;

static CONTEXTS: Lazy<DashMap<ThreadId, Arc<SessionContext>>> = Lazy::new(DashMap::new);

/// Whether the process is running under the hosted runtime. Outside hosted
/// mode a missing context is expected and stays silent.
static HOSTED: AtomicBool = AtomicBool::new(false);

/// Mark the process as running (or not) under the hosted runtime.
pub fn set_hosted(hosted: bool) {
    HOSTED.store(hosted, Ordering::Relaxed);
}

/// Whether the process runs under the hosted runtime.
#[must_use]
pub fn is_hosted() -> bool {
    HOSTED.load(Ordering::Relaxed)
}

/// Associate a context with the calling thread.
///
/// Returns a guard that removes the association when dropped.
#[must_use]
pub fn attach(ctx: Arc<SessionContext>) -> ContextGuard {
    let thread_id = thread::current().id();
    CONTEXTS.insert(thread_id, ctx);
    ContextGuard { thread_id }
}

/// Associate a context with an arbitrary worker thread.
///
/// The parent must do this before the worker starts running session code;
/// the association stays until [`detach_from`] (or the worker's own
/// [`attach`] guard) removes it.
pub fn attach_to(thread_id: ThreadId, ctx: Arc<SessionContext>) {
    CONTEXTS.insert(thread_id, ctx);
}

/// The calling thread's context, if one is attached.
///
/// In hosted mode a miss is reportable but non-fatal: it logs a warning and
/// returns `None`. Outside hosted mode the miss is silent.
#[must_use]
pub fn current() -> Option<Arc<SessionContext>> {
    let current_thread = thread::current();
    let found = CONTEXTS
        .get(&current_thread.id())
        .map(|entry| Arc::clone(&entry));
    if found.is_none() && is_hosted() {
        tracing::warn!(
            thread = current_thread.name().unwrap_or("unnamed"),
            "thread has no session context attached"
        );
    }
    found
}

/// Remove the calling thread's association, if any.
pub fn detach() {
    CONTEXTS.remove(&thread::current().id());
}

/// Remove an arbitrary thread's association, if any.
pub fn detach_from(thread_id: ThreadId) {
    CONTEXTS.remove(&thread_id);
}

/// Attach `ctx` for the duration of `f` on the calling thread.
pub fn run_with_context<F, R>(ctx: Arc<SessionContext>, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = attach(ctx);
    f()
}

/// RAII guard returned by [`attach`]; detaches its thread on drop.
#[derive(Debug)]
pub struct ContextGuard {
    thread_id: ThreadId,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXTS.remove(&self.thread_id);
    }
}
