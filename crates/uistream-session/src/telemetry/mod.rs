//! Bounded-cost call telemetry.
//!
//! Every UI-producing operation can be routed through [`observed_call`],
//! which captures a structured [`CallRecord`] into the active session
//! context. Recording is strictly overhead-only: it never changes the
//! wrapped operation's result, it stops silently at the per-run capacity
//! bound, and nested instrumented calls collapse into the outermost record.

pub mod describe;
pub mod interceptor;
pub mod record;

pub use describe::{CallArg, UNRESOLVED, resolve_type_name};
pub use interceptor::{CallSpec, observed_call, wrap};
pub use record::{ArgMetadata, ArgRecord, CallRecord};
