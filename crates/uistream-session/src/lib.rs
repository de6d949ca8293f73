//! Session runtime for script-driven interactive apps.
//!
//! Provides:
//! - `SessionContext` - Run-scoped state and dispatch ordering
//! - `registry` - Explicit thread-to-context association
//! - `SessionManager` - Session lifecycle tracking
//! - `telemetry` - Call records and the instrumentation interceptor

pub mod context;
pub mod manager;
pub mod registry;
pub mod telemetry;

pub use context::{
    CALL_RECORD_CAPACITY, CursorPosition, DispatchError, OutputCallback, SessionContext,
};
pub use manager::SessionManager;
pub use telemetry::{ArgMetadata, ArgRecord, CallArg, CallRecord, CallSpec, observed_call, wrap};
