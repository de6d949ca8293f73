//! Structured call records.

use std::time::Duration;

use serde::Serialize;

/// Metadata captured for an argument.
///
/// Only cheap, bounded descriptions are ever recorded: a rendered literal
/// for booleans, enumerations and small integers, or an element count for
/// sized containers. Arbitrary values carry no metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgMetadata {
    /// Rendered literal value.
    Value(String),
    /// Element count of a sized container.
    Length(usize),
}

/// One argument of an instrumented call.
#[derive(Debug, Clone, Serialize)]
pub struct ArgRecord {
    /// Declared parameter name, or the positional index rendered as text.
    pub keyword: String,
    /// Zero-based position in the call.
    pub position: u32,
    /// Resolved type name.
    pub type_name: String,
    /// Optional bounded metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ArgMetadata>,
}

/// One instrumented invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    /// Resolved operation name.
    pub name: String,
    /// Argument descriptors, receiver excluded.
    pub args: Vec<ArgRecord>,
    /// Resolved return-type name.
    pub return_type: String,
    /// Wall-clock duration of the wrapped operation.
    pub exec_time: Duration,
    /// Time spent by the instrumentation itself.
    pub overhead: Duration,
}

impl CallRecord {
    /// Create a record with zero instrumentation overhead.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        args: Vec<ArgRecord>,
        return_type: impl Into<String>,
        exec_time: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            args,
            return_type: return_type.into(),
            exec_time,
            overhead: Duration::ZERO,
        }
    }

    /// Set the measured instrumentation overhead.
    #[must_use]
    pub const fn with_overhead(mut self, overhead: Duration) -> Self {
        self.overhead = overhead;
        self
    }
}
