//! Call instrumentation with recursion and capacity guards.
//!
//! The interceptor wraps every UI-producing operation, so its cost model is
//! strict: O(1) extra work per call, a hard per-run record cap, and a
//! recursion flag so only the outermost of a nested chain of instrumented
//! calls is recorded. Instrumentation is invisible to the wrapped
//! operation: its result, and its panic behavior, pass through unchanged.

use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    time::Instant,
};

use once_cell::sync::Lazy;

use super::{
    describe::{self, CallArg, resolve_type_name},
    record::{ArgRecord, CallRecord},
};
use crate::{context::SessionContext, registry};

/// Static name and declared parameter keywords of an instrumented
/// operation. The keyword list mirrors the declaration order; a leading
/// `"self"` marks a receiver, which is excluded from the recorded args.
#[derive(Debug, Clone, Copy)]
pub struct CallSpec {
    /// Qualified operation name, e.g. `"Element::write_text"`.
    pub name: &'static str,
    /// Declared parameter names, in order.
    pub keywords: &'static [&'static str],
}

impl CallSpec {
    /// Create a call spec.
    #[must_use]
    pub const fn new(name: &'static str, keywords: &'static [&'static str]) -> Self {
        Self { name, keywords }
    }
}

/// Process-wide immutable table of operation-name aliases.
static OP_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Legacy spellings kept stable for longitudinal reporting.
        ("Element::write_markdown", "write_text"),
        ("Element::add_rows", "append_rows"),
    ])
});

/// Factory-style operations whose receiver carries the interesting name.
static FACTORY_METHODS: &[&str] = &["create_instance"];

const SELF_KEYWORD: &str = "self";

/// Run `op`, recording a call fingerprint into the active session context.
///
/// Instrumentation is skipped entirely, and `op` runs untouched, when no
/// context is attached to the calling thread, when the session opted out of
/// usage stats, when already inside an instrumented call, or when the
/// run's record buffer is full.
pub fn observed_call<R>(spec: CallSpec, args: &[&dyn CallArg], op: impl FnOnce() -> R) -> R {
    let Some(ctx) = registry::current() else {
        return op();
    };
    if !ctx.try_begin_instrumented() {
        return op();
    }

    let reset = RecursionReset { ctx: &ctx };
    let exec_start = Instant::now();
    let result = op();
    let exec_time = exec_start.elapsed();
    drop(reset);

    // Record building runs outside the guard and must never take down the
    // wrapped operation, even if a caller-supplied descriptor misbehaves.
    let overhead_start = Instant::now();
    let built = catch_unwind(AssertUnwindSafe(|| {
        build_record::<R>(spec, args, exec_time)
    }));
    match built {
        Ok(record) => ctx.add_call_record(record.with_overhead(overhead_start.elapsed())),
        Err(_) => tracing::debug!(op = spec.name, "failed to build call record"),
    }

    result
}

/// Wrap a unary operation into an instrumented closure with an identical
/// signature, for registration-time composition.
pub fn wrap<A, R, F>(spec: CallSpec, f: F) -> impl Fn(&A) -> R
where
    A: CallArg,
    F: Fn(&A) -> R,
{
    move |arg| observed_call(spec, &[arg], || f(arg))
}

struct RecursionReset<'a> {
    ctx: &'a SessionContext,
}

impl Drop for RecursionReset<'_> {
    fn drop(&mut self) {
        self.ctx.end_instrumented();
    }
}

fn build_record<R>(spec: CallSpec, args: &[&dyn CallArg], exec_time: std::time::Duration) -> CallRecord {
    let mut receiver: Option<&dyn CallArg> = None;
    let mut described: Vec<ArgRecord> = Vec::with_capacity(args.len());

    for (position, arg) in args.iter().enumerate() {
        let keyword = spec.keywords.get(position).copied();
        if keyword == Some(SELF_KEYWORD) {
            receiver = Some(*arg);
            continue;
        }
        #[allow(clippy::cast_possible_truncation)]
        described.push(describe::describe(position as u32, keyword, *arg));
    }

    CallRecord::new(
        resolve_op_name(spec.name, receiver),
        described,
        resolve_type_name(std::any::type_name::<R>()),
        exec_time,
    )
}

/// Resolve the recorded operation name: de-alias, strip the receiver-type
/// qualifier, and surface a custom component name for factory methods.
fn resolve_op_name(raw: &str, receiver: Option<&dyn CallArg>) -> String {
    let name = OP_ALIASES
        .get(raw)
        .copied()
        .unwrap_or_else(|| raw.rsplit("::").next().unwrap_or(raw));
    if name.is_empty() {
        return super::describe::UNRESOLVED.to_owned();
    }
    if FACTORY_METHODS.contains(&name) {
        if let Some(custom) = receiver.and_then(CallArg::component_name) {
            return custom;
        }
    }
    name.to_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uistream_core::{MemoryFileStore, MemoryStateStore};

    use super::*;
    use crate::{
        context::{CALL_RECORD_CAPACITY, SessionContext},
        telemetry::record::ArgMetadata,
    };

    struct Element {
        name: Option<String>,
    }

    impl CallArg for Element {
        fn type_name(&self) -> &'static str {
            "demo::Element"
        }

        fn component_name(&self) -> Option<String> {
            self.name.clone()
        }
    }

    fn session(gather_stats: bool) -> Arc<SessionContext> {
        let ctx = Arc::new(
            SessionContext::new(
                "telemetry-test",
                Arc::new(|_| {}),
                Arc::new(MemoryStateStore::new()),
                Arc::new(MemoryFileStore::new()),
            )
            .with_stats(gather_stats),
        );
        ctx.reset("", "main");
        ctx
    }

    const WRITE_TEXT: CallSpec = CallSpec::new("Element::write_text", &["self", "body"]);

    #[test]
    fn test_result_passes_through() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let el = Element { name: None };
        let result = observed_call(WRITE_TEXT, &[&el, &"hello"], || 42);
        assert_eq!(result, 42);
        assert_eq!(ctx.call_record_count(), 1);
    }

    #[test]
    fn test_write_text_fingerprint() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let el = Element { name: None };
        observed_call(WRITE_TEXT, &[&el, &"hello"], || ());

        let records = ctx.take_call_records();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.name, "write_text");
        assert_eq!(record.args.len(), 1, "receiver must be excluded");
        assert_eq!(record.args[0].keyword, "body");
        assert_eq!(record.args[0].position, 1);
        assert_eq!(record.args[0].type_name, "str");
        assert_eq!(record.args[0].metadata, Some(ArgMetadata::Length(5)));
    }

    #[test]
    fn test_no_context_skips_recording() {
        let result = observed_call(WRITE_TEXT, &[&"hello"], || "ok");
        assert_eq!(result, "ok");
    }

    #[test]
    fn test_stats_disabled_skips_recording() {
        let ctx = session(false);
        let _guard = registry::attach(Arc::clone(&ctx));

        observed_call(WRITE_TEXT, &[&"hello"], || ());
        assert_eq!(ctx.call_record_count(), 0);
    }

    #[test]
    fn test_nested_calls_record_only_outermost() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let inner = CallSpec::new("Element::write_caption", &["self", "body"]);
        let result = observed_call(WRITE_TEXT, &[&"outer"], || {
            observed_call(inner, &[&"inner"], || 7) + 1
        });

        assert_eq!(result, 8);
        let records = ctx.take_call_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "write_text");
    }

    #[test]
    fn test_capacity_saturation_is_silent() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        for _ in 0..CALL_RECORD_CAPACITY + 10 {
            observed_call(WRITE_TEXT, &[&"x"], || ());
        }
        assert_eq!(ctx.call_record_count(), CALL_RECORD_CAPACITY);
    }

    #[test]
    fn test_panicking_op_propagates_and_clears_guard() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            observed_call(WRITE_TEXT, &[&"boom"], || panic!("script error"));
        }));
        assert!(panicked.is_err());
        assert_eq!(ctx.call_record_count(), 0, "panicking calls are not recorded");

        // The recursion guard must have been restored on the unwind path.
        observed_call(WRITE_TEXT, &[&"after"], || ());
        assert_eq!(ctx.call_record_count(), 1);
    }

    #[test]
    fn test_factory_method_surfaces_component_name() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let spec = CallSpec::new("CustomComponent::create_instance", &["self", "args"]);
        let component = Element {
            name: Some("my_map_widget".to_owned()),
        };
        observed_call(spec, &[&component, &"payload"], || ());

        let records = ctx.take_call_records();
        assert_eq!(records[0].name, "my_map_widget");
    }

    #[test]
    fn test_op_alias_table() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let spec = CallSpec::new("Element::write_markdown", &["self", "body"]);
        observed_call(spec, &[&"# hi"], || ());

        let records = ctx.take_call_records();
        assert_eq!(records[0].name, "write_text");
    }

    #[test]
    fn test_extra_positional_args_use_index_keywords() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let spec = CallSpec::new("Element::write_columns", &["self"]);
        observed_call(spec, &[&"a", &2u32], || ());

        let records = ctx.take_call_records();
        // Position 0 matched "self" and was excluded; the rest fall back
        // to their positional index.
        assert_eq!(records[0].args.len(), 1);
        assert_eq!(records[0].args[0].keyword, "1");
    }

    #[test]
    fn test_misbehaving_descriptor_never_fails_the_op() {
        struct Hostile;
        impl CallArg for Hostile {
            fn type_name(&self) -> &'static str {
                "demo::Hostile"
            }

            fn metadata(&self) -> Option<ArgMetadata> {
                panic!("descriptor bug")
            }
        }

        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let spec = CallSpec::new("Element::write_custom", &["self", "value"]);
        let el = Element { name: None };
        let result = observed_call(spec, &[&el, &Hostile], || "survived");
        assert_eq!(result, "survived");
        assert_eq!(ctx.call_record_count(), 0);
    }

    #[test]
    fn test_script_run_end_to_end() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));
        ctx.reset("tab=overview", "main");

        let el = Element { name: None };
        observed_call(WRITE_TEXT, &[&el, &"hello"], || {
            ctx.mark_run_started();
            ctx.dispatch(uistream_core::UiMessage::delta(&b"hello"[..]))
        })
        .unwrap();

        let records = ctx.take_call_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "write_text");
        assert_eq!(records[0].args[0].type_name, "str");
        assert_eq!(records[0].args[0].metadata, Some(ArgMetadata::Length(5)));

        // The run has produced content, so page config is now locked out.
        let err = ctx
            .dispatch(uistream_core::UiMessage::page_config(&b"{}"[..]))
            .unwrap_err();
        assert_eq!(err, crate::context::DispatchError::ConfigAfterOutput);
    }

    #[test]
    fn test_wrap_composes_instrumented_closure() {
        let ctx = session(true);
        let _guard = registry::attach(Arc::clone(&ctx));

        let spec = CallSpec::new("Element::write_title", &["body"]);
        let write_title = wrap(spec, |body: &String| body.len());

        assert_eq!(write_title(&"Dashboard".to_owned()), 9);
        let records = ctx.take_call_records();
        assert_eq!(records[0].name, "write_title");
        assert_eq!(records[0].args[0].metadata, Some(ArgMetadata::Length(9)));
    }
}
