//! Demo app server: one scripted session, content-addressed delivery.
//!
//! Run with: cargo run -p app-server-demo
//!
//! On startup a demo "script" runs once on a worker thread with an attached
//! session context. Every message it dispatches lands in the message cache;
//! a downloadable report is registered with the media store. Both are then
//! served over HTTP; the log prints URLs to try.

use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uistream_core::{MemoryFileStore, MemoryStateStore, UiMessage};
use uistream_serve::{AssetKind, ServeConfig, ServeState, router};
use uistream_session::{
    CallSpec, OutputCallback, SessionContext, SessionManager, observed_call, registry,
};

const WRITE_TEXT: CallSpec = CallSpec::new("Element::write_text", &["body"]);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    registry::set_hosted(true);

    let state = ServeState::default();
    let manager = SessionManager::new();

    // The output callback is the transport seam: here it caches every
    // message and logs its wire form.
    let cache = Arc::clone(&state.cache);
    let on_message: OutputCallback = Arc::new(move |msg: UiMessage| {
        let hash = cache.put(&msg);
        match serde_json::to_string(&msg.to_wire()) {
            Ok(wire) => tracing::info!(%hash, %wire, "message dispatched"),
            Err(err) => tracing::error!(%err, "failed to render wire message"),
        }
    });

    let ctx = manager.create_session(
        on_message,
        Arc::new(MemoryStateStore::new()),
        Arc::new(MemoryFileStore::new()),
    );
    tracing::info!(session_id = ctx.session_id(), "session created");

    // Run the demo script on its own worker thread. Context propagation is
    // explicit: the worker attaches the context before the script executes.
    let script_ctx = Arc::clone(&ctx);
    tokio::task::spawn_blocking(move || {
        registry::run_with_context(Arc::clone(&script_ctx), || run_script(&script_ctx));
    })
    .await?;

    let records = ctx.take_call_records();
    tracing::info!(
        count = records.len(),
        records = %serde_json::to_string(&records)?,
        "telemetry captured this run"
    );

    let report_key = state.media.put(
        &b"%PDF-1.4 uistream demo report"[..],
        "application/pdf",
        AssetKind::Downloadable,
        None,
    );

    let app = router(state, ServeConfig { allow_cors: true });
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("serving on http://{addr}");
    tracing::info!("try: http://{addr}/media/{report_key}?title=Quarterly%20Report");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// The "user script": what the script engine would drive on every rerun.
fn run_script(ctx: &SessionContext) {
    ctx.reset("tab=overview", "main");

    // Page config first: the only position where it is accepted.
    if let Err(err) = ctx.dispatch(UiMessage::page_config(
        &br#"{"title":"Quarterly Report","layout":"wide"}"#[..],
    )) {
        tracing::warn!(%err, "script error surfaced to the user");
    }

    // Session state outlives the run; run-scoped fields do not.
    let state = ctx.state();
    let run_number = state
        .get("run_number")
        .and_then(|value| value.as_u64())
        .unwrap_or(0)
        + 1;
    state.set("run_number", serde_json::json!(run_number));

    write_text(ctx, &format!("hello from run #{run_number}"));
    write_text(ctx, "Revenue is up 14% quarter over quarter.");

    // A late page config violates the ordering contract; the error is shown
    // to the script author, and the run keeps its earlier output.
    if let Err(err) = ctx.dispatch(UiMessage::page_config(&b"{}"[..])) {
        tracing::warn!(%err, "script error surfaced to the user");
    }
}

/// One instrumented UI-producing operation.
fn write_text(ctx: &SessionContext, body: &str) {
    let result = observed_call(WRITE_TEXT, &[&body], || {
        if !ctx.script_started() {
            ctx.mark_run_started();
        }
        ctx.dispatch(UiMessage::delta(body.as_bytes().to_vec()))
    });
    if let Err(err) = result {
        tracing::warn!(%err, "script error surfaced to the user");
    }
}
