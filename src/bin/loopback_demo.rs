//! Loopback Demo Binary
//!
//! Runs one fetch and one socket session through a bridge context backed by
//! the in-process loopback transport. Callbacks run on a dedicated event
//! loop thread standing in for the scripting engine.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossbeam::channel::{bounded, unbounded, Sender};
use tracing::info;

use script_bridge::{
    init_structured_logging, BridgeConfig, BridgeContext, Dispatcher, EventLoop,
    LoopbackTransport, ScriptValue,
};

const WAIT: Duration = Duration::from_secs(5);

fn reporter(name: &'static str, events: &Sender<String>) -> ScriptValue {
    let events = events.clone();
    ScriptValue::native(name, move |args: &[ScriptValue]| {
        let thread = std::thread::current();
        let rendered = serde_json::to_string(args).unwrap_or_default();
        info!(callback = name, thread = ?thread.name(), args = %rendered, "Script callback invoked");
        let _ = events.send(format!("{name} {rendered}"));
        Ok(ScriptValue::Undefined)
    })
}

fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = BridgeConfig::load().context("loading bridge configuration")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("loopback-io")
        .enable_all()
        .build()
        .context("building loopback runtime")?;

    let event_loop = EventLoop::spawn(&config.event_loop_thread_name)?;
    let transport = Arc::new(
        LoopbackTransport::new(runtime.handle().clone()).with_latency(Duration::from_millis(10)),
    );
    let context = Arc::new(
        BridgeContext::new(config.clone(), Dispatcher::with_scope(event_loop.scope()))?
            .with_transport(transport),
    );

    let (events, received) = unbounded::<String>();

    context.call_global(
        &config.fetch_global,
        &[
            ScriptValue::from("https://loopback.test/echo"),
            ScriptValue::from(r#"{"hello":"bridge"}"#),
            reporter("onFetch", &events),
        ],
    );
    let event = received.recv_timeout(WAIT)?;
    info!(event = %event, "Fetch completed");

    let token = context.call_method(
        &config.websocket_global,
        "connect",
        &[
            ScriptValue::from("ws://loopback.test/socket"),
            reporter("onOpen", &events),
            reporter("onMessage", &events),
            reporter("onClose", &events),
            reporter("onError", &events),
        ],
    );
    let event = received.recv_timeout(WAIT)?;
    info!(event = %event, "Socket opened");

    context.call_method(
        &config.websocket_global,
        "send",
        &[token.clone(), ScriptValue::from("ping")],
    );
    let event = received.recv_timeout(WAIT)?;
    info!(event = %event, "Socket echoed");

    context.call_method(
        &config.websocket_global,
        "close",
        &[token, ScriptValue::from(1000), ScriptValue::from("demo finished")],
    );
    let event = received.recv_timeout(WAIT)?;
    info!(event = %event, "Socket closed");

    let metrics = serde_json::to_string(&context.metrics())?;
    info!(metrics = %metrics, "Bridge metrics");

    let (done, torn_down) = bounded(1);
    let owner = Arc::clone(&context);
    context.dispatcher().run_on(move || {
        let _ = done.send(owner.teardown());
    });
    torn_down.recv_timeout(WAIT)?;

    let ran = event_loop.shutdown();
    runtime.shutdown_timeout(WAIT);
    info!(tasks_run = ran, "Loopback demo finished");
    Ok(())
}
