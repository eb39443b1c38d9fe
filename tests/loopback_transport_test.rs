//! End-to-end bridge sessions over the loopback transport

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{connect_args, fetch_args, Recorder};
use script_bridge::{
    constants::{close_codes, globals},
    BridgeConfig, BridgeContext, Dispatcher, EventLoop, FetchResponse, LoopbackTransport,
    ScriptValue,
};

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for(recorder: &Recorder, n: usize) -> bool {
    tokio::time::timeout(WAIT, async {
        while recorder.count() < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .is_ok()
}

fn loopback_context(dispatcher: Dispatcher) -> (BridgeContext, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new(tokio::runtime::Handle::current()));
    let context = BridgeContext::new(BridgeConfig::default(), dispatcher)
        .unwrap()
        .with_transport(transport.clone());
    (context, transport)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_round_trip() {
    let (context, _transport) = loopback_context(Dispatcher::inline());
    let recorder = Recorder::new();

    context.call_global(
        globals::FETCH,
        &fetch_args("https://loopback.test", "{\"n\":1}", recorder.callback("done")),
    );
    assert!(wait_for(&recorder, 1).await);

    let call = &recorder.calls()[0];
    assert!(call.args[0].is_undefined());
    assert_eq!(
        call.args[1].get("statusCode"),
        Some(&ScriptValue::from(200))
    );
    assert_eq!(call.args[2], ScriptValue::from("{\"n\":1}"));
    assert_eq!(context.fetch().pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_transport_error_reaches_callback() {
    let (context, _transport) = loopback_context(Dispatcher::inline());
    let recorder = Recorder::new();

    context.call_global(
        globals::FETCH,
        &fetch_args("file:///etc/hosts", "", recorder.callback("done")),
    );
    assert!(wait_for(&recorder, 1).await);

    let error = recorder.calls()[0].args[0].clone();
    assert!(error
        .as_str()
        .is_some_and(|e| e.contains("unsupported url scheme")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_custom_responder() {
    let transport = Arc::new(
        LoopbackTransport::new(tokio::runtime::Handle::current())
            .with_responder(|url, _| FetchResponse::ok(404, format!("no route for {url}")))
            .with_latency(Duration::from_millis(5)),
    );
    let context = BridgeContext::new(BridgeConfig::default(), Dispatcher::inline())
        .unwrap()
        .with_transport(transport);
    let recorder = Recorder::new();

    context
        .fetch()
        .start(&fetch_args("http://x/missing", "", recorder.callback("done")))
        .unwrap();
    assert!(wait_for(&recorder, 1).await);
    assert_eq!(
        recorder.calls()[0].args[2],
        ScriptValue::from("no route for http://x/missing")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_echo_session() {
    let (context, transport) = loopback_context(Dispatcher::inline());
    let recorder = Recorder::new();
    let socket = context.websocket();

    let token = socket.connect(&connect_args("ws://echo", &recorder)).unwrap();
    assert!(wait_for(&recorder, 1).await);

    socket
        .send(&[ScriptValue::from(token), ScriptValue::from("ping")])
        .unwrap();
    assert!(wait_for(&recorder, 2).await);

    socket
        .close(&[
            ScriptValue::from(token),
            ScriptValue::from(close_codes::NORMAL),
            ScriptValue::from("bye"),
        ])
        .unwrap();
    assert!(wait_for(&recorder, 3).await);

    assert_eq!(recorder.names(), vec!["open", "message", "close"]);
    assert_eq!(recorder.calls()[1].args, vec![ScriptValue::from("ping")]);
    assert_eq!(socket.open_connections(), 0);
    assert_eq!(transport.open_connections(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_invalid_url_reports_error() {
    let (context, _transport) = loopback_context(Dispatcher::inline());
    let recorder = Recorder::new();

    context
        .websocket()
        .connect(&connect_args("http://not-a-socket", &recorder))
        .unwrap();
    assert!(wait_for(&recorder, 1).await);
    assert_eq!(recorder.names(), vec!["error"]);
    assert_eq!(context.websocket().open_connections(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_all_closes_abnormally() {
    let (context, transport) = loopback_context(Dispatcher::inline());
    let recorder = Recorder::new();

    context
        .websocket()
        .connect(&connect_args("wss://secure", &recorder))
        .unwrap();
    assert!(wait_for(&recorder, 1).await);

    assert_eq!(transport.disconnect_all("server going away"), 1);
    assert!(wait_for(&recorder, 2).await);
    assert_eq!(
        recorder.calls()[1].args[0].get("code"),
        Some(&ScriptValue::from(close_codes::ABNORMAL))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_callbacks_run_on_event_loop_thread() {
    let event_loop = EventLoop::spawn("loopback-script").unwrap();
    let loop_thread = event_loop.scope().thread_id();
    let (context, _transport) = loopback_context(Dispatcher::with_scope(event_loop.scope()));
    let recorder = Recorder::new();

    for i in 0..5 {
        context.call_global(
            globals::FETCH,
            &fetch_args("http://x", &i.to_string(), recorder.callback("done")),
        );
    }
    assert!(wait_for(&recorder, 5).await);
    assert!(recorder.calls().iter().all(|call| call.thread == loop_thread));

    // shutdown joins the loop thread
    tokio::task::spawn_blocking(move || event_loop.shutdown())
        .await
        .unwrap();
}
