//! Shared helpers for bridge integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use script_bridge::{
    CorrelationId, FetchDelivery, FetchTransport, ScriptValue, SocketDelivery, SocketTransport,
};

/// One observed script callback invocation
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub name: &'static str,
    pub args: Vec<ScriptValue>,
    pub thread: ThreadId,
}

/// Hands out script callbacks that record every invocation
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self, name: &'static str) -> ScriptValue {
        let calls = Arc::clone(&self.calls);
        ScriptValue::native(name, move |args: &[ScriptValue]| {
            calls.lock().push(RecordedCall {
                name,
                args: args.to_vec(),
                thread: std::thread::current().id(),
            });
            Ok(ScriptValue::Undefined)
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calls.lock().iter().map(|call| call.name).collect()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Poll until at least `n` calls were recorded or `timeout` passes
    pub fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count() >= n {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        self.count() >= n
    }
}

/// Arguments for the fetch global
pub fn fetch_args(url: &str, body: &str, callback: ScriptValue) -> Vec<ScriptValue> {
    vec![ScriptValue::from(url), ScriptValue::from(body), callback]
}

/// Arguments for `connect` with all four callbacks from `recorder`
pub fn connect_args(url: &str, recorder: &Recorder) -> Vec<ScriptValue> {
    vec![
        ScriptValue::from(url),
        recorder.callback("open"),
        recorder.callback("message"),
        recorder.callback("close"),
        recorder.callback("error"),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Fetch {
        id: CorrelationId,
        url: String,
        body: String,
    },
    Connect {
        token: CorrelationId,
        url: String,
    },
    Send {
        token: CorrelationId,
        message: String,
    },
    Close {
        token: CorrelationId,
        code: i32,
        reason: String,
    },
}

/// Transport that records requests and keeps the delivery sinks so tests can
/// play the transport's side by hand
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    fetch_sink: Mutex<Option<Arc<dyn FetchDelivery>>>,
    socket_sink: Mutex<Option<Arc<dyn SocketDelivery>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn fetch_sink(&self) -> Option<Arc<dyn FetchDelivery>> {
        self.fetch_sink.lock().clone()
    }

    pub fn socket_sink(&self) -> Option<Arc<dyn SocketDelivery>> {
        self.socket_sink.lock().clone()
    }
}

impl FetchTransport for RecordingTransport {
    fn invoke_fetch(
        &self,
        id: CorrelationId,
        url: &str,
        body: &str,
        delivery: Arc<dyn FetchDelivery>,
    ) {
        self.calls.lock().push(TransportCall::Fetch {
            id,
            url: url.to_string(),
            body: body.to_string(),
        });
        *self.fetch_sink.lock() = Some(delivery);
    }
}

impl SocketTransport for RecordingTransport {
    fn connect(&self, token: CorrelationId, url: &str, delivery: Arc<dyn SocketDelivery>) {
        self.calls.lock().push(TransportCall::Connect {
            token,
            url: url.to_string(),
        });
        *self.socket_sink.lock() = Some(delivery);
    }

    fn send(&self, token: CorrelationId, message: &str) {
        self.calls.lock().push(TransportCall::Send {
            token,
            message: message.to_string(),
        });
    }

    fn close(&self, token: CorrelationId, code: i32, reason: &str) {
        self.calls.lock().push(TransportCall::Close {
            token,
            code,
            reason: reason.to_string(),
        });
    }
}
