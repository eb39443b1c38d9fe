#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Script Bridge
//!
//! Async callback correlation and cross-thread dispatch between a
//! single-threaded scripting engine and native transports.
//!
//! ## Overview
//!
//! A script calls an asynchronous native operation (an HTTP fetch, a socket
//! connection) and passes callbacks. The bridge allocates a correlation id,
//! registers the callbacks under it, and forwards the request to a native
//! transport. When the transport reports back, from any thread, the bridge
//! finds the callbacks by id and runs them on the engine's required thread.
//!
//! ## Architecture
//!
//! ```text
//! scripting thread                       transport I/O threads
//! ────────────────                       ─────────────────────
//! fetch(url, body, cb) ──→ FetchBinding ──invoke_fetch──→ FetchTransport
//!                              │                               │
//!                        CallbackRegistry ←──deliver(id)───────┘
//!                              │
//! cb(err, {statusCode}, body) ←── Dispatcher (inline, or posted to the
//!                                 engine's EventLoop)
//! ```
//!
//! ## Module Organization
//!
//! - [`registry`] - Correlation ids and the callback registry
//! - [`engine`] - The engine value model the bridge marshals into
//! - [`dispatch`] - Thread scopes, event loops and the dispatcher
//! - [`transport`] - Native transport traits and the loopback transport
//! - [`bridge`] - Fetch and WebSocket bindings
//! - [`context`] - Per-engine-context ownership and teardown
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use script_bridge::{BridgeConfig, BridgeContext, Dispatcher, ScriptValue};
//!
//! let context = BridgeContext::new(BridgeConfig::default(), Dispatcher::inline())?;
//!
//! let called = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&called);
//! let callback = ScriptValue::native("onResult", move |_args: &[ScriptValue]| {
//!     flag.store(true, Ordering::SeqCst);
//!     Ok(ScriptValue::Undefined)
//! });
//!
//! let id = context.fetch().start(&[
//!     ScriptValue::from("https://example.test"),
//!     ScriptValue::from("{}"),
//!     callback,
//! ])?;
//!
//! // Normally called by the transport from its own thread
//! context.fetch().deliver_parts(id, "", 200, "{}");
//! assert!(called.load(Ordering::SeqCst));
//! # Ok::<(), script_bridge::BridgeError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod logging;
pub mod registry;
pub mod transport;

pub use bridge::{
    FetchBinding, FetchHandle, SocketCallbacks, SocketEvent, SocketHandle, SocketState,
    WebSocketBinding,
};
pub use config::BridgeConfig;
pub use constants::MAX_SAFE_TOKEN;
pub use context::{BridgeContext, BridgeMetrics};
pub use dispatch::{
    run_on, DispatchOutcome, Dispatcher, EventLoop, EventLoopHandle, EventLoopScope, TaskPump,
    ThreadScope,
};
pub use engine::{NativeFunction, ScriptCallable, ScriptFunction, ScriptValue};
pub use error::{BridgeError, DispatchError, Result};
pub use logging::init_structured_logging;
pub use registry::{CallbackRegistry, CorrelationId, IdAllocator, RegistryMetrics};
pub use transport::{
    FetchDelivery, FetchResponse, FetchTransport, LoopbackTransport, SocketDelivery,
    SocketTransport,
};
