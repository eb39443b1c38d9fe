//! # Native Transport Interfaces
//!
//! The bridge forwards requests to a native transport and receives results
//! back through delivery sinks. Every call in both directions is
//! fire-and-forget; transports call the sinks from their own threads.
//!
//! ```text
//! FetchBinding ──invoke_fetch(id, url, body, sink)──→ FetchTransport
//!      ↑                                                   │
//!      └────────── FetchDelivery::deliver(id, response) ───┘   (I/O thread)
//! ```

pub mod loopback;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::registry::CorrelationId;

pub use loopback::{FetchResponder, LoopbackTransport};

/// Outcome of one fetch, as reported by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// Transport-level failure; empty when the request completed
    pub error: String,
    pub status_code: i32,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(status_code: i32, body: impl Into<String>) -> Self {
        Self {
            error: String::new(),
            status_code,
            body: body.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status_code: 0,
            body: String::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Sink for fetch completions. Callable from any thread.
pub trait FetchDelivery: Send + Sync {
    /// Report the result for `id`. Returns false if nothing was waiting for it.
    fn deliver(&self, id: CorrelationId, response: FetchResponse) -> bool;
}

/// Sink for socket events. Callable from any thread.
///
/// Each method returns false when the token is unknown (never registered or
/// already closed) or the matching script callback is missing.
pub trait SocketDelivery: Send + Sync {
    fn deliver_open(&self, token: CorrelationId) -> bool;
    fn deliver_message(&self, token: CorrelationId, message: String) -> bool;
    fn deliver_close(&self, token: CorrelationId, code: i32, reason: String) -> bool;
    fn deliver_error(&self, token: CorrelationId, error: String) -> bool;
}

/// Native HTTP fetch implementation
pub trait FetchTransport: Send + Sync {
    fn invoke_fetch(
        &self,
        id: CorrelationId,
        url: &str,
        body: &str,
        delivery: Arc<dyn FetchDelivery>,
    );
}

/// Native socket implementation
pub trait SocketTransport: Send + Sync {
    /// Open a connection identified by `token`; events go to `delivery`
    fn connect(&self, token: CorrelationId, url: &str, delivery: Arc<dyn SocketDelivery>);
    fn send(&self, token: CorrelationId, message: &str);
    fn close(&self, token: CorrelationId, code: i32, reason: &str);
}

/// Late-bound transport reference.
///
/// Hosts may register the native side after the engine bindings exist; until
/// then the slot is empty and operations report the transport as unavailable.
pub struct TransportSlot<T: ?Sized> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Default for TransportSlot<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for TransportSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl<T: ?Sized> TransportSlot<T> {
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.read().clone()
    }

    pub fn set(&self, transport: Arc<T>) {
        *self.inner.write() = Some(transport);
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn is_registered(&self) -> bool {
        self.inner.read().is_some()
    }
}
