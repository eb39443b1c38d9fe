//! # Engine Bindings
//!
//! The two operation façades the scripting engine sees as globals.
//!
//! - **FetchBinding**: one-shot request/response, one callback per id
//! - **WebSocketBinding**: multi-event connections, four callbacks per token
//!
//! Both own their registry and allocator, forward work to a late-bound
//! native transport, and route deliveries through the context's
//! [`Dispatcher`](crate::dispatch::Dispatcher).

pub mod fetch;
pub mod handle;
pub mod websocket;

pub use fetch::FetchBinding;
pub use handle::{FetchHandle, SocketCallbacks, SocketEvent, SocketHandle, SocketState};
pub use websocket::WebSocketBinding;
