//! # Bridge Constants
//!
//! Names, limits and wire-level defaults shared by the bridge façades and the
//! configuration layer.

/// Names of the entry points installed into the scripting engine's global scope
pub mod globals {
    /// Default name of the global fetch function
    pub const FETCH: &str = "__bridge_fetch__";
    /// Default name of the global socket host object
    pub const WEBSOCKET: &str = "__bridge_websocket__";
}

/// Property names exposed by the socket host object
pub mod websocket_methods {
    pub const CONNECT: &str = "connect";
    pub const SEND: &str = "send";
    pub const CLOSE: &str = "close";

    /// All methods in enumeration order
    pub const ALL: [&str; 3] = [CONNECT, SEND, CLOSE];
}

/// Expected argument counts for each entry point
pub mod arity {
    pub const FETCH: usize = 3;
    pub const CONNECT: usize = 5;
    pub const SEND: usize = 2;
    pub const CLOSE: usize = 3;
}

/// Property names on objects handed to script callbacks
pub mod properties {
    /// Fetch response object: HTTP status code
    pub const STATUS_CODE: &str = "statusCode";
    /// Socket close event: close code
    pub const CODE: &str = "code";
    /// Socket close event: close reason
    pub const MESSAGE: &str = "message";
}

/// Socket close codes used by the loopback transport
pub mod close_codes {
    /// Normal closure
    pub const NORMAL: i32 = 1000;
    /// Abnormal closure, no close frame received
    pub const ABNORMAL: i32 = 1006;
    /// Close codes are unsigned 16-bit on the wire
    pub const MAX: i32 = u16::MAX as i32;
}

/// Largest integer the engine's number type represents exactly (2^53 - 1).
///
/// Correlation ids and socket tokens travel through the engine as numbers,
/// so allocators stop here instead of handing out ids that would collide
/// after conversion.
pub const MAX_SAFE_TOKEN: i64 = 9_007_199_254_740_991;

/// Environment variables read by configuration and logging
pub mod env {
    pub const PREFIX: &str = "SCRIPT_BRIDGE";
    pub const ENVIRONMENT: &str = "SCRIPT_BRIDGE_ENV";
    pub const LOG_FORMAT: &str = "SCRIPT_BRIDGE_LOG_FORMAT";
    pub const FETCH_GLOBAL: &str = "SCRIPT_BRIDGE_FETCH_GLOBAL";
    pub const WEBSOCKET_GLOBAL: &str = "SCRIPT_BRIDGE_WEBSOCKET_GLOBAL";
    pub const ID_BASE: &str = "SCRIPT_BRIDGE_ID_BASE";
    pub const PENDING_AGE_WARNING_MS: &str = "SCRIPT_BRIDGE_PENDING_AGE_WARNING_MS";
    pub const EVENT_LOOP_THREAD_NAME: &str = "SCRIPT_BRIDGE_EVENT_LOOP_THREAD_NAME";
}
