//! # Callback Handles
//!
//! Owned wrappers around the script callables an operation will eventually
//! invoke. Handles are shared (`Arc`) between the registry and in-flight
//! dispatch tasks; per-delivery payloads travel in the task itself, never in
//! the handle, so concurrent deliveries cannot overwrite each other's data.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::constants::properties;
use crate::engine::{ScriptFunction, ScriptValue};
use crate::error::{BridgeError, Result};
use crate::transport::FetchResponse;

/// Handle for one in-flight fetch
pub struct FetchHandle {
    url: String,
    callback: ScriptFunction,
}

impl fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchHandle")
            .field("url", &self.url)
            .field("callback", &self.callback.name())
            .finish()
    }
}

impl FetchHandle {
    pub fn new(url: impl Into<String>, callback: ScriptFunction) -> Self {
        Self {
            url: url.into(),
            callback,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Callback arguments: `(error | undefined, { statusCode }, body)`
    pub fn arguments(response: &FetchResponse) -> [ScriptValue; 3] {
        let error = if response.is_error() {
            ScriptValue::from(response.error.as_str())
        } else {
            ScriptValue::Undefined
        };
        let status = ScriptValue::object([(
            properties::STATUS_CODE,
            ScriptValue::from(response.status_code),
        )]);
        [error, status, ScriptValue::from(response.body.as_str())]
    }

    /// Invoke the callback with `response`. Must run on the scripting thread.
    pub fn invoke(&self, response: &FetchResponse) -> Result<()> {
        if !self.callback.is_callable() {
            return Err(BridgeError::NotCallable {
                event: "fetch".to_string(),
            });
        }
        self.callback.invoke(&Self::arguments(response))?;
        Ok(())
    }
}

/// Lifecycle of a socket connection, as observed from deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl SocketState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// One event delivered by the socket transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Message(String),
    Close { code: i32, reason: String },
    Error(String),
}

impl SocketEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Close { .. } => "close",
            Self::Error(_) => "error",
        }
    }

    /// Close and error end the connection
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Close { .. } | Self::Error(_))
    }

    /// State the connection is in after this event
    pub fn resulting_state(&self) -> SocketState {
        match self {
            Self::Open | Self::Message(_) => SocketState::Open,
            Self::Close { .. } => SocketState::Closed,
            Self::Error(_) => SocketState::Errored,
        }
    }

    /// Arguments passed to the matching script callback
    pub fn arguments(&self) -> Vec<ScriptValue> {
        match self {
            Self::Open => Vec::new(),
            Self::Message(message) => vec![ScriptValue::from(message.as_str())],
            Self::Close { code, reason } => vec![ScriptValue::object([
                (properties::CODE, ScriptValue::from(*code)),
                (properties::MESSAGE, ScriptValue::from(reason.as_str())),
            ])],
            Self::Error(error) => vec![ScriptValue::from(error.as_str())],
        }
    }
}

/// The four optional socket callbacks, fixed at connect time
#[derive(Clone, Default)]
pub struct SocketCallbacks {
    pub on_open: Option<ScriptFunction>,
    pub on_message: Option<ScriptFunction>,
    pub on_close: Option<ScriptFunction>,
    pub on_error: Option<ScriptFunction>,
}

impl fmt::Debug for SocketCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketCallbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl SocketCallbacks {
    /// Callbacks from engine arguments; anything that is not a function is absent
    pub fn from_values(
        on_open: &ScriptValue,
        on_message: &ScriptValue,
        on_close: &ScriptValue,
        on_error: &ScriptValue,
    ) -> Self {
        Self {
            on_open: on_open.as_function().cloned(),
            on_message: on_message.as_function().cloned(),
            on_close: on_close.as_function().cloned(),
            on_error: on_error.as_function().cloned(),
        }
    }

    pub fn for_event(&self, event: &SocketEvent) -> Option<&ScriptFunction> {
        match event {
            SocketEvent::Open => self.on_open.as_ref(),
            SocketEvent::Message(_) => self.on_message.as_ref(),
            SocketEvent::Close { .. } => self.on_close.as_ref(),
            SocketEvent::Error(_) => self.on_error.as_ref(),
        }
    }
}

/// Handle for one socket connection, receiving many events
#[derive(Debug)]
pub struct SocketHandle {
    url: String,
    callbacks: SocketCallbacks,
    state: Mutex<SocketState>,
}

impl SocketHandle {
    pub fn new(url: impl Into<String>, callbacks: SocketCallbacks) -> Self {
        Self {
            url: url.into(),
            callbacks,
            state: Mutex::new(SocketState::Connecting),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SocketState {
        *self.state.lock()
    }

    /// Note the state implied by `event`. Observed, never enforced.
    pub fn record(&self, event: &SocketEvent) -> SocketState {
        let mut state = self.state.lock();
        let previous = *state;
        *state = event.resulting_state();
        previous
    }

    /// Whether a callable callback is wired for `event` right now
    pub fn accepts(&self, event: &SocketEvent) -> bool {
        self.callbacks
            .for_event(event)
            .is_some_and(|callback| callback.is_callable())
    }

    /// Invoke the callback for `event`. Must run on the scripting thread.
    pub fn invoke(&self, event: &SocketEvent) -> Result<()> {
        let callback = self
            .callbacks
            .for_event(event)
            .filter(|callback| callback.is_callable())
            .ok_or_else(|| BridgeError::NotCallable {
                event: event.name().to_string(),
            })?;
        callback.invoke(&event.arguments())?;
        Ok(())
    }
}
