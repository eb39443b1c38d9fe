//! # WebSocket Binding
//!
//! Multi-event correlation for socket connections. One token maps to one
//! [`SocketHandle`] carrying four optional callbacks; the handle stays
//! registered across open and message events and is removed when the close
//! or error event arrives.
//!
//! The host object exposed to scripts has three methods:
//!
//! - `connect(url, onOpen, onMessage, onClose, onError) -> token`
//! - `send(token, message)`
//! - `close(token, code, reason)`
//!
//! `send` and `close` go straight to the transport; the transport owns the
//! connection state and decides whether they are meaningful.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use super::fetch::outcome_label;
use super::handle::{SocketCallbacks, SocketEvent, SocketHandle, SocketState};
use crate::constants::{arity, close_codes, websocket_methods, MAX_SAFE_TOKEN};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::engine::ScriptValue;
use crate::error::{BridgeError, Result};
use crate::logging::log_bridge_operation;
use crate::registry::{CallbackRegistry, CorrelationId, IdAllocator, RegistryMetrics};
use crate::transport::{SocketDelivery, SocketTransport, TransportSlot};

const COMPONENT: &str = "websocket";

/// Engine-facing socket host object and transport-facing event sink
pub struct WebSocketBinding {
    global_name: String,
    registry: CallbackRegistry<SocketHandle>,
    tokens: IdAllocator,
    transport: TransportSlot<dyn SocketTransport>,
    dispatcher: Dispatcher,
    active: AtomicBool,
}

impl std::fmt::Debug for WebSocketBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketBinding")
            .field("global_name", &self.global_name)
            .field("open_connections", &self.registry.len())
            .field("transport", &self.transport)
            .field("dispatcher", &self.dispatcher)
            .field("active", &self.is_active())
            .finish()
    }
}

impl WebSocketBinding {
    pub fn new(
        global_name: impl Into<String>,
        token_base: CorrelationId,
        dispatcher: Dispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            global_name: global_name.into(),
            registry: CallbackRegistry::new("socket connection"),
            tokens: IdAllocator::new(token_base),
            transport: TransportSlot::default(),
            dispatcher,
            active: AtomicBool::new(true),
        })
    }

    pub fn global_name(&self) -> &str {
        &self.global_name
    }

    pub fn set_transport(&self, transport: Arc<dyn SocketTransport>) {
        self.transport.set(transport);
    }

    pub fn clear_transport(&self) {
        self.transport.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Method names of the host object
    pub fn property_names(&self) -> Vec<&'static str> {
        websocket_methods::ALL.to_vec()
    }

    /// Host object property lookup; unknown names are undefined
    pub fn get_property(self: &Arc<Self>, name: &str) -> ScriptValue {
        if !websocket_methods::ALL.contains(&name) {
            return ScriptValue::Undefined;
        }
        let binding = Arc::clone(self);
        let method = name.to_string();
        ScriptValue::native(name, move |args: &[ScriptValue]| {
            Ok(binding.call(&method, args))
        })
    }

    /// The host object is read-only
    pub fn set_property(&self, name: &str, _value: ScriptValue) -> Result<()> {
        Err(BridgeError::ReadOnlyProperty {
            object: self.global_name.clone(),
            property: name.to_string(),
        })
    }

    /// Object value with the three methods, to install as the engine global
    pub fn host_object(self: &Arc<Self>) -> ScriptValue {
        ScriptValue::object(
            websocket_methods::ALL
                .iter()
                .map(|name| (*name, self.get_property(name))),
        )
    }

    /// Engine entry point for `method`. Never raises; failures are logged.
    pub fn call(self: &Arc<Self>, method: &str, args: &[ScriptValue]) -> ScriptValue {
        let result = match method {
            websocket_methods::CONNECT => self.connect(args).map(ScriptValue::from),
            websocket_methods::SEND => self.send(args).map(|()| ScriptValue::Undefined),
            websocket_methods::CLOSE => self.close(args).map(|()| ScriptValue::Undefined),
            other => Err(BridgeError::validation(
                self.global_name.clone(),
                format!("unknown method '{other}'"),
            )),
        };
        result.unwrap_or_else(|e| {
            e.log_absorbed(COMPONENT);
            ScriptValue::Undefined
        })
    }

    /// Open a connection from `(url, onOpen, onMessage, onClose, onError)`.
    ///
    /// The token is registered before the transport sees it. With no
    /// transport registered the token is still returned; no events follow.
    pub fn connect(self: &Arc<Self>, args: &[ScriptValue]) -> Result<CorrelationId> {
        if !self.is_active() {
            return Err(BridgeError::TornDown);
        }
        if args.len() < arity::CONNECT {
            return Err(self.invalid(
                websocket_methods::CONNECT,
                format!(
                    "takes {} arguments (url, onOpen, onMessage, onClose, onError), got {}",
                    arity::CONNECT,
                    args.len()
                ),
            ));
        }
        let url = args[0].as_str().ok_or_else(|| {
            self.invalid(
                websocket_methods::CONNECT,
                format!("url must be a string, got {}", args[0].type_name()),
            )
        })?;

        let callbacks = SocketCallbacks::from_values(&args[1], &args[2], &args[3], &args[4]);
        let token = self.tokens.try_next().ok_or(BridgeError::IdsExhausted {
            ceiling: MAX_SAFE_TOKEN,
        })?;
        debug!(token = token, url = %url, callbacks = ?callbacks, "Socket connect requested");
        self.registry
            .set(token, Arc::new(SocketHandle::new(url, callbacks)));

        match self.transport.get() {
            Some(transport) => {
                log_bridge_operation(COMPONENT, "connect", token, "forwarded", Some(url));
                transport.connect(token, url, Arc::clone(self) as Arc<dyn SocketDelivery>);
            }
            None => BridgeError::TransportUnavailable {
                operation: format!("{}.{}", self.global_name, websocket_methods::CONNECT),
            }
            .log_absorbed(COMPONENT),
        }
        Ok(token)
    }

    /// Forward `(token, message)` to the transport
    pub fn send(&self, args: &[ScriptValue]) -> Result<()> {
        if args.len() < arity::SEND {
            return Err(self.invalid(
                websocket_methods::SEND,
                format!("takes 2 arguments (token, message), got {}", args.len()),
            ));
        }
        let token = self.token_arg(websocket_methods::SEND, &args[0])?;
        let message = args[1].as_str().ok_or_else(|| {
            self.invalid(
                websocket_methods::SEND,
                format!("message must be a string, got {}", args[1].type_name()),
            )
        })?;

        let transport = self.require_transport(websocket_methods::SEND)?;
        transport.send(token, message);
        Ok(())
    }

    /// Forward `(token, code, reason)` to the transport
    pub fn close(&self, args: &[ScriptValue]) -> Result<()> {
        if args.len() < arity::CLOSE {
            return Err(self.invalid(
                websocket_methods::CLOSE,
                format!("takes 3 arguments (token, code, reason), got {}", args.len()),
            ));
        }
        let token = self.token_arg(websocket_methods::CLOSE, &args[0])?;
        let code = args[1].as_number().ok_or_else(|| {
            self.invalid(
                websocket_methods::CLOSE,
                format!("code must be a number, got {}", args[1].type_name()),
            )
        })?;
        if code.fract() != 0.0 || !(0.0..=f64::from(close_codes::MAX)).contains(&code) {
            return Err(self.invalid(
                websocket_methods::CLOSE,
                format!("code must be an integer in 0..={}, got {code}", close_codes::MAX),
            ));
        }
        let reason = args[2].as_str().ok_or_else(|| {
            self.invalid(
                websocket_methods::CLOSE,
                format!("reason must be a string, got {}", args[2].type_name()),
            )
        })?;

        let transport = self.require_transport(websocket_methods::CLOSE)?;
        transport.close(token, code as i32, reason);
        Ok(())
    }

    fn token_arg(&self, method: &str, value: &ScriptValue) -> Result<CorrelationId> {
        let number = value.as_number().ok_or_else(|| {
            self.invalid(
                method,
                format!("token must be a number, got {}", value.type_name()),
            )
        })?;
        if number.fract() != 0.0 || !(0.0..=MAX_SAFE_TOKEN as f64).contains(&number) {
            return Err(self.invalid(method, format!("token {number} is not a valid token")));
        }
        Ok(number as CorrelationId)
    }

    fn require_transport(&self, method: &str) -> Result<Arc<dyn SocketTransport>> {
        self.transport
            .get()
            .ok_or_else(|| BridgeError::TransportUnavailable {
                operation: format!("{}.{method}", self.global_name),
            })
    }

    fn invalid(&self, method: &str, message: String) -> BridgeError {
        BridgeError::validation(format!("{}.{method}", self.global_name), message)
    }

    /// Route one transport event to its script callback.
    ///
    /// Terminal events take the handle out of the registry first, so later
    /// events for the token are ignored.
    pub fn deliver(&self, token: CorrelationId, event: SocketEvent) -> bool {
        let handle = if event.is_terminal() {
            self.registry.remove(token)
        } else {
            self.registry.get(token)
        };
        let Some(handle) = handle else {
            BridgeError::UnknownId {
                kind: self.registry.kind(),
                id: token,
            }
            .log_absorbed(COMPONENT);
            return false;
        };

        let previous = handle.record(&event);
        debug!(
            token = token,
            event = event.name(),
            previous_state = %previous,
            state = %event.resulting_state(),
            "Socket event received"
        );
        if previous.is_terminal() {
            error!(token = token, event = event.name(), "Socket event after terminal state");
        }

        if !handle.accepts(&event) {
            BridgeError::NotCallable {
                event: event.name().to_string(),
            }
            .log_absorbed(COMPONENT);
            return false;
        }

        let event_name = event.name();
        let outcome = self.dispatcher.run_on(move || {
            if let Err(e) = handle.invoke(&event) {
                e.log_absorbed(COMPONENT);
            }
        });
        log_bridge_operation(COMPONENT, event_name, token, outcome_label(outcome), None);
        outcome != DispatchOutcome::Dropped
    }

    /// Observed state of a registered connection; `None` once closed
    pub fn connection_state(&self, token: CorrelationId) -> Option<SocketState> {
        self.registry.get(token).map(|handle| handle.state())
    }

    pub fn open_connections(&self) -> usize {
        self.registry.len()
    }

    pub fn metrics(&self, aging_threshold: Duration) -> RegistryMetrics {
        self.registry.metrics(aging_threshold)
    }

    pub fn log_aging_entries(&self, aging_threshold: Duration) -> usize {
        self.registry.log_aging_entries(aging_threshold)
    }

    /// Release every connection handle without invoking it and refuse new
    /// connections. Returns how many handles were released.
    pub fn teardown(&self) -> usize {
        self.active.store(false, Ordering::Release);
        self.registry.reset()
    }
}

impl SocketDelivery for WebSocketBinding {
    fn deliver_open(&self, token: CorrelationId) -> bool {
        self.deliver(token, SocketEvent::Open)
    }

    fn deliver_message(&self, token: CorrelationId, message: String) -> bool {
        self.deliver(token, SocketEvent::Message(message))
    }

    fn deliver_close(&self, token: CorrelationId, code: i32, reason: String) -> bool {
        self.deliver(token, SocketEvent::Close { code, reason })
    }

    fn deliver_error(&self, token: CorrelationId, error: String) -> bool {
        self.deliver(token, SocketEvent::Error(error))
    }
}
