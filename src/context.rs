//! # Bridge Context
//!
//! Owner of everything one engine context needs: the two bindings, the
//! dispatcher bound to the engine's thread, and the teardown lifecycle.
//! Each engine instance gets its own context, so several engines can run in
//! one process without sharing callback state.
//!
//! ```rust
//! use script_bridge::{BridgeConfig, BridgeContext, Dispatcher};
//!
//! let context = BridgeContext::new(BridgeConfig::default(), Dispatcher::inline()).unwrap();
//! assert!(context.global("__bridge_fetch__").is_callable());
//!
//! context.teardown();
//! assert!(context.global("__bridge_fetch__").is_undefined());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::bridge::{FetchBinding, WebSocketBinding};
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::engine::ScriptValue;
use crate::error::{BridgeError, Result};
use crate::registry::RegistryMetrics;
use crate::transport::{FetchTransport, SocketTransport};

/// Registry metrics for both bindings
#[derive(Debug, Clone, Serialize)]
pub struct BridgeMetrics {
    pub fetch: RegistryMetrics,
    pub websocket: RegistryMetrics,
    pub torn_down: bool,
}

/// Per-engine-context bridge state
#[derive(Debug)]
pub struct BridgeContext {
    config: BridgeConfig,
    dispatcher: Dispatcher,
    fetch: Arc<FetchBinding>,
    websocket: Arc<WebSocketBinding>,
    torn_down: AtomicBool,
}

impl BridgeContext {
    /// Create a context after validating `config`
    pub fn new(config: BridgeConfig, dispatcher: Dispatcher) -> Result<Self> {
        config.validate()?;

        let fetch = FetchBinding::new(&config.fetch_global, config.id_base, dispatcher.clone());
        let websocket =
            WebSocketBinding::new(&config.websocket_global, config.id_base, dispatcher.clone());

        info!(
            fetch_global = %config.fetch_global,
            websocket_global = %config.websocket_global,
            id_base = config.id_base,
            dispatcher = ?dispatcher,
            "Bridge context created"
        );

        Ok(Self {
            config,
            dispatcher,
            fetch,
            websocket,
            torn_down: AtomicBool::new(false),
        })
    }

    /// Register one transport for both operations
    pub fn with_transport<T>(self, transport: Arc<T>) -> Self
    where
        T: FetchTransport + SocketTransport + 'static,
    {
        self.set_fetch_transport(transport.clone());
        self.set_socket_transport(transport);
        self
    }

    pub fn set_fetch_transport(&self, transport: Arc<dyn FetchTransport>) {
        self.fetch.set_transport(transport);
    }

    pub fn set_socket_transport(&self, transport: Arc<dyn SocketTransport>) {
        self.websocket.set_transport(transport);
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn fetch(&self) -> &Arc<FetchBinding> {
        &self.fetch
    }

    pub fn websocket(&self) -> &Arc<WebSocketBinding> {
        &self.websocket
    }

    /// The global name/value pairs to install in the engine
    pub fn globals(&self) -> Vec<(String, ScriptValue)> {
        if self.is_torn_down() {
            return Vec::new();
        }
        vec![
            (self.config.fetch_global.clone(), self.fetch.as_function()),
            (
                self.config.websocket_global.clone(),
                self.websocket.host_object(),
            ),
        ]
    }

    /// Resolve a global by name; unknown names and any name after teardown
    /// are undefined
    pub fn global(&self, name: &str) -> ScriptValue {
        if self.is_torn_down() {
            return ScriptValue::Undefined;
        }
        if name == self.config.fetch_global {
            self.fetch.as_function()
        } else if name == self.config.websocket_global {
            self.websocket.host_object()
        } else {
            ScriptValue::Undefined
        }
    }

    /// Call the global function `name` as the engine would
    pub fn call_global(&self, name: &str, args: &[ScriptValue]) -> ScriptValue {
        match self.global(name).as_function() {
            Some(function) => function.invoke(args).unwrap_or_else(|e| {
                e.log_absorbed("context");
                ScriptValue::Undefined
            }),
            None => {
                BridgeError::validation(name, "not a callable global").log_absorbed("context");
                ScriptValue::Undefined
            }
        }
    }

    /// Call `object.method(args)` on a global host object
    pub fn call_method(&self, object: &str, method: &str, args: &[ScriptValue]) -> ScriptValue {
        let target = self.global(object);
        match target.get(method).and_then(ScriptValue::as_function) {
            Some(function) => function.invoke(args).unwrap_or_else(|e| {
                e.log_absorbed("context");
                ScriptValue::Undefined
            }),
            None => {
                BridgeError::validation(format!("{object}.{method}"), "not a callable method")
                    .log_absorbed("context");
                ScriptValue::Undefined
            }
        }
    }

    /// Release every outstanding handle without invoking it.
    ///
    /// Runs once; returns false when the context was already torn down.
    /// Deliveries racing with teardown find nothing and are ignored.
    pub fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            BridgeError::TornDown.log_absorbed("context");
            return false;
        }
        if let Some(scope) = self.dispatcher.scope() {
            if !scope.is_current_thread() {
                warn!(scope = %scope.name(), "Bridge teardown called off the scripting thread");
            }
        }

        let fetch_released = self.fetch.teardown();
        let sockets_released = self.websocket.teardown();
        info!(
            fetch_released = fetch_released,
            sockets_released = sockets_released,
            "Bridge context torn down"
        );
        true
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> BridgeMetrics {
        let threshold = self.config.pending_age_warning();
        BridgeMetrics {
            fetch: self.fetch.metrics(threshold),
            websocket: self.websocket.metrics(threshold),
            torn_down: self.is_torn_down(),
        }
    }

    /// Warn about registry entries older than the configured threshold
    pub fn log_aging_entries(&self) -> usize {
        let threshold = self.config.pending_age_warning();
        self.fetch.log_aging_entries(threshold) + self.websocket.log_aging_entries(threshold)
    }
}
