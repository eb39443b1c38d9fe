//! # Fetch Binding
//!
//! One-shot request/response correlation between the scripting engine's
//! global fetch function and the native fetch transport.
//!
//! ## Flow
//!
//! ```text
//! script: __bridge_fetch__(url, body, callback)        (scripting thread)
//!     │
//!     ├─→ validate arguments (bad args: logged, no-op)
//!     ├─→ id = IdAllocator::try_next()
//!     ├─→ registry.set(id, FetchHandle)                 before the transport sees id
//!     └─→ FetchTransport::invoke_fetch(id, url, body, sink)
//!
//! transport: FetchDelivery::deliver(id, response)     (any thread)
//!     │
//!     ├─→ registry.remove(id) (unknown id: logged, ignored)
//!     └─→ Dispatcher::run_on(callback(error, {statusCode}, body))
//! ```
//!
//! The handle is removed before it is invoked, so a second delivery for the
//! same id finds nothing and the callback runs at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::handle::FetchHandle;
use crate::constants::{arity, MAX_SAFE_TOKEN};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::engine::{ScriptFunction, ScriptValue};
use crate::error::{BridgeError, Result};
use crate::logging::log_bridge_operation;
use crate::registry::{CallbackRegistry, CorrelationId, IdAllocator, RegistryMetrics};
use crate::transport::{FetchDelivery, FetchResponse, FetchTransport, TransportSlot};

const COMPONENT: &str = "fetch";

/// Engine-facing fetch entry point and transport-facing completion sink
pub struct FetchBinding {
    global_name: String,
    registry: CallbackRegistry<FetchHandle>,
    ids: IdAllocator,
    transport: TransportSlot<dyn FetchTransport>,
    dispatcher: Dispatcher,
    active: AtomicBool,
}

impl std::fmt::Debug for FetchBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchBinding")
            .field("global_name", &self.global_name)
            .field("pending_count", &self.registry.len())
            .field("transport", &self.transport)
            .field("dispatcher", &self.dispatcher)
            .field("active", &self.is_active())
            .finish()
    }
}

impl FetchBinding {
    pub fn new(
        global_name: impl Into<String>,
        id_base: CorrelationId,
        dispatcher: Dispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            global_name: global_name.into(),
            registry: CallbackRegistry::new("fetch callback"),
            ids: IdAllocator::new(id_base),
            transport: TransportSlot::default(),
            dispatcher,
            active: AtomicBool::new(true),
        })
    }

    pub fn global_name(&self) -> &str {
        &self.global_name
    }

    pub fn set_transport(&self, transport: Arc<dyn FetchTransport>) {
        self.transport.set(transport);
    }

    pub fn clear_transport(&self) {
        self.transport.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Engine entry point. Never raises; failures are logged.
    pub fn call(self: &Arc<Self>, args: &[ScriptValue]) -> ScriptValue {
        if let Err(e) = self.start(args) {
            e.log_absorbed(COMPONENT);
        }
        ScriptValue::Undefined
    }

    /// Function value to install as the engine global
    pub fn as_function(self: &Arc<Self>) -> ScriptValue {
        let binding = Arc::clone(self);
        ScriptValue::native(self.global_name.clone(), move |args: &[ScriptValue]| {
            Ok(binding.call(args))
        })
    }

    /// Start a fetch from `(url, body, callback)`. Returns the allocated id.
    ///
    /// With no transport registered the callback stays registered and never
    /// fires; the id is still returned.
    pub fn start(self: &Arc<Self>, args: &[ScriptValue]) -> Result<CorrelationId> {
        if !self.is_active() {
            return Err(BridgeError::TornDown);
        }
        let (url, body, callback) = self.validate(args)?;

        let id = self.ids.try_next().ok_or(BridgeError::IdsExhausted {
            ceiling: MAX_SAFE_TOKEN,
        })?;
        self.registry
            .set(id, Arc::new(FetchHandle::new(url, callback.clone())));

        let Some(transport) = self.transport.get() else {
            BridgeError::TransportUnavailable {
                operation: self.global_name.clone(),
            }
            .log_absorbed(COMPONENT);
            return Ok(id);
        };

        log_bridge_operation(COMPONENT, "start", id, "forwarded", Some(url));
        transport.invoke_fetch(id, url, body, Arc::clone(self) as Arc<dyn FetchDelivery>);
        Ok(id)
    }

    fn validate<'a>(
        &self,
        args: &'a [ScriptValue],
    ) -> Result<(&'a str, &'a str, &'a ScriptFunction)> {
        if args.len() != arity::FETCH {
            return Err(self.invalid(format!(
                "expects {} arguments (url, body, callback), got {}",
                arity::FETCH,
                args.len()
            )));
        }
        let callback = args[2]
            .as_function()
            .filter(|callback| callback.is_callable())
            .ok_or_else(|| {
                self.invalid(format!(
                    "callback must be a function, got {}",
                    args[2].type_name()
                ))
            })?;
        let url = args[0].as_str().ok_or_else(|| {
            self.invalid(format!("url must be a string, got {}", args[0].type_name()))
        })?;
        let body = args[1].as_str().ok_or_else(|| {
            self.invalid(format!(
                "body must be a string, got {}",
                args[1].type_name()
            ))
        })?;
        Ok((url, body, callback))
    }

    fn invalid(&self, message: String) -> BridgeError {
        BridgeError::validation(self.global_name.clone(), message)
    }

    /// Deliver the result for `id` from any thread.
    ///
    /// Returns true if a callback was waiting and its invocation was run or
    /// queued on the scripting thread.
    pub fn deliver(&self, id: CorrelationId, response: FetchResponse) -> bool {
        let Some(handle) = self.registry.remove(id) else {
            BridgeError::UnknownId {
                kind: self.registry.kind(),
                id,
            }
            .log_absorbed(COMPONENT);
            return false;
        };

        debug!(
            id = id,
            url = %handle.url(),
            status_code = response.status_code,
            is_error = response.is_error(),
            "Fetch result received"
        );

        let outcome = self.dispatcher.run_on(move || {
            if let Err(e) = handle.invoke(&response) {
                e.log_absorbed(COMPONENT);
            }
        });
        log_bridge_operation(COMPONENT, "deliver", id, outcome_label(outcome), None);
        outcome != DispatchOutcome::Dropped
    }

    /// Convenience form of [`FetchBinding::deliver`] taking the raw fields
    pub fn deliver_parts(
        &self,
        id: CorrelationId,
        error: &str,
        status_code: i32,
        body: &str,
    ) -> bool {
        self.deliver(
            id,
            FetchResponse {
                error: error.to_string(),
                status_code,
                body: body.to_string(),
            },
        )
    }

    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.registry.contains(id)
    }

    pub fn metrics(&self, aging_threshold: Duration) -> RegistryMetrics {
        self.registry.metrics(aging_threshold)
    }

    pub fn log_aging_entries(&self, aging_threshold: Duration) -> usize {
        self.registry.log_aging_entries(aging_threshold)
    }

    /// Release every pending callback without invoking it and refuse new
    /// fetches. Returns how many callbacks were released.
    pub fn teardown(&self) -> usize {
        self.active.store(false, Ordering::Release);
        self.registry.reset()
    }
}

impl FetchDelivery for FetchBinding {
    fn deliver(&self, id: CorrelationId, response: FetchResponse) -> bool {
        FetchBinding::deliver(self, id, response)
    }
}

pub(crate) fn outcome_label(outcome: DispatchOutcome) -> &'static str {
    match outcome {
        DispatchOutcome::Inline => "invoked_inline",
        DispatchOutcome::Posted => "posted",
        DispatchOutcome::Dropped => "dropped",
    }
}
