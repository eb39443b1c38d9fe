//! # Cross-Thread Dispatch
//!
//! Runs a unit of work on the scripting engine's required thread.
//!
//! ## Contract
//!
//! - No scope configured: the work runs inline, before `run_on` returns.
//! - Caller already on the target thread: the work runs inline.
//! - Otherwise the work is queued on the target thread and `run_on` returns
//!   immediately. Work queued from one thread runs in submission order.
//! - Target thread gone: the work is dropped without running. Nobody is
//!   listening for the result after teardown.
//!
//! Work items are `'static` closures: anything they touch is moved or
//! reference-counted into them, never borrowed from the caller's stack.

pub mod event_loop;
pub mod scope;

use std::sync::Arc;

pub use event_loop::{EventLoop, EventLoopHandle, EventLoopScope, TaskPump};
pub use scope::{Task, ThreadScope};

use crate::error::BridgeError;

/// What happened to a unit of work handed to [`run_on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Ran synchronously on the calling thread
    Inline,
    /// Queued on the target thread
    Posted,
    /// Target thread has shut down; the work was dropped
    Dropped,
}

/// Run `work` on the thread `scope` requires, or inline when there is no scope
pub fn run_on<F>(scope: Option<&dyn ThreadScope>, work: F) -> DispatchOutcome
where
    F: FnOnce() + Send + 'static,
{
    match scope {
        Some(scope) if !scope.is_current_thread() => {
            match scope.post_to_target_thread(Box::new(work)) {
                Ok(()) => DispatchOutcome::Posted,
                Err(e) => {
                    BridgeError::from(e).log_absorbed("dispatcher");
                    DispatchOutcome::Dropped
                }
            }
        }
        _ => {
            work();
            DispatchOutcome::Inline
        }
    }
}

/// Dispatcher bound to one engine context's scheduling scope
#[derive(Clone, Default)]
pub struct Dispatcher {
    scope: Option<Arc<dyn ThreadScope>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("scope", &self.scope.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher for an engine without thread affinity
    pub fn inline() -> Self {
        Self { scope: None }
    }

    pub fn new(scope: Option<Arc<dyn ThreadScope>>) -> Self {
        Self { scope }
    }

    pub fn with_scope(scope: Arc<dyn ThreadScope>) -> Self {
        Self { scope: Some(scope) }
    }

    pub fn scope(&self) -> Option<&Arc<dyn ThreadScope>> {
        self.scope.as_ref()
    }

    pub fn run_on<F>(&self, work: F) -> DispatchOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        run_on(self.scope.as_deref(), work)
    }
}
