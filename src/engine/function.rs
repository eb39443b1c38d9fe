//! Script-side callables as seen from native code.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

use super::ScriptValue;

/// A script function the bridge can hold on to and invoke later.
///
/// Engine bindings wrap their persistent function references in this trait.
/// The bridge moves handles across threads but only ever calls
/// [`ScriptCallable::invoke`] on the engine's required thread, via the
/// dispatcher.
pub trait ScriptCallable: Send + Sync {
    /// Call the function. An `Err` means the script raised.
    fn invoke(&self, args: &[ScriptValue]) -> Result<ScriptValue>;

    /// Whether the underlying value can still be called.
    ///
    /// Checked again at delivery time: a reference that was callable when it
    /// was registered may have been released by the engine since.
    fn is_callable(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Shared reference to a script callable
pub type ScriptFunction = Arc<dyn ScriptCallable>;

/// Callable backed by a Rust closure.
///
/// Used by host-defined functions and by tests standing in for script code.
pub struct NativeFunction<F> {
    name: String,
    body: F,
}

impl<F> NativeFunction<F>
where
    F: Fn(&[ScriptValue]) -> Result<ScriptValue> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn into_function(self) -> ScriptFunction {
        Arc::new(self)
    }
}

impl<F> ScriptCallable for NativeFunction<F>
where
    F: Fn(&[ScriptValue]) -> Result<ScriptValue> + Send + Sync + 'static,
{
    fn invoke(&self, args: &[ScriptValue]) -> Result<ScriptValue> {
        (self.body)(args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for NativeFunction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish()
    }
}
