//! Thread affinity abstraction for the scripting engine.

use std::fmt;

use crate::error::DispatchError;

/// A unit of work that owns everything it touches
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The thread a scripting engine must run on.
///
/// Implementations queue tasks for that thread and report whether the caller
/// is already on it. Tasks posted from one thread run in submission order.
pub trait ThreadScope: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Whether the calling thread is the target thread
    fn is_current_thread(&self) -> bool;

    /// Queue `task` on the target thread without waiting for it to run.
    ///
    /// Fails with [`DispatchError::TargetClosed`] once the target thread has
    /// shut down; the task is dropped without running.
    fn post_to_target_thread(&self, task: Task) -> Result<(), DispatchError>;
}
