//! # Event Loop Scopes
//!
//! Concrete [`ThreadScope`]s backed by a FIFO channel.
//!
//! ```text
//! transport thread ──post──→ [ crossbeam channel ] ──→ scripting thread
//!                                                      (EventLoop::spawn loop,
//!                                                       or TaskPump driven by
//!                                                       the engine itself)
//! ```
//!
//! Two ways to bind the scripting thread:
//!
//! - [`EventLoop::spawn`] starts a dedicated thread that runs tasks until
//!   shut down.
//! - [`EventLoop::attach_current`] binds the calling thread; the engine
//!   drains tasks with [`TaskPump`] from its own loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error, info};

use super::scope::{Task, ThreadScope};
use crate::error::DispatchError;

enum Message {
    Run(Task),
    Shutdown,
}

/// Scope bound to one event loop thread
pub struct EventLoopScope {
    name: String,
    thread_id: ThreadId,
    sender: Sender<Message>,
    posted: AtomicU64,
}

impl std::fmt::Debug for EventLoopScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopScope")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .field("posted", &self.posted())
            .field("queued", &self.sender.len())
            .finish()
    }
}

impl EventLoopScope {
    fn new(name: String, thread_id: ThreadId, sender: Sender<Message>) -> Self {
        Self {
            name,
            thread_id,
            sender,
            posted: AtomicU64::new(0),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Tasks successfully queued so far
    pub fn posted(&self) -> u64 {
        self.posted.load(Ordering::Relaxed)
    }

    /// Ask the loop to stop after the tasks already queued.
    ///
    /// Posts after the loop stops fail with [`DispatchError::TargetClosed`].
    pub fn shutdown(&self) {
        if self.sender.send(Message::Shutdown).is_err() {
            debug!(scope = %self.name, "Event loop already stopped");
        }
    }
}

impl ThreadScope for EventLoopScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_current_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    fn post_to_target_thread(&self, task: Task) -> Result<(), DispatchError> {
        self.sender
            .send(Message::Run(task))
            .map_err(|_| DispatchError::TargetClosed {
                scope: self.name.clone(),
            })?;
        self.posted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Constructors for event loop scopes
pub struct EventLoop;

impl EventLoop {
    /// Start a dedicated scripting thread named `name`
    pub fn spawn(name: impl Into<String>) -> Result<EventLoopHandle, DispatchError> {
        let name = name.into();
        let (sender, receiver) = unbounded();
        let loop_name = name.clone();

        let join = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut pump = TaskPump::new(loop_name, receiver);
                pump.run_until_shutdown()
            })
            .map_err(|e| DispatchError::SpawnFailed {
                name: name.clone(),
                message: e.to_string(),
            })?;

        let scope = Arc::new(EventLoopScope::new(
            name.clone(),
            join.thread().id(),
            sender,
        ));
        info!(scope = %name, "Event loop thread started");

        Ok(EventLoopHandle {
            scope,
            join: Some(join),
        })
    }

    /// Bind the calling thread as the scripting thread.
    ///
    /// Tasks posted from other threads run when the returned pump is driven.
    /// Dropping the pump closes the scope.
    pub fn attach_current(name: impl Into<String>) -> (Arc<EventLoopScope>, TaskPump) {
        let name = name.into();
        let (sender, receiver) = unbounded();
        let scope = Arc::new(EventLoopScope::new(
            name.clone(),
            std::thread::current().id(),
            sender,
        ));
        (scope, TaskPump::new(name, receiver))
    }
}

/// Owner of a dedicated event loop thread.
///
/// Dropping the handle stops the loop after the tasks already queued.
pub struct EventLoopHandle {
    scope: Arc<EventLoopScope>,
    join: Option<JoinHandle<usize>>,
}

impl std::fmt::Debug for EventLoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopHandle")
            .field("scope", &self.scope)
            .field("running", &self.join.is_some())
            .finish()
    }
}

impl EventLoopHandle {
    pub fn scope(&self) -> Arc<EventLoopScope> {
        Arc::clone(&self.scope)
    }

    /// Stop the loop and wait for it. Returns how many tasks it ran.
    pub fn shutdown(mut self) -> usize {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> usize {
        let Some(join) = self.join.take() else {
            return 0;
        };
        self.scope.shutdown();
        if self.scope.is_current_thread() {
            // joining ourselves would deadlock; the loop exits after this task
            return 0;
        }
        match join.join() {
            Ok(ran) => ran,
            Err(_) => {
                error!(scope = %self.scope.name, "Event loop thread panicked");
                0
            }
        }
    }
}

impl Drop for EventLoopHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Receiving end of an event loop, driven on the scripting thread
pub struct TaskPump {
    name: String,
    receiver: Option<Receiver<Message>>,
    ran: usize,
}

impl std::fmt::Debug for TaskPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPump")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .field("ran", &self.ran)
            .finish()
    }
}

impl TaskPump {
    fn new(name: String, receiver: Receiver<Message>) -> Self {
        Self {
            name,
            receiver: Some(receiver),
            ran: 0,
        }
    }

    /// Whether the pump has seen a shutdown request
    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }

    /// Total tasks run by this pump
    pub fn tasks_run(&self) -> usize {
        self.ran
    }

    /// Run every task queued right now, without waiting. Returns the count.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Some(receiver) = &self.receiver {
            match receiver.try_recv() {
                Ok(message) => ran += usize::from(self.handle(message)),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.close();
                    break;
                }
            }
        }
        ran
    }

    /// Run tasks as they arrive for up to `timeout`. Returns the count.
    pub fn run_for(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut ran = 0;
        while let Some(receiver) = &self.receiver {
            match receiver.recv_deadline(deadline) {
                Ok(message) => ran += usize::from(self.handle(message)),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    self.close();
                    break;
                }
            }
        }
        ran
    }

    /// Run tasks until `done` returns true or `timeout` passes.
    ///
    /// Returns whether `done` was satisfied.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let Some(receiver) = &self.receiver else {
                return false;
            };
            let wait = deadline
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(10));
            if wait.is_zero() {
                return done();
            }
            match receiver.recv_timeout(wait) {
                Ok(message) => {
                    self.handle(message);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.close(),
            }
        }
    }

    fn run_until_shutdown(&mut self) -> usize {
        while let Some(receiver) = &self.receiver {
            match receiver.recv() {
                Ok(message) => {
                    self.handle(message);
                }
                Err(_) => self.close(),
            }
        }
        info!(scope = %self.name, tasks_run = self.ran, "Event loop thread stopped");
        self.ran
    }

    /// Returns true if a task ran
    fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Run(task) => {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    error!(scope = %self.name, "Task panicked on event loop thread");
                }
                self.ran += 1;
                true
            }
            Message::Shutdown => {
                self.close();
                false
            }
        }
    }

    fn close(&mut self) {
        if self.receiver.take().is_some() {
            debug!(scope = %self.name, "Event loop closed");
        }
    }
}
