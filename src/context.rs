//! Execution contexts: where observer callbacks and read results run.
//!
//! The archive makes no assumption about where its callers live beyond
//! "somewhere that can run a closure later, in submission order". That
//! capability is modeled by [`ExecutionContext`] and injected at
//! registration time. [`SerialContext`] is the stock implementation: a
//! dedicated FIFO worker task.

use tokio::sync::mpsc;

/// A unit of work handed to an execution context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A place to run callbacks later.
///
/// Implementations must run tasks submitted by a single party in submission
/// order; that ordering is what turns the serializer's commit order into
/// per-observer delivery order. Tasks are expected to be short and
/// non-blocking.
pub trait ExecutionContext: Send + Sync + 'static {
    /// Accepts `task` for later execution. Must not block the caller.
    fn execute(&self, task: Task);
}

/// FIFO execution context backed by a dedicated worker task.
///
/// Tasks are queued on an unbounded channel and run one at a time, in
/// submission order, on a spawned tokio task. Cloning shares the same
/// worker. The worker winds down when every clone has been dropped.
#[derive(Debug, Clone)]
pub struct SerialContext {
    sender: mpsc::UnboundedSender<Task>,
}

impl SerialContext {
    /// Creates a new context and spawns its worker task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();
        tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                task();
            }
            tracing::debug!("serial context worker stopped");
        });
        Self { sender }
    }
}

impl Default for SerialContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for SerialContext {
    fn execute(&self, task: Task) {
        if self.sender.send(task).is_err() {
            tracing::debug!("serial context gone; task dropped");
        }
    }
}
