//! Observer registration: a captured execution context plus a callback.

use std::sync::Arc;

use crate::context::ExecutionContext;

use super::Mutation;

/// Callback invoked once per delivered [`Mutation`].
pub(crate) type ObserverCallback = Arc<dyn Fn(Mutation) + Send + Sync>;

/// One registered observer: the execution context captured at registration
/// time and the callback to run on it.
pub(crate) struct Observer {
    context: Arc<dyn ExecutionContext>,
    callback: ObserverCallback,
}

impl Observer {
    pub(crate) fn new(context: Arc<dyn ExecutionContext>, callback: ObserverCallback) -> Self {
        Self { context, callback }
    }

    /// Schedules one delivery on the observer's own context. Never runs the
    /// callback inline; the serialized step stays free of subscriber code.
    pub(crate) fn deliver(&self, mutation: Mutation) {
        let callback = Arc::clone(&self.callback);
        self.context.execute(Box::new(move || (*callback)(mutation)));
    }
}
