//! Completion callbacks.

use std::sync::Arc;

use mediaplat_core::Result;

use crate::queue::WorkQueueId;
use crate::result::AsyncResult;

/// Where and how a callback wants to be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackParameters {
    /// Queue the callback runs on.
    pub queue: WorkQueueId,
    /// Opaque behaviour flags; not interpreted by the scheduler.
    pub flags: u32,
}

impl Default for CallbackParameters {
    fn default() -> Self {
        Self {
            queue: WorkQueueId::STANDARD,
            flags: 0,
        }
    }
}

/// Receiver of asynchronous completions.
///
/// `invoke` runs on a worker thread. An error return is logged and stored
/// as the result's status; it does not affect other work items.
pub trait AsyncCallback: Send + Sync {
    fn parameters(&self) -> CallbackParameters {
        CallbackParameters::default()
    }

    fn invoke(&self, result: &AsyncResult) -> Result<()>;
}

/// Closure-backed callback.
pub struct FnCallback<F> {
    parameters: CallbackParameters,
    f: F,
}

impl<F> AsyncCallback for FnCallback<F>
where
    F: Fn(&AsyncResult) -> Result<()> + Send + Sync,
{
    fn parameters(&self) -> CallbackParameters {
        self.parameters
    }

    fn invoke(&self, result: &AsyncResult) -> Result<()> {
        (self.f)(result)
    }
}

/// Wrap a closure as a callback on the standard queue.
pub fn callback_fn<F>(f: F) -> Arc<dyn AsyncCallback>
where
    F: Fn(&AsyncResult) -> Result<()> + Send + Sync + 'static,
{
    callback_on(WorkQueueId::STANDARD, f)
}

/// Wrap a closure as a callback on `queue`.
pub fn callback_on<F>(queue: WorkQueueId, f: F) -> Arc<dyn AsyncCallback>
where
    F: Fn(&AsyncResult) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnCallback {
        parameters: CallbackParameters { queue, flags: 0 },
        f,
    })
}
