//! Asynchronous work queues: async results, completion callbacks, and a
//! scheduler that dispatches them on standard, private and serial queues.

pub mod callback;
pub mod config;
pub mod event;
pub mod item;
pub mod metrics;
pub mod queue;
pub mod result;
pub mod scheduler;
mod timer;

pub use callback::{callback_fn, callback_on, AsyncCallback, CallbackParameters, FnCallback};
pub use config::SchedulerConfig;
pub use event::Event;
pub use item::WorkItemKey;
pub use metrics::SchedulerMetrics;
pub use queue::WorkQueueId;
pub use result::{AsyncResult, AsyncResultBuilder};
pub use scheduler::Scheduler;
