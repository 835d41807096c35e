use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use mediaplat_core::{sync, PlatformError, Result};
use tracing::{debug, error, trace, warn};

use crate::item::WorkItem;
use crate::queue::{Job, Route, SerialQueue, WorkQueueId};
use crate::result::AsyncResult;

use super::core::SchedulerInner;

impl SchedulerInner {
    /// Send a job to `queue`.
    pub(super) fn submit(self: &Arc<Self>, queue: WorkQueueId, job: Job) -> Result<()> {
        let route = sync::lock(&self.queues).route(queue)?;
        match route {
            Route::Pool => self.spawn(job),
            Route::Serial(serial) => self.submit_serial(serial, job),
        }
    }

    fn spawn(&self, job: Job) -> Result<()> {
        let runtime = sync::read(&self.runtime);
        let runtime = runtime.as_ref().ok_or(PlatformError::Shutdown)?;
        runtime.pool.spawn(job.run);
        Ok(())
    }

    fn submit_serial(self: &Arc<Self>, serial: Arc<SerialQueue>, job: Job) -> Result<()> {
        match serial.enqueue(job) {
            None => Ok(()),
            Some(job) => self.start_serial(Arc::clone(&serial), job).inspect_err(|_| {
                serial.abandon();
            }),
        }
    }

    /// Run `job` on the serial queue's target, then pull the next queued
    /// job, until the queue drains.
    fn start_serial(self: &Arc<Self>, serial: Arc<SerialQueue>, job: Job) -> Result<()> {
        let weak = Arc::downgrade(self);
        let target = serial.target;
        let run = job.run;
        self.submit(
            target,
            Job::new(job.priority, move || {
                run();
                let Some(next) = serial.next() else {
                    return;
                };
                let restarted = match weak.upgrade() {
                    Some(inner) => inner.start_serial(Arc::clone(&serial), next),
                    None => Err(PlatformError::Shutdown),
                };
                if let Err(e) = restarted {
                    let dropped = serial.abandon();
                    debug!("Serial queue on {} stopped draining: {} ({} dropped)", target, e, dropped + 1);
                }
            }),
        )
    }

    /// Hand a keyed item to its queue. On failure the item is discarded.
    pub(super) fn dispatch_item(self: &Arc<Self>, item: Arc<WorkItem>) -> Result<()> {
        let queue = item.queue;
        let job = self.item_job(Arc::clone(&item));
        self.submit(queue, job).inspect_err(|_| {
            self.discard(&item);
        })
    }

    fn item_job(self: &Arc<Self>, item: Arc<WorkItem>) -> Job {
        let weak = Arc::downgrade(self);
        Job::new(item.priority, move || {
            if !item.claim() {
                trace!("Skipping cancelled work item {}", item.key);
                return;
            }
            if let Some(inner) = weak.upgrade() {
                sync::lock(&inner.items).remove(&item.key);
                inner.complete(item.queue, &item.result);
            }
        })
    }

    /// Job that completes `result` without a key.
    pub(super) fn result_job(self: &Arc<Self>, queue: WorkQueueId, result: AsyncResult) -> Job {
        let weak = Arc::downgrade(self);
        Job::new(0, move || {
            if let Some(inner) = weak.upgrade() {
                inner.complete(queue, &result);
            }
        })
    }

    /// Invoke the callback, then signal the result's event.
    fn complete(&self, queue: WorkQueueId, result: &AsyncResult) {
        let started = Instant::now();
        let outcome = match result.callback() {
            Some(callback) => panic::catch_unwind(AssertUnwindSafe(|| callback.invoke(result)))
                .unwrap_or_else(|_| {
                    error!("Callback on {} queue panicked", queue);
                    Err(PlatformError::Fail)
                }),
            None => Ok(()),
        };
        if let Err(e) = outcome {
            warn!("Callback on {} queue failed: {}", queue, e);
            result.set_status(Err(e));
        }

        {
            let mut metrics = sync::write(&self.metrics);
            metrics.record_execution(&queue.to_string(), started.elapsed());
            if outcome.is_err() {
                metrics.callback_failures += 1;
            }
        }

        if let Some(event) = result.event() {
            event.set();
        }
    }
}
