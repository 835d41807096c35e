use std::sync::Arc;
use std::time::{Duration, Instant};

use mediaplat_core::{sync, Object, PlatformError, Result};
use tracing::{debug, warn};

use crate::callback::AsyncCallback;
use crate::event::Event;
use crate::item::WorkItemKey;
use crate::queue::WorkQueueId;
use crate::result::AsyncResult;

use super::Scheduler;

impl Scheduler {
    /// Run `callback` once after `delay_ms` milliseconds, with a fresh
    /// result carrying `state`. A non-positive delay means as soon as
    /// possible.
    pub fn schedule_work_item(
        &self,
        callback: Arc<dyn AsyncCallback>,
        state: Option<Object>,
        delay_ms: i64,
    ) -> Result<WorkItemKey> {
        let result = AsyncResult::new(None, Some(callback), state);
        self.schedule_work_item_ex(&result, delay_ms)
    }

    /// Complete `result` once after `delay_ms` milliseconds.
    pub fn schedule_work_item_ex(&self, result: &AsyncResult, delay_ms: i64) -> Result<WorkItemKey> {
        let inner = &self.inner;
        inner.ensure_running()?;
        let queue = result.queue();
        inner.validate_queue(queue)?;

        let item = inner.register(queue, 0, result.clone(), None);
        let key = item.key;
        if delay_ms <= 0 {
            inner.dispatch_item(item)?;
        } else {
            let deadline = Instant::now() + Duration::from_millis(delay_ms as u64);
            let runtime = sync::read(&inner.runtime);
            match runtime.as_ref() {
                Some(runtime) => runtime.timer.schedule(deadline, item),
                None => {
                    inner.discard(&item);
                    return Err(PlatformError::Shutdown);
                }
            }
        }
        debug!("Scheduled work item {} on {} queue, delay {} ms", key, queue, delay_ms);
        Ok(key)
    }

    /// Complete `result` when `event` is signalled, or as soon as possible
    /// when there is no event. Several items may share one result.
    ///
    /// On a serial queue a higher `priority` overtakes queued items of
    /// lower priority.
    pub fn put_waiting_work_item(
        &self,
        event: Option<&Event>,
        priority: i32,
        result: &AsyncResult,
    ) -> Result<WorkItemKey> {
        let inner = &self.inner;
        inner.ensure_running()?;
        if result.callback().is_none() && result.event().is_none() {
            return Err(PlatformError::InvalidArgument);
        }
        let queue = result.queue();
        inner.validate_queue(queue)?;

        let item = inner.register(queue, priority, result.clone(), event.cloned());
        let key = item.key;
        match event {
            None => inner.dispatch_item(item)?,
            Some(event) => {
                let weak = Arc::downgrade(inner);
                let waiting = Arc::clone(&item);
                let token = event.register(Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        if let Err(e) = inner.dispatch_item(waiting) {
                            warn!("Waiting work item {} dropped: {}", key, e);
                        }
                    }
                }));
                if let Some(token) = token {
                    item.set_waiter(token);
                    // Cancelled before the token was recorded.
                    if !item.is_pending() {
                        event.unregister(token);
                    }
                }
            }
        }
        debug!("Queued waiting work item {} on {} queue", key, queue);
        Ok(key)
    }

    /// Run `callback` on `queue` with a fresh result carrying `state`.
    pub fn put_work_item(
        &self,
        queue: WorkQueueId,
        callback: Arc<dyn AsyncCallback>,
        state: Option<Object>,
    ) -> Result<()> {
        let result = AsyncResult::new(None, Some(callback), state);
        self.put_work_item_ex(queue, &result)
    }

    /// Complete `result` on `queue`. Such items carry no key.
    pub fn put_work_item_ex(&self, queue: WorkQueueId, result: &AsyncResult) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_running()?;
        inner.submit(queue, inner.result_job(queue, result.clone()))
    }

    /// Complete `result` on the queue its callback asks for.
    pub fn invoke_callback(&self, result: &AsyncResult) -> Result<()> {
        self.put_work_item_ex(result.queue(), result)
    }

    /// Cancel a pending work item.
    ///
    /// Fails with `NotFound` once the item has been dispatched or cancelled,
    /// unless the scheduler is configured with `repeat_cancel_succeeds`.
    pub fn cancel_work_item(&self, key: WorkItemKey) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_running()?;
        let item = sync::lock(&inner.items).get(&key).cloned();
        if let Some(item) = item {
            if inner.discard(&item) {
                sync::write(&inner.metrics).items_cancelled += 1;
                debug!("Cancelled work item {}", key);
                return Ok(());
            }
        }
        if inner.config.repeat_cancel_succeeds {
            Ok(())
        } else {
            Err(PlatformError::NotFound)
        }
    }
}
