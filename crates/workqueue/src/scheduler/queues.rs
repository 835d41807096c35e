use std::sync::Arc;

use mediaplat_core::{sync, PlatformError, Result};
use tracing::{debug, warn};

use crate::queue::{QueueKind, SerialQueue, WorkQueueId};

use super::Scheduler;

impl Scheduler {
    /// Allocate a private work queue holding one lock.
    pub fn allocate_work_queue(&self) -> Result<WorkQueueId> {
        self.inner.ensure_running()?;
        let id = sync::lock(&self.inner.queues)
            .allocate(QueueKind::Private)
            .inspect_err(|_| warn!("Private work queue limit reached"))?;
        debug!("Allocated work queue {}", id);
        Ok(id)
    }

    /// Add a lock to a private queue. Standard ids are always available.
    pub fn lock_work_queue(&self, queue: WorkQueueId) -> Result<()> {
        self.inner.ensure_running()?;
        if !queue.is_private() {
            return Ok(());
        }
        sync::lock(&self.inner.queues).lock(queue)
    }

    /// Drop one lock; the queue is released when none remain. Releasing a
    /// serial queue drops its lock on a private base queue.
    ///
    /// Timed or waiting items keyed to a released queue are dropped when
    /// they come due: their callback never runs and their key reports
    /// `NotFound` on cancel unless `repeat_cancel_succeeds` is set. Each drop
    /// is logged at `warn`.
    pub fn unlock_work_queue(&self, queue: WorkQueueId) -> Result<()> {
        self.inner.ensure_running()?;
        if !queue.is_private() {
            return Ok(());
        }

        let mut table = sync::lock(&self.inner.queues);
        let mut released = table.unlock(queue)?;
        while let Some(entry) = released {
            debug!("Released work queue {}", entry.id);
            released = match entry.kind {
                QueueKind::Serial(serial) if serial.target.is_private() => {
                    table.unlock(serial.target).ok().flatten()
                }
                _ => None,
            };
        }
        Ok(())
    }

    /// Allocate a serial queue on top of `base`.
    ///
    /// `base` may be any standard queue or an outstanding private or serial
    /// queue; a private base stays locked for as long as the serial queue
    /// exists.
    pub fn allocate_serial_work_queue(&self, base: WorkQueueId) -> Result<WorkQueueId> {
        self.inner.ensure_running()?;
        if self.inner.config.legacy_serial_restrictions
            && matches!(base, WorkQueueId::TIMER | WorkQueueId::LONG_FUNCTION)
        {
            return Err(PlatformError::Unsupported);
        }

        let mut table = sync::lock(&self.inner.queues);
        if base.is_private() {
            table
                .lock(base)
                .map_err(|_| PlatformError::InvalidArgument)?;
        } else if !base.is_standard() {
            return Err(PlatformError::InvalidArgument);
        }

        match table.allocate(QueueKind::Serial(Arc::new(SerialQueue::new(base)))) {
            Ok(id) => {
                debug!("Allocated serial work queue {} on {}", id, base);
                Ok(id)
            }
            Err(e) => {
                warn!("Private work queue limit reached");
                if base.is_private() {
                    let _ = table.unlock(base);
                }
                Err(e)
            }
        }
    }
}
