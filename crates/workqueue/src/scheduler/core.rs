use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use mediaplat_core::{sync, PlatformError, Result};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::event::Event;
use crate::item::{WorkItem, WorkItemKey};
use crate::metrics::SchedulerMetrics;
use crate::queue::{QueueKind, QueueTable, WorkQueueId};
use crate::result::AsyncResult;
use crate::timer::Timer;

/// The work queue scheduler.
///
/// Created stopped. [`Scheduler::start`] builds the worker pool and the
/// timer thread; [`Scheduler::stop`] tears them down. While stopped every
/// queue and work item operation fails with [`PlatformError::Shutdown`].
/// Dropping the scheduler stops it.
pub struct Scheduler {
    pub(super) inner: Arc<SchedulerInner>,
}

pub(super) struct Runtime {
    pub(super) pool: rayon::ThreadPool,
    pub(super) timer: Timer,
    pub(super) workers: usize,
}

pub(super) struct SchedulerInner {
    pub(super) config: SchedulerConfig,
    /// Present while started.
    pub(super) runtime: RwLock<Option<Runtime>>,
    /// Outstanding private and serial queues.
    pub(super) queues: Mutex<QueueTable>,
    /// Keyed items that have not left the pending state.
    pub(super) items: Mutex<HashMap<WorkItemKey, Arc<WorkItem>>>,
    pub(super) next_key: AtomicU64,
    pub(super) metrics: RwLock<SchedulerMetrics>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        let capacity = config.resolved_max_private_queues();
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                runtime: RwLock::new(None),
                queues: Mutex::new(QueueTable::new(capacity)),
                items: Mutex::new(HashMap::new()),
                next_key: AtomicU64::new(0),
                metrics: RwLock::new(SchedulerMetrics::default()),
            }),
        }
    }

    /// Start the worker pool and timer thread. No-op when already running.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Stop the scheduler: pending items are cancelled and every private
    /// queue is released. No-op when already stopped.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_running(&self) -> bool {
        sync::read(&self.inner.runtime).is_some()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        let mut metrics = sync::read(&self.inner.metrics).clone();
        if let Some(runtime) = sync::read(&self.inner.runtime).as_ref() {
            metrics.running = true;
            metrics.worker_threads = runtime.workers;
        }
        metrics.items_pending = sync::lock(&self.inner.items).len();
        let queues = sync::lock(&self.inner.queues);
        metrics.private_queues = queues.len();
        metrics.serial_backlog = queues.serial_backlog();
        metrics
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl SchedulerInner {
    fn start(self: &Arc<Self>) -> Result<()> {
        let mut runtime = sync::write(&self.runtime);
        if runtime.is_some() {
            return Ok(());
        }

        let workers = self.config.resolved_worker_threads();
        let prefix = self.config.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{}-worker-{}", prefix, i))
            .build()
            .map_err(|e| {
                error!("Failed to build worker pool: {}", e);
                PlatformError::Fail
            })?;

        let weak = Arc::downgrade(self);
        let timer = Timer::spawn(
            format!("{}-timer", self.config.thread_name_prefix),
            move |item| {
                if let Some(inner) = weak.upgrade() {
                    let key = item.key;
                    if let Err(e) = inner.dispatch_item(item) {
                        warn!("Timed work item {} dropped: {}", key, e);
                    }
                }
            },
        )
        .map_err(|e| {
            error!("Failed to spawn timer thread: {}", e);
            PlatformError::Fail
        })?;

        *runtime = Some(Runtime {
            pool,
            timer,
            workers,
        });
        info!("Work queue scheduler started with {} workers", workers);
        Ok(())
    }

    pub(super) fn stop(&self) {
        let Some(runtime) = sync::write(&self.runtime).take() else {
            return;
        };

        let cancelled = self.cancel_all();
        let released = sync::lock(&self.queues).clear();
        for entry in &released {
            if let QueueKind::Serial(serial) = &entry.kind {
                serial.abandon();
            }
        }

        runtime.timer.shutdown();
        drop(runtime.pool);
        info!(
            "Work queue scheduler stopped ({} items cancelled, {} queues released)",
            cancelled,
            released.len()
        );
    }

    pub(super) fn ensure_running(&self) -> Result<()> {
        if sync::read(&self.runtime).is_some() {
            Ok(())
        } else {
            Err(PlatformError::Shutdown)
        }
    }

    /// Whether `queue` currently accepts jobs.
    pub(super) fn validate_queue(&self, queue: WorkQueueId) -> Result<()> {
        sync::lock(&self.queues).route(queue).map(|_| ())
    }

    /// Issue a key and track the item until it is dispatched or cancelled.
    pub(super) fn register(
        &self,
        queue: WorkQueueId,
        priority: i32,
        result: AsyncResult,
        wait_on: Option<Event>,
    ) -> Arc<WorkItem> {
        let key = WorkItemKey(self.next_key.fetch_add(1, Ordering::Relaxed) + 1);
        let item = Arc::new(WorkItem::new(key, queue, priority, result, wait_on));
        sync::lock(&self.items).insert(key, Arc::clone(&item));
        item
    }

    /// Cancel `item` and stop tracking it. Returns whether it was pending.
    pub(super) fn discard(&self, item: &WorkItem) -> bool {
        sync::lock(&self.items).remove(&item.key);
        if !item.cancel() {
            return false;
        }
        if let (Some(event), Some(token)) = (&item.wait_on, item.waiter()) {
            event.unregister(token);
        }
        true
    }

    fn cancel_all(&self) -> usize {
        let items: Vec<Arc<WorkItem>> = sync::lock(&self.items)
            .drain()
            .map(|(_, item)| item)
            .collect();
        let cancelled = items.iter().filter(|item| self.discard(item)).count();
        sync::write(&self.metrics).items_cancelled += cancelled as u64;
        cancelled
    }
}
