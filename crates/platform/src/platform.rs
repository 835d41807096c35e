//! Platform lifecycle and the factory surface.
//!
//! The platform is reference counted: every successful [`Platform::startup`]
//! or [`Platform::lock`] takes a lock and every [`Platform::shutdown`] or
//! [`Platform::unlock`] drops one. The scheduler runs while at least one
//! lock is held.

use std::sync::{Arc, Mutex};

use mediaplat_core::{sync, Collection, Object, PlatformError, Result};
use mediaplat_topology::{Node, NodeType, Topology, TopologyFactory};
use mediaplat_workqueue::{AsyncCallback, AsyncResult, Scheduler, WorkQueueId};
use tracing::{debug, info, warn};

use crate::config::PlatformConfig;

/// The only platform version `startup` accepts.
pub const PLATFORM_VERSION: u32 = 0x0002_0070;

struct PlatformInner {
    config: PlatformConfig,
    lock_count: Mutex<u32>,
    scheduler: Scheduler,
    topologies: TopologyFactory,
}

/// Handle to a platform instance. Clones share the same state.
///
/// Topology and node id counters, the scheduler and its queue-id namespace
/// all belong to the instance, not to the process. Ids are monotonic across
/// every clone of one platform; a second `Platform::new` starts its own
/// sequence at 1. A process that needs process-wide ids creates a single
/// platform and hands out clones.
#[derive(Clone)]
pub struct Platform {
    inner: Arc<PlatformInner>,
}

impl Platform {
    /// Create a platform that is not yet started.
    pub fn new(config: PlatformConfig) -> Self {
        let scheduler = Scheduler::new(config.scheduler.clone());
        let topologies = TopologyFactory::new(&config.topology);
        Self {
            inner: Arc::new(PlatformInner {
                config,
                lock_count: Mutex::new(0),
                scheduler,
                topologies,
            }),
        }
    }

    /// Start the platform, checking the caller's version.
    pub fn startup(&self, version: u32) -> Result<()> {
        if version != PLATFORM_VERSION {
            warn!(
                "Rejected startup: version {:#x}, expected {:#x}",
                version, PLATFORM_VERSION
            );
            return Err(PlatformError::BadVersion);
        }
        self.lock()
    }

    /// Drop the lock taken by `startup`. Extra calls are harmless.
    pub fn shutdown(&self) {
        self.unlock();
    }

    /// Take a platform lock, starting the scheduler on the first one.
    pub fn lock(&self) -> Result<()> {
        let mut count = sync::lock(&self.inner.lock_count);
        if *count == 0 {
            self.inner.scheduler.start()?;
            info!("Platform started");
        }
        *count += 1;
        debug!("Platform lock taken ({} held)", *count);
        Ok(())
    }

    /// Drop a platform lock. When the last one goes the scheduler stops,
    /// cancelling pending work and releasing private queues.
    pub fn unlock(&self) {
        let mut count = sync::lock(&self.inner.lock_count);
        if *count == 0 {
            debug!("Platform unlock ignored, not running");
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.inner.scheduler.stop();
            info!("Platform shut down");
        } else {
            debug!("Platform lock dropped ({} held)", *count);
        }
    }

    pub fn is_running(&self) -> bool {
        *sync::lock(&self.inner.lock_count) > 0
    }

    pub fn lock_count(&self) -> u32 {
        *sync::lock(&self.inner.lock_count)
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.inner.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn topology_factory(&self) -> &TopologyFactory {
        &self.inner.topologies
    }

    // ── Factories ─────────────────────────────────────────────

    pub fn create_topology(&self) -> Topology {
        self.inner.topologies.create_topology()
    }

    pub fn create_node(&self, node_type: NodeType) -> Node {
        self.inner.topologies.create_node(node_type)
    }

    pub fn create_collection(&self) -> Collection {
        Collection::new()
    }

    pub fn create_async_result(
        &self,
        object: Option<Object>,
        callback: Option<Arc<dyn AsyncCallback>>,
        state: Option<Object>,
    ) -> AsyncResult {
        AsyncResult::new(object, callback, state)
    }

    pub fn allocate_work_queue(&self) -> Result<WorkQueueId> {
        self.inner.scheduler.allocate_work_queue()
    }

    pub fn allocate_serial_work_queue(&self, base: WorkQueueId) -> Result<WorkQueueId> {
        self.inner.scheduler.allocate_serial_work_queue(base)
    }
}
