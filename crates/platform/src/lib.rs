//! Media pipeline platform: topology graphs, collections, async results and
//! work queues behind one reference-counted lifecycle.

pub mod config;
pub mod platform;

pub use config::{load_dotenv, ConfigError, PlatformConfig};
pub use platform::{Platform, PLATFORM_VERSION};

pub use mediaplat_core::{status_code, Collection, Handle, Object, PlatformError, Result};
pub use mediaplat_topology::{Node, NodeType, TopoId, Topology, TopologyConfig, TopologyFactory};
pub use mediaplat_workqueue::{
    callback_fn, callback_on, AsyncCallback, AsyncResult, AsyncResultBuilder, CallbackParameters,
    Event, Scheduler, SchedulerConfig, SchedulerMetrics, WorkItemKey, WorkQueueId,
};
