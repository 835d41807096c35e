use serde::{Deserialize, Serialize};

/// Upper bound on private queue ids: the slot number lives in the upper
/// 16 bits of the id.
pub const MAX_PRIVATE_QUEUES: usize = 0xFFFF;

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Name prefix for worker and timer threads.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
    /// Maximum number of outstanding private (and serial) queues.
    #[serde(default = "default_max_private_queues")]
    pub max_private_queues: usize,
    /// Report success when cancelling a key that is no longer pending, as
    /// older platform revisions do.
    #[serde(default)]
    pub repeat_cancel_succeeds: bool,
    /// Refuse to wrap the timer and long-function queues in serial queues,
    /// as older platform revisions do.
    #[serde(default)]
    pub legacy_serial_restrictions: bool,
}

fn default_worker_threads() -> usize { 0 }
fn default_thread_name_prefix() -> String { "mediaplat".into() }
fn default_max_private_queues() -> usize { MAX_PRIVATE_QUEUES }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name_prefix: default_thread_name_prefix(),
            max_private_queues: default_max_private_queues(),
            repeat_cancel_succeeds: false,
            legacy_serial_restrictions: false,
        }
    }
}

impl SchedulerConfig {
    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    /// Private queue capacity, clamped to what the id space can address.
    pub fn resolved_max_private_queues(&self) -> usize {
        self.max_private_queues.min(MAX_PRIVATE_QUEUES)
    }
}
