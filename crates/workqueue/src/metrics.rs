use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Scheduler operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Whether the worker pool is running.
    pub running: bool,
    /// Worker threads in the pool.
    pub worker_threads: usize,
    /// Total items dispatched by queue.
    pub items_dispatched: HashMap<String, u64>,
    /// Items cancelled before dispatch.
    pub items_cancelled: u64,
    /// Keyed items not yet dispatched or cancelled.
    pub items_pending: usize,
    /// Jobs queued behind a running job on a serial queue.
    pub serial_backlog: usize,
    /// Outstanding private and serial queues.
    pub private_queues: usize,
    /// Callback failures (error returns and panics).
    pub callback_failures: u64,
    /// Average callback duration by queue.
    pub avg_callback_duration: HashMap<String, Duration>,
    /// Last dispatch time by queue.
    pub last_run: HashMap<String, DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Record a dispatch on `queue`.
    pub fn record_execution(&mut self, queue: &str, duration: Duration) {
        *self.items_dispatched.entry(queue.to_string()).or_default() += 1;
        self.last_run.insert(queue.to_string(), Utc::now());

        // Update rolling average duration
        let count = self.items_dispatched[queue];
        let prev_avg = self
            .avg_callback_duration
            .get(queue)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count == 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };

        self.avg_callback_duration.insert(queue.to_string(), new_avg);
    }

    /// Total dispatches across all queues.
    pub fn total_dispatched(&self) -> u64 {
        self.items_dispatched.values().sum()
    }
}
