//! Work queue scheduler -- worker pool, private and serial queues, timed
//! and waiting work items.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, lifecycle, accessors and metrics
//! - `execution`: routing jobs to the pool or through serial queues, and
//!   running callbacks
//! - `queues`: private and serial queue allocation and locking
//! - `submission`: scheduled, waiting and immediate work items, cancellation

mod core;
mod execution;
mod queues;
mod submission;

pub use self::core::Scheduler;
