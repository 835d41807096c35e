//! Keyed work items.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use serde::Serialize;

use crate::event::Event;
use crate::queue::WorkQueueId;
use crate::result::AsyncResult;

/// Cancellation key of a scheduled or waiting work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkItemKey(pub(crate) u64);

impl WorkItemKey {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const DISPATCHED: u8 = 2;

/// A pending work item. Leaves the pending state exactly once, either by
/// being claimed for dispatch or by being cancelled.
pub(crate) struct WorkItem {
    pub(crate) key: WorkItemKey,
    pub(crate) queue: WorkQueueId,
    pub(crate) priority: i32,
    pub(crate) result: AsyncResult,
    /// Waiting handle the item is registered on, if any.
    pub(crate) wait_on: Option<Event>,
    /// Token of the waiter registered on `wait_on`; 0 when none.
    waiter: AtomicU64,
    state: AtomicU8,
}

impl WorkItem {
    pub(crate) fn new(
        key: WorkItemKey,
        queue: WorkQueueId,
        priority: i32,
        result: AsyncResult,
        wait_on: Option<Event>,
    ) -> Self {
        Self {
            key,
            queue,
            priority,
            result,
            wait_on,
            waiter: AtomicU64::new(0),
            state: AtomicU8::new(PENDING),
        }
    }

    pub(crate) fn set_waiter(&self, token: u64) {
        self.waiter.store(token, Ordering::Release);
    }

    pub(crate) fn waiter(&self) -> Option<u64> {
        match self.waiter.load(Ordering::Acquire) {
            0 => None,
            token => Some(token),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Take the item for dispatch. Fails if it was cancelled or claimed.
    pub(crate) fn claim(&self) -> bool {
        self.transition(DISPATCHED)
    }

    /// Cancel the item. Fails if it was already claimed or cancelled.
    pub(crate) fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
