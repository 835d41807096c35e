//! Work queue identifiers and the private queue table.
//!
//! Standard queues are fixed ids served directly by the worker pool.
//! Private queues live in a slot table; a slot's id carries the slot number
//! in its upper 16 bits so it can never collide with a standard id. Serial
//! queues are private queues that forward one job at a time to a target
//! queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use mediaplat_core::{sync, PlatformError, Result};
use serde::{Deserialize, Serialize};

/// Identifier of a work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkQueueId(pub u32);

impl WorkQueueId {
    pub const UNDEFINED: WorkQueueId = WorkQueueId(0);
    pub const STANDARD: WorkQueueId = WorkQueueId(1);
    pub const RT: WorkQueueId = WorkQueueId(2);
    pub const IO: WorkQueueId = WorkQueueId(3);
    pub const TIMER: WorkQueueId = WorkQueueId(4);
    pub const MULTITHREADED: WorkQueueId = WorkQueueId(5);
    pub const LONG_FUNCTION: WorkQueueId = WorkQueueId(7);

    /// Bits that distinguish a private queue id from a standard one.
    pub const PRIVATE_MASK: u32 = 0xFFFF_0000;

    /// Every standard queue, in id order.
    pub const STANDARD_QUEUES: [WorkQueueId; 6] = [
        Self::STANDARD,
        Self::RT,
        Self::IO,
        Self::TIMER,
        Self::MULTITHREADED,
        Self::LONG_FUNCTION,
    ];

    pub fn is_standard(self) -> bool {
        Self::STANDARD_QUEUES.contains(&self)
    }

    pub fn is_private(self) -> bool {
        self.0 & Self::PRIVATE_MASK != 0
    }

    pub(crate) fn from_slot(slot: usize) -> Self {
        WorkQueueId(((slot as u32) + 1) << 16)
    }

    /// Table slot of a private id. Ids with low bits set were never issued.
    pub(crate) fn slot(self) -> Option<usize> {
        if self.is_private() && self.0 & !Self::PRIVATE_MASK == 0 {
            Some((self.0 >> 16) as usize - 1)
        } else {
            None
        }
    }
}

impl fmt::Display for WorkQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNDEFINED => write!(f, "undefined"),
            Self::STANDARD => write!(f, "standard"),
            Self::RT => write!(f, "rt"),
            Self::IO => write!(f, "io"),
            Self::TIMER => write!(f, "timer"),
            Self::MULTITHREADED => write!(f, "multithreaded"),
            Self::LONG_FUNCTION => write!(f, "long_function"),
            id if id.is_private() => write!(f, "private:{:#010x}", id.0),
            id => write!(f, "reserved:{}", id.0),
        }
    }
}

// ── Jobs ────────────────────────────────────────────────────────────

/// A unit of work bound for a queue.
pub(crate) struct Job {
    pub(crate) priority: i32,
    pub(crate) run: Box<dyn FnOnce() + Send>,
}

impl Job {
    pub(crate) fn new(priority: i32, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            priority,
            run: Box::new(run),
        }
    }
}

// ── Serial queues ───────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct SerialState {
    pending: VecDeque<Job>,
    running: bool,
}

/// Queue that runs its jobs one at a time on `target`.
pub(crate) struct SerialQueue {
    pub(crate) target: WorkQueueId,
    state: Mutex<SerialState>,
}

impl SerialQueue {
    pub(crate) fn new(target: WorkQueueId) -> Self {
        Self {
            target,
            state: Mutex::new(SerialState::default()),
        }
    }

    /// Queue `job`. Returns it back when the queue was idle, in which case
    /// the caller owns the running slot and must start the job.
    pub(crate) fn enqueue(&self, job: Job) -> Option<Job> {
        let mut state = sync::lock(&self.state);
        if state.running {
            // Stable: a job only overtakes strictly lower priorities.
            let at = state
                .pending
                .iter()
                .position(|queued| queued.priority < job.priority)
                .unwrap_or(state.pending.len());
            state.pending.insert(at, job);
            None
        } else {
            state.running = true;
            Some(job)
        }
    }

    /// Take the next job after one finished, or mark the queue idle.
    pub(crate) fn next(&self) -> Option<Job> {
        let mut state = sync::lock(&self.state);
        let next = state.pending.pop_front();
        if next.is_none() {
            state.running = false;
        }
        next
    }

    /// Give up the running slot and drop whatever is still queued.
    pub(crate) fn abandon(&self) -> usize {
        let mut state = sync::lock(&self.state);
        state.running = false;
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }

    pub(crate) fn pending(&self) -> usize {
        sync::lock(&self.state).pending.len()
    }
}

// ── Queue table ─────────────────────────────────────────────────────

pub(crate) enum QueueKind {
    Private,
    Serial(Arc<SerialQueue>),
}

pub(crate) struct QueueEntry {
    pub(crate) id: WorkQueueId,
    pub(crate) kind: QueueKind,
    locks: u32,
}

/// Where a queue id sends its jobs.
pub(crate) enum Route {
    Pool,
    Serial(Arc<SerialQueue>),
}

/// Outstanding private queues, indexed by slot.
pub(crate) struct QueueTable {
    slots: Vec<Option<QueueEntry>>,
    free: Vec<usize>,
    capacity: usize,
}

impl QueueTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    /// Issue a new private id holding one lock.
    pub(crate) fn allocate(&mut self, kind: QueueKind) -> Result<WorkQueueId> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.slots.len() < self.capacity => {
                self.slots.push(None);
                self.slots.len() - 1
            }
            None => return Err(PlatformError::Fail),
        };
        let id = WorkQueueId::from_slot(slot);
        self.slots[slot] = Some(QueueEntry { id, kind, locks: 1 });
        Ok(id)
    }

    fn entry_mut(&mut self, id: WorkQueueId) -> Option<&mut QueueEntry> {
        let slot = id.slot()?;
        self.slots.get_mut(slot)?.as_mut()
    }

    pub(crate) fn lock(&mut self, id: WorkQueueId) -> Result<()> {
        let entry = self.entry_mut(id).ok_or(PlatformError::NotFound)?;
        entry.locks += 1;
        Ok(())
    }

    /// Drop one lock; returns the entry once its last lock is gone.
    pub(crate) fn unlock(&mut self, id: WorkQueueId) -> Result<Option<QueueEntry>> {
        let entry = self.entry_mut(id).ok_or(PlatformError::NotFound)?;
        entry.locks -= 1;
        if entry.locks > 0 {
            return Ok(None);
        }
        let slot = id.slot().ok_or(PlatformError::NotFound)?;
        self.free.push(slot);
        Ok(self.slots[slot].take())
    }

    /// Resolve where jobs for `id` go. Unknown ids are invalid arguments.
    pub(crate) fn route(&self, id: WorkQueueId) -> Result<Route> {
        if id.is_standard() {
            return Ok(Route::Pool);
        }
        let entry = id
            .slot()
            .and_then(|slot| self.slots.get(slot))
            .and_then(Option::as_ref)
            .ok_or(PlatformError::InvalidArgument)?;
        Ok(match &entry.kind {
            QueueKind::Private => Route::Pool,
            QueueKind::Serial(serial) => Route::Serial(Arc::clone(serial)),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Jobs waiting behind a running job on any serial queue.
    pub(crate) fn serial_backlog(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .map(|entry| match &entry.kind {
                QueueKind::Serial(serial) => serial.pending(),
                QueueKind::Private => 0,
            })
            .sum()
    }

    /// Release every queue regardless of locks.
    pub(crate) fn clear(&mut self) -> Vec<QueueEntry> {
        self.free.clear();
        self.slots.drain(..).flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ids() {
        for id in WorkQueueId::STANDARD_QUEUES {
            assert!(id.is_standard());
            assert!(!id.is_private());
        }
        assert!(!WorkQueueId::UNDEFINED.is_standard());
        assert!(!WorkQueueId(6).is_standard());
        assert_eq!(WorkQueueId::IO.to_string(), "io");
        assert_eq!(WorkQueueId(6).to_string(), "reserved:6");
    }

    #[test]
    fn private_ids_map_to_slots() {
        let id = WorkQueueId::from_slot(0);
        assert_eq!(id, WorkQueueId(0x0001_0000));
        assert!(id.is_private());
        assert_eq!(id.slot(), Some(0));
        assert_eq!(WorkQueueId(0x0001_0001).slot(), None);
        assert_eq!(WorkQueueId::STANDARD.slot(), None);
    }

    #[test]
    fn allocate_and_release() {
        let mut table = QueueTable::new(4);
        let a = table.allocate(QueueKind::Private).unwrap();
        let b = table.allocate(QueueKind::Private).unwrap();
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);

        table.lock(a).unwrap();
        assert!(table.unlock(a).unwrap().is_none());
        let released = table.unlock(a).unwrap().unwrap();
        assert_eq!(released.id, a);
        assert!(table.route(a).is_err());
        assert!(matches!(table.unlock(a), Err(PlatformError::NotFound)));
        assert_eq!(table.lock(a), Err(PlatformError::NotFound));

        // Released slots are reused.
        let c = table.allocate(QueueKind::Private).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut table = QueueTable::new(1);
        table.allocate(QueueKind::Private).unwrap();
        assert_eq!(table.allocate(QueueKind::Private), Err(PlatformError::Fail));
    }

    #[test]
    fn routes() {
        let mut table = QueueTable::new(4);
        assert!(matches!(table.route(WorkQueueId::TIMER), Ok(Route::Pool)));
        assert_eq!(table.route(WorkQueueId::UNDEFINED).err(), Some(PlatformError::InvalidArgument));
        assert_eq!(table.route(WorkQueueId(6)).err(), Some(PlatformError::InvalidArgument));

        let serial = table
            .allocate(QueueKind::Serial(Arc::new(SerialQueue::new(WorkQueueId::IO))))
            .unwrap();
        assert!(matches!(table.route(serial), Ok(Route::Serial(s)) if s.target == WorkQueueId::IO));
        assert_eq!(table.route(WorkQueueId(0x00FF_0000)).err(), Some(PlatformError::InvalidArgument));
    }

    #[test]
    fn serial_queue_orders_by_priority_then_arrival() {
        let serial = SerialQueue::new(WorkQueueId::STANDARD);
        let order = Arc::new(Mutex::new(Vec::new()));
        let job = |tag: &'static str, priority| {
            let order = Arc::clone(&order);
            Job::new(priority, move || order.lock().unwrap().push(tag))
        };

        let first = serial.enqueue(job("first", 0)).unwrap();
        assert!(serial.enqueue(job("low-a", 0)).is_none());
        assert!(serial.enqueue(job("low-b", 0)).is_none());
        assert!(serial.enqueue(job("high", 5)).is_none());
        assert_eq!(serial.pending(), 3);

        (first.run)();
        while let Some(next) = serial.next() {
            (next.run)();
        }
        assert_eq!(*order.lock().unwrap(), vec!["first", "high", "low-a", "low-b"]);

        // Idle again: the next job starts immediately.
        assert!(serial.enqueue(job("again", 0)).is_some());
        assert_eq!(serial.abandon(), 0);
    }
}
