//! Deadline thread for delayed work items.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

use mediaplat_core::sync;
use tracing::{debug, warn};

use crate::item::WorkItem;

struct Deadline {
    at: Instant,
    seq: u64,
    item: Arc<WorkItem>,
}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Deadline {}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

#[derive(Default)]
struct TimerState {
    heap: BinaryHeap<Reverse<Deadline>>,
    seq: u64,
    shutdown: bool,
}

#[derive(Default)]
struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Owns the deadline thread. Items are handed to `fire` once due, in
/// deadline order (submission order for equal deadlines).
pub(crate) struct Timer {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub(crate) fn spawn<F>(name: String, fire: F) -> std::io::Result<Self>
    where
        F: Fn(Arc<WorkItem>) + Send + 'static,
    {
        let shared = Arc::new(TimerShared::default());
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || run(&thread_shared, fire))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub(crate) fn schedule(&self, at: Instant, item: Arc<WorkItem>) {
        let mut state = sync::lock(&self.shared.state);
        state.seq += 1;
        let seq = state.seq;
        state.heap.push(Reverse(Deadline { at, seq, item }));
        drop(state);
        self.shared.wake.notify_one();
    }

    /// Stop the thread and drop every item still waiting on a deadline.
    pub(crate) fn shutdown(mut self) {
        {
            let mut state = sync::lock(&self.shared.state);
            state.shutdown = true;
            state.heap.clear();
        }
        self.shared.wake.notify_one();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Timer thread panicked");
            }
        }
    }
}

fn run<F>(shared: &TimerShared, fire: F)
where
    F: Fn(Arc<WorkItem>),
{
    debug!("Timer thread started");
    let mut state = sync::lock(&shared.state);
    loop {
        if state.shutdown {
            break;
        }
        let now = Instant::now();
        let next = state.heap.peek().map(|Reverse(due)| due.at);
        match next {
            Some(at) if at <= now => {
                let due = state.heap.pop();
                drop(state);
                if let Some(Reverse(due)) = due {
                    if due.item.is_pending() {
                        fire(due.item);
                    }
                }
                state = sync::lock(&shared.state);
            }
            Some(at) => {
                state = shared
                    .wake
                    .wait_timeout(state, at - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            None => {
                state = shared
                    .wake
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
    debug!("Timer thread stopped");
}
