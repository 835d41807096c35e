//! Manual-reset event.
//!
//! Serves as the waiting handle of waiting work items and as the
//! completion signal of an [`AsyncResult`](crate::AsyncResult). Once set, an
//! event stays set until [`Event::reset`]; every registered waiter fires on
//! the transition, and waiters registered while it is set fire at once.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use mediaplat_core::{sync, Handle};

type Waiter = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct EventState {
    signaled: bool,
    /// Last waiter token handed out. Tokens start at 1.
    last_token: u64,
    waiters: Vec<(u64, Waiter)>,
}

#[derive(Default)]
pub struct EventInner {
    state: Mutex<EventState>,
    cond: Condvar,
}

/// Handle to a manual-reset event. Clones share the same signal.
#[derive(Clone, Default)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Handle for Event {
    type Inner = EventInner;

    fn from_inner(inner: Arc<EventInner>) -> Self {
        Self { inner }
    }

    fn inner(&self) -> &Arc<EventInner> {
        &self.inner
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = sync::lock(&self.inner.state);
        f.debug_struct("Event")
            .field("signaled", &state.signaled)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl Event {
    /// Create an event in the non-signalled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the event, waking blocked threads and firing waiters.
    pub fn set(&self) {
        let waiters = {
            let mut state = sync::lock(&self.inner.state);
            state.signaled = true;
            std::mem::take(&mut state.waiters)
        };
        self.inner.cond.notify_all();
        for (_, waiter) in waiters {
            waiter();
        }
    }

    pub fn reset(&self) {
        sync::lock(&self.inner.state).signaled = false;
    }

    pub fn is_set(&self) -> bool {
        sync::lock(&self.inner.state).signaled
    }

    /// Block until the event is signalled.
    pub fn wait(&self) {
        let mut state = sync::lock(&self.inner.state);
        while !state.signaled {
            state = self
                .inner
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until the event is signalled or `timeout` elapses. Returns
    /// whether the event was signalled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = sync::lock(&self.inner.state);
        while !state.signaled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .inner
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Run `waiter` on the next signal, or right away if already signalled.
    ///
    /// Returns the token to pass to [`Event::unregister`], or `None` when
    /// the waiter already ran. Tokens are unique per event, whoever
    /// registers them.
    pub(crate) fn register(&self, waiter: Waiter) -> Option<u64> {
        {
            let mut state = sync::lock(&self.inner.state);
            if !state.signaled {
                state.last_token += 1;
                let token = state.last_token;
                state.waiters.push((token, waiter));
                return Some(token);
            }
        }
        waiter();
        None
    }

    /// Forget a registered waiter. Returns whether it was still waiting.
    pub(crate) fn unregister(&self, token: u64) -> bool {
        let mut state = sync::lock(&self.inner.state);
        match state.waiters.iter().position(|(t, _)| *t == token) {
            Some(index) => {
                state.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn waiter_count(&self) -> usize {
        sync::lock(&self.inner.state).waiters.len()
    }
}
