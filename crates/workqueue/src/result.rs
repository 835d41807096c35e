//! Asynchronous result: the record handed to a completion callback.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use mediaplat_core::{sync, Handle, Object, PlatformError, Result};

use crate::callback::AsyncCallback;
use crate::event::Event;
use crate::queue::WorkQueueId;

pub struct AsyncResultInner {
    object: Option<Object>,
    state: Option<Object>,
    callback: Option<Arc<dyn AsyncCallback>>,
    event: Option<Event>,
    status: Mutex<Result<()>>,
    bytes_transferred: AtomicU32,
}

/// Handle to an asynchronous result.
///
/// The object and state handles are retained for as long as the result
/// lives. The object may itself be another `AsyncResult`, which is how
/// completion chains are expressed.
#[derive(Clone)]
pub struct AsyncResult {
    inner: Arc<AsyncResultInner>,
}

impl Handle for AsyncResult {
    type Inner = AsyncResultInner;

    fn from_inner(inner: Arc<AsyncResultInner>) -> Self {
        Self { inner }
    }

    fn inner(&self) -> &Arc<AsyncResultInner> {
        &self.inner
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("object", &self.inner.object)
            .field("state", &self.inner.state)
            .field("has_callback", &self.inner.callback.is_some())
            .field("event", &self.inner.event)
            .field("status", &self.status())
            .finish()
    }
}

impl AsyncResult {
    /// Create a result. Never fails; every field may be absent.
    pub fn new(
        object: Option<Object>,
        callback: Option<Arc<dyn AsyncCallback>>,
        state: Option<Object>,
    ) -> Self {
        AsyncResultBuilder {
            object,
            callback,
            state,
            event: None,
        }
        .build()
    }

    pub fn builder() -> AsyncResultBuilder {
        AsyncResultBuilder::default()
    }

    /// Acquire the object, or `InvalidPointer` when none was given.
    pub fn object(&self) -> Result<Object> {
        self.inner.object.clone().ok_or(PlatformError::InvalidPointer)
    }

    /// Acquire the caller state, or `InvalidPointer` when none was given.
    pub fn state(&self) -> Result<Object> {
        self.inner.state.clone().ok_or(PlatformError::InvalidPointer)
    }

    /// Peek at the caller state without acquiring a reference.
    pub fn state_ref(&self) -> Option<&Object> {
        self.inner.state.as_ref()
    }

    pub fn status(&self) -> Result<()> {
        *sync::lock(&self.inner.status)
    }

    pub fn set_status(&self, status: Result<()>) {
        *sync::lock(&self.inner.status) = status;
    }

    pub fn bytes_transferred(&self) -> u32 {
        self.inner.bytes_transferred.load(Ordering::Acquire)
    }

    pub fn set_bytes_transferred(&self, bytes: u32) {
        self.inner.bytes_transferred.store(bytes, Ordering::Release);
    }

    pub fn callback(&self) -> Option<&Arc<dyn AsyncCallback>> {
        self.inner.callback.as_ref()
    }

    /// Event signalled after the callback (if any) has run.
    pub fn event(&self) -> Option<&Event> {
        self.inner.event.as_ref()
    }

    /// Queue the callback asks for, standard when there is no callback.
    pub fn queue(&self) -> WorkQueueId {
        self.inner
            .callback
            .as_ref()
            .map(|cb| cb.parameters().queue)
            .unwrap_or(WorkQueueId::STANDARD)
    }
}

/// Builder for results that carry a completion event.
#[derive(Default)]
pub struct AsyncResultBuilder {
    object: Option<Object>,
    callback: Option<Arc<dyn AsyncCallback>>,
    state: Option<Object>,
    event: Option<Event>,
}

impl AsyncResultBuilder {
    pub fn object(mut self, object: Object) -> Self {
        self.object = Some(object);
        self
    }

    pub fn callback(mut self, callback: Arc<dyn AsyncCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn state(mut self, state: Object) -> Self {
        self.state = Some(state);
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    pub fn build(self) -> AsyncResult {
        AsyncResult {
            inner: Arc::new(AsyncResultInner {
                object: self.object,
                state: self.state,
                callback: self.callback,
                event: self.event,
                status: Mutex::new(Ok(())),
                bytes_transferred: AtomicU32::new(0),
            }),
        }
    }
}
