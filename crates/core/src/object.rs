//! Reference-counted handle model.
//!
//! Every platform entity lives behind an `Arc`. Typed handles ([`Handle`])
//! wrap that `Arc` directly, and [`Object`] is the type-erased form used
//! wherever an arbitrary entity is stored (collection slots, async result
//! payloads, node payloads). Converting between the two never reallocates,
//! so identity survives the round trip.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A typed, cheaply clonable handle to a shared platform entity.
///
/// Cloning a handle acquires a reference; dropping it releases one. The
/// entity is destroyed when the last handle (typed or [`Object`]) is gone.
pub trait Handle: Clone {
    /// The shared state the handle points at.
    type Inner: Any + Send + Sync;

    /// Rebuild a typed handle from its shared state.
    fn from_inner(inner: Arc<Self::Inner>) -> Self;

    /// The shared state behind this handle.
    fn inner(&self) -> &Arc<Self::Inner>;

    /// Acquire a type-erased reference to the same entity.
    fn to_object(&self) -> Object {
        Object(Arc::clone(self.inner()) as Arc<dyn Any + Send + Sync>)
    }

    /// Whether two handles refer to the same entity.
    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.inner(), other.inner())
    }

    /// Number of live references to the entity, across typed and erased handles.
    fn ref_count(&self) -> usize {
        Arc::strong_count(self.inner())
    }
}

/// Type-erased reference to any shared entity.
#[derive(Clone)]
pub struct Object(Arc<dyn Any + Send + Sync>);

impl Object {
    /// Wrap an arbitrary value as a new entity.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Recover a typed handle, or `None` if the entity has a different type.
    pub fn downcast<H: Handle>(&self) -> Option<H> {
        Arc::clone(&self.0)
            .downcast::<H::Inner>()
            .ok()
            .map(H::from_inner)
    }

    /// Borrow the entity as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether both objects refer to the same entity.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.addr() == other.addr()
    }

    /// Whether this object refers to the entity behind `handle`.
    pub fn is<H: Handle>(&self, handle: &H) -> bool {
        self.addr() == Arc::as_ptr(handle.inner()) as *const ()
    }

    /// Number of live references to the entity.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl<H: Handle> From<&H> for Object {
    fn from(handle: &H) -> Self {
        handle.to_object()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({:p})", self.addr())
    }
}
