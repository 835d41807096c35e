//! Sparse, ordered collection of optional object handles.
//!
//! Slots may be empty. Inserting past the end pads the gap with empty
//! slots, which are present (they count) but fail retrieval with
//! [`PlatformError::Unexpected`] rather than [`PlatformError::OutOfRange`].

use std::sync::{Arc, RwLock};

use crate::error::{PlatformError, Result};
use crate::object::{Handle, Object};
use crate::sync;

#[derive(Debug, Default)]
pub struct CollectionInner {
    slots: RwLock<Vec<Option<Object>>>,
}

/// Handle to a collection. Clones share the same elements.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

impl Handle for Collection {
    type Inner = CollectionInner;

    fn from_inner(inner: Arc<CollectionInner>) -> Self {
        Self { inner }
    }

    fn inner(&self) -> &Arc<CollectionInner> {
        &self.inner
    }
}

impl Collection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection holding the given handles, in order.
    pub fn from_objects(objects: impl IntoIterator<Item = Object>) -> Self {
        let slots = objects.into_iter().map(Some).collect();
        Self {
            inner: Arc::new(CollectionInner {
                slots: RwLock::new(slots),
            }),
        }
    }

    /// Number of slots, empty ones included.
    pub fn count(&self) -> usize {
        sync::read(&self.inner.slots).len()
    }

    /// Acquire the element at `index`.
    pub fn element(&self, index: usize) -> Result<Object> {
        let slots = sync::read(&self.inner.slots);
        match slots.get(index) {
            None => Err(PlatformError::OutOfRange),
            Some(None) => Err(PlatformError::Unexpected),
            Some(Some(obj)) => Ok(obj.clone()),
        }
    }

    /// Append an element; `None` appends an empty slot.
    pub fn add_element(&self, element: Option<Object>) {
        sync::write(&self.inner.slots).push(element);
    }

    /// Insert at `index`, shifting later slots up, or padding with empty
    /// slots when `index` is at or past the end.
    ///
    /// Fails with `OutOfMemory`, leaving the collection unchanged, when the
    /// padded slots cannot be allocated.
    pub fn insert_element_at(&self, index: usize, element: Option<Object>) -> Result<()> {
        let mut slots = sync::write(&self.inner.slots);
        let additional = index.saturating_sub(slots.len()).checked_add(1);
        additional
            .and_then(|n| slots.try_reserve(n).ok())
            .ok_or(PlatformError::OutOfMemory)?;
        if index >= slots.len() {
            slots.resize_with(index, || None);
            slots.push(element);
        } else {
            slots.insert(index, element);
        }
        Ok(())
    }

    /// Remove the slot at `index`, handing its reference to the caller.
    pub fn remove_element(&self, index: usize) -> Result<Option<Object>> {
        let mut slots = sync::write(&self.inner.slots);
        if index >= slots.len() {
            return Err(PlatformError::OutOfRange);
        }
        Ok(slots.remove(index))
    }

    /// Release every element.
    pub fn remove_all(&self) {
        sync::write(&self.inner.slots).clear();
    }

    /// Acquire every present element as a typed handle, skipping empty slots
    /// and entities of other types.
    pub fn handles<H: Handle>(&self) -> Vec<H> {
        sync::read(&self.inner.slots)
            .iter()
            .flatten()
            .filter_map(|obj| obj.downcast::<H>())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collection() {
        let c = Collection::new();
        assert_eq!(c.count(), 0);
        assert_eq!(c.element(0), Err(PlatformError::OutOfRange));
        assert_eq!(c.remove_element(0), Err(PlatformError::OutOfRange));
        c.remove_all();
        assert_eq!(c.count(), 0);
    }

    #[test]
    fn add_counts_empty_slots() {
        let c = Collection::new();
        c.add_element(Some(c.to_object()));
        assert_eq!(c.count(), 1);
        c.add_element(None);
        assert_eq!(c.count(), 2);
        assert_eq!(c.element(1), Err(PlatformError::Unexpected));

        // Holding itself forms a cycle; break it before the test ends.
        c.remove_all();
    }

    #[test]
    fn sparse_insert_pads_with_empty_slots() {
        let c = Collection::new();
        let x = Object::new(42u32);
        c.insert_element_at(10, Some(x.clone())).unwrap();

        assert_eq!(c.count(), 11);
        assert_eq!(c.element(0), Err(PlatformError::Unexpected));
        assert_eq!(c.element(1), Err(PlatformError::Unexpected));
        assert_eq!(c.element(2), Err(PlatformError::Unexpected));
        assert_eq!(c.element(10), Ok(x));
        assert_eq!(c.element(11), Err(PlatformError::OutOfRange));
    }

    #[test]
    fn sparse_insert_after_existing_elements() {
        let c = Collection::new();
        let x = Object::new("x");
        c.add_element(Some(x.clone()));
        c.add_element(None);
        c.insert_element_at(10, Some(x.clone())).unwrap();

        assert_eq!(c.count(), 11);
        assert_eq!(c.element(0), Ok(x.clone()));
        assert_eq!(c.element(1), Err(PlatformError::Unexpected));
        assert_eq!(c.element(2), Err(PlatformError::Unexpected));
        assert_eq!(c.element(10), Ok(x.clone()));

        c.insert_element_at(0, None).unwrap();
        assert_eq!(c.count(), 12);
        assert_eq!(c.element(0), Err(PlatformError::Unexpected));
        assert_eq!(c.element(1), Ok(x));
    }

    #[test]
    fn oversized_insert_fails_without_changes() {
        let x = Object::new(1u8);
        let c = Collection::from_objects([x.clone()]);
        assert_eq!(c.insert_element_at(usize::MAX, None), Err(PlatformError::OutOfMemory));
        assert_eq!(
            c.insert_element_at(isize::MAX as usize, Some(x.clone())),
            Err(PlatformError::OutOfMemory)
        );
        assert_eq!(c.count(), 1);
        assert_eq!(c.element(0), Ok(x.clone()));
        assert_eq!(x.ref_count(), 2);
    }

    #[test]
    fn insert_in_range_shifts_up() {
        let a = Object::new('a');
        let b = Object::new('b');
        let c = Collection::from_objects([a.clone(), b.clone()]);
        let mid = Object::new('m');
        c.insert_element_at(1, Some(mid.clone())).unwrap();

        assert_eq!(c.count(), 3);
        assert_eq!(c.element(0), Ok(a));
        assert_eq!(c.element(1), Ok(mid));
        assert_eq!(c.element(2), Ok(b));
    }

    #[test]
    fn remove_transfers_ownership_and_shifts_down() {
        let a = Object::new(1u8);
        let b = Object::new(2u8);
        let c = Collection::from_objects([a.clone(), b.clone()]);
        assert_eq!(a.ref_count(), 2);

        let removed = c.remove_element(0).unwrap().unwrap();
        assert_eq!(removed, a);
        assert_eq!(c.count(), 1);
        assert_eq!(c.element(0), Ok(b));

        drop(removed);
        assert_eq!(a.ref_count(), 1);
    }

    #[test]
    fn remove_all_releases_references() {
        let a = Object::new(1u8);
        let c = Collection::from_objects([a.clone(), a.clone()]);
        assert_eq!(a.ref_count(), 3);
        c.remove_all();
        assert_eq!(c.count(), 0);
        assert_eq!(a.ref_count(), 1);

        c.insert_element_at(0, None).unwrap();
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn clones_share_elements() {
        let c = Collection::new();
        let alias = c.clone();
        alias.add_element(None);
        assert_eq!(c.count(), 1);
    }
}
