//! # Slot Pool
//!
//! Storage keyed by [`SlotHandle`]s minted elsewhere.
//!
//! The pool never invents handles. It stores an object in the slot the handle
//! names and compares the full handle (index and generation) on every lookup.

use crate::error::{CoreError, CoreResult};

use super::slots::SlotHandle;

/// Handle-keyed object storage.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by the consumer thread.
///
/// # Example
///
/// ```rust,ignore
/// let slots = SlotAllocator::new();
/// let mut pool: SlotPool<Body> = SlotPool::with_capacity(1024);
///
/// let handle = slots.reserve();          // producer side
/// pool.insert(handle, Body::default())?; // consumer side, later
/// ```
#[derive(Debug)]
pub struct SlotPool<T> {
    storage: Vec<Option<(SlotHandle, T)>>,
    len: usize,
}

impl<T> SlotPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: Vec::new(),
            len: 0,
        }
    }

    /// Creates a pool with `capacity` slots pre-allocated.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut storage = Vec::with_capacity(capacity);
        storage.resize_with(capacity, || None);
        Self { storage, len: 0 }
    }

    /// Number of stored objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the pool holds nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` under `handle`.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownHandle`] for the unset handle,
    /// [`CoreError::SlotOccupied`] if the slot already holds an object.
    pub fn insert(&mut self, handle: SlotHandle, value: T) -> CoreResult<&mut T> {
        if handle.is_unknown() {
            return Err(CoreError::UnknownHandle);
        }
        let index = handle.index() as usize;
        if index >= self.storage.len() {
            self.storage.resize_with(index + 1, || None);
        }

        let slot = &mut self.storage[index];
        if let Some((occupant, _)) = slot {
            return Err(CoreError::SlotOccupied {
                requested: handle,
                occupant: *occupant,
            });
        }
        self.len += 1;
        let (_, value) = slot.insert((handle, value));
        Ok(value)
    }

    /// Removes and returns the object stored under `handle`.
    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let slot = self.storage.get_mut(handle.index() as usize)?;
        if !matches!(slot, Some((occupant, _)) if *occupant == handle) {
            return None;
        }
        self.len -= 1;
        slot.take().map(|(_, value)| value)
    }

    /// True if an object is stored under exactly `handle`.
    #[must_use]
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets the object stored under `handle`.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        match self.storage.get(handle.index() as usize)? {
            Some((occupant, value)) if *occupant == handle => Some(value),
            _ => None,
        }
    }

    /// Gets the object stored under `handle` mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        match self.storage.get_mut(handle.index() as usize)? {
            Some((occupant, value)) if *occupant == handle => Some(value),
            _ => None,
        }
    }

    /// Drops every object. Capacity is kept.
    pub fn clear(&mut self) {
        for slot in &mut self.storage {
            *slot = None;
        }
        self.len = 0;
    }

    /// Iterates over stored objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.storage
            .iter()
            .filter_map(|slot| slot.as_ref().map(|(handle, value)| (*handle, value)))
    }

    /// Iterates mutably over stored objects in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotHandle, &mut T)> {
        self.storage
            .iter_mut()
            .filter_map(|slot| slot.as_mut().map(|(handle, value)| (*handle, value)))
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_insert_remove() {
        let mut pool: SlotPool<u32> = SlotPool::with_capacity(4);
        let handle = SlotHandle::new(2, 0);

        pool.insert(handle, 42).unwrap();
        assert_eq!(pool.get(handle), Some(&42));
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.remove(handle), Some(42));
        assert!(pool.is_empty());
        assert_eq!(pool.remove(handle), None);
    }

    #[test]
    fn test_pool_grows_past_capacity() {
        let mut pool: SlotPool<u32> = SlotPool::with_capacity(1);
        let far = SlotHandle::new(100, 3);
        pool.insert(far, 7).unwrap();
        assert_eq!(pool.get(far), Some(&7));
    }

    #[test]
    fn test_pool_rejects_occupied_slot() {
        let mut pool: SlotPool<u32> = SlotPool::new();
        let first = SlotHandle::new(0, 0);
        pool.insert(first, 1).unwrap();

        let err = pool.insert(SlotHandle::new(0, 1), 2).unwrap_err();
        assert_eq!(
            err,
            CoreError::SlotOccupied {
                requested: SlotHandle::new(0, 1),
                occupant: first,
            }
        );
        assert_eq!(pool.insert(SlotHandle::UNKNOWN, 3).unwrap_err(), CoreError::UnknownHandle);
    }

    #[test]
    fn test_pool_stale_generation_misses() {
        let mut pool: SlotPool<u32> = SlotPool::new();
        let old = SlotHandle::new(5, 0);
        let new = SlotHandle::new(5, 1);
        pool.insert(old, 1).unwrap();
        pool.remove(old);
        pool.insert(new, 2).unwrap();

        assert_eq!(pool.get(old), None);
        assert_eq!(pool.get_mut(old), None);
        assert_eq!(pool.remove(old), None);
        assert_eq!(pool.get(new), Some(&2));
    }

    #[test]
    fn test_pool_iter_in_slot_order() {
        let mut pool: SlotPool<&str> = SlotPool::new();
        pool.insert(SlotHandle::new(3, 0), "c").unwrap();
        pool.insert(SlotHandle::new(1, 0), "a").unwrap();
        let values: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["a", "c"]);
    }
}
