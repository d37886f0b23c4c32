//! # Component Storage
//!
//! One dense, pre-allocated array per component type, indexed by entity
//! slot. Presence is tracked by the entity's component mask, not here.

use super::component::Component;

/// Dense storage for a single component type.
///
/// ```rust,ignore
/// let mut storage: ComponentStorage<Position> = ComponentStorage::new(1024);
/// storage.set(7, Position::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug)]
pub struct ComponentStorage<C: Component> {
    data: Box<[C]>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates storage for `capacity` entities, filled with defaults.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self {
            data: vec![C::default(); capacity].into_boxed_slice(),
        }
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Component in slot `index`, or `None` past capacity.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&C> {
        self.data.get(index)
    }

    /// Mutable component in slot `index`, or `None` past capacity.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut C> {
        self.data.get_mut(index)
    }

    /// Overwrites slot `index`. Returns `false` past capacity.
    #[inline]
    pub fn set(&mut self, index: usize, component: C) -> bool {
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = component;
                true
            }
            None => false,
        }
    }

    /// Restores slot `index` to the default value.
    #[inline]
    pub fn reset(&mut self, index: usize) {
        if let Some(slot) = self.data.get_mut(index) {
            *slot = C::default();
        }
    }

    /// All slots, including unused ones.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }
}
