//! # Slot Handles
//!
//! Generation-checked handles for objects that are created on one thread and
//! materialized on another.
//!
//! The producer reserves a slot immediately, and the handle is valid to pass
//! around at once. The consumer fills the slot when it integrates the Add, and
//! releases it when it integrates the Delete. Releasing bumps the slot's
//! generation, so stale copies of the old handle never match the next object
//! stored in that slot.

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;

/// Generation-checked handle.
///
/// - Lower 32 bits: slot index
/// - Upper 32 bits: generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct SlotHandle(u64);

impl SlotHandle {
    /// Unset handle.
    pub const UNKNOWN: Self = Self(u64::MAX);

    /// Creates a handle from slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// True for [`SlotHandle::UNKNOWN`].
    #[inline]
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == u64::MAX
    }

    /// Raw packed value.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl Default for SlotHandle {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl std::fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            f.write_str("#unknown")
        } else {
            write!(f, "#{}v{}", self.index(), self.generation())
        }
    }
}

/// How a change ledger mints and retires handles.
///
/// `create` runs on the producer thread when an Add is recorded; `destroy`
/// runs on the consumer thread after the object has been removed.
pub trait HandleStrategy<H>: Send + Sync {
    /// Returns a handle not held by any live object.
    fn create(&self) -> H;

    /// Returns `handle` to the strategy once its object is gone.
    fn destroy(&self, handle: H);
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    generation: u32,
    reserved: bool,
}

#[derive(Debug, Default)]
struct SlotTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    reserved: usize,
}

/// Thread-safe slot reservation with generation counters.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    table: Mutex<SlotTable>,
}

impl SlotAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator with room for `capacity` slots before growing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Mutex::new(SlotTable {
                slots: Vec::with_capacity(capacity),
                free: Vec::with_capacity(capacity),
                reserved: 0,
            }),
        }
    }

    /// Reserves a slot, reusing released ones first.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX - 1` slots are in use at once.
    #[allow(clippy::cast_possible_truncation)]
    pub fn reserve(&self) -> SlotHandle {
        let mut table = self.table.lock();
        let index = if let Some(index) = table.free.pop() {
            index
        } else {
            let len = table.slots.len();
            assert!(len < u32::MAX as usize, "slot allocator exhausted");
            table.slots.push(Slot::default());
            len as u32
        };

        let slot = &mut table.slots[index as usize];
        debug_assert!(!slot.reserved, "free list held a reserved slot");
        slot.reserved = true;
        let handle = SlotHandle::new(index, slot.generation);
        table.reserved += 1;
        handle
    }

    /// Releases `handle`. Returns `false` for stale, unknown or already
    /// released handles.
    pub fn release(&self, handle: SlotHandle) -> bool {
        if handle.is_unknown() {
            return false;
        }
        let mut table = self.table.lock();
        let Some(slot) = table.slots.get_mut(handle.index() as usize) else {
            return false;
        };
        if !slot.reserved || slot.generation != handle.generation() {
            return false;
        }
        slot.reserved = false;
        slot.generation = slot.generation.wrapping_add(1);
        table.free.push(handle.index());
        table.reserved -= 1;
        true
    }

    /// True if `handle` is currently reserved.
    #[must_use]
    pub fn is_reserved(&self, handle: SlotHandle) -> bool {
        if handle.is_unknown() {
            return false;
        }
        let table = self.table.lock();
        table
            .slots
            .get(handle.index() as usize)
            .is_some_and(|slot| slot.reserved && slot.generation == handle.generation())
    }

    /// Number of reserved slots.
    #[must_use]
    pub fn reserved_count(&self) -> usize {
        self.table.lock().reserved
    }
}

impl HandleStrategy<SlotHandle> for SlotAllocator {
    fn create(&self) -> SlotHandle {
        self.reserve()
    }

    fn destroy(&self, handle: SlotHandle) {
        if !self.release(handle) {
            tracing::warn!(%handle, "released a handle that was not reserved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_handle_roundtrip() {
        let handle = SlotHandle::new(12345, 67890);
        assert_eq!(handle.index(), 12345);
        assert_eq!(handle.generation(), 67890);
        assert!(!handle.is_unknown());
        assert!(SlotHandle::default().is_unknown());
    }

    #[test]
    fn test_live_handles_are_unique() {
        let slots = SlotAllocator::new();
        let a = slots.reserve();
        let b = slots.reserve();
        assert_ne!(a, b);
        assert_eq!(slots.reserved_count(), 2);
    }

    #[test]
    fn test_release_bumps_generation() {
        let slots = SlotAllocator::new();
        let a = slots.reserve();
        assert!(slots.release(a));
        assert!(!slots.is_reserved(a));

        let b = slots.reserve();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(slots.is_reserved(b));
        assert!(!slots.is_reserved(a));
    }

    #[test]
    fn test_stale_release_rejected() {
        let slots = SlotAllocator::new();
        let a = slots.reserve();
        assert!(slots.release(a));
        assert!(!slots.release(a));

        let b = slots.reserve();
        assert!(!slots.release(a));
        assert!(slots.is_reserved(b));
        assert!(!slots.release(SlotHandle::UNKNOWN));
    }

    #[test]
    fn test_concurrent_reservations_are_unique() {
        let slots = Arc::new(SlotAllocator::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let slots = Arc::clone(&slots);
                thread::spawn(move || (0..500).map(|_| slots.create()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for handle in worker.join().unwrap() {
                assert!(seen.insert(handle), "duplicate handle {handle}");
            }
        }
        assert_eq!(slots.reserved_count(), 2000);
    }
}
