//! # Entities
//!
//! An entity is a slot index, a generation, and a mask of attached
//! components.

/// Generation-checked entity identifier.
///
/// - Lower 32 bits: slot index into component storages
/// - Upper 32 bits: generation, bumped on every despawn of the slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates an ID from slot index and generation.
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

    /// True for [`EntityId::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

/// Entity slot state.
#[derive(Clone, Copy, Debug)]
pub struct Entity {
    /// Current (or last) ID held by the slot.
    pub id: EntityId,
    /// One bit per attached component type.
    pub component_mask: u64,
    /// Whether the slot is in use.
    pub alive: bool,
}

impl Entity {
    /// A live entity with no components.
    #[inline]
    #[must_use]
    pub const fn new(id: EntityId) -> Self {
        Self {
            id,
            component_mask: 0,
            alive: true,
        }
    }

    /// An unused slot.
    #[inline]
    #[must_use]
    pub const fn dead() -> Self {
        Self {
            id: EntityId::NULL,
            component_mask: 0,
            alive: false,
        }
    }

    /// True if every bit of `mask` is attached.
    #[inline]
    #[must_use]
    pub const fn has_all(self, mask: u64) -> bool {
        self.component_mask & mask == mask
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::dead()
    }
}
