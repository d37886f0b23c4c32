//! # ECS World
//!
//! Fixed-capacity container for entities and their components. Owned by the
//! game thread; the physics thread never sees it.

use super::component::{Component, Control, Lifetime, PhysicsBody, Position, Timer};
use super::entity::{Entity, EntityId};
use super::storage::ComponentStorage;

/// The ECS world.
///
/// All storage is allocated at creation. Spawning past capacity returns
/// [`EntityId::NULL`].
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(1024);
///
/// let entity = world.spawn();
/// world.insert(entity, Position::new(0.0, 1.0, 0.0));
/// world.insert(entity, PhysicsBody::new(handle));
///
/// for id in world.query(Position::MASK | PhysicsBody::MASK) {
///     // ...
/// }
/// ```
pub struct World {
    entities: Box<[Entity]>,
    free_indices: Vec<u32>,
    alive_count: usize,

    // =========================================================================
    // Component Storages - one per `Component` impl
    // =========================================================================
    pub(crate) positions: ComponentStorage<Position>,
    pub(crate) bodies: ComponentStorage<PhysicsBody>,
    pub(crate) controls: ComponentStorage<Control>,
    pub(crate) lifetimes: ComponentStorage<Lifetime>,
    pub(crate) timers: ComponentStorage<Timer>,
}

impl World {
    /// Creates a world holding at most `capacity` entities.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity <= u32::MAX as usize,
            "Capacity cannot exceed u32::MAX"
        );

        Self {
            entities: vec![Entity::dead(); capacity].into_boxed_slice(),
            // Reversed so slot 0 is handed out first.
            free_indices: (0..capacity as u32).rev().collect(),
            alive_count: 0,
            positions: ComponentStorage::new(capacity),
            bodies: ComponentStorage::new(capacity),
            controls: ComponentStorage::new(capacity),
            lifetimes: ComponentStorage::new(capacity),
            timers: ComponentStorage::new(capacity),
        }
    }

    /// Maximum number of entities.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entities.len()
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Spawns an entity with no components.
    ///
    /// Returns [`EntityId::NULL`] when the world is full.
    pub fn spawn(&mut self) -> EntityId {
        let Some(index) = self.free_indices.pop() else {
            return EntityId::NULL;
        };

        let entity = &mut self.entities[index as usize];
        let generation = entity.id.generation().wrapping_add(1);
        let id = EntityId::new(index, generation);
        *entity = Entity::new(id);
        self.alive_count += 1;
        id
    }

    /// Despawns an entity and resets its components.
    ///
    /// Returns `false` for dead, stale or null IDs.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        let entity = &mut self.entities[idx];
        entity.alive = false;
        entity.component_mask = 0;
        self.alive_count -= 1;
        self.free_indices.push(id.index());

        self.positions.reset(idx);
        self.bodies.reset(idx);
        self.controls.reset(idx);
        self.lifetimes.reset(idx);
        self.timers.reset(idx);
        true
    }

    /// True if `id` names a live entity of the current generation.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        self.entities
            .get(id.index() as usize)
            .is_some_and(|entity| entity.alive && entity.id.generation() == id.generation())
    }

    /// Slot state for a live entity.
    #[inline]
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.is_alive(id).then(|| &self.entities[id.index() as usize])
    }

    /// Attaches (or overwrites) a component. Returns `false` if `id` is dead.
    pub fn insert<C: Component>(&mut self, id: EntityId, component: C) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        C::storage_mut(self).set(idx, component);
        self.entities[idx].component_mask |= C::MASK;
        true
    }

    /// Detaches a component. Returns `false` if it was not attached.
    pub fn remove<C: Component>(&mut self, id: EntityId) -> bool {
        if !self.has::<C>(id) {
            return false;
        }
        let idx = id.index() as usize;
        C::storage_mut(self).reset(idx);
        self.entities[idx].component_mask &= !C::MASK;
        true
    }

    /// True if `id` is alive and has `C` attached.
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|entity| entity.has_all(C::MASK))
    }

    /// The attached `C` component.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        if !self.has::<C>(id) {
            return None;
        }
        C::storage(self).get(id.index() as usize)
    }

    /// The attached `C` component, mutably.
    #[inline]
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        if !self.has::<C>(id) {
            return None;
        }
        C::storage_mut(self).get_mut(id.index() as usize)
    }

    /// Live entities holding every component in `mask`, in slot order.
    #[must_use]
    pub fn query(&self, mask: u64) -> Vec<EntityId> {
        self.iter_alive()
            .filter(|entity| entity.has_all(mask))
            .map(|entity| entity.id)
            .collect()
    }

    /// Iterates over live entity slots.
    pub fn iter_alive(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|entity| entity.alive)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("capacity", &self.capacity())
            .field("alive_count", &self.alive_count)
            .finish_non_exhaustive()
    }
}
