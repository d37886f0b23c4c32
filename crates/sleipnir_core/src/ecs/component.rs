//! # Components
//!
//! Plain data attached to entities. Every component type owns one dense
//! storage inside [`World`]; the trait ties the type to that storage.

use bytemuck::{Pod, Zeroable};
use sleipnir_shared::math::Vec3;

use crate::memory::SlotHandle;

use super::storage::ComponentStorage;
use super::world::World;

/// An ECS component type.
///
/// Components must be `Copy` and `Pod` so storages can be pre-allocated and
/// reset without running destructors.
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Bit index in the entity component mask (0-63).
    const ID: u8;

    /// Single-bit mask for this component.
    const MASK: u64 = 1 << Self::ID;

    /// This component's storage in `world`.
    fn storage(world: &World) -> &ComponentStorage<Self>;

    /// This component's storage in `world`, mutably.
    fn storage_mut(world: &mut World) -> &mut ComponentStorage<Self>;
}

/// World-space position, written from the latest physics snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// Position in world units.
    pub value: Vec3,
}

impl Position {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            value: Vec3::new(x, y, z),
        }
    }
}

impl Component for Position {
    const ID: u8 = 0;

    fn storage(world: &World) -> &ComponentStorage<Self> {
        &world.positions
    }

    fn storage_mut(world: &mut World) -> &mut ComponentStorage<Self> {
        &mut world.positions
    }
}

/// Links an entity to a body owned by the physics thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PhysicsBody {
    /// Body handle returned when the Add was recorded.
    pub handle: SlotHandle,
}

impl PhysicsBody {
    /// Links to `handle`.
    #[inline]
    #[must_use]
    pub const fn new(handle: SlotHandle) -> Self {
        Self { handle }
    }
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            handle: SlotHandle::UNKNOWN,
        }
    }
}

impl Component for PhysicsBody {
    const ID: u8 = 1;

    fn storage(world: &World) -> &ComponentStorage<Self> {
        &world.bodies
    }

    fn storage_mut(world: &mut World) -> &mut ComponentStorage<Self> {
        &mut world.bodies
    }
}

/// One-shot force request. Consumed by the physics control pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Control {
    /// Force to add to the linked body.
    pub force: Vec3,
}

impl Component for Control {
    const ID: u8 = 2;

    fn storage(world: &World) -> &ComponentStorage<Self> {
        &world.controls
    }

    fn storage_mut(world: &mut World) -> &mut ComponentStorage<Self> {
        &mut world.controls
    }
}

/// World time, in microseconds, at which the entity expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Lifetime {
    /// Deadline in world microseconds.
    pub deadline_micros: u64,
}

impl Component for Lifetime {
    const ID: u8 = 3;

    fn storage(world: &World) -> &ComponentStorage<Self> {
        &world.lifetimes
    }

    fn storage_mut(world: &mut World) -> &mut ComponentStorage<Self> {
        &mut world.lifetimes
    }
}

/// Periodic timer in world microseconds.
///
/// Fires every `tick_micros` after `last_micros` and times out at
/// `end_micros`. Driven by the engine's timer system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Timer {
    /// Last processed tick.
    pub last_micros: u64,
    /// Time point at which the timer times out.
    pub end_micros: u64,
    /// Period between ticks.
    pub tick_micros: u64,
}

impl Timer {
    /// A timer started at `start` ticking every `tick` until `end`.
    #[inline]
    #[must_use]
    pub const fn new(start: u64, tick: u64, end: u64) -> Self {
        Self {
            last_micros: start,
            end_micros: end,
            tick_micros: tick,
        }
    }
}

impl Component for Timer {
    const ID: u8 = 4;

    fn storage(world: &World) -> &ComponentStorage<Self> {
        &world.timers
    }

    fn storage_mut(world: &mut World) -> &mut ComponentStorage<Self> {
        &mut world.timers
    }
}
