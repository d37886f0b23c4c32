//! # Physics System
//!
//! The game-thread side of physics. Once per frame it turns [`Control`]
//! components into force modifies, copies the latest published positions into
//! [`Position`] components, and reports quiescence for its reader section.

use std::sync::Arc;
use std::time::Duration;

use sleipnir_core::{
    Combine, Component, Control, EntityId, Instance, PhysicsBody, Position, Priority, Section,
    World,
};
use sleipnir_shared::EngineConfig;
use tracing::trace;

use crate::error::PhysicsResult;
use crate::systems::System;
use crate::time::WorldTime;

use super::backend::PhysicsBackend;
use super::body::{BodyChanges, BodyMemento};
use super::engine::Engine;
use super::thread::{PhysicsClock, PhysicsThread};

/// Converts one-shot [`Control`] components into body force modifies.
#[derive(Debug)]
pub struct ControlPass {
    changes: Instance<BodyMemento>,
    world_time: Arc<WorldTime>,
    scratch: Vec<EntityId>,
}

impl ControlPass {
    /// Records into `changes`, stamped with `world_time`.
    #[must_use]
    pub fn new(changes: Instance<BodyMemento>, world_time: Arc<WorldTime>) -> Self {
        Self {
            changes,
            world_time,
            scratch: Vec::new(),
        }
    }

    /// Consumes every `Control` on a physics-linked entity and pushes the
    /// resulting batch. Returns the number of forces recorded.
    pub fn update(&mut self, world: &mut World) -> usize {
        self.scratch.clear();
        self.scratch
            .extend(world.query(Control::MASK | PhysicsBody::MASK));

        for &id in &self.scratch {
            let (Some(control), Some(body)) =
                (world.get::<Control>(id).copied(), world.get::<PhysicsBody>(id).copied())
            else {
                continue;
            };
            self.changes
                .modify(body.handle, BodyMemento::force(control.force), Combine::Add);
            world.remove::<Control>(id);
        }

        let recorded = self.changes.len();
        if recorded > 0 {
            trace!(recorded, "control forces pushed");
        }
        self.changes.push(self.world_time.now());
        recorded
    }
}

/// Per-frame physics system.
pub struct Physics<B: PhysicsBackend> {
    thread: PhysicsThread<B>,
    section: Section,
    control: ControlPass,
}

impl<B: PhysicsBackend> Physics<B> {
    /// Wraps `engine`, ticking by `tick` towards `world_time`. Control forces
    /// are pushed at `control_priority`.
    #[must_use]
    pub fn new(
        engine: Engine<B>,
        world_time: Arc<WorldTime>,
        tick: Duration,
        control_priority: Priority,
    ) -> Self {
        let thread = PhysicsThread::new(engine, Arc::clone(&world_time), tick);
        let section = thread.register_section();
        let control = ControlPass::new(thread.clone_body_changes(control_priority), world_time);
        Self {
            thread,
            section,
            control,
        }
    }

    /// Builds the engine from `config`.
    #[must_use]
    pub fn from_config(backend: B, world_time: Arc<WorldTime>, config: &EngineConfig) -> Self {
        Self::new(
            Engine::new(backend, config.max_physics_objects),
            world_time,
            config.physics_tick(),
            config.default_priority,
        )
    }

    /// Initializes the backend and starts the worker.
    ///
    /// # Errors
    ///
    /// See [`PhysicsThread::initialize`] and [`PhysicsThread::run`].
    pub fn start(&mut self) -> PhysicsResult<()> {
        self.thread.initialize()?;
        self.thread.run()
    }

    /// Stops the worker.
    ///
    /// # Errors
    ///
    /// See [`PhysicsThread::join`].
    pub fn stop(&mut self) -> PhysicsResult<()> {
        self.thread.join()
    }

    /// A new empty write batch against the body ledger.
    #[must_use]
    pub fn clone_body_changes(&self, priority: Priority) -> Instance<BodyMemento> {
        self.thread.clone_body_changes(priority)
    }

    /// The body change ledger.
    #[must_use]
    pub const fn body_changes(&self) -> &Arc<BodyChanges> {
        self.thread.body_changes()
    }

    /// A handle on the simulated time.
    #[must_use]
    pub fn clock(&self) -> PhysicsClock {
        self.thread.clock()
    }

    /// The worker.
    #[must_use]
    pub const fn thread(&self) -> &PhysicsThread<B> {
        &self.thread
    }

    /// Copies published positions into `Position` components.
    ///
    /// Returns how many entities were updated.
    pub fn sync_positions(&mut self, world: &mut World) -> usize {
        let positions = self.thread.body_positions(&self.section);
        let mut updated = 0;
        for id in world.query(Position::MASK | PhysicsBody::MASK) {
            let Some(handle) = world.get::<PhysicsBody>(id).map(|body| body.handle) else {
                continue;
            };
            if let (Some(value), Some(position)) =
                (positions.get(handle), world.get_mut::<Position>(id))
            {
                position.value = value;
                updated += 1;
            }
        }
        self.section.quiescent();
        updated
    }
}

impl<B: PhysicsBackend> System for Physics<B> {
    fn update(&mut self, world: &mut World) {
        self.control.update(world);
        self.sync_positions(world);
    }

    fn name(&self) -> &'static str {
        "physics"
    }
}

impl<B: PhysicsBackend> std::fmt::Debug for Physics<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Physics")
            .field("thread", &self.thread)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::backend::KinematicBackend;
    use sleipnir_core::SlotHandle;
    use sleipnir_shared::math::Vec3;

    #[test]
    fn test_control_pass_consumes_linked_controls() {
        let world_time = Arc::new(WorldTime::new(Duration::from_millis(12)));
        let engine = Engine::new(KinematicBackend::new(Vec3::ZERO), 4);
        let changes = Arc::clone(engine.changes());
        let mut pass = ControlPass::new(engine.clone_body_changes(7), world_time);

        let mut world = World::new(8);
        let linked = world.spawn();
        let unlinked = world.spawn();
        let handle = SlotHandle::new(2, 0);
        world.insert(linked, PhysicsBody::new(handle));
        world.insert(linked, Control { force: Vec3::X });
        world.insert(unlinked, Control { force: Vec3::Y });

        assert_eq!(pass.update(&mut world), 1);
        assert!(!world.has::<Control>(linked));
        assert!(world.has::<Control>(unlinked));

        assert!(changes.pull(Duration::from_millis(11)).is_empty());
        let due = changes.pull(Duration::from_millis(12));
        assert_eq!(due.modifies().len(), 1);
        assert_eq!(due.modifies()[0].handle, handle);
        assert_eq!(due.modifies()[0].combine, Combine::Add);
        assert_eq!(due.modifies()[0].memento, BodyMemento::force(Vec3::X));
    }

    #[test]
    fn test_control_pass_without_controls_pushes_nothing() {
        let world_time = Arc::new(WorldTime::default());
        let engine = Engine::new(KinematicBackend::new(Vec3::ZERO), 4);
        let mut pass = ControlPass::new(engine.clone_body_changes(0), world_time);
        let mut world = World::new(2);

        assert_eq!(pass.update(&mut world), 0);
        assert_eq!(engine.changes().pending_batches(), 0);
    }

    #[test]
    fn test_sync_positions_before_start_uses_initial_snapshot() {
        let world_time = Arc::new(WorldTime::default());
        let mut physics = Physics::new(
            Engine::new(KinematicBackend::new(Vec3::ZERO), 4),
            world_time,
            Duration::from_millis(4),
            0,
        );
        let mut world = World::new(2);
        let id = world.spawn();
        world.insert(id, Position::new(5.0, 5.0, 5.0));
        world.insert(id, PhysicsBody::new(SlotHandle::new(0, 0)));

        assert_eq!(physics.sync_positions(&mut world), 0);
        assert_eq!(world.get::<Position>(id), Some(&Position::new(5.0, 5.0, 5.0)));
    }
}
