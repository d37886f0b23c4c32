//! # Physics Engine
//!
//! Everything the physics thread owns: the backend, the body collection,
//! the change ledger and the integrator that drains it.

use std::sync::Arc;
use std::time::Duration;

use sleipnir_core::{
    Changes, Instance, IntegrationReport, Integrator, Priority, SlotAllocator,
};
use sleipnir_shared::constants::DEFAULT_PRIORITY;

use super::backend::PhysicsBackend;
use crate::error::PhysicsResult;
use super::body::{BodyChanges, BodyCollection, BodyMemento, BodyPositions};

/// A backend plus the bodies it simulates.
///
/// Not thread-safe; lives on exactly one thread at a time. Producers reach it
/// only through [`Engine::changes`].
pub struct Engine<B: PhysicsBackend> {
    backend: B,
    bodies: BodyCollection,
    changes: Arc<BodyChanges>,
    integrator: Integrator<BodyMemento>,
}

impl<B: PhysicsBackend> Engine<B> {
    /// Creates an engine sized for `capacity` bodies.
    #[must_use]
    pub fn new(backend: B, capacity: usize) -> Self {
        let handles = Arc::new(SlotAllocator::with_capacity(capacity));
        let changes = Changes::new(handles);
        let integrator = Integrator::for_ledger(&changes);
        Self {
            backend,
            bodies: BodyCollection::with_capacity(capacity),
            changes,
            integrator,
        }
    }

    /// Lets the backend seed scenery, then integrates it.
    ///
    /// # Errors
    ///
    /// Whatever the backend's `initialize` returns. Nothing is integrated
    /// in that case.
    pub fn initialize(&mut self) -> PhysicsResult<IntegrationReport> {
        let mut scenery = self.changes.clone_instance(DEFAULT_PRIORITY);
        self.backend.initialize(&mut scenery)?;
        Ok(self.integrator.integrate(&mut self.bodies, &mut scenery))
    }

    /// Advances the simulation by one `tick`.
    pub fn run(&mut self, tick: Duration) {
        self.backend.step(tick, &mut self.bodies);
    }

    /// Applies every batch due at or before `timepoint`.
    pub fn integrate(&mut self, timepoint: Duration) -> IntegrationReport {
        let mut due = self.changes.pull(timepoint);
        self.integrator.integrate(&mut self.bodies, &mut due)
    }

    /// Current body positions, stamped with `time`.
    #[must_use]
    pub fn poll_positions(&self, time: Duration) -> BodyPositions {
        self.bodies.snapshot(time)
    }

    /// A new empty write batch against this engine's ledger.
    #[must_use]
    pub fn clone_body_changes(&self, priority: Priority) -> Instance<BodyMemento> {
        self.changes.clone_instance(priority)
    }

    /// The change ledger.
    #[inline]
    #[must_use]
    pub const fn changes(&self) -> &Arc<BodyChanges> {
        &self.changes
    }

    /// Live bodies.
    #[inline]
    #[must_use]
    pub const fn bodies(&self) -> &BodyCollection {
        &self.bodies
    }

    /// Live bodies, mutably. For backends and tests seeding state directly.
    #[inline]
    pub fn bodies_mut(&mut self) -> &mut BodyCollection {
        &mut self.bodies
    }

    /// The backend.
    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: PhysicsBackend> std::fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("bodies", &self.bodies.len())
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}
