//! # Physics Worker Thread
//!
//! Owns an [`Engine`] on a dedicated OS thread and keeps it within one tick
//! of world time.
//!
//! ```text
//! Created ──initialize──► Initialized ──run──► Running ──join──► Stopping ──► Joined
//!    │                        │                                                ▲
//!    └────────────────────────┴──────────────────join──────────────────────────┘
//! ```
//!
//! ## Worker loop
//!
//! ```text
//! loop until stopped:
//!     target = world time
//!     while last + tick < target:
//!         step backend by one tick
//!         publish positions, store simulated time
//!         report quiescence
//!         integrate batches due at the new time
//!     yield
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sleipnir_core::{Instance, Priority, Published, Qsbr, Section};
use sleipnir_shared::EngineConfig;
use tracing::{debug, error, info};

use crate::error::{PhysicsError, PhysicsResult};
use crate::time::{duration_to_micros, WorldTime};

use super::backend::PhysicsBackend;
use super::body::{BodyChanges, BodyMemento, BodyPositions};
use super::engine::Engine;

/// Name given to the worker OS thread.
pub const WORKER_THREAD_NAME: &str = "sleipnir-physics";

/// Lifecycle of a [`PhysicsThread`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    /// Constructed; backend not initialized.
    Created,
    /// Backend initialized; worker not started.
    Initialized,
    /// Worker running.
    Running,
    /// Stop requested; waiting for the worker.
    Stopping,
    /// Worker gone. Terminal.
    Joined,
}

/// State shared between the owner and the worker.
struct Shared {
    positions: Published<BodyPositions>,
    current_time: AtomicU64,
    working: AtomicBool,
    world_time: Arc<WorldTime>,
}

impl Shared {
    fn now(&self) -> Duration {
        Duration::from_micros(self.current_time.load(Ordering::Acquire))
    }
}

/// Read-only view of the worker's simulated time.
#[derive(Clone)]
pub struct PhysicsClock {
    shared: Arc<Shared>,
}

impl PhysicsClock {
    /// Last fully simulated time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        self.shared.now()
    }
}

impl std::fmt::Debug for PhysicsClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsClock")
            .field("now", &self.now())
            .finish()
    }
}

/// The physics worker.
///
/// # Example
///
/// ```rust,ignore
/// let world_time = Arc::new(WorldTime::default());
/// let mut physics = PhysicsThread::new(engine, Arc::clone(&world_time), PHYSICS_TICK);
/// physics.initialize()?;
/// physics.run()?;
///
/// let mut section = physics.register_section();
/// let positions = physics.body_positions(&section);
/// // ... read positions ...
/// section.quiescent();
///
/// physics.join()?;
/// ```
pub struct PhysicsThread<B: PhysicsBackend> {
    shared: Arc<Shared>,
    reclaimer: Arc<Qsbr>,
    changes: Arc<BodyChanges>,
    worker_section: Option<Section>,
    engine: Option<Engine<B>>,
    worker: Option<JoinHandle<Engine<B>>>,
    state: ThreadState,
    tick: Duration,
}

impl<B: PhysicsBackend> PhysicsThread<B> {
    /// Wraps `engine`, simulating in steps of `tick` towards `world_time`.
    ///
    /// Simulated time starts at the current world time.
    ///
    /// # Panics
    ///
    /// Panics if `tick` is zero.
    #[must_use]
    pub fn new(engine: Engine<B>, world_time: Arc<WorldTime>, tick: Duration) -> Self {
        assert!(!tick.is_zero(), "physics tick must be non-zero");

        let reclaimer = Arc::new(Qsbr::new());
        let worker_section = Section::register(&reclaimer);
        let start = world_time.now();
        let shared = Arc::new(Shared {
            positions: Published::new(Arc::clone(&reclaimer), engine.poll_positions(start)),
            current_time: AtomicU64::new(duration_to_micros(start)),
            working: AtomicBool::new(false),
            world_time,
        });

        Self {
            shared,
            reclaimer,
            changes: Arc::clone(engine.changes()),
            worker_section: Some(worker_section),
            engine: Some(engine),
            worker: None,
            state: ThreadState::Created,
            tick,
        }
    }

    /// Builds an engine around `backend` sized and ticked from `config`.
    #[must_use]
    pub fn from_config(backend: B, world_time: Arc<WorldTime>, config: &EngineConfig) -> Self {
        Self::new(
            Engine::new(backend, config.max_physics_objects),
            world_time,
            config.physics_tick(),
        )
    }

    fn expect_state(&self, expected: ThreadState) -> PhysicsResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PhysicsError::InvalidState {
                expected,
                found: self.state,
            })
        }
    }

    /// Initializes the backend and publishes the resulting positions.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidState`] unless the thread is
    /// [`ThreadState::Created`].
    pub fn initialize(&mut self) -> PhysicsResult<()> {
        self.expect_state(ThreadState::Created)?;
        let engine = self.engine.as_mut().ok_or(PhysicsError::InvalidState {
            expected: ThreadState::Created,
            found: self.state,
        })?;

        engine.initialize()?;
        self.shared
            .positions
            .publish(engine.poll_positions(self.shared.now()));
        self.state = ThreadState::Initialized;
        debug!(bodies = engine.bodies().len(), "physics initialized");
        Ok(())
    }

    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::InvalidState`] unless the thread is
    /// [`ThreadState::Initialized`]. [`PhysicsError::Spawn`] if the OS
    /// refuses the thread; the engine is lost and the state becomes
    /// [`ThreadState::Joined`].
    pub fn run(&mut self) -> PhysicsResult<()> {
        self.expect_state(ThreadState::Initialized)?;
        let (Some(engine), Some(section)) = (self.engine.take(), self.worker_section.take())
        else {
            return Err(PhysicsError::InvalidState {
                expected: ThreadState::Initialized,
                found: self.state,
            });
        };

        self.shared.working.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let tick = self.tick;
        let dispatch = tracing::dispatcher::get_default(Clone::clone);

        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                tracing::dispatcher::with_default(&dispatch, || {
                    routine(engine, section, &shared, tick)
                })
            });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                self.state = ThreadState::Running;
                info!(tick_us = duration_to_micros(tick), "physics thread started");
                Ok(())
            }
            Err(err) => {
                self.shared.working.store(false, Ordering::Release);
                self.state = ThreadState::Joined;
                error!(%err, "failed to spawn physics thread");
                Err(PhysicsError::Spawn(err))
            }
        }
    }

    /// Stops the worker and waits for it. Idempotent.
    ///
    /// After a clean join the engine is available again through
    /// [`PhysicsThread::engine`].
    ///
    /// # Errors
    ///
    /// [`PhysicsError::WorkerPanicked`] if the worker panicked.
    pub fn join(&mut self) -> PhysicsResult<()> {
        match self.state {
            ThreadState::Joined => return Ok(()),
            ThreadState::Created | ThreadState::Initialized => {
                self.worker_section = None;
                self.state = ThreadState::Joined;
                return Ok(());
            }
            ThreadState::Running | ThreadState::Stopping => {}
        }

        self.state = ThreadState::Stopping;
        self.shared.working.store(false, Ordering::Release);
        let Some(worker) = self.worker.take() else {
            self.state = ThreadState::Joined;
            return Ok(());
        };

        let joined = worker.join();
        self.state = ThreadState::Joined;
        match joined {
            Ok(engine) => {
                info!(
                    simulated_us = duration_to_micros(self.shared.now()),
                    bodies = engine.bodies().len(),
                    "physics thread joined"
                );
                self.engine = Some(engine);
                Ok(())
            }
            Err(_) => {
                error!("physics thread panicked");
                Err(PhysicsError::WorkerPanicked)
            }
        }
    }

    /// Registers a reader section for [`PhysicsThread::body_positions`].
    #[must_use]
    pub fn register_section(&self) -> Section {
        Section::register(&self.reclaimer)
    }

    /// Latest published positions.
    ///
    /// The borrow ends before `section` can report quiescence.
    #[inline]
    #[must_use]
    pub fn body_positions<'a>(&'a self, section: &'a Section) -> &'a BodyPositions {
        self.shared.positions.load(section)
    }

    /// Last fully simulated time.
    #[inline]
    #[must_use]
    pub fn current_time(&self) -> Duration {
        self.shared.now()
    }

    /// A cloneable handle on the simulated time.
    #[must_use]
    pub fn clock(&self) -> PhysicsClock {
        PhysicsClock {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A new empty write batch against the body ledger.
    #[must_use]
    pub fn clone_body_changes(&self, priority: Priority) -> Instance<BodyMemento> {
        self.changes.clone_instance(priority)
    }

    /// The body change ledger.
    #[inline]
    #[must_use]
    pub const fn body_changes(&self) -> &Arc<BodyChanges> {
        &self.changes
    }

    /// The reclaimer guarding published snapshots.
    #[inline]
    #[must_use]
    pub const fn reclaimer(&self) -> &Arc<Qsbr> {
        &self.reclaimer
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ThreadState {
        self.state
    }

    /// Fixed simulation step.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> Duration {
        self.tick
    }

    /// The engine, while no worker owns it.
    #[must_use]
    pub const fn engine(&self) -> Option<&Engine<B>> {
        self.engine.as_ref()
    }
}

impl<B: PhysicsBackend> Drop for PhysicsThread<B> {
    fn drop(&mut self) {
        if let Err(err) = self.join() {
            error!(%err, "physics thread failed during shutdown");
        }
    }
}

impl<B: PhysicsBackend> std::fmt::Debug for PhysicsThread<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsThread")
            .field("state", &self.state)
            .field("tick", &self.tick)
            .field("current_time", &self.current_time())
            .finish_non_exhaustive()
    }
}

fn routine<B: PhysicsBackend>(
    mut engine: Engine<B>,
    mut section: Section,
    shared: &Shared,
    tick: Duration,
) -> Engine<B> {
    let mut last = shared.now();
    let mut steps = 0_u64;

    while shared.working.load(Ordering::Acquire) {
        let target = shared.world_time.now();
        let mut next = last + tick;
        while next < target {
            engine.run(tick);
            shared.positions.publish(engine.poll_positions(next));
            shared
                .current_time
                .store(duration_to_micros(next), Ordering::Release);
            section.quiescent();
            engine.integrate(next);

            last = next;
            next = last + tick;
            steps += 1;
        }
        thread::yield_now();
    }

    debug!(steps, "physics routine finished");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::backend::KinematicBackend;
    use crate::physics::body::Shape;
    use sleipnir_shared::math::Vec3;

    const TICK: Duration = Duration::from_millis(4);

    fn physics(world_time: &Arc<WorldTime>) -> PhysicsThread<KinematicBackend> {
        PhysicsThread::new(
            Engine::new(KinematicBackend::new(Vec3::ZERO), 8),
            Arc::clone(world_time),
            TICK,
        )
    }

    #[test]
    fn test_lifecycle_order_is_enforced() {
        let world_time = Arc::new(WorldTime::default());
        let mut physics = physics(&world_time);
        assert_eq!(physics.state(), ThreadState::Created);

        assert!(matches!(
            physics.run(),
            Err(PhysicsError::InvalidState {
                expected: ThreadState::Initialized,
                found: ThreadState::Created,
            })
        ));

        physics.initialize().unwrap();
        assert!(physics.initialize().is_err());
        physics.run().unwrap();
        assert_eq!(physics.state(), ThreadState::Running);
        assert!(physics.engine().is_none());

        physics.join().unwrap();
        assert_eq!(physics.state(), ThreadState::Joined);
        assert!(physics.engine().is_some());
        physics.join().unwrap();
    }

    #[test]
    fn test_join_before_run() {
        let world_time = Arc::new(WorldTime::default());
        let mut physics = physics(&world_time);
        physics.join().unwrap();
        assert_eq!(physics.state(), ThreadState::Joined);
        assert_eq!(physics.reclaimer().section_count(), 0);
        assert!(physics.initialize().is_err());
    }

    #[test]
    fn test_snapshot_published_on_construction() {
        let world_time = Arc::new(WorldTime::new(Duration::from_millis(20)));
        let physics = physics(&world_time);
        let section = physics.register_section();
        let positions = physics.body_positions(&section);
        assert!(positions.is_empty());
        assert_eq!(positions.time(), Duration::from_millis(20));
        assert_eq!(physics.current_time(), Duration::from_millis(20));
    }

    #[test]
    fn test_engine_returns_after_join_with_bodies() {
        let world_time = Arc::new(WorldTime::default());
        let mut physics = physics(&world_time);
        let mut batch = physics.clone_body_changes(0);
        let handle = batch.add(BodyMemento::new(Shape::Sphere { radius: 1.0 }));
        batch.push(Duration::ZERO);

        physics.initialize().unwrap();
        physics.run().unwrap();
        world_time.set(Duration::from_millis(40));
        while physics.current_time() + TICK < Duration::from_millis(40) {
            thread::yield_now();
        }
        physics.join().unwrap();

        let engine = physics.engine().unwrap();
        assert!(engine.bodies().get(handle).is_some());
        assert_eq!(physics.current_time(), Duration::from_millis(36));
    }
}
