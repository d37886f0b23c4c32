//! # Sleipnir Game Loop
//!
//! ```text
//! Frame N (game thread):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. TIME                                                             │
//! │    └─ Scale real frame time; freeze if physics lags > 1 tick        │
//! │                                                                     │
//! │ 2. SYSTEMS (ascending priority)                                     │
//! │    ├─ Lifetime: despawn expired entities, delete their bodies       │
//! │    ├─ Timer: fire due ticks and timeouts                            │
//! │    ├─ Physics: Control -> force modifies, push at world time        │
//! │    └─ Physics: latest snapshot -> Position, report quiescence       │
//! │                                                                     │
//! │ 3. STATS                                                            │
//! │    └─ Record frame timing                                           │
//! └─────────────────────────────────────────────────────────────────────┘
//!
//! Physics thread (concurrently): step, publish, quiesce, integrate.
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use sleipnir_core::{Instance, PhysicsBody, Priority, World};
use sleipnir_shared::EngineConfig;
use tracing::{info, warn};

use crate::error::{PhysicsError, PhysicsResult};
use crate::physics::{BodyChanges, BodyMemento, Physics, PhysicsBackend, PhysicsClock};
use crate::systems::{DefaultPriority, LifetimeSystem, System, SystemId, Systems, TimerSystem};
use crate::time::{duration_to_micros, TimeBase, TimeWithPhysics, WorldTime};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Update time above which a frame is logged as slow.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Longest real frame [`GameLoop::tick`] will feed the time system.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

/// Timing of one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Real time the frame stood for, in microseconds.
    pub real_us: u64,
    /// World time that passed, in microseconds. Zero while physics lags.
    pub world_us: u64,
    /// Time spent running systems, in microseconds.
    pub update_us: u64,
}

impl FrameStats {
    /// True if the time system held world time back.
    #[inline]
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.real_us > 0 && self.world_us == 0
    }
}

struct PhysicsLink {
    changes: Arc<BodyChanges>,
    clock: PhysicsClock,
}

/// The main game loop.
///
/// Owns the ECS world, world time and the scheduler. Physics runs on its own
/// thread once attached with [`GameLoop::attach_physics`].
pub struct GameLoop {
    world: World,
    world_time: Arc<WorldTime>,
    systems: Systems,
    physics: Option<PhysicsLink>,
    config: EngineConfig,
    frame_count: u64,
    last_frame_time: Instant,
    stats_accumulator: FrameStatsAccumulator,
}

impl GameLoop {
    /// Creates a game loop without physics.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::Config`] if `config` fails validation.
    pub fn new(config: EngineConfig) -> PhysicsResult<Self> {
        config.validate()?;
        let world_time = Arc::new(WorldTime::default());
        let time = TimeBase::with_factor(Arc::clone(&world_time), config.time_factor);

        Ok(Self {
            world: World::new(config.entity_capacity),
            world_time,
            systems: Systems::new(Box::new(time)),
            physics: None,
            config,
            frame_count: 0,
            last_frame_time: Instant::now(),
            stats_accumulator: FrameStatsAccumulator::new(),
        })
    }

    /// Starts a physics thread around `backend` and schedules its system.
    ///
    /// World time is throttled against the physics clock from here on.
    ///
    /// On error the loop is left as it was, without physics.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::AlreadyAttached`] on a second call; otherwise whatever
    /// starting the worker returns.
    pub fn attach_physics<B: PhysicsBackend>(&mut self, backend: B) -> PhysicsResult<()> {
        if self.physics.is_some() {
            return Err(PhysicsError::AlreadyAttached);
        }

        let mut physics = Physics::from_config(backend, Arc::clone(&self.world_time), &self.config);
        physics.start()?;

        let clock = physics.clock();
        let base = TimeBase::with_factor(Arc::clone(&self.world_time), self.config.time_factor);
        self.systems.set_time_system(Box::new(TimeWithPhysics::new(
            base,
            clock.clone(),
            self.config.physics_tick(),
        )));
        self.physics = Some(PhysicsLink {
            changes: Arc::clone(physics.body_changes()),
            clock,
        });
        self.systems.add(physics, DefaultPriority::Physics);
        Ok(())
    }

    /// Schedules entity expiry. Expiring entities with a [`PhysicsBody`] get
    /// their body deleted when physics is already attached.
    pub fn attach_lifetime(&mut self) -> SystemId {
        let mut lifetime = LifetimeSystem::new(Arc::clone(&self.world_time));
        if let Some(link) = &self.physics {
            let mut deletes = link.changes.clone_instance(self.config.default_priority);
            let world_time = Arc::clone(&self.world_time);
            lifetime = lifetime.with_reclaimer(move |world, id| {
                if let Some(body) = world.get::<PhysicsBody>(id) {
                    deletes.delete(body.handle);
                    deletes.push(world_time.now());
                }
            });
        }
        self.systems.add(lifetime, DefaultPriority::Lifetime)
    }

    /// Schedules `timers` in the timer slot.
    pub fn attach_timers(&mut self, timers: TimerSystem) -> SystemId {
        self.systems.add(timers, DefaultPriority::Timer)
    }

    /// Schedules a custom system.
    pub fn add_system<S: System + 'static>(
        &mut self,
        system: S,
        priority: impl Into<u16>,
    ) -> SystemId {
        self.systems.add(system, priority)
    }

    /// Runs one frame that stood for `real` time.
    pub fn run_frame(&mut self, real: Duration) -> FrameStats {
        let start = Instant::now();
        let world_elapsed = self.systems.run_once(&mut self.world, real);
        let update = start.elapsed();

        let stats = FrameStats {
            frame: self.frame_count,
            real_us: duration_to_micros(real),
            world_us: duration_to_micros(world_elapsed),
            update_us: duration_to_micros(update),
        };
        self.frame_count += 1;
        self.stats_accumulator.record(stats);

        if update > MAX_FRAME_TIME {
            warn!(
                frame = stats.frame,
                update_us = stats.update_us,
                budget_us = duration_to_micros(TARGET_FRAME_TIME),
                "frame exceeded budget"
            );
        }
        stats
    }

    /// Runs one frame using the wall-clock time since the previous tick.
    ///
    /// Gaps longer than [`MAX_FRAME_DELTA`] are clamped.
    pub fn tick(&mut self) -> FrameStats {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time).min(MAX_FRAME_DELTA);
        self.last_frame_time = now;
        self.run_frame(delta)
    }

    /// A write batch against the physics body ledger, if physics is attached.
    #[must_use]
    pub fn clone_body_changes(&self, priority: Priority) -> Option<Instance<BodyMemento>> {
        self.physics
            .as_ref()
            .map(|link| link.changes.clone_instance(priority))
    }

    /// Last fully simulated physics time, if physics is attached.
    #[must_use]
    pub fn physics_time(&self) -> Option<Duration> {
        self.physics.as_ref().map(|link| link.clock.now())
    }

    /// Stops every system, joining the physics thread.
    ///
    /// World time keeps advancing unthrottled on later frames.
    pub fn shutdown(&mut self) {
        self.systems.clear();
        if self.physics.take().is_some() {
            let time = TimeBase::with_factor(Arc::clone(&self.world_time), self.config.time_factor);
            self.systems.set_time_system(Box::new(time));
        }
        info!(
            frames = self.frame_count,
            avg_update_ms = self.stats_accumulator.avg_update_ms(),
            "game loop shut down"
        );
    }

    /// The ECS world.
    #[inline]
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The ECS world, mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The shared world clock.
    #[inline]
    #[must_use]
    pub const fn world_time(&self) -> &Arc<WorldTime> {
        &self.world_time
    }

    /// Current world time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        self.world_time.now()
    }

    /// Returns the current frame count.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// The scheduler.
    #[must_use]
    pub const fn systems(&self) -> &Systems {
        &self.systems
    }

    /// Configuration the loop was built from.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

impl std::fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("frame_count", &self.frame_count)
            .field("world_time", &self.world_time.now())
            .field("systems", &self.systems)
            .field("physics", &self.physics_time())
            .finish_non_exhaustive()
    }
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of update times.
    pub update_us_sum: u64,
    /// Sum of real frame times.
    pub real_us_sum: u64,
    /// Sum of world time advanced.
    pub world_us_sum: u64,
    /// Min update time.
    pub min_update_us: u64,
    /// Max update time.
    pub max_update_us: u64,
    /// Frames whose update exceeded the budget.
    pub frames_over_budget: u64,
    /// Frames where world time was held back for physics.
    pub frames_frozen: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_recorded: 0,
            update_us_sum: 0,
            real_us_sum: 0,
            world_us_sum: 0,
            min_update_us: u64::MAX,
            max_update_us: 0,
            frames_over_budget: 0,
            frames_frozen: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.update_us_sum += stats.update_us;
        self.real_us_sum += stats.real_us;
        self.world_us_sum += stats.world_us;
        self.min_update_us = self.min_update_us.min(stats.update_us);
        self.max_update_us = self.max_update_us.max(stats.update_us);

        if stats.update_us > duration_to_micros(TARGET_FRAME_TIME) {
            self.frames_over_budget += 1;
        }
        if stats.is_frozen() {
            self.frames_frozen += 1;
        }
    }

    /// Returns average update time in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_update_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.update_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Returns the fraction of frames with world time frozen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frozen_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_frozen as f64 / self.frames_recorded as f64
    }

    /// World time advanced per unit of real time over every recorded frame.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn effective_time_factor(&self) -> f64 {
        if self.real_us_sum == 0 {
            return 0.0;
        }
        self.world_us_sum as f64 / self.real_us_sum as f64
    }

    /// Logs a summary of the statistics.
    pub fn log_summary(&self) {
        info!(
            frames = self.frames_recorded,
            avg_update_ms = self.avg_update_ms(),
            min_update_us = self.min_update_us,
            max_update_us = self.max_update_us,
            over_budget = self.frames_over_budget,
            frozen = self.frames_frozen,
            time_factor = self.effective_time_factor(),
            "frame statistics"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
