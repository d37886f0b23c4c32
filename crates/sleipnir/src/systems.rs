//! # System Scheduler
//!
//! Systems run once per frame in ascending priority, after the time system
//! has advanced world time. Equal priorities run in insertion order.
//!
//! ```text
//! run_once(real)
//!   ├─ time.update(real)          -> world duration
//!   ├─ Input     (0x1000)
//!   ├─ Lifetime  (0x2000)
//!   ├─ Timer     (0x3000)
//!   ├─ Physics   (0x4000)
//!   └─ Render    (0x5000)
//! ```

use std::sync::Arc;
use std::time::Duration;

use sleipnir_core::{Component, EntityId, Lifetime, Timer, World};
use tracing::{debug, trace};

use crate::time::{duration_to_micros, TimeSystem, WorldTime};

/// A per-frame unit of game logic.
pub trait System {
    /// Runs one frame.
    fn update(&mut self, world: &mut World);

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Built-in scheduling slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum DefaultPriority {
    /// World time. Always first.
    Time = 0x0000,
    /// Input handling.
    Input = 0x1000,
    /// Entity expiry.
    Lifetime = 0x2000,
    /// Timers.
    Timer = 0x3000,
    /// Physics control and position sync.
    Physics = 0x4000,
    /// Rendering.
    Render = 0x5000,
}

impl From<DefaultPriority> for u16 {
    fn from(priority: DefaultPriority) -> Self {
        priority as Self
    }
}

/// Identifies a scheduled system for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SystemId(u64);

struct Entry {
    id: SystemId,
    priority: u16,
    system: Box<dyn System>,
}

/// Ordered set of systems plus the time system that drives them.
pub struct Systems {
    time: Box<dyn TimeSystem>,
    entries: Vec<Entry>,
    next_id: u64,
}

impl Systems {
    /// Creates an empty scheduler driven by `time`.
    #[must_use]
    pub fn new(time: Box<dyn TimeSystem>) -> Self {
        Self {
            time,
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedules `system` at `priority`.
    pub fn add<S: System + 'static>(&mut self, system: S, priority: impl Into<u16>) -> SystemId {
        self.add_boxed(Box::new(system), priority.into())
    }

    /// Schedules an already boxed system.
    pub fn add_boxed(&mut self, system: Box<dyn System>, priority: u16) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        let at = self
            .entries
            .partition_point(|entry| entry.priority <= priority);
        debug!(name = system.name(), priority, "system added");
        self.entries.insert(
            at,
            Entry {
                id,
                priority,
                system,
            },
        );
        id
    }

    /// Unschedules a system and hands it back.
    pub fn remove(&mut self, id: SystemId) -> Option<Box<dyn System>> {
        let at = self.entries.iter().position(|entry| entry.id == id)?;
        Some(self.entries.remove(at).system)
    }

    /// Replaces the time system, returning the previous one.
    pub fn set_time_system(&mut self, time: Box<dyn TimeSystem>) -> Box<dyn TimeSystem> {
        std::mem::replace(&mut self.time, time)
    }

    /// The time system.
    #[must_use]
    pub fn time_system(&self) -> &dyn TimeSystem {
        self.time.as_ref()
    }

    /// The time system, mutably.
    pub fn time_system_mut(&mut self) -> &mut dyn TimeSystem {
        self.time.as_mut()
    }

    /// Advances time for a frame of `real` duration, then runs every system.
    ///
    /// Returns the world time that passed.
    pub fn run_once(&mut self, world: &mut World, real: Duration) -> Duration {
        let elapsed = self.time.update(real);
        for entry in &mut self.entries {
            entry.system.update(world);
        }
        elapsed
    }

    /// Number of scheduled systems, excluding the time system.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when only the time system is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every scheduled system in reverse priority order.
    pub fn clear(&mut self) {
        while self.entries.pop().is_some() {}
    }
}

impl std::fmt::Debug for Systems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|entry| (entry.priority, entry.system.name())),
            )
            .finish()
    }
}

/// Called for each entity about to expire, before it is despawned.
pub type Reclaimer = Box<dyn FnMut(&World, EntityId)>;

/// Despawns entities whose [`Lifetime`] deadline has passed.
pub struct LifetimeSystem {
    world_time: Arc<WorldTime>,
    reclaimer: Option<Reclaimer>,
    expired: Vec<EntityId>,
}

impl LifetimeSystem {
    /// Expires entities against `world_time`.
    #[must_use]
    pub fn new(world_time: Arc<WorldTime>) -> Self {
        Self {
            world_time,
            reclaimer: None,
            expired: Vec::new(),
        }
    }

    /// Runs `reclaimer` on each expiring entity before despawn.
    #[must_use]
    pub fn with_reclaimer(mut self, reclaimer: impl FnMut(&World, EntityId) + 'static) -> Self {
        self.reclaimer = Some(Box::new(reclaimer));
        self
    }
}

impl System for LifetimeSystem {
    fn update(&mut self, world: &mut World) {
        let now = duration_to_micros(self.world_time.now());
        self.expired.clear();
        self.expired.extend(world.query(Lifetime::MASK).into_iter().filter(|&id| {
            world
                .get::<Lifetime>(id)
                .is_some_and(|lifetime| lifetime.deadline_micros <= now)
        }));

        for &id in &self.expired {
            if let Some(reclaim) = self.reclaimer.as_mut() {
                reclaim(world, id);
            }
            world.despawn(id);
        }
        if !self.expired.is_empty() {
            debug!(expired = self.expired.len(), now_us = now, "entities expired");
        }
    }

    fn name(&self) -> &'static str {
        "lifetime"
    }
}

impl std::fmt::Debug for LifetimeSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeSystem")
            .field("world_time", &self.world_time.now())
            .field("reclaimer", &self.reclaimer.is_some())
            .finish_non_exhaustive()
    }
}

/// Called with the entity whose timer ticked or timed out.
pub type TimerHook = Box<dyn FnMut(&mut World, EntityId)>;

/// Drives every [`Timer`] component against world time.
///
/// A timer fires one tick per elapsed period and catches up on several in a
/// single frame. Catch-up stops as soon as the next tick would reach the end.
/// Once world time reaches the end the timeout fires and the component is
/// removed.
pub struct TimerSystem {
    world_time: Arc<WorldTime>,
    on_tick: Option<TimerHook>,
    on_timeout: Option<TimerHook>,
    active: Vec<EntityId>,
}

impl TimerSystem {
    /// Drives timers against `world_time`.
    #[must_use]
    pub fn new(world_time: Arc<WorldTime>) -> Self {
        Self {
            world_time,
            on_tick: None,
            on_timeout: None,
            active: Vec::new(),
        }
    }

    /// Runs `hook` on every tick.
    #[must_use]
    pub fn on_tick(mut self, hook: impl FnMut(&mut World, EntityId) + 'static) -> Self {
        self.on_tick = Some(Box::new(hook));
        self
    }

    /// Runs `hook` once when a timer ends.
    #[must_use]
    pub fn on_timeout(mut self, hook: impl FnMut(&mut World, EntityId) + 'static) -> Self {
        self.on_timeout = Some(Box::new(hook));
        self
    }
}

impl System for TimerSystem {
    fn update(&mut self, world: &mut World) {
        let now = duration_to_micros(self.world_time.now());
        self.active.clear();
        self.active.extend(world.query(Timer::MASK));

        let mut ticks = 0_usize;
        let mut timeouts = 0_usize;
        for &id in &self.active {
            let Some(&start) = world.get::<Timer>(id) else {
                continue;
            };
            let mut timer = start;
            // A zero period would never advance.
            if timer.tick_micros > 0 {
                while now >= timer.last_micros.saturating_add(timer.tick_micros) {
                    if let Some(hook) = self.on_tick.as_mut() {
                        hook(world, id);
                    }
                    ticks += 1;
                    timer.last_micros += timer.tick_micros;
                    if timer.last_micros.saturating_add(timer.tick_micros) >= timer.end_micros {
                        break;
                    }
                }
            }

            if now >= timer.end_micros {
                if let Some(hook) = self.on_timeout.as_mut() {
                    hook(world, id);
                }
                world.remove::<Timer>(id);
                timeouts += 1;
            } else if let Some(stored) = world.get_mut::<Timer>(id) {
                stored.last_micros = timer.last_micros;
            }
        }
        if ticks + timeouts > 0 {
            trace!(ticks, timeouts, now_us = now, "timers fired");
        }
    }

    fn name(&self) -> &'static str {
        "timer"
    }
}

impl std::fmt::Debug for TimerSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSystem")
            .field("world_time", &self.world_time.now())
            .field("on_tick", &self.on_tick.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .finish_non_exhaustive()
    }
}
