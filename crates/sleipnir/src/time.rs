//! # World Time
//!
//! World time is the clock gameplay and physics agree on. The game thread
//! advances it once per frame through a [`TimeSystem`]; the physics thread
//! only reads it.
//!
//! ```text
//! real frame time ──► TimeSystem::update ──► WorldTime::advance
//!                            │
//!                            └─ TimeWithPhysics: returns zero while physics
//!                               lags more than one tick behind
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::physics::PhysicsClock;

/// Whole microseconds in `duration`, saturating.
#[inline]
#[must_use]
pub fn duration_to_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Shared world clock, in microseconds.
#[derive(Debug, Default)]
pub struct WorldTime {
    micros: AtomicU64,
}

impl WorldTime {
    /// A clock starting at `start`.
    #[must_use]
    pub fn new(start: Duration) -> Self {
        Self {
            micros: AtomicU64::new(duration_to_micros(start)),
        }
    }

    /// Current world time.
    #[inline]
    #[must_use]
    pub fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Acquire))
    }

    /// Overwrites the world time.
    #[inline]
    pub fn set(&self, time: Duration) {
        self.micros.store(duration_to_micros(time), Ordering::Release);
    }

    /// Moves the world time forward and returns the new value.
    pub fn advance(&self, by: Duration) -> Duration {
        let step = duration_to_micros(by);
        let previous = self.micros.fetch_add(step, Ordering::AcqRel);
        Duration::from_micros(previous.saturating_add(step))
    }
}

/// Turns real frame time into world time.
pub trait TimeSystem: Send {
    /// Advances world time for a frame that took `real` and returns how much
    /// world time passed.
    fn update(&mut self, real: Duration) -> Duration;

    /// World seconds per real second.
    fn factor(&self) -> f32;

    /// Changes the time factor.
    fn set_factor(&mut self, factor: f32);

    /// The clock this system advances.
    fn world_time(&self) -> &Arc<WorldTime>;
}

/// Scales real time by a constant factor.
#[derive(Debug, Clone)]
pub struct TimeBase {
    world_time: Arc<WorldTime>,
    factor: f32,
}

impl TimeBase {
    /// Advances `world_time` at real-time speed.
    #[must_use]
    pub fn new(world_time: Arc<WorldTime>) -> Self {
        Self {
            world_time,
            factor: 1.0,
        }
    }

    /// Advances `world_time` at `factor` times real-time speed.
    ///
    /// # Panics
    ///
    /// Panics unless `factor` is finite and positive.
    #[must_use]
    pub fn with_factor(world_time: Arc<WorldTime>, factor: f32) -> Self {
        let mut time = Self::new(world_time);
        time.set_factor(factor);
        time
    }

    /// World time that passes during `real`, rounded to whole microseconds.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn scale(&self, real: Duration) -> Duration {
        let micros = duration_to_micros(real) as f64 * f64::from(self.factor);
        Duration::from_micros(micros.round() as u64)
    }
}

impl TimeSystem for TimeBase {
    fn update(&mut self, real: Duration) -> Duration {
        let world = self.scale(real);
        self.world_time.advance(world);
        world
    }

    fn factor(&self) -> f32 {
        self.factor
    }

    fn set_factor(&mut self, factor: f32) {
        assert!(
            factor.is_finite() && factor > 0.0,
            "time factor must be positive, got {factor}"
        );
        self.factor = factor;
    }

    fn world_time(&self) -> &Arc<WorldTime> {
        &self.world_time
    }
}

/// [`TimeBase`] that stops the clock while physics falls behind.
///
/// When world time leads physics time by more than one tick the frame
/// advances no world time at all, giving the physics thread room to catch up.
#[derive(Debug, Clone)]
pub struct TimeWithPhysics {
    base: TimeBase,
    physics: PhysicsClock,
    tick: Duration,
}

impl TimeWithPhysics {
    /// Throttles `base` against `physics`, allowing `tick` of lag.
    #[must_use]
    pub fn new(base: TimeBase, physics: PhysicsClock, tick: Duration) -> Self {
        Self {
            base,
            physics,
            tick,
        }
    }

    /// How far physics trails world time.
    #[must_use]
    pub fn lag(&self) -> Duration {
        self.base.world_time.now().saturating_sub(self.physics.now())
    }
}

impl TimeSystem for TimeWithPhysics {
    fn update(&mut self, real: Duration) -> Duration {
        let lag = self.lag();
        if lag > self.tick {
            warn!(
                lag_us = duration_to_micros(lag),
                tick_us = duration_to_micros(self.tick),
                "physics is lagging, world time frozen"
            );
            return Duration::ZERO;
        }
        self.base.update(real)
    }

    fn factor(&self) -> f32 {
        self.base.factor()
    }

    fn set_factor(&mut self, factor: f32) {
        self.base.set_factor(factor);
    }

    fn world_time(&self) -> &Arc<WorldTime> {
        self.base.world_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_time_advance() {
        let time = WorldTime::new(Duration::from_millis(1));
        assert_eq!(time.advance(Duration::from_millis(2)), Duration::from_millis(3));
        assert_eq!(time.now(), Duration::from_millis(3));
        time.set(Duration::ZERO);
        assert_eq!(time.now(), Duration::ZERO);
    }

    #[test]
    fn test_time_base_scales_and_rounds() {
        let world = Arc::new(WorldTime::default());
        let mut time = TimeBase::with_factor(Arc::clone(&world), 0.5);

        assert_eq!(time.update(Duration::from_micros(3)), Duration::from_micros(2));
        assert_eq!(time.update(Duration::from_millis(10)), Duration::from_millis(5));
        assert_eq!(world.now(), Duration::from_micros(5_002));
    }

    #[test]
    fn test_time_base_default_factor() {
        let world = Arc::new(WorldTime::default());
        let mut time = TimeBase::new(Arc::clone(&world));
        time.update(Duration::from_millis(16));
        assert_eq!(world.now(), Duration::from_millis(16));
        assert_eq!(time.factor(), 1.0);
    }

    #[test]
    #[should_panic(expected = "time factor must be positive")]
    fn test_time_base_rejects_zero_factor() {
        let _ = TimeBase::with_factor(Arc::new(WorldTime::default()), 0.0);
    }

    #[test]
    fn test_micros_saturate() {
        assert_eq!(duration_to_micros(Duration::MAX), u64::MAX);
        assert_eq!(duration_to_micros(Duration::from_nanos(1_999)), 1);
    }
}
