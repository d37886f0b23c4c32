//! # Engine Constants
//!
//! Compile-time defaults. Everything here can be overridden at startup through
//! [`EngineConfig`](crate::EngineConfig) except where noted.

use std::time::Duration;

// =============================================================================
// PHYSICS
// =============================================================================

/// Fixed physics step, in microseconds.
pub const PHYSICS_TICK_MICROS: u64 = 4_000;

/// Fixed physics step.
pub const PHYSICS_TICK: Duration = Duration::from_micros(PHYSICS_TICK_MICROS);

/// Expected upper bound on simultaneously live bodies.
///
/// Used to pre-size the body collection and position snapshots.
pub const MAX_PHYSICS_OBJECTS: usize = 1024;

/// Default gravity, in metres per second squared.
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

// =============================================================================
// CHANGE LEDGER
// =============================================================================

/// Priority handed to write batches when the caller does not pick one.
///
/// Mid-range so built-in systems can sort before or after user batches.
pub const DEFAULT_PRIORITY: u16 = 0x8000;

// =============================================================================
// WORLD
// =============================================================================

/// Default entity capacity of the ECS world.
pub const ENTITY_CAPACITY: usize = 1024;

/// Default ratio of world time to real time.
pub const DEFAULT_TIME_FACTOR: f32 = 1.0;
