//! # Sleipnir
//!
//! An ECS game loop with a dedicated physics thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              SLEIPNIR                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────────┐   BodyChanges    ┌──────────────────────┐     │
//! │  │   GAME THREAD        │ ───────────────> │   PHYSICS THREAD     │     │
//! │  │                      │                  │                      │     │
//! │  │  • World (ECS)       │  BodyPositions   │  • Engine            │     │
//! │  │  • Systems           │ <─────────────── │  • Backend           │     │
//! │  │  • TimeWithPhysics   │   (QSBR cell)    │  • Integrator        │     │
//! │  └──────────────────────┘                  └──────────────────────┘     │
//! │             │                                         ▲                 │
//! │             └──────────── WorldTime (atomic) ─────────┘                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `physics`: bodies, backends, the worker thread and its game-side system
//! - `time`: world time and lag throttling
//! - `systems`: priority scheduler and entity expiry
//! - `game_loop`: frame orchestration and timing

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod game_loop;
pub mod physics;
pub mod systems;
pub mod time;

pub use sleipnir_core as core;
pub use sleipnir_shared as shared;

pub use error::{PhysicsError, PhysicsResult};
pub use game_loop::{FrameStats, FrameStatsAccumulator, GameLoop};
pub use physics::{
    BodyChanges, BodyHandle, BodyMemento, BodyPositions, Engine, KinematicBackend, Physics,
    PhysicsBackend, PhysicsClock, PhysicsThread, Shape, ThreadState,
};
pub use systems::{
    DefaultPriority, LifetimeSystem, Reclaimer, System, SystemId, Systems, TimerHook, TimerSystem,
};
pub use time::{TimeBase, TimeSystem, TimeWithPhysics, WorldTime};
