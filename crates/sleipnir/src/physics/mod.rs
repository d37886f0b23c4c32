//! # Physics
//!
//! A dedicated worker thread owns every body. The game thread talks to it
//! through two channels only:
//!
//! ```text
//!  game thread                                 physics thread
//!  ───────────                                 ──────────────
//!  Instance::add/modify/delete
//!  Instance::push(world time) ──► BodyChanges ──► Engine::integrate(next tick)
//!
//!  Physics::sync_positions    ◄── Published<BodyPositions> ◄── publish per tick
//!  Section::quiescent          ──► Qsbr ◄──                     Section::quiescent
//! ```

mod backend;
mod body;
mod engine;
mod system;
mod thread;

pub use backend::{KinematicBackend, PhysicsBackend, TERMINAL_VELOCITY};
pub use body::{
    AngularMotion, BodyChanges, BodyCollection, BodyHandle, BodyMemento, BodyObject,
    BodyPositions, LinearMotion, Shape,
};
pub use engine::Engine;
pub use system::{ControlPass, Physics};
pub use thread::{PhysicsClock, PhysicsThread, ThreadState, WORKER_THREAD_NAME};
