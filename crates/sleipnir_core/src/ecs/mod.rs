//! # Entity Component System
//!
//! The game thread's view of the scene.
//!
//! - Storage is pre-allocated at world creation
//! - Entity IDs carry generations, so stale IDs never alias new entities
//! - Each component type has one dense storage; presence is a bitmask

mod component;
mod entity;
mod storage;
mod world;

pub use component::{Component, Control, Lifetime, PhysicsBody, Position, Timer};
pub use entity::{Entity, EntityId};
pub use storage::ComponentStorage;
pub use world::World;
