//! # Sleipnir Shared
//!
//! Common types used by both the game loop and the physics worker.
//!
//! ## Contents
//!
//! - [`constants`]: tick length, default ledger priority, capacities
//! - [`math`]: `Vec3` and `Quaternion`
//! - [`config`]: TOML-backed [`EngineConfig`]

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod math;

pub use config::{ConfigError, EngineConfig};
pub use constants::{DEFAULT_PRIORITY, ENTITY_CAPACITY, MAX_PHYSICS_OBJECTS, PHYSICS_TICK};
pub use math::{Quaternion, Vec3};
