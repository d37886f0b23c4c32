//! # Sleipnir Core
//!
//! The cross-thread synchronization core of the engine:
//!
//! - [`sync`]: QSBR reclaimer and lock-free snapshot publication
//! - [`changes`]: priority/time ordered change ledger and its integrator
//! - [`memory`]: generation-checked handles and handle-keyed storage
//! - [`ecs`]: the fixed-capacity world the game loop runs on
//!
//! ## Threading Rules
//!
//! 1. **Objects behind the ledger have one owner** - only the consumer thread
//!    integrates batches into them
//! 2. **Producers only write intents** - through [`Instance`]s, never directly
//! 3. **Readers only see snapshots** - through [`Published`], under a [`Section`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use sleipnir_core::{Changes, Integrator, SlotAllocator};
//!
//! let ledger = Changes::new(Arc::new(SlotAllocator::new()));
//! let mut batch = ledger.clone_instance(DEFAULT_PRIORITY);
//! let handle = batch.add(memento);
//! batch.push(now);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod changes;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod sync;

pub use changes::{
    AddCollection, AddEntry, Changes, Collection, Combinable, Combine, DeleteCollection,
    Instance, IntegrationReport, Integrator, Memento, ModifyCollection, ModifyEntry, Priority,
};
pub use ecs::{
    Component, ComponentStorage, Control, Entity, EntityId, Lifetime, PhysicsBody, Position, Timer,
    World,
};
pub use error::{CoreError, CoreResult};
pub use memory::{HandleStrategy, SlotAllocator, SlotHandle, SlotPool};
pub use sync::{Published, Qsbr, Section, SectionIndex};
