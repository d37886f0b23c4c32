//! # Change Ledger
//!
//! Lets any number of producer threads queue Add/Modify/Delete intents
//! against a collection owned by one consumer thread.
//!
//! ```text
//!  game thread(s)                        physics thread
//!  ─────────────                         ──────────────
//!  let mut batch = ledger.clone_instance(p);
//!  batch.add(..) / modify(..) / delete(..)
//!  batch.push(now) ──▶ [ (t, p, seq) → batch ]  (mutex)
//!                                  │
//!                         ledger.pull(tick) ──▶ merged Instance
//!                                                    │
//!                               integrator.integrate(&mut bodies, &mut merged)
//! ```
//!
//! Submitted batches are ordered by timestamp, then priority (lower first),
//! then submission order. Within one batch, operations keep call order.

mod instance;
mod integrator;
mod ledger;

#[cfg(test)]
pub(crate) mod test_utils;

use std::fmt::Debug;
use std::hash::Hash;

pub use instance::Instance;
pub use integrator::{Collection, Combinable, IntegrationReport, Integrator};
pub use ledger::Changes;

/// Ordering key for submitted batches. Lower runs first.
pub type Priority = u16;

/// A sparse description of an object's state or of a change to it.
pub trait Memento: Clone + Send + 'static {
    /// Identity of the object the memento applies to.
    type Handle: Copy + Eq + Hash + Debug + Send + Sync + 'static;
}

/// How a Modify combines its memento with the live object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Combine {
    /// Field-wise addition.
    #[default]
    Add,
    /// Field-wise multiplication.
    Multiply,
}

/// A queued Add.
#[derive(Clone, Debug, PartialEq)]
pub struct AddEntry<M: Memento> {
    /// Handle minted for the new object.
    pub handle: M::Handle,
    /// Full initial state.
    pub memento: M,
}

/// A queued Modify.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifyEntry<M: Memento> {
    /// Target object.
    pub handle: M::Handle,
    /// Delta to combine.
    pub memento: M,
    /// Combinator.
    pub combine: Combine,
}

/// Queued Adds, in call order.
pub type AddCollection<M> = Vec<AddEntry<M>>;
/// Queued Modifies, in call order.
pub type ModifyCollection<M> = Vec<ModifyEntry<M>>;
/// Queued Deletes, in call order.
pub type DeleteCollection<M> = Vec<<M as Memento>::Handle>;

/// The three operation buffers of one write batch.
#[derive(Clone, Debug)]
pub(crate) struct Batch<M: Memento> {
    pub(crate) adds: AddCollection<M>,
    pub(crate) modifies: ModifyCollection<M>,
    pub(crate) deletes: DeleteCollection<M>,
}

impl<M: Memento> Batch<M> {
    pub(crate) const fn new() -> Self {
        Self {
            adds: Vec::new(),
            modifies: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.modifies.is_empty() && self.deletes.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.adds.len() + self.modifies.len() + self.deletes.len()
    }

    /// Moves every entry of `other` to the end of `self`.
    pub(crate) fn append(&mut self, other: &mut Self) {
        self.adds.append(&mut other.adds);
        self.modifies.append(&mut other.modifies);
        self.deletes.append(&mut other.deletes);
    }

    pub(crate) fn clear(&mut self) {
        self.adds.clear();
        self.modifies.clear();
        self.deletes.clear();
    }
}
