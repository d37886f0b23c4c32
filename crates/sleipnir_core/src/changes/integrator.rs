//! Consumer side of the change ledger: applying a pulled batch.

use std::sync::Arc;

use crate::memory::HandleStrategy;

use super::{
    AddCollection, Changes, Combine, DeleteCollection, Instance, Memento, ModifyCollection,
};

/// An object that can absorb a memento field by field.
pub trait Combinable<M> {
    /// Adds every field set in `memento`.
    fn add_memento(&mut self, memento: &M);

    /// Multiplies by every field set in `memento`.
    fn multiply_memento(&mut self, memento: &M);

    /// Dispatches on `combine`.
    fn combine(&mut self, memento: &M, combine: Combine) {
        match combine {
            Combine::Add => self.add_memento(memento),
            Combine::Multiply => self.multiply_memento(memento),
        }
    }
}

/// A consumer-owned collection the integrator can mutate.
pub trait Collection<M: Memento> {
    /// Live object type.
    type Object: Combinable<M>;
    /// Why an Add was refused.
    type Error: std::fmt::Display;

    /// Creates an object from its initial memento.
    ///
    /// # Errors
    ///
    /// The handle is already present, or the memento cannot describe a
    /// valid object.
    fn spawn(&mut self, handle: M::Handle, memento: M) -> Result<(), Self::Error>;

    /// Looks up a live object.
    fn get_mut(&mut self, handle: M::Handle) -> Option<&mut Self::Object>;

    /// Removes an object. Returns `false` if it was not present.
    fn delete(&mut self, handle: M::Handle) -> bool;
}

/// What one [`Integrator::integrate`] call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationReport {
    /// Objects removed.
    pub deleted: usize,
    /// Deletes whose target was already gone.
    pub deletes_missed: usize,
    /// Objects created.
    pub spawned: usize,
    /// Adds refused by the collection.
    pub rejected: usize,
    /// Modifies applied.
    pub modified: usize,
    /// Modifies whose target was gone.
    pub modifies_missed: usize,
}

impl IntegrationReport {
    /// True if nothing was attempted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.deleted
            + self.deletes_missed
            + self.spawned
            + self.rejected
            + self.modified
            + self.modifies_missed
            == 0
    }
}

/// Applies pulled batches to a collection: Deletes, then Adds, then Modifies.
///
/// Deleting first lets a batch that both removes and re-creates a handle end
/// with the object present. Modifying last means a modify queued together
/// with its Add finds the object.
pub struct Integrator<M: Memento> {
    handles: Arc<dyn HandleStrategy<M::Handle>>,
    adds: AddCollection<M>,
    modifies: ModifyCollection<M>,
    deletes: DeleteCollection<M>,
}

impl<M: Memento> Integrator<M> {
    /// Creates an integrator returning deleted handles to `handles`.
    #[must_use]
    pub fn new(handles: Arc<dyn HandleStrategy<M::Handle>>) -> Self {
        Self {
            handles,
            adds: Vec::new(),
            modifies: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// Creates an integrator sharing the handle strategy of `ledger`.
    #[must_use]
    pub fn for_ledger(ledger: &Changes<M>) -> Self {
        Self::new(Arc::clone(ledger.handles()))
    }

    /// Drains `batch` into `collection`.
    ///
    /// Missing targets of Deletes and Modifies are skipped silently. A
    /// refused Add is logged, its handle is returned to the strategy, and in
    /// debug builds it panics.
    ///
    /// # Panics
    ///
    /// In debug builds, if the collection refuses an Add.
    pub fn integrate<C>(&mut self, collection: &mut C, batch: &mut Instance<M>) -> IntegrationReport
    where
        C: Collection<M>,
    {
        let mut report = IntegrationReport::default();
        if batch.is_empty() {
            return report;
        }
        batch.export(&mut self.adds, &mut self.modifies, &mut self.deletes);

        for handle in self.deletes.drain(..) {
            if collection.delete(handle) {
                self.handles.destroy(handle);
                report.deleted += 1;
            } else {
                tracing::trace!(?handle, "delete target already gone");
                report.deletes_missed += 1;
            }
        }

        for entry in self.adds.drain(..) {
            let handle = entry.handle;
            match collection.spawn(handle, entry.memento) {
                Ok(()) => report.spawned += 1,
                Err(error) => {
                    tracing::error!(?handle, %error, "collection refused add");
                    self.handles.destroy(handle);
                    report.rejected += 1;
                    if cfg!(debug_assertions) {
                        panic!("collection refused add for {handle:?}: {error}");
                    }
                }
            }
        }

        for entry in self.modifies.drain(..) {
            if let Some(object) = collection.get_mut(entry.handle) {
                object.combine(&entry.memento, entry.combine);
                report.modified += 1;
            } else {
                tracing::trace!(handle = ?entry.handle, "modify target gone");
                report.modifies_missed += 1;
            }
        }

        tracing::debug!(
            deleted = report.deleted,
            spawned = report.spawned,
            modified = report.modified,
            missed = report.deletes_missed + report.modifies_missed,
            "integrated change batch"
        );
        report
    }
}

impl<M: Memento> std::fmt::Debug for Integrator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator").finish_non_exhaustive()
    }
}
