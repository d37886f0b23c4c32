//! Producer side of the change ledger.

use std::sync::Arc;
use std::time::Duration;

use super::{
    AddCollection, AddEntry, Batch, Changes, Combine, DeleteCollection, Memento, ModifyCollection,
    ModifyEntry, Priority,
};

/// A write batch: pending Adds, Modifies and Deletes plus a priority.
///
/// Owned by one producer at a time. Cloning copies the pending operations,
/// which is how one batch is fanned out. [`push`](Self::push),
/// [`export`](Self::export) and [`reset`](Self::reset) all leave it empty.
pub struct Instance<M: Memento> {
    ledger: Arc<Changes<M>>,
    priority: Priority,
    batch: Batch<M>,
}

impl<M: Memento> Instance<M> {
    pub(crate) fn new(ledger: Arc<Changes<M>>, priority: Priority) -> Self {
        Self {
            ledger,
            priority,
            batch: Batch::new(),
        }
    }

    /// Records the creation of a new object and returns its handle.
    ///
    /// The handle is valid at once; the object exists on the consumer side
    /// only after the batch has been pushed, pulled and integrated.
    pub fn add(&mut self, memento: M) -> M::Handle {
        let handle = self.ledger.handles().create();
        self.batch.adds.push(AddEntry { handle, memento });
        handle
    }

    /// Records a change to an existing object.
    ///
    /// Several modifies of one handle stay separate and apply in call order.
    pub fn modify(&mut self, handle: M::Handle, memento: M, combine: Combine) {
        self.batch.modifies.push(ModifyEntry {
            handle,
            memento,
            combine,
        });
    }

    /// Records the removal of an object.
    pub fn delete(&mut self, handle: M::Handle) {
        self.batch.deletes.push(handle);
    }

    /// Submits the batch to the ledger, due at `timestamp`, and clears it.
    ///
    /// An empty batch is not submitted.
    pub fn push(&mut self, timestamp: Duration) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::replace(&mut self.batch, Batch::new());
        self.ledger.submit(batch, self.priority, timestamp);
    }

    /// Moves the pending operations into the given buffers.
    ///
    /// The buffers are cleared first and handed back to this instance as its
    /// new (empty) storage, so repeated exports reuse allocations.
    pub fn export(
        &mut self,
        adds: &mut AddCollection<M>,
        modifies: &mut ModifyCollection<M>,
        deletes: &mut DeleteCollection<M>,
    ) {
        adds.clear();
        modifies.clear();
        deletes.clear();
        std::mem::swap(adds, &mut self.batch.adds);
        std::mem::swap(modifies, &mut self.batch.modifies);
        std::mem::swap(deletes, &mut self.batch.deletes);
    }

    /// Drops every pending operation.
    ///
    /// Handles minted by [`add`](Self::add) are not returned to the strategy.
    pub fn reset(&mut self) {
        self.batch.clear();
    }

    /// True if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Total number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    /// Priority used when this batch is pushed.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Changes the priority used for future pushes.
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Pending Adds.
    #[must_use]
    pub fn adds(&self) -> &[AddEntry<M>] {
        &self.batch.adds
    }

    /// Pending Modifies.
    #[must_use]
    pub fn modifies(&self) -> &[ModifyEntry<M>] {
        &self.batch.modifies
    }

    /// Pending Deletes.
    #[must_use]
    pub fn deletes(&self) -> &[M::Handle] {
        &self.batch.deletes
    }

    /// The ledger this batch pushes into.
    #[must_use]
    pub fn ledger(&self) -> &Arc<Changes<M>> {
        &self.ledger
    }

    pub(crate) fn append_batch(&mut self, batch: &mut Batch<M>) {
        self.batch.append(batch);
    }
}

impl<M: Memento> Clone for Instance<M> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            priority: self.priority,
            batch: self.batch.clone(),
        }
    }
}

impl<M: Memento> std::fmt::Debug for Instance<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("priority", &self.priority)
            .field("adds", &self.batch.adds.len())
            .field("modifies", &self.batch.modifies.len())
            .field("deletes", &self.batch.deletes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{ledger, TestMemento};
    use super::*;
    use crate::memory::HandleStrategy;

    fn position(x: i64, y: i64, z: i64) -> TestMemento {
        TestMemento {
            position: Some([x, y, z]),
            mass: None,
        }
    }

    #[test]
    fn test_each_operation_makes_instance_non_empty() {
        let changes = ledger();

        let mut added = changes.clone_instance(0);
        assert!(added.is_empty());
        let handle = added.add(position(0, 1, 0));
        assert!(!added.is_empty());
        assert_eq!(added.adds()[0].handle, handle);

        let mut modified = changes.clone_instance(0);
        modified.modify(handle, position(1, 1, 1), Combine::Add);
        assert!(!modified.is_empty());

        let mut deleted = changes.clone_instance(0);
        deleted.delete(handle);
        assert!(!deleted.is_empty());
        assert_eq!(deleted.len(), 1);
    }

    #[test]
    fn test_push_export_reset_empty_the_instance() {
        let changes = ledger();

        let mut pushed = changes.clone_instance(0);
        pushed.add(position(0, 0, 0));
        pushed.push(Duration::ZERO);
        assert!(pushed.is_empty());
        assert_eq!(changes.pending_batches(), 1);

        let mut exported = changes.clone_instance(0);
        let handle = exported.add(position(0, 0, 0));
        exported.modify(handle, position(1, 0, 0), Combine::Multiply);
        exported.delete(handle);
        let (mut adds, mut modifies, mut deletes) = (Vec::new(), Vec::new(), Vec::new());
        exported.export(&mut adds, &mut modifies, &mut deletes);
        assert!(exported.is_empty());
        assert_eq!(adds.len(), 1);
        assert_eq!(modifies[0].combine, Combine::Multiply);
        assert_eq!(deletes, vec![handle]);

        let mut reset = changes.clone_instance(0);
        reset.delete(handle);
        reset.reset();
        assert!(reset.is_empty());
    }

    #[test]
    fn test_export_clears_target_buffers() {
        let changes = ledger();
        let mut batch = changes.clone_instance(0);
        let stale = batch.add(position(9, 9, 9));
        let (mut adds, mut modifies, mut deletes) = (Vec::new(), Vec::new(), vec![stale]);
        batch.export(&mut adds, &mut modifies, &mut deletes);

        assert_eq!(adds.len(), 1);
        assert!(deletes.is_empty());
    }

    #[test]
    fn test_empty_push_is_skipped() {
        let changes = ledger();
        let mut batch = changes.clone_instance(0);
        batch.push(Duration::ZERO);
        assert_eq!(changes.pending_batches(), 0);
    }

    #[test]
    fn test_clone_copies_pending_operations() {
        let changes = ledger();
        let mut original = changes.clone_instance(42);
        let handle = original.add(position(0, 1, 0));
        original.modify(handle, position(-1, -1, -1), Combine::Add);

        let copy = original.clone();
        assert_eq!(copy.priority(), 42);
        assert_eq!(copy.adds(), original.adds());
        assert_eq!(copy.modifies(), original.modifies());

        original.reset();
        assert!(original.is_empty());
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn test_moved_instance_keeps_operations() {
        let changes = ledger();
        let mut original = changes.clone_instance(0);
        original.add(position(0, 0, 0));

        let mut moved = original;
        assert_eq!(moved.len(), 1);
        moved.push(Duration::ZERO);
        assert_eq!(changes.pending_batches(), 1);
    }

    #[test]
    fn test_modifies_for_one_handle_stay_sequential() {
        let changes = ledger();
        let mut batch = changes.clone_instance(0);
        let handle = changes.handles().create();
        batch.modify(handle, position(1, 0, 0), Combine::Add);
        batch.modify(handle, position(2, 0, 0), Combine::Multiply);

        let modifies = batch.modifies();
        assert_eq!(modifies.len(), 2);
        assert_eq!(modifies[0].memento.position, Some([1, 0, 0]));
        assert_eq!(modifies[1].combine, Combine::Multiply);
    }
}
