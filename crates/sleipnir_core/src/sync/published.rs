//! # Published Snapshot
//!
//! A single-writer, many-reader cell holding the latest immutable value.
//!
//! ## Safety Note
//!
//! Readers get a plain `&T` from an atomic pointer load, without any lock or
//! reference count. The previous value is only freed through the owning
//! [`Qsbr`], two intervals after it was replaced.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use super::qsbr::{Qsbr, Section};

/// Latest-value cell with QSBR-deferred reclamation.
///
/// ```text
///  writer                               readers
///  publish(v2) ──swap(AcqRel)──▶ ptr ◀──load(Acquire)── load(&section)
///       │
///       └─▶ qsbr.add_callback(free v1)
/// ```
///
/// The pointer is never null.
pub struct Published<T> {
    current: AtomicPtr<T>,
    reclaimer: Arc<Qsbr>,
    _owns: PhantomData<T>,
}

impl<T: Send + Sync + 'static> Published<T> {
    /// Creates a cell holding `initial`.
    #[must_use]
    pub fn new(reclaimer: Arc<Qsbr>, initial: T) -> Self {
        Self {
            current: AtomicPtr::new(Box::into_raw(Box::new(initial))),
            reclaimer,
            _owns: PhantomData,
        }
    }

    /// Replaces the current value. The old one is dropped once every section
    /// of the reclaimer has passed two quiescent intervals.
    pub fn publish(&self, value: T) {
        let fresh = Box::into_raw(Box::new(value));
        let old = self.current.swap(fresh, Ordering::AcqRel);
        // SAFETY: `old` came from `Box::into_raw` in `new` or a previous
        // `publish`, and the swap removed the only owning pointer to it.
        let retired = Retired(unsafe { NonNull::new_unchecked(old) });
        self.reclaimer.add_callback(move || drop(retired));
    }

    /// Reads the current value.
    ///
    /// The reference cannot outlive the borrow of `section`, and the section
    /// cannot report quiescence while borrowed.
    ///
    /// ```compile_fail
    /// # use std::sync::Arc;
    /// # use sleipnir_core::{Published, Qsbr, Section};
    /// let qsbr = Arc::new(Qsbr::new());
    /// let mut section = Section::register(&qsbr);
    /// let cell = Published::new(Arc::clone(&qsbr), 1_u32);
    /// let held = cell.load(&section);
    /// section.quiescent();
    /// assert_eq!(*held, 1);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `section` belongs to another reclaimer.
    #[inline]
    #[must_use]
    pub fn load<'a>(&'a self, section: &'a Section) -> &'a T {
        assert!(
            Arc::ptr_eq(section.reclaimer(), &self.reclaimer),
            "section registered with a different reclaimer"
        );
        let ptr = self.current.load(Ordering::Acquire);
        // SAFETY: the pointer is never null and the pointee is only freed by
        // a callback queued on `self.reclaimer` after it was swapped out.
        // `section` is registered on that reclaimer (checked above), and the
        // only way to report it quiescent is `Section::quiescent(&mut self)`
        // or dropping it, both of which end this borrow first.
        unsafe { &*ptr }
    }

    /// The reclaimer guarding this cell.
    #[must_use]
    pub fn reclaimer(&self) -> &Arc<Qsbr> {
        &self.reclaimer
    }
}

impl<T> Drop for Published<T> {
    fn drop(&mut self) {
        let ptr = *self.current.get_mut();
        // SAFETY: `&mut self` proves no reader borrow is alive, and the
        // current pointer is owned by this cell alone.
        drop(unsafe { Box::from_raw(ptr) });
    }
}

impl<T> std::fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Published")
            .field("current", &self.current.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// An unlinked value waiting for its QSBR callback.
struct Retired<T>(NonNull<T>);

// SAFETY: the retired value is owned exclusively by the callback that drops
// it; moving it to another thread is moving a `Box<T>`.
unsafe impl<T: Send> Send for Retired<T> {}

impl<T> Drop for Retired<T> {
    fn drop(&mut self) {
        // SAFETY: created from `Box::into_raw` and dropped exactly once.
        drop(unsafe { Box::from_raw(self.0.as_ptr()) });
    }
}
