//! # Quiescent-State-Based Reclamation
//!
//! Defers destructive cleanup until every registered reader section has
//! passed through a quiescent point since the cleanup was queued.
//!
//! ## Intervals
//!
//! ```text
//!   interval k-1          interval k             interval k+1
//! ───────────────────┬──────────────────────┬─────────────────────
//!  add_callback(f) ──┤ all sections report  │ all sections report
//!  f in `current`    │ f moves to `previous`│ f runs
//! ```
//!
//! A callback waits for two complete intervals. A reader that loaded a
//! pointer just before the callback was queued may already have reported
//! quiescence for the interval the callback landed in; only the *next* full
//! interval proves it has let go.
//!
//! Callbacks always run after the internal lock is released, so they may
//! freely queue more callbacks or register sections.

use std::sync::Arc;

use parking_lot::Mutex;

/// Identifier of a registered reader section.
pub type SectionIndex = usize;

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Per-section bookkeeping. Freed slots form an intrusive list via `next_free`.
#[derive(Debug, Default)]
struct SectionSlot {
    active: bool,
    quiescent: bool,
    next_free: Option<SectionIndex>,
}

#[derive(Default)]
struct QsbrState {
    sections: Vec<SectionSlot>,
    free_head: Option<SectionIndex>,
    /// Number of active sections.
    section_count: usize,
    /// Active sections that have not reported in the current interval.
    remaining: usize,
    previous: Vec<Callback>,
    current: Vec<Callback>,
}

impl QsbrState {
    fn slot_mut(&mut self, index: SectionIndex) -> Option<&mut SectionSlot> {
        self.sections.get_mut(index).filter(|slot| slot.active)
    }

    /// Ends the current interval: hands back the callbacks that are now safe
    /// to run and opens a fresh interval.
    fn complete_interval(&mut self) -> Vec<Callback> {
        let ready = std::mem::take(&mut self.previous);
        self.previous = std::mem::take(&mut self.current);
        for slot in &mut self.sections {
            slot.quiescent = false;
        }
        self.remaining = self.section_count;
        ready
    }

    fn count_down(&mut self) -> Vec<Callback> {
        debug_assert!(self.remaining > 0, "quiescent countdown underflow");
        self.remaining -= 1;
        if self.remaining == 0 {
            self.complete_interval()
        } else {
            Vec::new()
        }
    }
}

/// QSBR reclaimer.
///
/// Shared between threads behind an [`Arc`]. Sections are only registered,
/// reported and forgotten through [`Section`], whose `quiescent` takes
/// `&mut self`.
///
/// ## Usage
///
/// ```rust,ignore
/// let qsbr = Arc::new(Qsbr::new());
/// let mut reader = Section::register(&qsbr);
///
/// qsbr.add_callback(move || drop(old_snapshot));
///
/// reader.quiescent(); // interval 1 complete, callback now "previous"
/// reader.quiescent(); // interval 2 complete, callback runs
/// ```
pub struct Qsbr {
    state: Mutex<QsbrState>,
}

impl Qsbr {
    /// Creates a reclaimer with no sections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QsbrState::default()),
        }
    }

    /// Registers a new reader section, reusing a freed slot when possible.
    ///
    /// The new section counts as non-quiescent for the interval in progress.
    pub(crate) fn register_section(&self) -> SectionIndex {
        let mut state = self.state.lock();
        let index = if let Some(index) = state.free_head {
            state.free_head = state.sections[index].next_free.take();
            index
        } else {
            state.sections.push(SectionSlot::default());
            state.sections.len() - 1
        };

        let slot = &mut state.sections[index];
        slot.active = true;
        slot.quiescent = false;
        state.section_count += 1;
        state.remaining += 1;

        tracing::trace!(section = index, count = state.section_count, "qsbr section registered");
        index
    }

    /// Stops tracking a section.
    ///
    /// If the section still owed a report for the current interval, leaving
    /// counts as that report and may complete the interval.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `index` is not an active section.
    pub(crate) fn forget_section(&self, index: SectionIndex) {
        let ready = {
            let mut state = self.state.lock();
            let free_head = state.free_head;
            let Some(slot) = state.slot_mut(index) else {
                Self::report_unknown_section("forget_section", index);
                return;
            };
            let was_quiescent = slot.quiescent;
            slot.active = false;
            slot.quiescent = false;
            slot.next_free = free_head;
            state.free_head = Some(index);
            state.section_count -= 1;

            tracing::trace!(section = index, count = state.section_count, "qsbr section forgotten");
            if was_quiescent {
                Vec::new()
            } else {
                state.count_down()
            }
        };
        Self::run(ready);
    }

    /// Reports that the section holds no references to reclaimable data.
    ///
    /// Idempotent within one interval.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `index` is not an active section.
    pub(crate) fn on_quiescent_state(&self, index: SectionIndex) {
        let ready = {
            let mut state = self.state.lock();
            let Some(slot) = state.slot_mut(index) else {
                Self::report_unknown_section("on_quiescent_state", index);
                return;
            };
            if slot.quiescent {
                return;
            }
            slot.quiescent = true;
            state.count_down()
        };
        Self::run(ready);
    }

    /// Queues `callback` to run once two full intervals have passed.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.state.lock().current.push(Box::new(callback));
    }

    /// Number of active sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.state.lock().section_count
    }

    /// Active sections that have not yet reported in the current interval.
    #[must_use]
    pub fn remaining_sections(&self) -> usize {
        self.state.lock().remaining
    }

    /// Callbacks waiting, as `(previous interval, current interval)`.
    #[must_use]
    pub fn pending_callbacks(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.previous.len(), state.current.len())
    }

    fn run(callbacks: Vec<Callback>) {
        for callback in callbacks {
            callback();
        }
    }

    fn report_unknown_section(operation: &str, index: SectionIndex) {
        tracing::error!(operation, section = index, "qsbr section is not registered");
        if cfg!(debug_assertions) {
            panic!("{operation}: qsbr section {index} is not registered");
        }
    }
}

impl Default for Qsbr {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Qsbr {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.section_count > 0 || !state.previous.is_empty() || !state.current.is_empty() {
            tracing::warn!(
                sections = state.section_count,
                previous = state.previous.len(),
                current = state.current.len(),
                "qsbr dropped with outstanding work, running callbacks"
            );
        }
        let previous = std::mem::take(&mut state.previous);
        let current = std::mem::take(&mut state.current);
        Self::run(previous);
        Self::run(current);
    }
}

impl std::fmt::Debug for Qsbr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Qsbr")
            .field("section_count", &state.section_count)
            .field("remaining", &state.remaining)
            .field("previous", &state.previous.len())
            .field("current", &state.current.len())
            .finish()
    }
}

/// A registered reader section, forgotten on drop.
///
/// Reporting quiescence needs `&mut self`, so anything borrowed against
/// `&Section` (see [`Published::load`](super::Published::load)) is gone by
/// the time the owner can report.
#[derive(Debug)]
pub struct Section {
    reclaimer: Arc<Qsbr>,
    index: SectionIndex,
}

impl Section {
    /// Registers a new section on `reclaimer`.
    #[must_use]
    pub fn register(reclaimer: &Arc<Qsbr>) -> Self {
        let index = reclaimer.register_section();
        Self {
            reclaimer: Arc::clone(reclaimer),
            index,
        }
    }

    /// The raw section index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> SectionIndex {
        self.index
    }

    /// The reclaimer this section is registered with.
    #[inline]
    #[must_use]
    pub fn reclaimer(&self) -> &Arc<Qsbr> {
        &self.reclaimer
    }

    /// Reports a quiescent state for this section.
    #[inline]
    pub fn quiescent(&mut self) {
        self.reclaimer.on_quiescent_state(self.index);
    }
}

impl Drop for Section {
    fn drop(&mut self) {
        self.reclaimer.forget_section(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&fired);
        (fired, move || {
            hook.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_register_reuses_forgotten_slot() {
        let qsbr = Qsbr::new();
        let a = qsbr.register_section();
        let b = qsbr.register_section();
        assert_ne!(a, b);
        assert_eq!(qsbr.section_count(), 2);

        qsbr.forget_section(a);
        assert_eq!(qsbr.section_count(), 1);

        let c = qsbr.register_section();
        assert_eq!(c, a);
        assert_eq!(qsbr.section_count(), 2);
    }

    #[test]
    fn test_callback_waits_for_every_section_twice() {
        let qsbr = Qsbr::new();
        let sections: Vec<_> = (0..3).map(|_| qsbr.register_section()).collect();
        let (fired, callback) = counter();
        qsbr.add_callback(callback);

        // First interval: every section must report.
        qsbr.on_quiescent_state(sections[0]);
        qsbr.on_quiescent_state(sections[1]);
        assert_eq!(qsbr.pending_callbacks(), (0, 1));
        qsbr.on_quiescent_state(sections[2]);
        assert_eq!(qsbr.pending_callbacks(), (1, 0));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Second interval.
        qsbr.on_quiescent_state(sections[2]);
        qsbr.on_quiescent_state(sections[0]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        qsbr.on_quiescent_state(sections[1]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(qsbr.pending_callbacks(), (0, 0));
    }

    #[test]
    fn test_double_report_is_idempotent() {
        let qsbr = Qsbr::new();
        let a = qsbr.register_section();
        let b = qsbr.register_section();
        let (fired, callback) = counter();
        qsbr.add_callback(callback);

        qsbr.on_quiescent_state(a);
        qsbr.on_quiescent_state(a);
        assert_eq!(qsbr.remaining_sections(), 1);
        assert_eq!(qsbr.pending_callbacks(), (0, 1));

        qsbr.on_quiescent_state(b);
        qsbr.on_quiescent_state(a);
        qsbr.on_quiescent_state(a);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        qsbr.on_quiescent_state(b);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forget_can_complete_interval() {
        let qsbr = Qsbr::new();
        let a = qsbr.register_section();
        let b = qsbr.register_section();
        let (fired, callback) = counter();
        qsbr.add_callback(callback);

        qsbr.on_quiescent_state(a);
        qsbr.forget_section(b);
        assert_eq!(qsbr.pending_callbacks(), (1, 0));
        assert_eq!(qsbr.remaining_sections(), 1);

        qsbr.on_quiescent_state(a);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_forget_after_report_does_not_count_twice() {
        let qsbr = Qsbr::new();
        let a = qsbr.register_section();
        let b = qsbr.register_section();
        let c = qsbr.register_section();

        qsbr.on_quiescent_state(a);
        qsbr.forget_section(a);
        assert_eq!(qsbr.remaining_sections(), 2);
        qsbr.on_quiescent_state(b);
        assert_eq!(qsbr.remaining_sections(), 1);
        qsbr.on_quiescent_state(c);
        // Interval rolled over; only b and c remain.
        assert_eq!(qsbr.remaining_sections(), 2);
    }

    #[test]
    fn test_callback_may_queue_callback() {
        let qsbr = Arc::new(Qsbr::new());
        let mut section = Section::register(&qsbr);
        let (fired, inner) = counter();

        let reentrant = Arc::clone(&qsbr);
        qsbr.add_callback(move || reentrant.add_callback(inner));

        section.quiescent();
        section.quiescent();
        assert_eq!(qsbr.pending_callbacks(), (0, 1));
        section.quiescent();
        section.quiescent();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_runs_outstanding_callbacks_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let qsbr = Qsbr::new();
            let section = qsbr.register_section();

            let first = Arc::clone(&order);
            qsbr.add_callback(move || first.lock().push("previous"));
            qsbr.on_quiescent_state(section);

            let second = Arc::clone(&order);
            qsbr.add_callback(move || second.lock().push("current"));
        }
        assert_eq!(*order.lock(), vec!["previous", "current"]);
    }

    #[test]
    fn test_section_guard_forgets_on_drop() {
        let qsbr = Arc::new(Qsbr::new());
        {
            let _section = Section::register(&qsbr);
            assert_eq!(qsbr.section_count(), 1);
        }
        assert_eq!(qsbr.section_count(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "is not registered")]
    fn test_quiescent_on_unknown_section_panics_in_debug() {
        let qsbr = Qsbr::new();
        let index = qsbr.register_section();
        qsbr.forget_section(index);
        qsbr.on_quiescent_state(index);
    }
}
