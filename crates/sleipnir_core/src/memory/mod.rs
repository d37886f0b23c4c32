//! # Handles and Handle-Keyed Storage
//!
//! The producer side reserves handles through a [`SlotAllocator`]; the
//! consumer side stores objects under them in a [`SlotPool`]. Both check
//! generations, so a handle outliving its object never aliases a newer one.

mod pool;
mod slots;

pub use pool::SlotPool;
pub use slots::{HandleStrategy, SlotAllocator, SlotHandle};
