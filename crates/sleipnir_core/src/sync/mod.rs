//! # Synchronization Primitives for the Physics Boundary
//!
//! ## The Problem
//!
//! ```text
//! Physics thread:  WRITES a new position snapshot every tick
//! Game thread:     READS the latest snapshot every frame
//!
//! With Mutex:          game frame stalls behind a physics tick
//! With Arc per read:   refcount traffic on the hot read path
//! Free on replace:     use-after-free in a reader still iterating
//! ```
//!
//! ## The Solution: QSBR
//!
//! The writer swaps a pointer and hands the old value to [`Qsbr`]. Readers
//! load the pointer freely and report a quiescent state once per frame. The
//! old value is freed after every reader has reported twice.

mod published;
mod qsbr;

pub use published::Published;
pub use qsbr::{Qsbr, Section, SectionIndex};
