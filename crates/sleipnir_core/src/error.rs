//! # Core Error Types

use thiserror::Error;

use crate::memory::SlotHandle;

/// Errors raised by core storage.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// The unset handle was used where a real one is required.
    #[error("operation requires a handle, got the unset handle")]
    UnknownHandle,

    /// The slot named by a handle already holds an object.
    #[error("slot for handle {requested} is occupied by {occupant}")]
    SlotOccupied {
        /// The handle being inserted.
        requested: SlotHandle,
        /// The handle already stored in the slot.
        occupant: SlotHandle,
    },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
