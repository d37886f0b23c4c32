//! # Engine Error Types

use sleipnir_core::CoreError;
use sleipnir_shared::ConfigError;
use thiserror::Error;

use crate::physics::{BodyHandle, ThreadState};

/// Errors raised by the physics layer and the game loop.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// An Add described a body without a shape.
    #[error("body {0} was added without a shape")]
    MissingShape(BodyHandle),

    /// Handle-keyed storage refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A lifecycle method was called in the wrong state.
    #[error("physics thread is {found:?}, expected {expected:?}")]
    InvalidState {
        /// State the call requires.
        expected: ThreadState,
        /// State the thread is in.
        found: ThreadState,
    },

    /// The OS refused to start the worker thread.
    #[error("failed to spawn physics thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The game loop already runs a physics thread.
    #[error("physics is already attached")]
    AlreadyAttached,

    /// The worker thread panicked; its engine is lost.
    #[error("physics thread panicked")]
    WorkerPanicked,

    /// Startup configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for engine operations.
pub type PhysicsResult<T> = Result<T, PhysicsError>;
