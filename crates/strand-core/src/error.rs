//! Error types for the layers built on top of the context-switch primitive
//!
//! The raw primitive (`make_context` / `jump_context`) reports nothing: every
//! misuse there is a caller contract violation. These errors cover stack
//! allocation, configuration and the reference carrier.

use thiserror::Error;

/// Result type for strand operations
pub type StrandResult<T> = Result<T, StrandError>;

/// Errors that can occur above the raw primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrandError {
    /// No task slots left on this carrier
    #[error("no task slots available")]
    NoSlotsAvailable,

    /// Operation requires a carrier on the current thread
    #[error("not running on a carrier")]
    NotOnCarrier,

    /// A carrier is already installed on this thread
    #[error("carrier already initialized on this thread")]
    AlreadyInitialized,

    /// Carrier or pool was shut down
    #[error("carrier shut down")]
    ShutDown,

    /// Bounded injector queue is full
    #[error("carrier queue full")]
    QueueFull,

    /// Stack memory error
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Carrier thread error
    #[error("carrier thread error: {0}")]
    Thread(String),
}

/// Stack memory errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// mmap or the global allocator failed; carries errno where known
    #[error("stack allocation failed (errno {0})")]
    AllocationFailed(i32),

    /// munmap failed
    #[error("stack release failed (errno {0})")]
    ReleaseFailed(i32),

    /// Requested stack is smaller than the supported minimum
    #[error("stack of {size} bytes is below the minimum of {min} bytes")]
    StackTooSmall { size: usize, min: usize },

    /// Size overflowed when rounding to pages
    #[error("stack size overflow")]
    SizeOverflow,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
}
