//! # strand-core
//!
//! Core types shared by the strand crates.
//!
//! This crate is platform-agnostic and contains no architecture-specific code.
//! The context-switch primitive itself lives in `strand-context`.
//!
//! ## Modules
//!
//! - `id` - task identifier type
//! - `state` - task lifecycle states and switch reasons
//! - `error` - error types for everything layered above the raw primitive
//! - `kprint` - kernel-style debug printing macros
//! - `env` - environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::TaskId;
pub use state::{TaskState, SwitchReason};
pub use error::{StrandError, StrandResult, MemoryError, ConfigError};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

/// Constants for memory layout
pub mod constants {
    /// Required stack alignment on every supported architecture
    pub const STACK_ALIGN: usize = 16;

    /// Smallest stack accepted by the safe stack allocator.
    ///
    /// The largest context record is under 0x130 bytes; the rest is headroom
    /// for the entry routine and the termination handler.
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Page size assumed when rounding stack sizes
    pub const PAGE_SIZE: usize = 4096;

    /// Upper bound on tasks per carrier (ids must fit in u32)
    pub const MAX_CONTEXTS: usize = u32::MAX as usize - 1;

    /// Upper bound on carriers in one pool
    pub const MAX_CARRIERS: usize = 256;

    /// No task sentinel value
    pub const TASK_NONE: u32 = u32::MAX;
}
