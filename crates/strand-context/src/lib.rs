//! # strand-context
//!
//! User-mode execution contexts: create one on caller-owned stack memory,
//! switch between contexts on a single OS thread, and pass one machine word
//! across every switch.
//!
//! This crate provides:
//! - The switch primitive ([`make_context`], [`jump_context`]) with
//!   per-architecture records for x86, x86_64, ARM and AArch64
//! - Owned stack memory ([`Stack`])
//! - A reference cooperative scheduler ([`Carrier`]) and a thread pool of
//!   carriers ([`CarrierPool`])
//! - Configuration with build-time and environment overrides
//!   ([`CarrierConfig`])

mod arch;
pub mod carrier;
pub mod config;
pub mod context;
pub mod pool;
pub mod stack;
mod tls;

pub use carrier::{current_task, is_on_carrier, spawn, yield_now, Carrier, RunStats};
pub use config::CarrierConfig;
pub use context::{
    context_finished, jump_context, make_context, make_context_with_finish, ContextHandle,
    EntryFn, FinishFn, RECORD_SIZE,
};
pub use pool::CarrierPool;
pub use stack::Stack;

use arch::current as current_arch;
