//! Strand Configuration File
//!
//! Example build-time configuration for strand-context.
//! Copy this file to your project and modify as needed.
//!
//! Usage:
//!   STRAND_CONFIG_RS=$PWD/cmd/basic/strand_config.rs cargo build -p strand-basic
//!
//! You only need to include parameters you want to change.
//! All other parameters will use library defaults.
//!
//! These values can still be overridden at runtime via environment variables:
//!   STRAND_NUM_CARRIERS=8 ./basic

// Stack size of every carrier task
pub const STACK_SIZE: usize = 128 * 1024;

// Live tasks allowed per carrier
pub const MAX_CONTEXTS: usize = 4096;

// Save and restore the FPU control/status words on every switch
pub const PRESERVE_FPU: bool = true;

// Finished-task stacks cached per carrier for reuse
pub const STACK_POOL_LIMIT: usize = 64;

// Carrier threads started by CarrierPool
pub const NUM_CARRIERS: usize = 4;

// Per-carrier submission queue capacity
pub const INJECTOR_CAPACITY: usize = 1024;

// Idle carrier park timeout (ms)
pub const PARK_TIMEOUT_MS: u64 = 10;
