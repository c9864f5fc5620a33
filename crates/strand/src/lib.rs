//! # strand - user-mode execution contexts
//!
//! A context is a stack plus the callee-saved register state needed to
//! resume it. `strand` creates contexts on caller-owned memory and switches
//! between them on one OS thread, carrying one machine word per switch.
//!
//! ## Layers
//!
//! - **Primitive**: [`make_context`] and [`jump_context`], hand-written for
//!   x86 and x86_64 (System V and Windows), ARM and AArch64
//! - **Carrier**: a cooperative FIFO scheduler of stackful tasks built on
//!   the primitive, plus [`CarrierPool`] to run one carrier per OS thread
//! - **Write ordering**: [`WriteQueue`] materializes exactly-once write
//!   producers in FIFO order against a [`Transport`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use strand::{Carrier, CarrierConfig, spawn, yield_now};
//!
//! let mut carrier = Carrier::new(CarrierConfig::from_env())?;
//! carrier.spawn(|| {
//!     println!("ping");
//!     yield_now();
//!     println!("ping again");
//! })?;
//! carrier.spawn(|| {
//!     println!("pong");
//!     spawn(|| println!("spawned from a task")).unwrap();
//! })?;
//! let stats = carrier.run()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │   spawn(), yield_now(), CarrierPool::submit   │
//! └───────────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌───────────────────────────────────────────────┐
//! │  Carrier: run queue, task slab, stack pool    │
//! └───────────────────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌───────────────────────────────────────────────┐
//! │  make_context / jump_context (naked asm)      │
//! │  one record layout per architecture and ABI   │
//! └───────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use strand_core::{
    ConfigError, MemoryError, StrandError, StrandResult, SwitchReason, TaskId, TaskState,
};

// Re-export kprint macros for debug logging
pub use strand_core::kprint::{
    init as init_logging, set_flush_enabled, set_log_level, set_time_enabled, LogLevel,
};
pub use strand_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use strand_core::{env_get, env_get_bool, env_get_opt, env_get_size, env_get_str, env_is_set};

// Re-export the primitive and the carrier
pub use strand_context::{
    context_finished, current_task, is_on_carrier, jump_context, make_context,
    make_context_with_finish, spawn, yield_now, Carrier, CarrierConfig, CarrierPool,
    ContextHandle, EntryFn, FinishFn, RunStats, Stack, RECORD_SIZE,
};

// Re-export write ordering
pub use strand_write::{
    BytesMessage, FlushReport, MemoryTransport, MessagePtr, Transport, TransportId, WriteError,
    WriteMessage, WriteQueue, WriteReceipt,
};

/// Run `f` as the first task of a fresh carrier on this thread and drive
/// the carrier until every task has finished
///
/// Returns whatever `f` produced along with the carrier's counters.
pub fn block_on<F, T>(config: CarrierConfig, f: F) -> StrandResult<(T, RunStats)>
where
    F: FnOnce() -> T + 'static,
    T: 'static,
{
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut carrier = Carrier::new(config)?;
    let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let out = slot.clone();
    carrier.spawn(move || {
        *out.borrow_mut() = Some(f());
    })?;
    let stats = carrier.run()?;

    let value = slot.borrow_mut().take();
    match value {
        Some(value) => Ok((value, stats)),
        None => Err(StrandError::Thread("root task did not complete".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on_runs_nested_tasks() {
        let config = CarrierConfig::new().stack_size(64 * 1024);
        let (value, stats) = block_on(config, || {
            let counter = std::rc::Rc::new(std::cell::Cell::new(0));
            for _ in 0..3 {
                let c = counter.clone();
                spawn(move || c.set(c.get() + 1)).unwrap();
            }
            while counter.get() < 3 {
                yield_now();
            }
            counter.get()
        })
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(stats.completed, 4);
    }

    #[test]
    fn test_block_on_panicking_root() {
        let config = CarrierConfig::new().stack_size(64 * 1024);
        let result = block_on(config, || -> u32 { panic!("root failed") });
        assert!(matches!(result, Err(StrandError::Thread(_))));
    }
}
