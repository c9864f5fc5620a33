//! Execution context creation and switching
//!
//! Two operations form the whole primitive:
//!
//! - [`make_context`] lays out a context record at the top of caller-owned
//!   stack memory and returns an inert [`ContextHandle`].
//! - [`jump_context`] suspends the calling flow, resumes the target and
//!   eventually returns the word passed back by whoever switches to us.
//!
//! Neither validates anything. An undersized stack, a handle whose entry
//! routine already returned, or two carriers switching into one context at
//! the same time are caller contract violations with undefined behavior.
//!
//! # Example
//!
//! ```ignore
//! use strand_context::{jump_context, make_context, ContextHandle};
//! use std::cell::Cell;
//!
//! thread_local! {
//!     static ORIGIN: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
//!     static WORKER: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
//! }
//!
//! extern "C" fn increment_and_yield(v: usize) {
//!     let (me, origin) = (WORKER.with(Cell::as_ptr), ORIGIN.with(Cell::get));
//!     unsafe { jump_context(me, origin, v + 1, false) };
//! }
//!
//! let mut stack = vec![0u8; 64 * 1024];
//! let top = unsafe { stack.as_mut_ptr().add(stack.len()) };
//! let ctx = unsafe { make_context(top, stack.len(), increment_and_yield) };
//! let got = unsafe { jump_context(ORIGIN.with(Cell::as_ptr), ctx, 41, false) };
//! assert_eq!(got, 42);
//! ```

use core::fmt;

use crate::current_arch;

/// Entry routine of a fresh context; receives the first transfer value
pub type EntryFn = extern "C" fn(usize);

/// Handler the termination trampoline calls once an entry routine returns
///
/// Runs on the finished context's stack, which is still intact. It must not
/// return: there is no caller to return to.
pub type FinishFn = extern "C" fn() -> !;

/// Size in bytes of the context record for the current target
pub const RECORD_SIZE: usize = current_arch::RECORD_SIZE;

/// Opaque handle to a suspended context
///
/// In practice the address of the context record on the context's own stack.
/// Handles are plain words: copying one does not duplicate the context, and
/// only the most recently stored handle for a context is valid.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ContextHandle(*mut u8);

impl ContextHandle {
    /// A handle that refers to no context; only useful as a slot initializer
    #[inline]
    pub const fn null() -> Self {
        ContextHandle(core::ptr::null_mut())
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Address of the context record
    #[inline]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0
    }

    /// # Safety
    ///
    /// `record` must be a value previously produced by [`make_context`] or
    /// stored by [`jump_context`].
    #[inline]
    pub const unsafe fn from_raw(record: *mut u8) -> Self {
        ContextHandle(record)
    }
}

impl Default for ContextHandle {
    fn default() -> Self {
        ContextHandle::null()
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextHandle({:p})", self.0)
    }
}

/// Create a context on caller-owned memory
///
/// The first [`jump_context`] targeting the returned handle runs
/// `entry(transfer)`. If `entry` returns, the process is terminated by
/// [`context_finished`]; use [`make_context_with_finish`] to install a
/// different handler.
///
/// # Safety
///
/// - `stack_top` is the one-past-the-end address of a writable region of
///   `stack_size` bytes that stays alive and unused by anyone else for as
///   long as the context may run.
/// - The region must hold [`RECORD_SIZE`] bytes plus alignment slack plus
///   everything `entry` needs. Nothing checks this in release builds.
#[inline]
pub unsafe fn make_context(stack_top: *mut u8, stack_size: usize, entry: EntryFn) -> ContextHandle {
    make_context_with_finish(stack_top, stack_size, entry, context_finished)
}

/// Create a context whose entry routine returns into `finish`
///
/// # Safety
///
/// Same contract as [`make_context`].
#[inline]
pub unsafe fn make_context_with_finish(
    stack_top: *mut u8,
    stack_size: usize,
    entry: EntryFn,
    finish: FinishFn,
) -> ContextHandle {
    debug_assert!(!stack_top.is_null());
    debug_assert!(stack_size >= RECORD_SIZE + 64, "stack cannot hold a context record");

    let record = current_arch::make_record(stack_top, stack_size, entry as usize, finish as usize);
    ContextHandle(record)
}

/// Switch from the running context to `target`
///
/// Saves the caller's callee-saved registers on its own stack, stores the
/// resulting handle into `*current`, restores `target` and passes `transfer`
/// to it: as the return value of the `jump_context` call it is suspended in,
/// or as the argument of its entry routine if it has never run. With
/// `preserve_fpu` the floating-point control/status words travel as well.
///
/// Returns the transfer value of whichever switch eventually resumes the
/// caller.
///
/// # Safety
///
/// - `current` must be valid for a write of one handle.
/// - `target` must be a live, suspended context that no other thread is
///   switching into.
/// - `target` must not be a context whose entry routine has returned.
#[inline(always)]
pub unsafe fn jump_context(
    current: *mut ContextHandle,
    target: ContextHandle,
    transfer: usize,
    preserve_fpu: bool,
) -> usize {
    current_arch::jump_context(current, target, transfer, preserve_fpu)
}

/// Default termination handler: a raw context whose entry routine returned
///
/// There is no predecessor on the finished stack to resume, so the whole
/// process goes down.
pub extern "C" fn context_finished() -> ! {
    strand_core::kerror!("context entry routine returned without switching away; aborting");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static ORIGIN: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
        static WORKER: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
        static ENTRIES: Cell<usize> = const { Cell::new(0) };
    }

    fn switch_back(value: usize) -> usize {
        let me = WORKER.with(Cell::as_ptr);
        let origin = ORIGIN.with(Cell::get);
        unsafe { jump_context(me, origin, value, false) }
    }

    extern "C" fn echo_forever(first: usize) {
        ENTRIES.with(|n| n.set(n.get() + 1));
        let mut value = first;
        loop {
            value = switch_back(value * 2);
        }
    }

    fn stack(len: usize) -> (Vec<u8>, *mut u8) {
        let mut mem = vec![0u8; len];
        let top = unsafe { mem.as_mut_ptr().add(len) };
        (mem, top)
    }

    #[test]
    fn test_null_handle() {
        assert!(ContextHandle::null().is_null());
        assert_eq!(ContextHandle::default(), ContextHandle::null());
    }

    #[test]
    fn test_record_is_aligned_and_inside_region() {
        let (mem, top) = stack(16 * 1024);
        let ctx = unsafe { make_context(top, mem.len(), echo_forever) };
        let addr = ctx.as_ptr() as usize;
        let base = mem.as_ptr() as usize;

        assert!(addr > base && addr + RECORD_SIZE <= top as usize);
        assert!(top as usize - addr <= RECORD_SIZE + 0x40);
        assert_eq!((addr + RECORD_SIZE) % 16, 0);
    }

    #[test]
    fn test_entry_runs_once_and_values_alternate() {
        ENTRIES.with(|n| n.set(0));
        let (mem, top) = stack(64 * 1024);
        let ctx = unsafe { make_context(top, mem.len(), echo_forever) };
        WORKER.with(|w| w.set(ctx));

        let origin = ORIGIN.with(Cell::as_ptr);
        for k in 1..=100usize {
            let target = WORKER.with(Cell::get);
            let got = unsafe { jump_context(origin, target, k, false) };
            assert_eq!(got, k * 2);
        }
        assert_eq!(ENTRIES.with(Cell::get), 1);
    }

    #[test]
    fn test_full_word_transfer() {
        let (mem, top) = stack(64 * 1024);
        let ctx = unsafe { make_context(top, mem.len(), echo_forever) };
        WORKER.with(|w| w.set(ctx));

        let origin = ORIGIN.with(Cell::as_ptr);
        let word = usize::MAX / 2;
        let got = unsafe { jump_context(origin, WORKER.with(Cell::get), word, true) };
        assert_eq!(got, usize::MAX - 1);
    }
}
