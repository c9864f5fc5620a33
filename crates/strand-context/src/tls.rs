//! Thread-local carrier state
//!
//! One carrier per OS thread. The slot holds a raw pointer because control
//! leaves and re-enters carrier code through `jump_context`, which no borrow
//! guard can span.

use std::cell::Cell;

use strand_core::constants::TASK_NONE;
use strand_core::TaskId;

use crate::carrier::CarrierState;

thread_local! {
    /// Carrier installed on this OS thread
    static CARRIER: Cell<*mut CarrierState> = const { Cell::new(std::ptr::null_mut()) };

    /// Task currently running on this thread's carrier
    static CURRENT_TASK: Cell<u32> = const { Cell::new(TASK_NONE) };
}

#[inline]
pub(crate) fn install_carrier(state: *mut CarrierState) {
    CARRIER.with(|cell| cell.set(state));
}

#[inline]
pub(crate) fn clear_carrier() {
    CARRIER.with(|cell| cell.set(std::ptr::null_mut()));
    CURRENT_TASK.with(|cell| cell.set(TASK_NONE));
}

#[inline]
pub(crate) fn carrier_ptr() -> *mut CarrierState {
    CARRIER.with(|cell| cell.get())
}

#[inline]
pub(crate) fn set_current_task(id: TaskId) {
    CURRENT_TASK.with(|cell| cell.set(id.as_u32()));
}

#[inline]
pub(crate) fn clear_current_task() {
    CURRENT_TASK.with(|cell| cell.set(TASK_NONE));
}

/// Task running on this thread, if any
#[inline]
pub fn current_task() -> Option<TaskId> {
    TaskId::new(CURRENT_TASK.with(|cell| cell.get())).to_option()
}

/// Whether a carrier is installed on this thread
#[inline]
pub fn is_on_carrier() -> bool {
    !carrier_ptr().is_null()
}
