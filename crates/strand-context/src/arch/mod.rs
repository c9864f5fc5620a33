//! Architecture-specific context records and switch routines
//!
//! Every backend exports the same three items:
//!
//! - `RECORD_SIZE`: bytes of the record a fresh context starts from
//! - `make_record(stack_top, stack_size, entry, finish) -> *mut u8`
//! - `jump_context(current, target, transfer, preserve_fpu) -> usize`, a
//!   naked routine following the platform C calling convention
//!
//! Backends do not share machine code; each one is complete on its own.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub(crate) use self::x86_64 as current;
    } else if #[cfg(target_arch = "x86")] {
        pub mod x86;
        pub(crate) use self::x86 as current;
    } else if #[cfg(all(target_arch = "aarch64", not(windows)))] {
        pub mod aarch64;
        pub(crate) use self::aarch64 as current;
    } else if #[cfg(all(target_arch = "arm", target_os = "linux"))] {
        pub mod arm;
        pub(crate) use self::arm as current;
    } else {
        compile_error!("strand-context has no context switch backend for this target");
    }
}

use strand_core::constants::STACK_ALIGN;

/// Address of a record of `size` bytes below `stack_top`
///
/// `skew` bytes directly under the top stay untouched (Windows home space,
/// argument slots); the record's upper end is 16-aligned.
#[inline]
pub(crate) fn place_record(stack_top: *mut u8, skew: usize, size: usize) -> *mut u8 {
    let end = (stack_top as usize - skew) & !(STACK_ALIGN - 1);
    (end - size) as *mut u8
}
