//! AArch64 (AAPCS64)
//!
//! ```text
//! +0x00  d8 .. d15
//! +0x40  x19 .. x28
//! +0x90  x29, x30 (termination trampoline for a fresh entry)
//! +0xa0  resume address
//! +0xa8  fpcr
//! ```

use core::arch::{asm, naked_asm};
use core::mem::size_of;

use crate::arch::place_record;
use crate::ContextHandle;

pub const RECORD_SIZE: usize = 0xb0;

#[repr(C)]
struct Record {
    d: [u64; 8],
    x19_x28: [u64; 10],
    fp: u64,
    lr: u64,
    pc: u64,
    fpcr: u64,
}

const _: () = assert!(size_of::<Record>() == RECORD_SIZE);

pub(crate) fn read_fpcr() -> u64 {
    let fpcr: u64;
    unsafe {
        asm!("mrs {}, fpcr", out(reg) fpcr, options(nomem, nostack, preserves_flags));
    }
    fpcr
}

pub(crate) unsafe fn make_record(
    stack_top: *mut u8,
    _stack_size: usize,
    entry: usize,
    finish: usize,
) -> *mut u8 {
    let record = place_record(stack_top, 0, RECORD_SIZE);
    let mut x = [0u64; 10];
    x[0] = finish as u64;
    (record as *mut Record).write(Record {
        d: [0; 8],
        x19_x28: x,
        fp: 0,
        lr: trampoline as usize as u64,
        pc: entry as u64,
        fpcr: read_fpcr(),
    });
    record
}

/// Runs when an entry routine returns; the finish handler sits in x19
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!(
        "blr x19",
        "brk #0",
    );
}

/// x0 = current slot, x1 = target record, x2 = transfer, w3 = preserve_fpu
#[unsafe(naked)]
pub unsafe extern "C" fn jump_context(
    _current: *mut ContextHandle,
    _target: ContextHandle,
    _transfer: usize,
    _preserve_fpu: bool,
) -> usize {
    naked_asm!(
        "sub sp, sp, #0xb0",
        "stp d8, d9, [sp, #0x00]",
        "stp d10, d11, [sp, #0x10]",
        "stp d12, d13, [sp, #0x20]",
        "stp d14, d15, [sp, #0x30]",
        "stp x19, x20, [sp, #0x40]",
        "stp x21, x22, [sp, #0x50]",
        "stp x23, x24, [sp, #0x60]",
        "stp x25, x26, [sp, #0x70]",
        "stp x27, x28, [sp, #0x80]",
        "stp x29, x30, [sp, #0x90]",
        "str x30, [sp, #0xa0]",
        "tst w3, #0xff",
        "b.eq 2f",
        "mrs x4, fpcr",
        "str x4, [sp, #0xa8]",
        "2:",
        "mov x4, sp",
        "str x4, [x0]",
        "mov sp, x1",
        "ldp d8, d9, [sp, #0x00]",
        "ldp d10, d11, [sp, #0x10]",
        "ldp d12, d13, [sp, #0x20]",
        "ldp d14, d15, [sp, #0x30]",
        "ldp x19, x20, [sp, #0x40]",
        "ldp x21, x22, [sp, #0x50]",
        "ldp x23, x24, [sp, #0x60]",
        "ldp x25, x26, [sp, #0x70]",
        "ldp x27, x28, [sp, #0x80]",
        "ldp x29, x30, [sp, #0x90]",
        "tst w3, #0xff",
        "b.eq 3f",
        "ldr x4, [sp, #0xa8]",
        "msr fpcr, x4",
        "3:",
        // return value for a resumed jump, first argument for a fresh entry
        "mov x0, x2",
        "ldr x4, [sp, #0xa0]",
        "add sp, sp, #0xb0",
        "ret x4",
    );
}
