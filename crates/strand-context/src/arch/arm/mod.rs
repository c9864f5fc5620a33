//! 32-bit ARM (AAPCS with VFP)
//!
//! ```text
//! +0x00  fpscr, pad
//! +0x08  d8 .. d15
//! +0x48  r4 .. r11
//! +0x68  lr (termination trampoline for a fresh entry)
//! +0x6c  resume address
//! ```

#[cfg(not(target_feature = "vfp2"))]
compile_error!("strand-context requires an ARM target with VFP registers");

use core::arch::{asm, naked_asm};
use core::mem::size_of;

use crate::arch::place_record;
use crate::ContextHandle;

pub const RECORD_SIZE: usize = 0x70;

#[repr(C)]
struct Record {
    fpscr: u32,
    _pad: u32,
    d: [u64; 8],
    r: [u32; 8],
    lr: u32,
    pc: u32,
}

const _: () = assert!(size_of::<Record>() == RECORD_SIZE);

fn read_fpscr() -> u32 {
    let fpscr: u32;
    unsafe {
        asm!("vmrs {}, fpscr", out(reg) fpscr, options(nomem, nostack, preserves_flags));
    }
    fpscr
}

pub(crate) unsafe fn make_record(
    stack_top: *mut u8,
    _stack_size: usize,
    entry: usize,
    finish: usize,
) -> *mut u8 {
    let record = place_record(stack_top, 0, RECORD_SIZE);
    let mut r = [0u32; 8];
    r[0] = finish as u32;
    (record as *mut Record).write(Record {
        fpscr: read_fpscr(),
        _pad: 0,
        d: [0; 8],
        r,
        lr: trampoline as usize as u32,
        pc: entry as u32,
    });
    record
}

/// Runs when an entry routine returns; the finish handler sits in r4
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!(
        "blx r4",
        "udf #0",
    );
}

/// r0 = current slot, r1 = target record, r2 = transfer, r3 = preserve_fpu
#[unsafe(naked)]
pub unsafe extern "C" fn jump_context(
    _current: *mut ContextHandle,
    _target: ContextHandle,
    _transfer: usize,
    _preserve_fpu: bool,
) -> usize {
    naked_asm!(
        "push {{lr}}",
        "push {{r4-r11, lr}}",
        "sub sp, sp, #72",
        "add ip, sp, #8",
        "vstmia ip, {{d8-d15}}",
        "tst r3, #0xff",
        "beq 2f",
        "vmrs ip, fpscr",
        "str ip, [sp]",
        "2:",
        "str sp, [r0]",
        "mov sp, r1",
        "add ip, sp, #8",
        "vldmia ip, {{d8-d15}}",
        "tst r3, #0xff",
        "beq 3f",
        "ldr ip, [sp]",
        "vmsr fpscr, ip",
        "3:",
        "add sp, sp, #72",
        // return value for a resumed jump, first argument for a fresh entry
        "mov r0, r2",
        "pop {{r4-r11, lr}}",
        "pop {{pc}}",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn entry(_: usize) {}

    extern "C" fn finish() -> ! {
        std::process::abort()
    }

    #[test]
    fn test_fresh_record() {
        let mut stack = vec![0u32; 1024];
        let top = unsafe { (stack.as_mut_ptr() as *mut u8).add(stack.len() * 4) };
        let record = unsafe { make_record(top, 4096, entry as usize, finish as usize) };
        let r = unsafe { &*(record as *const Record) };

        assert_eq!(record as usize + RECORD_SIZE, top as usize & !15);
        assert_eq!(r.pc, entry as usize as u32);
        assert_eq!(r.r[0], finish as usize as u32);
        assert!(r.r[1..].iter().all(|&v| v == 0));
        assert_eq!(r.lr, trampoline as usize as u32);
        assert_eq!(r.d, [0; 8]);
        assert_eq!(r.fpscr, read_fpscr());
    }
}
