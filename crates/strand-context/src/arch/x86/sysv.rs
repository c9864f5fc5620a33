//! i386 System V
//!
//! ```text
//! +0x00  mxcsr (u32), x87 control word (u16), pad
//! +0x08  edi esi ebx ebp
//! +0x18  resume address
//! +0x1c  return address of a fresh entry (termination trampoline)
//! +0x20  argument slot of a fresh entry
//! +0x24  pad up to a 16 byte boundary
//! ```
//!
//! The argument slot lands on a 16 byte boundary so the entry routine
//! starts with the stack aligned the way the ABI requires after a call.

use core::arch::naked_asm;
use core::mem::size_of;

use super::{read_fpcw, read_mxcsr};
use crate::arch::place_record;
use crate::ContextHandle;

pub const RECORD_SIZE: usize = 0x30;

#[repr(C)]
struct Record {
    mxcsr: u32,
    fpcw: u16,
    _pad: u16,
    edi: u32,
    esi: u32,
    ebx: u32,
    ebp: u32,
    eip: u32,
    ret: u32,
    arg: u32,
    _tail: [u32; 3],
}

const _: () = assert!(size_of::<Record>() == RECORD_SIZE);

pub(crate) unsafe fn make_record(
    stack_top: *mut u8,
    _stack_size: usize,
    entry: usize,
    finish: usize,
) -> *mut u8 {
    let record = place_record(stack_top, 0, RECORD_SIZE);
    (record as *mut Record).write(Record {
        mxcsr: read_mxcsr(),
        fpcw: read_fpcw(),
        _pad: 0,
        edi: 0,
        esi: finish as u32,
        ebx: 0,
        ebp: 0,
        eip: entry as u32,
        ret: trampoline as usize as u32,
        arg: 0,
        _tail: [0; 3],
    });
    record
}

/// Runs when an entry routine returns; the finish handler sits in esi
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!(
        "and esp, -16",
        "call esi",
        "ud2",
    );
}

/// [esp+4] current slot, [esp+8] target, [esp+0xc] transfer, [esp+0x10] preserve_fpu
#[unsafe(naked)]
pub unsafe extern "C" fn jump_context(
    _current: *mut ContextHandle,
    _target: ContextHandle,
    _transfer: usize,
    _preserve_fpu: bool,
) -> usize {
    naked_asm!(
        "movzx ecx, byte ptr [esp + 0x10]",
        "push ebp",
        "push ebx",
        "push esi",
        "push edi",
        "lea esp, [esp - 8]",
        "test ecx, ecx",
        "je 2f",
        "stmxcsr dword ptr [esp]",
        "fnstcw word ptr [esp + 4]",
        "2:",
        "mov eax, [esp + 0x1c]",
        "mov [eax], esp",
        "mov edx, [esp + 0x20]",
        "mov eax, [esp + 0x24]",
        "mov esp, edx",
        "test ecx, ecx",
        "je 3f",
        "ldmxcsr dword ptr [esp]",
        "fldcw word ptr [esp + 4]",
        "3:",
        "lea esp, [esp + 8]",
        "pop edi",
        "pop esi",
        "pop ebx",
        "pop ebp",
        "pop edx",
        // first argument of a fresh entry; a resumed caller ignores this slot
        "mov [esp + 4], eax",
        "jmp edx",
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
        assert_eq!(r.eip, entry as usize as u32);
        assert_eq!(r.esi, finish as usize as u32);
        assert_eq!(r.ret, trampoline as usize as u32);
        assert_eq!(r.ebp, 0);
        assert_eq!(r.mxcsr, read_mxcsr());
        assert_eq!(r.fpcw, read_fpcw());
        // entry's first argument on a 16 byte boundary, as after a call
        assert_eq!((record as usize + 0x20) % 16, 0);
    }
}
