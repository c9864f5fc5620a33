//! Win32 x86
//!
//! A switch also swaps the thread information block fields that describe the
//! running stack and its structured exception handler chain. Each fresh
//! context gets a single terminal SEH record pointing at the process's final
//! handler.
//!
//! ```text
//! +0x00  mxcsr (u32), x87 control word (u16), pad
//! +0x08  FiberData, DeallocationStack, StackLimit, StackBase, ExceptionList
//! +0x1c  edi esi ebx ebp
//! +0x2c  resume address
//! +0x30  return address of a fresh entry (termination trampoline)
//! +0x34  argument slot of a fresh entry
//! +0x38  terminal SEH record: next = 0xffffffff, handler
//! ```

use core::arch::{asm, naked_asm};
use core::mem::size_of;

use super::{read_fpcw, read_mxcsr};
use crate::arch::place_record;
use crate::ContextHandle;

pub const RECORD_SIZE: usize = 0x40;

const SKEW: usize = 8;

const SEH_END: u32 = 0xffff_ffff;

#[repr(C)]
struct Record {
    mxcsr: u32,
    fpcw: u16,
    _pad: u16,
    fiber_data: u32,
    deallocation_stack: u32,
    stack_limit: u32,
    stack_base: u32,
    exception_list: u32,
    edi: u32,
    esi: u32,
    ebx: u32,
    ebp: u32,
    eip: u32,
    ret: u32,
    arg: u32,
    seh_next: u32,
    seh_handler: u32,
}

const _: () = assert!(size_of::<Record>() == RECORD_SIZE);

fn current_fiber_data() -> u32 {
    let data: u32;
    unsafe {
        asm!(
            "mov {0}, fs:[0x18]",
            "mov {0}, [{0} + 0x10]",
            out(reg) data,
            options(nostack, readonly, preserves_flags),
        );
    }
    data
}

/// Handler of the last record on this thread's SEH chain
fn final_seh_handler() -> u32 {
    let mut record: u32;
    unsafe {
        asm!(
            "mov {0}, fs:[0]",
            out(reg) record,
            options(nostack, readonly, preserves_flags),
        );
        while *(record as *const u32) != SEH_END {
            record = *(record as *const u32);
        }
        *((record + 4) as *const u32)
    }
}

pub(crate) unsafe fn make_record(
    stack_top: *mut u8,
    stack_size: usize,
    entry: usize,
    finish: usize,
) -> *mut u8 {
    let record = place_record(stack_top, SKEW, RECORD_SIZE);
    let limit = (stack_top as usize - stack_size) as u32;
    (record as *mut Record).write(Record {
        mxcsr: read_mxcsr(),
        fpcw: read_fpcw(),
        _pad: 0,
        fiber_data: current_fiber_data(),
        deallocation_stack: limit,
        stack_limit: limit,
        stack_base: stack_top as u32,
        exception_list: record as u32 + 0x38,
        edi: 0,
        esi: finish as u32,
        ebx: 0,
        ebp: 0,
        eip: entry as u32,
        ret: trampoline as usize as u32,
        arg: 0,
        seh_next: SEH_END,
        seh_handler: final_seh_handler(),
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
        "lea esp, [esp - 0x1c]",
        "test ecx, ecx",
        "je 2f",
        "stmxcsr dword ptr [esp]",
        "fnstcw word ptr [esp + 4]",
        "2:",
        "mov edx, fs:[0x18]",
        "mov eax, [edx + 0x10]",
        "mov [esp + 0x08], eax",
        "mov eax, [edx + 0xe0c]",
        "mov [esp + 0x0c], eax",
        "mov eax, [edx + 0x08]",
        "mov [esp + 0x10], eax",
        "mov eax, [edx + 0x04]",
        "mov [esp + 0x14], eax",
        "mov eax, [edx]",
        "mov [esp + 0x18], eax",
        "mov eax, [esp + 0x30]",
        "mov [eax], esp",
        "mov eax, [esp + 0x38]",
        "mov esp, [esp + 0x34]",
        "test ecx, ecx",
        "je 3f",
        "ldmxcsr dword ptr [esp]",
        "fldcw word ptr [esp + 4]",
        "3:",
        "mov edx, fs:[0x18]",
        "mov ecx, [esp + 0x08]",
        "mov [edx + 0x10], ecx",
        "mov ecx, [esp + 0x0c]",
        "mov [edx + 0xe0c], ecx",
        "mov ecx, [esp + 0x10]",
        "mov [edx + 0x08], ecx",
        "mov ecx, [esp + 0x14]",
        "mov [edx + 0x04], ecx",
        "mov ecx, [esp + 0x18]",
        "mov [edx], ecx",
        "lea esp, [esp + 0x1c]",
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
        let size = stack.len() * 4;
        let top = unsafe { (stack.as_mut_ptr() as *mut u8).add(size) };
        let record = unsafe { make_record(top, size, entry as usize, finish as usize) };
        let r = unsafe { &*(record as *const Record) };

        assert_eq!(record as usize + RECORD_SIZE, (top as usize - SKEW) & !15);
        assert_eq!(r.eip, entry as usize as u32);
        assert_eq!(r.esi, finish as usize as u32);
        assert_eq!(r.ret, trampoline as usize as u32);
        assert_eq!(r.stack_base, top as u32);
        assert_eq!(r.stack_limit, stack.as_ptr() as u32);
        assert_eq!(r.deallocation_stack, r.stack_limit);
        assert_eq!(r.fiber_data, current_fiber_data());
        // the chain of a fresh context is its own terminal record
        assert_eq!(r.exception_list, record as u32 + 0x38);
        assert_eq!(r.seh_next, SEH_END);
        assert_eq!(r.seh_handler, final_seh_handler());
    }
}
