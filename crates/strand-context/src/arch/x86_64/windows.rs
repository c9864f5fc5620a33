//! Microsoft x64
//!
//! Besides the nonvolatile registers (including xmm6-xmm15) a switch swaps
//! the stack bounds and fiber data kept in the thread environment block, so
//! stack probes and exception dispatch see the running context's stack.
//!
//! ```text
//! +0x00  pad
//! +0x08  xmm6 .. xmm15
//! +0xa8  mxcsr (u32), x87 control word (u16), pad
//! +0xb8  FiberData, DeallocationStack, StackLimit, StackBase
//! +0xd8  r12 r13 r14 r15 rdi rsi rbx rbp
//! +0x118 resume address
//! +0x120 return address of a fresh entry (termination trampoline)
//! ```
//!
//! 0x28 bytes above a fresh record stay free: the entry routine's home space
//! plus the return slot alignment.

use core::arch::{asm, naked_asm};
use core::mem::size_of;

use super::{read_fpcw, read_mxcsr};
use crate::arch::place_record;
use crate::ContextHandle;

pub const RECORD_SIZE: usize = 0x128;

const SKEW: usize = 0x28;

#[repr(C)]
struct Record {
    _pad0: u64,
    xmm: [u64; 20],
    mxcsr: u32,
    fpcw: u16,
    _pad1: u16,
    _pad2: u64,
    fiber_data: u64,
    deallocation_stack: u64,
    stack_limit: u64,
    stack_base: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rdi: u64,
    rsi: u64,
    rbx: u64,
    rbp: u64,
    rip: u64,
    ret: u64,
}

const _: () = assert!(size_of::<Record>() == RECORD_SIZE);

fn current_fiber_data() -> u64 {
    let data: u64;
    unsafe {
        asm!(
            "mov {0}, gs:[0x30]",
            "mov {0}, [{0} + 0x20]",
            out(reg) data,
            options(nostack, readonly, preserves_flags),
        );
    }
    data
}

pub(crate) unsafe fn make_record(
    stack_top: *mut u8,
    stack_size: usize,
    entry: usize,
    finish: usize,
) -> *mut u8 {
    let record = place_record(stack_top, SKEW, RECORD_SIZE);
    let limit = (stack_top as usize - stack_size) as u64;
    (record as *mut Record).write(Record {
        _pad0: 0,
        xmm: [0; 20],
        mxcsr: read_mxcsr(),
        fpcw: read_fpcw(),
        _pad1: 0,
        _pad2: 0,
        fiber_data: current_fiber_data(),
        deallocation_stack: limit,
        stack_limit: limit,
        stack_base: stack_top as u64,
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
        rdi: 0,
        rsi: 0,
        rbx: finish as u64,
        rbp: 0,
        rip: entry as u64,
        ret: trampoline as usize as u64,
    });
    record
}

/// Runs when an entry routine returns; the finish handler sits in rbx
#[unsafe(naked)]
unsafe extern "C" fn trampoline() -> ! {
    naked_asm!(
        "and rsp, -16",
        "sub rsp, 0x20",
        "call rbx",
        "ud2",
    );
}

/// rcx = current slot, rdx = target record, r8 = transfer, r9b = preserve_fpu
#[unsafe(naked)]
pub unsafe extern "C" fn jump_context(
    _current: *mut ContextHandle,
    _target: ContextHandle,
    _transfer: usize,
    _preserve_fpu: bool,
) -> usize {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push rsi",
        "push rdi",
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "sub rsp, 0xd8",
        "test r9b, r9b",
        "je 2f",
        "stmxcsr dword ptr [rsp + 0xa8]",
        "fnstcw word ptr [rsp + 0xac]",
        "2:",
        "movups [rsp + 0x08], xmm6",
        "movups [rsp + 0x18], xmm7",
        "movups [rsp + 0x28], xmm8",
        "movups [rsp + 0x38], xmm9",
        "movups [rsp + 0x48], xmm10",
        "movups [rsp + 0x58], xmm11",
        "movups [rsp + 0x68], xmm12",
        "movups [rsp + 0x78], xmm13",
        "movups [rsp + 0x88], xmm14",
        "movups [rsp + 0x98], xmm15",
        "mov r10, gs:[0x30]",
        "mov rax, [r10 + 0x20]",
        "mov [rsp + 0xb8], rax",
        "mov rax, [r10 + 0x1478]",
        "mov [rsp + 0xc0], rax",
        "mov rax, [r10 + 0x10]",
        "mov [rsp + 0xc8], rax",
        "mov rax, [r10 + 0x08]",
        "mov [rsp + 0xd0], rax",
        "mov [rcx], rsp",
        "mov rsp, rdx",
        "test r9b, r9b",
        "je 3f",
        "ldmxcsr dword ptr [rsp + 0xa8]",
        "fldcw word ptr [rsp + 0xac]",
        "3:",
        "movups xmm6, [rsp + 0x08]",
        "movups xmm7, [rsp + 0x18]",
        "movups xmm8, [rsp + 0x28]",
        "movups xmm9, [rsp + 0x38]",
        "movups xmm10, [rsp + 0x48]",
        "movups xmm11, [rsp + 0x58]",
        "movups xmm12, [rsp + 0x68]",
        "movups xmm13, [rsp + 0x78]",
        "movups xmm14, [rsp + 0x88]",
        "movups xmm15, [rsp + 0x98]",
        "mov r10, gs:[0x30]",
        "mov rax, [rsp + 0xb8]",
        "mov [r10 + 0x20], rax",
        "mov rax, [rsp + 0xc0]",
        "mov [r10 + 0x1478], rax",
        "mov rax, [rsp + 0xc8]",
        "mov [r10 + 0x10], rax",
        "mov rax, [rsp + 0xd0]",
        "mov [r10 + 0x08], rax",
        "add rsp, 0xd8",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "pop rdi",
        "pop rsi",
        "pop rbx",
        "pop rbp",
        "pop r10",
        // return value for a resumed jump, first argument for a fresh entry
        "mov rax, r8",
        "mov rcx, r8",
        "jmp r10",
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
    fn test_fresh_record_bounds() {
        let mut stack = vec![0u64; 1024];
        let size = stack.len() * 8;
        let top = unsafe { (stack.as_mut_ptr() as *mut u8).add(size) };
        let record = unsafe { make_record(top, size, entry as usize, finish as usize) };
        let r = unsafe { &*(record as *const Record) };

        assert_eq!(r.stack_base, top as u64);
        assert_eq!(r.stack_limit, stack.as_ptr() as u64);
        assert_eq!(r.rbx, finish as usize as u64);
        assert_eq!(r.rip, entry as usize as u64);
        // entry sees rsp + 8 on a 16 byte boundary with home space above
        assert_eq!((record as usize + 0x120 + 8) % 16, 0);
        assert!(record as usize + 0x128 + 0x20 <= top as usize);
    }
}
