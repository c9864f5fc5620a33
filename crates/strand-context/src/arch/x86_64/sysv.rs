//! System V AMD64
//!
//! A suspended context is the stack of its jump frame:
//!
//! ```text
//! +0x00  mxcsr (u32), x87 control word (u16), pad
//! +0x08  r12 r13 r14 r15 rbx rbp
//! +0x38  resume address
//! +0x40  return address of a fresh entry (termination trampoline)
//! ```

use core::arch::naked_asm;
use core::mem::size_of;

use super::{read_fpcw, read_mxcsr};
use crate::arch::place_record;
use crate::ContextHandle;

pub const RECORD_SIZE: usize = 0x48;

#[repr(C)]
struct Record {
    mxcsr: u32,
    fpcw: u16,
    _pad: u16,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rbx: u64,
    rbp: u64,
    rip: u64,
    ret: u64,
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
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
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
        "call rbx",
        "ud2",
    );
}

/// rdi = current slot, rsi = target record, rdx = transfer, cl = preserve_fpu
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
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "lea rsp, [rsp - 8]",
        "test cl, cl",
        "je 2f",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 4]",
        "2:",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "test cl, cl",
        "je 3f",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 4]",
        "3:",
        "lea rsp, [rsp + 8]",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "pop rbx",
        "pop rbp",
        "pop r8",
        // return value for a resumed jump, first argument for a fresh entry
        "mov rax, rdx",
        "mov rdi, rdx",
        "jmp r8",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::arch::asm;
    use std::cell::Cell;

    thread_local! {
        static ORIGIN: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
        static PEER: Cell<ContextHandle> = const { Cell::new(ContextHandle::null()) };
        static PEER_FPU: Cell<bool> = const { Cell::new(false) };
    }

    extern "C" fn entry(_: usize) {}

    extern "C" fn finish() -> ! {
        std::process::abort()
    }

    fn peer_stack() -> (Vec<u8>, *mut u8) {
        let mut mem = vec![0u8; 64 * 1024];
        let top = unsafe { mem.as_mut_ptr().add(mem.len()) };
        (mem, top)
    }

    fn write_mxcsr(value: u32) {
        unsafe {
            asm!("ldmxcsr dword ptr [{}]", in(reg) &value, options(nostack, preserves_flags));
        }
    }

    /// Switches back with r12-r15 holding junk
    extern "C" fn scrambler(_: usize) {
        loop {
            let slot = PEER.with(Cell::as_ptr);
            let origin = ORIGIN.with(Cell::get);
            unsafe {
                asm!(
                    "call {jump}",
                    jump = sym jump_context,
                    in("rdi") slot,
                    in("rsi") origin.as_ptr(),
                    in("rdx") 7usize,
                    in("rcx") 0usize,
                    inout("r12") 0xdead_0012usize => _,
                    inout("r13") 0xdead_0013usize => _,
                    inout("r14") 0xdead_0014usize => _,
                    inout("r15") 0xdead_0015usize => _,
                    clobber_abi("C"),
                );
            }
        }
    }

    /// Switches back with the rounding mode set to toward-zero
    extern "C" fn rounding_changer(_: usize) {
        loop {
            write_mxcsr(0x7f80);
            let slot = PEER.with(Cell::as_ptr);
            let origin = ORIGIN.with(Cell::get);
            let fpu = PEER_FPU.with(Cell::get);
            unsafe { jump_context(slot, origin, 0, fpu) };
        }
    }

    fn switch_to_peer(fpu: bool) -> usize {
        let origin = ORIGIN.with(Cell::as_ptr);
        let peer = PEER.with(Cell::get);
        PEER_FPU.with(|f| f.set(fpu));
        unsafe { jump_context(origin, peer, 0, fpu) }
    }

    #[test]
    fn test_fresh_record() {
        let mut stack = vec![0u64; 512];
        let top = unsafe { (stack.as_mut_ptr() as *mut u8).add(stack.len() * 8) };
        let record = unsafe { make_record(top, 4096, entry as usize, finish as usize) };
        let r = unsafe { &*(record as *const Record) };

        assert_eq!(record as usize + RECORD_SIZE, top as usize & !15);
        assert_eq!(r.rip, entry as usize as u64);
        assert_eq!(r.rbx, finish as usize as u64);
        assert_eq!(r.ret, trampoline as usize as u64);
        assert_eq!(r.rbp, 0);
        assert_eq!(r.mxcsr, read_mxcsr());
        // entry sees rsp + 8 on a 16 byte boundary, as after a call
        assert_eq!((record as usize + 0x40 + 8) % 16, 0);
    }

    #[test]
    fn test_callee_saved_registers_survive() {
        let (mem, top) = peer_stack();
        let ctx = unsafe { make_record(top, mem.len(), scrambler as usize, finish as usize) };
        PEER.with(|p| p.set(unsafe { ContextHandle::from_raw(ctx) }));

        for _ in 0..3 {
            let origin = ORIGIN.with(Cell::as_ptr);
            let peer = PEER.with(Cell::get);
            let (a, b, c, d, ret): (usize, usize, usize, usize, usize);
            unsafe {
                asm!(
                    "call {jump}",
                    jump = sym jump_context,
                    in("rdi") origin,
                    in("rsi") peer.as_ptr(),
                    in("rdx") 1usize,
                    in("rcx") 0usize,
                    inout("r12") 0x1212usize => a,
                    inout("r13") 0x1313usize => b,
                    inout("r14") 0x1414usize => c,
                    inout("r15") 0x1515usize => d,
                    lateout("rax") ret,
                    clobber_abi("C"),
                );
            }
            assert_eq!((a, b, c, d), (0x1212, 0x1313, 0x1414, 0x1515));
            assert_eq!(ret, 7);
        }
    }

    #[test]
    fn test_mxcsr_follows_flag() {
        let (mem, top) = peer_stack();
        let ctx = unsafe { make_record(top, mem.len(), rounding_changer as usize, finish as usize) };
        PEER.with(|p| p.set(unsafe { ContextHandle::from_raw(ctx) }));
        write_mxcsr(0x1f80);

        switch_to_peer(true);
        assert_eq!(read_mxcsr() & !0x3f, 0x1f80);

        switch_to_peer(false);
        assert_eq!(read_mxcsr() & !0x3f, 0x7f80);
        write_mxcsr(0x1f80);
    }
}
