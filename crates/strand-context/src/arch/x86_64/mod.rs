//! x86_64 backends
//!
//! System V (Linux, macOS and the BSDs) and Microsoft x64 differ in argument
//! registers, callee-saved set and thread bookkeeping, so each gets its own
//! record and switch routine.

use core::arch::asm;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub use self::windows::*;
    } else {
        mod sysv;
        pub use self::sysv::*;
    }
}

/// Current SSE control/status register
#[inline]
pub(crate) fn read_mxcsr() -> u32 {
    let mut mxcsr: u32 = 0;
    unsafe {
        asm!(
            "stmxcsr dword ptr [{}]",
            in(reg) &mut mxcsr,
            options(nostack, preserves_flags),
        );
    }
    mxcsr
}

/// Current x87 control word
#[inline]
pub(crate) fn read_fpcw() -> u16 {
    let mut cw: u16 = 0;
    unsafe {
        asm!(
            "fnstcw word ptr [{}]",
            in(reg) &mut cw,
            options(nostack, preserves_flags),
        );
    }
    cw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_words_have_exceptions_masked() {
        // Rust runtimes start with every floating point exception masked
        assert_eq!(read_mxcsr() & 0x1f80, 0x1f80);
        assert_eq!(read_fpcw() & 0x3f, 0x3f);
    }
}
