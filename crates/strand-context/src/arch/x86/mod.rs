//! 32-bit x86 backends (cdecl)

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
