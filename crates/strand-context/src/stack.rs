//! Stack memory for contexts
//!
//! A [`Stack`] owns one contiguous read/write region. There are no guard
//! pages: overflowing a context's stack is a caller contract violation, so
//! size stacks for the deepest call chain the entry routine can reach.

use strand_core::constants::{MIN_STACK_SIZE, PAGE_SIZE};
use strand_core::{MemoryError, StrandResult};

/// Owned stack region, released on drop
pub struct Stack {
    base: *mut u8,
    size: usize,
}

// The region is plain memory; whoever holds the Stack decides who runs on it.
unsafe impl Send for Stack {}

impl Stack {
    /// Allocate a stack of at least `size` bytes, rounded up to whole pages
    pub fn new(size: usize) -> StrandResult<Stack> {
        if size < MIN_STACK_SIZE {
            return Err(MemoryError::StackTooSmall { size, min: MIN_STACK_SIZE }.into());
        }
        let size = size
            .checked_add(PAGE_SIZE - 1)
            .ok_or(MemoryError::SizeOverflow)?
            & !(PAGE_SIZE - 1);

        let base = sys::allocate(size)?;
        Ok(Stack { base, size })
    }

    /// Lowest address of the region
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        self.base
    }

    /// One past the highest address; what `make_context` expects
    #[inline]
    pub fn top(&self) -> *mut u8 {
        unsafe { self.base.add(self.size) }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `addr` lies inside the region
    #[inline]
    pub fn contains(&self, addr: *const u8) -> bool {
        let addr = addr as usize;
        addr >= self.base as usize && addr < self.top() as usize
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        if let Err(e) = unsafe { sys::release(self.base, self.size) } {
            strand_core::kwarn!("failed to release stack at {:p}: {}", self.base, e);
        }
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.base)
            .field("size", &self.size)
            .finish()
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod sys {
            use strand_core::MemoryError;

            fn errno() -> i32 {
                std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
            }

            pub(super) fn allocate(size: usize) -> Result<*mut u8, MemoryError> {
                let base = unsafe {
                    libc::mmap(
                        std::ptr::null_mut(),
                        size,
                        libc::PROT_READ | libc::PROT_WRITE,
                        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                        -1,
                        0,
                    )
                };
                if base == libc::MAP_FAILED {
                    return Err(MemoryError::AllocationFailed(errno()));
                }
                Ok(base as *mut u8)
            }

            pub(super) unsafe fn release(base: *mut u8, size: usize) -> Result<(), MemoryError> {
                if libc::munmap(base as *mut libc::c_void, size) != 0 {
                    return Err(MemoryError::ReleaseFailed(errno()));
                }
                Ok(())
            }
        }
    } else {
        mod sys {
            use std::alloc::{alloc, dealloc, Layout};
            use strand_core::constants::PAGE_SIZE;
            use strand_core::MemoryError;

            fn layout(size: usize) -> Result<Layout, MemoryError> {
                Layout::from_size_align(size, PAGE_SIZE).map_err(|_| MemoryError::SizeOverflow)
            }

            pub(super) fn allocate(size: usize) -> Result<*mut u8, MemoryError> {
                let base = unsafe { alloc(layout(size)?) };
                if base.is_null() {
                    return Err(MemoryError::AllocationFailed(0));
                }
                Ok(base)
            }

            pub(super) unsafe fn release(base: *mut u8, size: usize) -> Result<(), MemoryError> {
                dealloc(base, layout(size)?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::StrandError;

    #[test]
    fn test_rounds_to_pages() {
        let stack = Stack::new(MIN_STACK_SIZE + 1).unwrap();
        assert_eq!(stack.size(), MIN_STACK_SIZE + PAGE_SIZE);
        assert_eq!(stack.bottom() as usize % PAGE_SIZE, 0);
        assert_eq!(stack.top() as usize - stack.bottom() as usize, stack.size());
    }

    #[test]
    fn test_rejects_tiny_stack() {
        let err = Stack::new(1024).unwrap_err();
        assert_eq!(
            err,
            StrandError::Memory(MemoryError::StackTooSmall { size: 1024, min: MIN_STACK_SIZE })
        );
    }

    #[test]
    fn test_contains_and_writable() {
        let stack = Stack::new(MIN_STACK_SIZE).unwrap();
        let last = unsafe { stack.top().sub(1) };
        unsafe {
            stack.bottom().write(0xaa);
            last.write(0x55);
        }
        assert!(stack.contains(stack.bottom()));
        assert!(stack.contains(last));
        assert!(!stack.contains(stack.top()));
    }
}
