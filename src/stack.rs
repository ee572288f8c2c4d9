//! Fixed size generator stack
//!
//! The memory map looks like this, from low address to high address:
//!
//! ```text
//! | guard page | producer stack ... | exit page |
//! ```
//!
//! The producer stack grows down towards the guard page, so an overflow
//! faults instead of scribbling over the heap. The exit page is the stack
//! of the exit trampoline, which only runs after the producer returned.

use std::ffi::c_void;
use std::io;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{mmap_anonymous, mprotect, munmap, MapFlags, ProtFlags};

fn page_size() -> usize {
    // sysconf can't fail for _SC_PAGESIZE, fall back to 4k anyway
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        4096
    } else {
        size as usize
    }
}

pub(crate) struct Stack {
    base: NonNull<c_void>,
    // total mapped length, guard and exit page included
    len: usize,
    page: usize,
    // usable producer stack size in bytes
    size: usize,
}

impl Stack {
    /// map a new stack with at least `size` bytes for the producer
    pub fn new(size: usize) -> io::Result<Stack> {
        let page = page_size();
        let size = size
            .max(1)
            .div_ceil(page)
            .checked_mul(page)
            .ok_or(io::ErrorKind::InvalidInput)?;
        let len = size
            .checked_add(2 * page)
            .and_then(NonZeroUsize::new)
            .ok_or(io::ErrorKind::InvalidInput)?;

        let base = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_STACK,
            )?
        };

        if let Err(e) = unsafe { mprotect(base, page, ProtFlags::PROT_NONE) } {
            unsafe { munmap(base, len.get()).ok() };
            return Err(e.into());
        }

        Ok(Stack {
            base,
            len: len.get(),
            page,
            size,
        })
    }

    /// usable producer stack size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// lowest address of the producer stack, just above the guard page
    #[inline]
    pub fn producer(&self) -> *mut c_void {
        unsafe { self.base.as_ptr().cast::<u8>().add(self.page).cast() }
    }

    /// lowest address of the exit page
    #[inline]
    pub fn exit(&self) -> *mut c_void {
        unsafe { self.base.as_ptr().cast::<u8>().add(self.page + self.size).cast() }
    }

    #[inline]
    pub fn exit_size(&self) -> usize {
        self.page
    }

    /// how many bytes of the producer stack were ever touched
    ///
    /// fresh anonymous pages are zero filled, so the first non zero word
    /// counting up from the bottom marks the deepest frame
    pub fn used(&self) -> usize {
        let words = self.size / std::mem::size_of::<usize>();
        let bottom = self.producer() as *const usize;
        let untouched = (0..words)
            .position(|i| unsafe { bottom.add(i).read_volatile() } != 0)
            .unwrap_or(words);
        (words - untouched) * std::mem::size_of::<usize>()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.base, self.len) } {
            error!("failed to unmap generator stack: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rounds_up_to_page() {
        let page = page_size();
        let stack = Stack::new(page + 1).unwrap();
        assert_eq!(stack.size(), 2 * page);
        assert_eq!(stack.exit_size(), page);
        assert_eq!(stack.exit() as usize - stack.producer() as usize, 2 * page);
    }

    #[test]
    fn zero_size_gets_one_page() {
        let stack = Stack::new(0).unwrap();
        assert_eq!(stack.size(), page_size());
    }

    #[test]
    fn huge_size_is_rejected() {
        let e = Stack::new(usize::MAX).err().unwrap();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e = Stack::new(usize::MAX - page_size()).err().unwrap();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn fresh_stack_is_untouched() {
        let stack = Stack::new(0x4000).unwrap();
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn used_tracks_deepest_write() {
        let stack = Stack::new(0x4000).unwrap();
        let size = stack.size();
        let bottom = stack.producer() as *mut u8;
        unsafe { bottom.add(size - 100).write(1) };
        assert!(stack.used() >= 100);
        assert!(stack.used() <= 104);
        unsafe { bottom.add(8).write(1) };
        assert_eq!(stack.used(), size - 8);
    }
}
