//! Saved machine state of one side of a generator
//!
//! A thin wrapper around glibc `ucontext_t`. A context must not move once it
//! has been captured, `uc_mcontext` points back into the struct itself.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::io;
use std::mem;
use std::process;
use std::ptr;

/// the signature every context entry has
///
/// `makecontext` only passes `int` sized arguments, so the data pointer is
/// handed over as two 32 bit halves
pub(crate) type EntryFn = extern "C" fn(u32, u32);

pub(crate) struct Context {
    uc: UnsafeCell<libc::ucontext_t>,
}

impl Context {
    pub fn empty() -> Self {
        Context {
            uc: UnsafeCell::new(unsafe { mem::zeroed() }),
        }
    }

    /// initialize the context so that switching to it runs `entry(data)` on
    /// the given stack, when `entry` returns control goes to `link`
    ///
    /// # Safety
    ///
    /// the context and `link` must stay at the same address for as long as
    /// the context may be switched to, the stack must outlive the context
    pub unsafe fn prepare(
        &self,
        stack: *mut c_void,
        size: usize,
        link: Option<&Context>,
        entry: EntryFn,
        data: *const (),
    ) -> io::Result<()> {
        let uc = self.uc.get();
        if libc::getcontext(uc) != 0 {
            return Err(io::Error::last_os_error());
        }
        (*uc).uc_stack.ss_sp = stack;
        (*uc).uc_stack.ss_size = size;
        (*uc).uc_stack.ss_flags = 0;
        (*uc).uc_link = link.map_or(ptr::null_mut(), |c| c.uc.get());

        let addr = data as usize as u64;
        let entry: extern "C" fn() = mem::transmute::<EntryFn, extern "C" fn()>(entry);
        libc::makecontext(uc, entry, 2, (addr >> 32) as u32, addr as u32);
        Ok(())
    }

    /// save the running state into `from` and resume `to`
    ///
    /// returns when some other context switches back to `from`
    ///
    /// # Safety
    ///
    /// `to` must be a prepared or previously saved context, and nothing else
    /// may run on the stack `to` was saved from
    #[inline]
    pub unsafe fn swap(from: &Context, to: &Context) {
        if libc::swapcontext(from.uc.get(), to.uc.get()) != 0 {
            fatal("swapcontext");
        }
    }

    /// abandon the running state and resume `to`
    ///
    /// # Safety
    ///
    /// same as [`Context::swap`], and the current stack must hold nothing
    /// that still needs to be dropped
    #[inline]
    pub unsafe fn set(to: &Context) -> ! {
        libc::setcontext(to.uc.get());
        fatal("setcontext")
    }
}

/// rebuild the pointer handed to an [`EntryFn`]
#[inline]
pub(crate) fn entry_data<T>(hi: u32, lo: u32) -> *const T {
    (((hi as u64) << 32) | lo as u64) as usize as *const T
}

#[cold]
fn fatal(op: &str) -> ! {
    let e = io::Error::last_os_error();
    error!("{} failed: {}, can't continue", op, e);
    eprintln!("{} failed: {}", op, e);
    process::abort()
}
