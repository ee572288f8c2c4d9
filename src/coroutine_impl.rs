use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::thread;

use crate::cancel::is_cancel;
use crate::context::{entry_data, Context};
use crate::error::Error;
use crate::stack::Stack;
use crate::yielder::Yielder;

/// Execution state of a [`Coroutine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// contexts are wired but the producer never ran
    Created,
    /// the producer is running
    Running,
    /// the producer is parked at a yield point
    Suspended,
    /// the producer returned normally
    Completed,
    /// the producer was unwound because the instance was dropped early
    Cancelled,
    /// the producer panicked, the panic was passed on to the consumer
    Panicked,
}

impl State {
    /// the producer can't be resumed any more
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, State::Completed | State::Cancelled | State::Panicked)
    }
}

/// /////////////////////////////////////////////////////////////////////////////
/// Coroutine internals
/// /////////////////////////////////////////////////////////////////////////////

// boxed so that the contexts never move after they are captured
struct Inner<T, F> {
    yielder: Yielder<T>,
    exit: Context,
    func: Cell<Option<F>>,
    panic: Cell<Option<Box<dyn Any + Send>>>,
    state: Cell<State>,
    name: Option<String>,
    // dropped last, after everything that could live on it is gone
    stack: Stack,
}

impl<T, F> Inner<T, F> {
    #[inline]
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

impl<T, F: FnOnce(&Yielder<T>)> Inner<T, F> {
    // runs on the producer stack
    fn run(&self) {
        if let Some(func) = self.func.take() {
            match panic::catch_unwind(AssertUnwindSafe(|| func(&self.yielder))) {
                Ok(()) => trace!("generator {} completed", self.name()),
                Err(e) if is_cancel(&*e) => trace!("generator {} cancelled", self.name()),
                Err(e) => {
                    trace!("generator {} panicked", self.name());
                    self.panic.set(Some(e));
                }
            }
        }
        self.yielder.clear();
    }
}

// entry trampoline, the first frame of every producer stack
extern "C" fn coroutine_entry<T, F: FnOnce(&Yielder<T>)>(hi: u32, lo: u32) {
    let inner = unsafe { &*entry_data::<Inner<T, F>>(hi, lo) };
    inner.run();
    // returning here lands in the exit context through uc_link
}

// exit trampoline, runs on the exit page once the producer stack is unwound
extern "C" fn coroutine_exit<T, F>(hi: u32, lo: u32) {
    let inner = unsafe { &*entry_data::<Inner<T, F>>(hi, lo) };
    let panicked = {
        let panic = inner.panic.take();
        let panicked = panic.is_some();
        inner.panic.set(panic);
        panicked
    };
    let state = if panicked {
        State::Panicked
    } else if inner.yielder.is_canceled() {
        State::Cancelled
    } else {
        State::Completed
    };
    inner.state.set(state);
    unsafe { Context::set(&inner.yielder.consumer) }
}

/// /////////////////////////////////////////////////////////////////////////////
/// Coroutine
/// /////////////////////////////////////////////////////////////////////////////

/// A running generator instance.
///
/// Owns the producer stack and the contexts. It is primed on creation, so the
/// first value, if any, is ready before the first call to [`next`].
///
/// Dropping an instance whose producer hasn't finished unwinds the producer
/// first, so everything it owns is dropped before the stack is released.
///
/// [`next`]: Iterator::next
pub struct Coroutine<T, F> {
    inner: NonNull<Inner<T, F>>,
    // we own an Inner, and it must stay on this thread
    _marker: PhantomData<(Box<Inner<T, F>>, *mut ())>,
}

impl<T, F: FnOnce(&Yielder<T>)> Coroutine<T, F> {
    pub(crate) fn new(name: Option<String>, stack_size: usize, f: F) -> Result<Self, Error> {
        let stack = Stack::new(stack_size).map_err(Error::Stack)?;
        let inner = Box::new(Inner {
            yielder: Yielder::new(),
            exit: Context::empty(),
            func: Cell::new(Some(f)),
            panic: Cell::new(None),
            state: Cell::new(State::Created),
            name,
            stack,
        });
        let mut co = Coroutine {
            inner: NonNull::from(Box::leak(inner)),
            _marker: PhantomData,
        };

        let inner = co.inner();
        let data = co.inner.as_ptr() as *const ();
        unsafe {
            inner
                .yielder
                .producer
                .prepare(
                    inner.stack.producer(),
                    inner.stack.size(),
                    Some(&inner.exit),
                    coroutine_entry::<T, F>,
                    data,
                )
                .map_err(Error::Context)?;
            inner
                .exit
                .prepare(
                    inner.stack.exit(),
                    inner.stack.exit_size(),
                    None,
                    coroutine_exit::<T, F>,
                    data,
                )
                .map_err(Error::Context)?;
        }
        trace!(
            "generator {} created, stack size = {}",
            inner.name(),
            inner.stack.size()
        );

        // prime, the first value is ready before anyone asks
        co.resume();
        Ok(co)
    }
}

impl<T, F> Coroutine<T, F> {
    #[inline]
    fn inner(&self) -> &Inner<T, F> {
        unsafe { self.inner.as_ref() }
    }

    // switch into the producer and wait for it to yield or finish
    fn switch_in(&mut self) {
        let inner = self.inner();
        // the slot is always empty while the producer runs
        inner.yielder.clear();
        inner.state.set(State::Running);

        let prev = inner.yielder.enter();
        unsafe { Context::swap(&inner.yielder.consumer, &inner.yielder.producer) };
        Yielder::<T>::leave(prev);

        if inner.state.get() == State::Running {
            inner.state.set(State::Suspended);
        }
    }

    // switch in, and pass a producer panic on to the consumer
    fn resume(&mut self) {
        self.switch_in();
        if let Some(panic) = self.inner().panic.take() {
            panic::resume_unwind(panic);
        }
    }

    // unwind a suspended producer
    fn cancel(&mut self) {
        let inner = self.inner();
        if thread::panicking() {
            warn!(
                "generator {} is cancelled while the thread is panicking",
                inner.name()
            );
        }
        trace!("generator {} dropped before completion, cancel it", inner.name());
        inner.yielder.clear();
        inner.yielder.set_cancel();
        self.switch_in();
        if self.inner().panic.take().is_some() {
            error!(
                "generator {} panicked while being cancelled, the panic is discarded",
                self.inner().name()
            );
        }
    }

    /// resume the producer until it yields the next value or finishes
    ///
    /// the previous value, if still in the slot, is dropped. a panic in the
    /// producer is propagated from this call, after which the instance is
    /// finished.
    ///
    /// # Errors
    ///
    /// returns [`Error::Done`] if the producer already finished
    pub fn advance(&mut self) -> Result<(), Error> {
        if self.is_done() {
            return Err(Error::Done);
        }
        self.resume();
        Ok(())
    }

    /// true if a yielded value is waiting in the slot
    #[inline]
    pub fn has_value(&self) -> bool {
        self.inner().yielder.slot().is_some()
    }

    /// the most recently yielded value, if it is still in the slot
    #[inline]
    pub fn get(&self) -> Option<&T> {
        self.inner().yielder.slot()
    }

    /// mutable access to the most recently yielded value
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.inner().yielder.slot_mut()
    }

    /// move the most recently yielded value out of the slot
    #[inline]
    pub fn take_value(&mut self) -> Option<T> {
        self.inner().yielder.take()
    }

    /// true if the producer can't produce anything more
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state().is_finished()
    }

    /// Gets the current execution state.
    #[inline]
    pub fn state(&self) -> State {
        self.inner().state.get()
    }

    /// Gets the generator name.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.inner().name.as_deref()
    }

    /// Gets the producer stack size in bytes.
    #[inline]
    pub fn stack_size(&self) -> usize {
        self.inner().stack.size()
    }

    /// return `(size, used)` of the producer stack in bytes
    pub fn stack_usage(&self) -> (usize, usize) {
        let stack = &self.inner().stack;
        (stack.size(), stack.used())
    }
}

impl<T, F> Iterator for Coroutine<T, F> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if !self.has_value() {
            if self.is_done() {
                return None;
            }
            self.resume();
        }
        self.take_value()
    }
}

impl<T, F> FusedIterator for Coroutine<T, F> {}

impl<T, F> Drop for Coroutine<T, F> {
    fn drop(&mut self) {
        if self.state() == State::Suspended {
            self.cancel();
        }

        let state = self.state();
        if state != State::Created && !state.is_finished() {
            // a producer that keeps running after cancel, locals may still
            // point into the stack so the memory can't be reused
            error!(
                "generator {} not unwound (state = {:?}), leak it",
                self.inner().name(),
                state
            );
            return;
        }

        if log_enabled!(log::Level::Debug) {
            let (size, used) = self.stack_usage();
            debug!(
                "generator {}: stack size = {}, used size = {}",
                self.inner().name(),
                size,
                used
            );
            if used == size {
                warn!("stack fully used, may overflow, size={}", size);
            }
        }

        drop(unsafe { Box::from_raw(self.inner.as_ptr()) });
    }
}

impl<T, F> fmt::Debug for Coroutine<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .finish()
    }
}
