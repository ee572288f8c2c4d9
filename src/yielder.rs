use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::ptr;

use crate::cancel::trigger_cancel_panic;
use crate::context::Context;

thread_local! {
    // the handle whose producer currently runs on this thread
    static RUNNING: Cell<*const ()> = const { Cell::new(ptr::null()) };
}

/// The handle a producer uses to hand values to its consumer.
///
/// A producer only ever sees `&Yielder<T>`, the handle is owned by the
/// coroutine instance together with its contexts and value slot.
pub struct Yielder<T> {
    slot: UnsafeCell<Option<T>>,
    cancel: Cell<bool>,
    pub(crate) consumer: Context,
    pub(crate) producer: Context,
}

impl<T> Yielder<T> {
    pub(crate) fn new() -> Self {
        Yielder {
            slot: UnsafeCell::new(None),
            cancel: Cell::new(false),
            consumer: Context::empty(),
            producer: Context::empty(),
        }
    }

    /// hand `value` to the consumer and suspend until the next advance
    ///
    /// if the consumer drops the sequence while suspended here, this call
    /// does not return: it unwinds the producer so its locals are dropped.
    ///
    /// # Panics
    ///
    /// panics if called from any context other than this handle's producer
    pub fn yield_(&self, value: T) {
        // once told to cancel, every further yield goes on unwinding
        if self.cancel.get() {
            trigger_cancel_panic();
        }
        assert!(
            self.is_running(),
            "yield_ called outside of the producer that owns this Yielder"
        );

        unsafe { *self.slot.get() = Some(value) };
        unsafe { Context::swap(&self.producer, &self.consumer) };

        if self.cancel.get() {
            trigger_cancel_panic();
        }
    }

    /// yield every item of `iter` in order
    pub fn yield_from<I>(&self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for v in iter {
            self.yield_(v);
        }
    }

    #[inline]
    fn is_running(&self) -> bool {
        RUNNING.with(|r| r.get() == self as *const _ as *const ())
    }

    /// mark this handle's producer as the running one, return the previous
    #[inline]
    pub(crate) fn enter(&self) -> *const () {
        RUNNING.with(|r| r.replace(self as *const _ as *const ()))
    }

    #[inline]
    pub(crate) fn leave(prev: *const ()) {
        RUNNING.with(|r| r.set(prev));
    }

    #[inline]
    pub(crate) fn set_cancel(&self) {
        self.cancel.set(true);
    }

    #[inline]
    pub(crate) fn is_canceled(&self) -> bool {
        self.cancel.get()
    }

    // the slot accessors below are only sound while the producer is
    // suspended, or from the producer itself while it runs

    #[inline]
    pub(crate) fn slot(&self) -> Option<&T> {
        unsafe { (*self.slot.get()).as_ref() }
    }

    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) fn slot_mut(&self) -> Option<&mut T> {
        unsafe { (*self.slot.get()).as_mut() }
    }

    #[inline]
    pub(crate) fn take(&self) -> Option<T> {
        unsafe { (*self.slot.get()).take() }
    }

    #[inline]
    pub(crate) fn clear(&self) {
        drop(self.take());
    }
}

impl<T> fmt::Debug for Yielder<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Yielder")
            .field("canceled", &self.cancel.get())
            .finish_non_exhaustive()
    }
}
