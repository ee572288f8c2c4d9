use std::any::Any;
use std::panic;
use std::thread;

// the cancel is implemented by relaying a Cancel unwind into the
// suspended producer. the type is private, so a producer that catches
// the unwind can neither match on it nor tell it from a foreign payload
pub(crate) struct Cancel;

// resume_unwind doesn't run the panic hook, so nothing is printed
#[inline]
pub(crate) fn trigger_cancel_panic() -> ! {
    if thread::panicking() {
        warn!("trigger cancel unwind while the thread is already panicking");
    }
    panic::resume_unwind(Box::new(Cancel))
}

#[inline]
pub(crate) fn is_cancel(payload: &(dyn Any + Send)) -> bool {
    payload.is::<Cancel>()
}
