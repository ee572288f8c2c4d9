// re-export coroutine interface
pub use crate::coroutine_impl::{Coroutine, State};
pub use crate::yielder::Yielder;
