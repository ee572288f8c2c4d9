//! # Rust Stackful Generator Library
//!
//! `may_gen` turns a plain producer routine into a lazily evaluated
//! sequence. The routine runs on its own stack and suspends in the middle of
//! whatever it is doing each time it yields a value, so loops, nested scopes
//! and local resources survive across yields without writing a state machine.
//!
//! ## Features
//!
//! * Stackful generator implementation based on glibc `ucontext`
//! * Standard `Iterator` / `IntoIterator` integration
//! * Fixed size producer stack with a guard page, configurable per generator
//! * Early drop of an unfinished sequence unwinds the producer, so every
//!   local it owns is dropped before the stack is released
//! * Producer panics propagate to the consumer at the step that resumed it
//!
//! ## Example
//!
//! ```
//! use may_gen::generate;
//!
//! let fib = generate(|y| {
//!     let (mut a, mut b) = (0u64, 1u64);
//!     while a < 100 {
//!         y.yield_(a);
//!         std::mem::swap(&mut a, &mut b);
//!         b += a;
//!     }
//! });
//!
//! let v: Vec<u64> = fib.into_iter().collect();
//! assert_eq!(v, [0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89]);
//! ```
//!
//! ## Stack size
//!
//! Each instance reserves a fixed stack, see [`Config::set_stack_size`] and
//! [`Builder::stack_size`]. There is no runtime check for overflow; a
//! producer that needs more than it got hits the guard page and the process
//! is killed by `SIGSEGV`.
//!

// #![deny(missing_docs)]

#[macro_use]
#[doc(hidden)]
extern crate log;

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
        mod context;
        mod stack;
    } else {
        compile_error!("may_gen relies on glibc ucontext, only linux-gnu targets are supported");
    }
}

mod cancel;
mod config;
mod coroutine_impl;
mod error;
mod generator;
mod yielder;

pub mod coroutine;
pub use config::{config, Config};
pub use error::Error;
pub use generator::{generate, generate_fn, Builder, Generator};
pub use yielder::Yielder;
