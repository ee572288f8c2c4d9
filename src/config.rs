//! `may_gen` Configuration interface
//!

use std::sync::atomic::{AtomicUsize, Ordering};

// default stack size, in bytes
// the panic and unwind machinery runs on the producer stack,
// so don't go much lower than this
const DEFAULT_STACK_SIZE: usize = 0x4_0000;

static STACK_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_STACK_SIZE);

/// `may_gen` Configuration type
pub struct Config;

/// get the may_gen configuration instance
pub fn config() -> Config {
    Config
}

/// the config should be called before any generator is started
///
/// generators already started keep the stack they were created with
impl Config {
    /// set default generator stack size in bytes
    ///
    /// if you pass 0 to it, will use internal default
    pub fn set_stack_size(&self, size: usize) -> &Self {
        info!("set stack size={:?}", size);
        let size = if size == 0 { DEFAULT_STACK_SIZE } else { size };
        STACK_SIZE.store(size, Ordering::Release);
        self
    }

    /// get the default generator stack size
    pub fn get_stack_size(&self) -> usize {
        STACK_SIZE.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_restores_default() {
        let old = config().get_stack_size();
        config().set_stack_size(0);
        assert_eq!(config().get_stack_size(), DEFAULT_STACK_SIZE);
        config().set_stack_size(old);
        assert_eq!(config().get_stack_size(), old);
    }
}
