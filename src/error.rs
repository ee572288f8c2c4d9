use std::error;
use std::fmt;
use std::io;

/// Errors reported by generator construction and stepping.
#[derive(Debug)]
pub enum Error {
    /// the producer already finished, it can't be advanced again
    Done,
    /// failed to map or protect the producer stack
    Stack(io::Error),
    /// failed to capture an execution context
    Context(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Done => write!(f, "generator is done"),
            Error::Stack(e) => write!(f, "generator stack error: {e}"),
            Error::Context(e) => write!(f, "generator context error: {e}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Done => None,
            Error::Stack(e) | Error::Context(e) => Some(e),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Done => io::Error::new(io::ErrorKind::Other, "generator is done"),
            Error::Stack(e) | Error::Context(e) => e,
        }
    }
}
