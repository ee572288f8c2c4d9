use std::fmt;
use std::marker::PhantomData;

use crate::config::config;
use crate::coroutine_impl::Coroutine;
use crate::error::Error;
use crate::yielder::Yielder;

////////////////////////////////////////////////////////////////////////////////
// Builder
////////////////////////////////////////////////////////////////////////////////

/// Generator factory, which can be used in order to configure the properties
/// of a new generator.
///
/// Methods can be chained on it in order to configure it.
///
/// The two configurations available are:
///
/// - [`name`]: specifies an associated name, used in log records
/// - [`stack_size`]: specifies the desired producer stack size in bytes
///
/// The [`build`] method takes ownership of the builder and the producer
/// routine and returns a [`Generator`].
///
/// # Examples
///
/// ```
/// use may_gen::Builder;
///
/// let squares = Builder::new()
///     .name("squares".to_owned())
///     .stack_size(0x8000)
///     .build(|y| {
///         for i in 0..4u32 {
///             y.yield_(i * i);
///         }
///     });
///
/// assert_eq!(squares.into_iter().collect::<Vec<_>>(), [0, 1, 4, 9]);
/// ```
///
/// [`name`]: Builder::name
/// [`stack_size`]: Builder::stack_size
/// [`build`]: Builder::build
#[derive(Default)]
pub struct Builder {
    // A name for the generator, for identification in log records
    name: Option<String>,
    // The size of the stack for every instance of the generator
    stack_size: Option<usize>,
}

impl Builder {
    /// Generates the base configuration for a generator, from which
    /// configuration methods can be chained.
    pub fn new() -> Builder {
        Builder {
            name: None,
            stack_size: None,
        }
    }

    /// Names the generator-to-be.
    pub fn name(mut self, name: String) -> Builder {
        self.name = Some(name);
        self
    }

    /// Sets the size of the producer stack, in bytes.
    ///
    /// The size is rounded up to whole pages. There is no runtime check for
    /// overflowing it: a producer that does touches the guard page and the
    /// process dies with a segmentation fault.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.stack_size = Some(size);
        self
    }

    /// Wrap the producer routine in a [`Generator`].
    pub fn build<T, F>(self, f: F) -> Generator<T, F>
    where
        F: FnOnce(&Yielder<T>),
    {
        Generator {
            f,
            name: self.name,
            stack_size: self.stack_size,
            _marker: PhantomData,
        }
    }

    /// Wrap a reusable producer routine in a [`Generator`].
    ///
    /// Same as [`build`], but a closure passed here is inferred as `Fn`, so
    /// the generator can be iterated by reference any number of times.
    ///
    /// [`build`]: Builder::build
    pub fn build_fn<T, F>(self, f: F) -> Generator<T, F>
    where
        F: Fn(&Yielder<T>),
    {
        self.build(f)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Generator
////////////////////////////////////////////////////////////////////////////////

/// A lazily evaluated sequence backed by a producer routine.
///
/// Every iteration starts a fresh [`Coroutine`] running the routine on its
/// own stack. Consuming the generator runs the routine once; a routine that
/// is `Fn` can also be iterated by reference, any number of times. Build such
/// a generator with [`generate_fn`] or [`Builder::build_fn`], a closure given
/// to [`generate`] is only inferred as `FnOnce`.
pub struct Generator<T, F> {
    f: F,
    name: Option<String>,
    stack_size: Option<usize>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Generator<T, F> {
    #[inline]
    fn stack_size(&self) -> usize {
        self.stack_size.unwrap_or_else(|| config().get_stack_size())
    }

    /// Gets the generator name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<T, F: FnOnce(&Yielder<T>)> Generator<T, F> {
    /// Start the routine, consuming the generator.
    ///
    /// The returned instance is already primed.
    ///
    /// # Errors
    ///
    /// fails if the producer stack can't be mapped or the contexts can't be
    /// captured
    pub fn start(self) -> Result<Coroutine<T, F>, Error> {
        let stack_size = self.stack_size();
        Coroutine::new(self.name, stack_size, self.f)
    }
}

impl<T, F: Fn(&Yielder<T>)> Generator<T, F> {
    /// Start a new instance that borrows the routine.
    ///
    /// # Errors
    ///
    /// same as [`Generator::start`]
    pub fn try_iter(&self) -> Result<Coroutine<T, &F>, Error> {
        Coroutine::new(self.name.clone(), self.stack_size(), &self.f)
    }

    /// Start a new instance that borrows the routine.
    ///
    /// # Panics
    ///
    /// panics if the instance can't be created, use [`try_iter`] to handle
    /// the failure instead
    ///
    /// [`try_iter`]: Generator::try_iter
    pub fn iter(&self) -> Coroutine<T, &F> {
        self.try_iter()
            .unwrap_or_else(|e| panic!("failed to start generator: {e}"))
    }
}

impl<T, F: FnOnce(&Yielder<T>)> IntoIterator for Generator<T, F> {
    type Item = T;
    type IntoIter = Coroutine<T, F>;

    fn into_iter(self) -> Coroutine<T, F> {
        self.start()
            .unwrap_or_else(|e| panic!("failed to start generator: {e}"))
    }
}

impl<'a, T, F: Fn(&Yielder<T>)> IntoIterator for &'a Generator<T, F> {
    type Item = T;
    type IntoIter = Coroutine<T, &'a F>;

    fn into_iter(self) -> Coroutine<T, &'a F> {
        self.iter()
    }
}

impl<T, F> fmt::Debug for Generator<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.name)
            .field("stack_size", &self.stack_size)
            .finish_non_exhaustive()
    }
}

/// Wrap a producer routine into a [`Generator`] with default options.
///
/// This is the same as `Builder::new().build(f)`.
///
/// # Examples
///
/// ```
/// let evens = may_gen::generate(|y| {
///     let mut i = 0;
///     loop {
///         y.yield_(i);
///         i += 2;
///     }
/// });
///
/// let v: Vec<u64> = evens.into_iter().take(3).collect();
/// assert_eq!(v, [0, 2, 4]);
/// ```
pub fn generate<T, F>(f: F) -> Generator<T, F>
where
    F: FnOnce(&Yielder<T>),
{
    Builder::new().build(f)
}

/// Wrap a reusable producer routine into a [`Generator`] with default options.
///
/// This is the same as `Builder::new().build_fn(f)`. Every iteration by
/// reference starts an independent instance.
///
/// # Examples
///
/// ```
/// let digits = may_gen::generate_fn(|y| y.yield_from(1..=3));
///
/// assert_eq!(digits.iter().sum::<i32>(), 6);
/// assert_eq!((&digits).into_iter().max(), Some(3));
/// ```
pub fn generate_fn<T, F>(f: F) -> Generator<T, F>
where
    F: Fn(&Yielder<T>),
{
    Builder::new().build_fn(f)
}
