extern crate may_gen;

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;

use may_gen::coroutine::State;
use may_gen::{generate, generate_fn, Builder, Error, Yielder};

// bumps the counter when dropped
struct Guard(Rc<Cell<u32>>);

impl Drop for Guard {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn yield_in_order() {
    let gen = generate(|y| {
        for i in 0..100 {
            y.yield_(i);
        }
    });

    let v: Vec<i32> = gen.into_iter().collect();
    assert_eq!(v, (0..100).collect::<Vec<_>>());
}

#[test]
#[allow(clippy::never_loop)]
fn break_runs_cleanup() {
    let outer = Rc::new(Cell::new(0));
    let inner = Rc::new(Cell::new(0));

    let gen = generate(|y| {
        let _outer = Guard(outer.clone());
        for i in 0.. {
            let _inner = Guard(inner.clone());
            y.yield_(i);
        }
    });

    for i in gen {
        assert_eq!(i, 0);
        break;
    }

    assert_eq!(outer.get(), 1);
    assert_eq!(inner.get(), 1);
}

#[test]
fn drop_unconsumed_value() {
    let dropped = Rc::new(Cell::new(0));

    let co = generate(|y| {
        y.yield_(Guard(dropped.clone()));
        y.yield_(Guard(dropped.clone()));
    })
    .start()
    .unwrap();

    assert!(co.has_value());
    assert_eq!(dropped.get(), 0);
    drop(co);
    // only the first value was ever created
    assert_eq!(dropped.get(), 1);
}

#[test]
fn panic_propagates_once() {
    let gen = generate(|y| {
        y.yield_(0);
        y.yield_(1);
        y.yield_(2);
        panic!("boom");
    });

    let mut co = gen.into_iter();
    assert_eq!(co.next(), Some(0));
    assert_eq!(co.next(), Some(1));
    assert_eq!(co.next(), Some(2));

    let err = panic::catch_unwind(AssertUnwindSafe(|| co.next())).unwrap_err();
    assert_eq!(err.downcast_ref::<&str>(), Some(&"boom"));

    assert_eq!(co.state(), State::Panicked);
    assert!(!co.has_value());
    assert_eq!(co.next(), None);
    assert!(matches!(co.advance(), Err(Error::Done)));
}

#[test]
fn panic_propagates_once_from_advance() {
    let mut co = generate(|y| {
        y.yield_(0);
        panic!("bang");
    })
    .start()
    .unwrap();
    assert_eq!(co.get(), Some(&0));

    let err = panic::catch_unwind(AssertUnwindSafe(|| co.advance())).unwrap_err();
    assert_eq!(err.downcast_ref::<&str>(), Some(&"bang"));

    assert_eq!(co.state(), State::Panicked);
    assert!(!co.has_value());
    assert!(matches!(co.advance(), Err(Error::Done)));
    assert!(matches!(co.advance(), Err(Error::Done)));
    assert_eq!(co.next(), None);
}

#[test]
fn panic_before_first_yield() {
    let gen = generate(|_y: &Yielder<u32>| panic!("early"));
    let err = panic::catch_unwind(AssertUnwindSafe(|| gen.start())).unwrap_err();
    assert_eq!(err.downcast_ref::<&str>(), Some(&"early"));
}

#[test]
fn empty_producer() {
    let co = generate(|_y: &Yielder<u32>| {}).start().unwrap();
    assert!(!co.has_value());
    assert!(co.is_done());
    assert_eq!(co.state(), State::Completed);
    assert_eq!(co.count(), 0);
}

#[test]
fn independent_instances() {
    let dropped = Rc::new(Cell::new(0));
    let gen = generate_fn(|y| {
        let _g = Guard(dropped.clone());
        for i in 0..5 {
            y.yield_(i);
        }
    });

    let mut a = gen.iter();
    let mut b = gen.iter();
    assert_eq!(a.next(), Some(0));
    assert_eq!(b.next(), Some(0));
    assert_eq!(b.next(), Some(1));

    drop(a);
    assert_eq!(dropped.get(), 1);

    assert_eq!(b.collect::<Vec<_>>(), [2, 3, 4]);
    assert_eq!(dropped.get(), 2);

    // and the generator can still be iterated again
    assert_eq!((&gen).into_iter().sum::<i32>(), 10);
}

#[test]
fn has_value_is_idempotent() {
    let mut co = generate(|y| {
        y.yield_(7);
        y.yield_(8);
    })
    .start()
    .unwrap();

    assert!(co.has_value());
    assert!(co.has_value());
    assert_eq!(co.get(), Some(&7));
    assert_eq!(co.get(), Some(&7));

    co.advance().unwrap();
    assert_eq!(co.get(), Some(&8));
    *co.get_mut().unwrap() += 1;
    assert_eq!(co.take_value(), Some(9));
    assert!(!co.has_value());
    assert_eq!(co.state(), State::Suspended);
}

#[test]
fn cursor_protocol() {
    let mut co = generate(|y| y.yield_from("abc".chars())).start().unwrap();

    let mut v = Vec::new();
    while co.has_value() {
        v.push(*co.get().unwrap());
        co.advance().unwrap();
    }

    assert_eq!(v, ['a', 'b', 'c']);
    assert_eq!(co.state(), State::Completed);
    assert!(matches!(co.advance(), Err(Error::Done)));
}

#[test]
fn borrow_local_data() {
    let words = vec!["hello", "generator"];
    let mut total = 0;

    let gen = generate(|y| {
        for w in &words {
            total += w.len();
            y.yield_(*w);
        }
    });
    let v: Vec<&str> = gen.into_iter().collect();

    assert_eq!(v, words);
    assert_eq!(total, 14);
}

fn walk(y: &Yielder<u32>, lo: u32, hi: u32) {
    if lo >= hi {
        return;
    }
    let mid = (lo + hi) / 2;
    walk(y, lo, mid);
    y.yield_(mid);
    walk(y, mid + 1, hi);
}

#[test]
fn yield_from_recursion() {
    let gen = generate(|y| walk(y, 0, 64));
    let v: Vec<u32> = gen.into_iter().collect();
    assert_eq!(v, (0..64).collect::<Vec<_>>());
}

#[test]
fn nested_generator() {
    let outer = generate(|y| {
        for v in generate(|y| y.yield_from(0..3)) {
            y.yield_(v * 10);
        }
    });

    let v: Vec<i32> = outer.into_iter().collect();
    assert_eq!(v, [0, 10, 20]);
}

#[test]
fn nested_generator_cancel() {
    let dropped = Rc::new(Cell::new(0));

    let outer = generate(|y| {
        let inner = generate(|y| {
            let _g = Guard(dropped.clone());
            y.yield_from(0..10)
        });
        for v in inner {
            y.yield_(v);
        }
    });

    let v: Vec<i32> = outer.into_iter().take(2).collect();
    assert_eq!(v, [0, 1]);
    assert_eq!(dropped.get(), 1);
}

#[test]
fn yield_from_wrong_producer() {
    let r = panic::catch_unwind(|| {
        let outer = generate(|y: &Yielder<i32>| {
            let inner = generate(|_: &Yielder<i32>| y.yield_(1));
            for _ in inner {}
        });
        for _ in outer {}
    });

    let err = r.unwrap_err();
    let msg = err.downcast_ref::<&str>().unwrap();
    assert!(msg.contains("outside of the producer"));
}

#[test]
fn cancel_dominates_yield() {
    let dropped = Rc::new(Cell::new(0));
    let reached = Rc::new(Cell::new(false));

    let mut co = generate(|y| {
        let _g = Guard(dropped.clone());
        let r = panic::catch_unwind(AssertUnwindSafe(|| {
            y.yield_(1);
            y.yield_(2);
        }));
        assert!(r.is_err());
        // told to cancel, this must not suspend again
        y.yield_(3);
        reached.set(true);
    })
    .start()
    .unwrap();

    assert_eq!(co.next(), Some(1));
    drop(co);

    assert_eq!(dropped.get(), 1);
    assert!(!reached.get());
}

#[test]
fn catch_cancel_and_return() {
    let dropped = Rc::new(Cell::new(0));
    let caught = Rc::new(Cell::new(false));

    let mut co = generate(|y| {
        let _g = Guard(dropped.clone());
        let r = panic::catch_unwind(AssertUnwindSafe(|| {
            let _inner = Guard(dropped.clone());
            y.yield_(1);
            y.yield_(2);
        }));
        caught.set(r.is_err());
        // swallow the unwind and return normally
    })
    .start()
    .unwrap();

    assert_eq!(co.next(), Some(1));
    drop(co);

    assert!(caught.get());
    assert_eq!(dropped.get(), 2);
}

#[test]
fn cancel_while_consumer_panics() {
    let dropped = Rc::new(Cell::new(0));

    let r = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut co = generate(|y| {
            let _g = Guard(dropped.clone());
            loop {
                y.yield_(1);
            }
        })
        .into_iter();
        assert_eq!(co.next(), Some(1));
        panic!("consumer failed");
    }));

    assert!(r.is_err());
    assert_eq!(dropped.get(), 1);
}

#[test]
fn builder_options() {
    let co = Builder::new()
        .name("numbers".to_owned())
        .stack_size(0x10000)
        .build(|y| y.yield_(1))
        .start()
        .unwrap();

    assert_eq!(co.name(), Some("numbers"));
    assert_eq!(co.stack_size(), 0x10000);
    let (size, used) = co.stack_usage();
    assert_eq!(size, 0x10000);
    assert!(used > 0);
    assert!(used < size);
}

#[test]
fn huge_stack_size_is_an_error() {
    let r = Builder::new()
        .stack_size(usize::MAX)
        .build(|y| y.yield_(1))
        .start();
    assert!(matches!(r, Err(Error::Stack(_))));
}

#[test]
fn run_on_other_thread() {
    let gen = generate(|y| y.yield_from(1..=10u32));
    let sum = thread::spawn(move || gen.into_iter().sum::<u32>())
        .join()
        .unwrap();
    assert_eq!(sum, 55);
}

#[test]
fn error_display() {
    assert_eq!(Error::Done.to_string(), "generator is done");
    let e: std::io::Error = Error::Done.into();
    assert_eq!(e.kind(), std::io::ErrorKind::Other);
}
