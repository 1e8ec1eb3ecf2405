//! Drives a single future to completion on the calling thread without an
//! ambient Tokio runtime.
//!
//! The corpus's own `blocking/wait.rs` wasn't among the retrieved example
//! files, so this is reconstructed from the well-known park/unpark pattern
//! the `reqwest`/`rquest` family blocking clients use (see DESIGN.md):
//! the waker unparks whichever thread is polling, and that thread parks
//! itself (optionally with a deadline) between polls instead of spinning.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

struct ThreadWaker(Thread);

impl Wake for ThreadWaker {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

/// The outcome of [`timeout`]: either the future resolved, or `deadline`
/// elapsed first while it was still pending.
pub(crate) enum Outcome<T> {
    Ready(T),
    TimedOut,
}

/// Polls `fut` to completion, parking the current thread between polls.
/// With `deadline: None` this blocks indefinitely, the same as
/// `futures::executor::block_on`; with `Some(d)` it gives up and returns
/// [`Outcome::TimedOut`] once `d` has elapsed without the future resolving.
///
/// `fut` itself is *not* canceled on timeout — the caller drops it, which
/// is enough for the futures this module drives (an `AsyncCall::wait()` or
/// a response body read), since both sides have their own independent
/// cancellation signal (the dispatcher's `Call`, the body stream's drop).
pub(crate) fn timeout<F: Future>(fut: F, deadline: Option<Duration>) -> Outcome<F::Output> {
    let mut fut = Box::pin(fut);
    let waker = Waker::from(Arc::new(ThreadWaker(thread::current())));
    let mut cx = Context::from_waker(&waker);
    let deadline = deadline.map(|d| Instant::now() + d);

    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return Outcome::Ready(value),
            Poll::Pending => match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Outcome::TimedOut;
                    }
                    thread::park_timeout(deadline - now);
                }
                None => thread::park(),
            },
        }
    }
}
