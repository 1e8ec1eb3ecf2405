//! The call dispatcher (C10, spec.md §4.9): concurrency limits, async
//! enqueueing, and cancellation. Grounded on OkHttp's `Dispatcher` for the
//! three-queue/limit shape, and on `penumbra-x-rquest/src/blocking/client.rs`'s
//! dedicated-runtime-thread pattern for the [`Scheduler`] abstraction that
//! lets the same dispatcher core serve both the async [`crate::Client`]
//! and [`crate::blocking::Client`].

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tracing::trace;

use crate::response::Response;
use crate::{Error, Result};

/// How the dispatcher actually runs a call's future. `TokioScheduler`
/// spawns onto whichever Tokio runtime is current, the scheduler an async
/// [`crate::Client`] uses; [`crate::blocking::Client`] supplies one backed
/// by its own dedicated background runtime so sync callers never need a
/// runtime of their own.
pub trait Scheduler: Send + Sync + std::fmt::Debug {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>);
}

/// Spawns onto the ambient Tokio runtime — the default for async calls.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn spawn(&self, future: Pin<Box<dyn Future<Output = ()> + Send>>) {
        tokio::spawn(future);
    }
}

/// A handle to one dispatched call, shared between the dispatcher's
/// bookkeeping and whatever task is actually driving the call's I/O.
/// Cancellation (spec.md §4.9/§5) is idempotent and the only mutation
/// exposed after construction.
pub struct Call {
    id: u64,
    host: String,
    canceled: AtomicBool,
    notify: Notify,
}

impl Call {
    fn new(id: u64, host: String) -> Arc<Call> {
        Arc::new(Call { id, host, canceled: AtomicBool::new(false), notify: Notify::new() })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Sets the canceled flag and wakes anyone awaiting [`Call::canceled`].
    /// Returns `true` the first time it is called for this call, `false`
    /// on every later call — the idempotence spec.md §4.9 requires so a
    /// `canceled` event fires at most once.
    pub fn cancel(&self) -> bool {
        if self.canceled.swap(true, Ordering::SeqCst) {
            return false;
        }
        trace!(call = self.id, "canceled");
        self.notify.notify_waiters();
        true
    }

    /// Resolves once this call has been canceled. In-flight I/O races
    /// this against its own read/write future (`tokio::select!`) so a
    /// cancel interrupts blocked operations promptly, as spec.md §5
    /// requires.
    pub async fn canceled(&self) {
        if self.is_canceled() {
            return;
        }
        self.notify.notified().await;
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call").field("id", &self.id).field("host", &self.host).field("canceled", &self.is_canceled()).finish()
    }
}

type BoxedCallFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

struct Queued {
    call: Arc<Call>,
    future: BoxedCallFuture,
    tx: oneshot::Sender<Result<Response>>,
}

#[derive(Default)]
struct State {
    ready_async: VecDeque<Queued>,
    running_async: HashMap<u64, Arc<Call>>,
    running_sync: HashMap<u64, Arc<Call>>,
    per_host_running: HashMap<String, usize>,
}

/// A call dispatched asynchronously: an `AsyncCall` is returned immediately
/// (it may still be sitting in `ready_async`); awaiting [`AsyncCall::wait`]
/// resolves once the dispatcher has actually run it to completion.
pub struct AsyncCall {
    call: Arc<Call>,
    result: oneshot::Receiver<Result<Response>>,
}

impl AsyncCall {
    /// The call handle, usable to cancel this specific call.
    pub fn handle(&self) -> Arc<Call> {
        self.call.clone()
    }

    pub async fn wait(self) -> Result<Response> {
        match self.result.await {
            Ok(result) => result,
            Err(_canceled) => Err(Error::canceled()),
        }
    }
}

impl std::fmt::Debug for AsyncCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCall").field("call", &self.call).finish()
    }
}

/// The dispatcher (C10): bounds total and per-host concurrency for
/// asynchronously scheduled calls, tracks synchronously executing calls
/// purely so `cancel_all()` reaches them too, and hands every call a
/// [`Call`] handle for cooperative cancellation.
pub struct Dispatcher {
    scheduler: Arc<dyn Scheduler>,
    max_requests: usize,
    max_requests_per_host: usize,
    next_id: AtomicU64,
    state: Arc<Mutex<State>>,
}

impl Dispatcher {
    /// `max_requests` default 64, `max_requests_per_host` default 5
    /// (spec.md §4.9).
    pub fn new(scheduler: Arc<dyn Scheduler>, max_requests: usize, max_requests_per_host: usize) -> Self {
        Dispatcher {
            scheduler,
            max_requests,
            max_requests_per_host,
            next_id: AtomicU64::new(1),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_defaults(scheduler: Arc<dyn Scheduler>) -> Self {
        Dispatcher::new(scheduler, 64, 5)
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Enqueues `future` to run for `host` (spec.md's "canonicalized
    /// host"). The call may run immediately or be queued in
    /// `ready_async`, depending on the current concurrency limits.
    pub fn enqueue_async<F>(&self, host: String, future: F) -> AsyncCall
    where
        F: Future<Output = Result<Response>> + Send + 'static,
    {
        let call = Call::new(self.alloc_id(), host);
        let (tx, rx) = oneshot::channel();
        let queued = Queued { call: call.clone(), future: Box::pin(future), tx };

        self.state.lock().ready_async.push_back(queued);
        promote(&self.state, &self.scheduler, self.max_requests, self.max_requests_per_host);

        AsyncCall { call, result: rx }
    }

    /// Registers a call that will run synchronously on the caller's own
    /// thread (spec.md's `running_sync`, "tracked for cancellation only" —
    /// it never counts against `max_requests`). Callers must pass the
    /// returned handle's id to [`Dispatcher::finish_sync`] once the call
    /// completes.
    pub fn register_sync(&self, host: String) -> Arc<Call> {
        let call = Call::new(self.alloc_id(), host);
        self.state.lock().running_sync.insert(call.id(), call.clone());
        call
    }

    pub fn finish_sync(&self, id: u64) {
        self.state.lock().running_sync.remove(&id);
    }

    /// Sets the canceled flag on every tracked call — queued, running
    /// async, and running sync — and drops anything still waiting in
    /// `ready_async` without ever running it.
    pub fn cancel_all(&self) {
        let mut state = self.state.lock();
        for queued in state.ready_async.drain(..) {
            queued.call.cancel();
            let _ = queued.tx.send(Err(Error::canceled()));
        }
        for call in state.running_async.values() {
            call.cancel();
        }
        for call in state.running_sync.values() {
            call.cancel();
        }
    }

    /// Cancels one call by id, wherever it currently lives. Idempotent:
    /// calling it twice emits at most one `canceled` event (via
    /// [`Call::cancel`]'s own idempotence).
    pub fn cancel(&self, id: u64) {
        let state = self.state.lock();
        if let Some(call) = state.running_async.get(&id).or_else(|| state.running_sync.get(&id)) {
            call.cancel();
            return;
        }
        if let Some(queued) = state.ready_async.iter().find(|q| q.call.id() == id) {
            queued.call.cancel();
        }
    }

    pub fn running_count(&self) -> usize {
        let state = self.state.lock();
        state.running_async.len() + state.running_sync.len()
    }

    pub fn queued_count(&self) -> usize {
        self.state.lock().ready_async.len()
    }
}

/// Promotes as many `ready_async` calls into `running_async` as the
/// current limits allow, spawning each via the scheduler (spec.md: "On
/// call finish the dispatcher promotes from ready until either limit
/// binds"). Free-standing so the completion closure spawned by a previous
/// promotion can call it again without holding a `&Dispatcher`.
fn promote(state: &Arc<Mutex<State>>, scheduler: &Arc<dyn Scheduler>, max_requests: usize, max_requests_per_host: usize) {
    loop {
        let next = {
            let mut guard = state.lock();
            if guard.running_async.len() >= max_requests {
                return;
            }
            let idx = guard
                .ready_async
                .iter()
                .position(|q| guard.per_host_running.get(&q.call.host).copied().unwrap_or(0) < max_requests_per_host);
            let Some(idx) = idx else { return };
            let queued = guard.ready_async.remove(idx).unwrap();
            guard.running_async.insert(queued.call.id(), queued.call.clone());
            *guard.per_host_running.entry(queued.call.host.clone()).or_insert(0) += 1;
            queued
        };
        run(next, state.clone(), scheduler.clone(), max_requests, max_requests_per_host);
    }
}

fn run(queued: Queued, state: Arc<Mutex<State>>, scheduler: Arc<dyn Scheduler>, max_requests: usize, max_requests_per_host: usize) {
    let Queued { call, future, tx } = queued;
    let host = call.host().to_string();
    let id = call.id();
    let spawn_scheduler = scheduler.clone();

    scheduler.spawn(Box::pin(async move {
        let result = if call.is_canceled() {
            Err(Error::canceled())
        } else {
            tokio::select! {
                biased;
                _ = call.canceled() => Err(Error::canceled()),
                result = future => result,
            }
        };
        let _ = tx.send(result);

        {
            let mut guard = state.lock();
            guard.running_async.remove(&id);
            if let Some(count) = guard.per_host_running.get_mut(&host) {
                *count = count.saturating_sub(1);
            }
        }
        promote(&state, &spawn_scheduler, max_requests, max_requests_per_host);
    }));
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_requests", &self.max_requests)
            .field("max_requests_per_host", &self.max_requests_per_host)
            .field("running", &self.running_count())
            .field("queued", &self.queued_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ready_response() -> Result<Response> {
        Ok(Response::new(
            url::Url::parse("https://example.com").unwrap(),
            http::StatusCode::OK,
            http::Version::HTTP_11,
            http::HeaderMap::new(),
            Box::pin(futures_util::stream::empty()),
            std::time::SystemTime::now(),
            std::time::SystemTime::now(),
        ))
    }

    #[tokio::test]
    async fn runs_a_single_call_immediately() {
        let dispatcher = Dispatcher::with_defaults(Arc::new(TokioScheduler));
        let call = dispatcher.enqueue_async("example.com".into(), ready_response());
        let response = call.wait().await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn cancel_before_execution_is_observed() {
        let dispatcher = Dispatcher::new(Arc::new(TokioScheduler), 0, 5);
        let call = dispatcher.enqueue_async("example.com".into(), ready_response());
        let handle = call.handle();
        dispatcher.cancel_all();
        assert!(handle.is_canceled());
        let result = call.wait().await;
        assert!(result.is_err());
    }

    #[test]
    fn per_host_limit_defaults_match_spec() {
        let dispatcher = Dispatcher::with_defaults(Arc::new(TokioScheduler));
        assert_eq!(dispatcher.max_requests, 64);
        assert_eq!(dispatcher.max_requests_per_host, 5);
    }
}
