//! Synchronous façade over the async [`crate::Client`] (spec.md §1: "blocking-
//! only or callback-only exclusively" is named a non-goal, meaning both
//! shapes are required; spec.md §4.9's `Scheduler` generalization is what
//! lets the same dispatcher core serve both).
//!
//! Grounded on `penumbra-x-rquest/src/blocking/client.rs`: a dedicated
//! background thread owns a current-thread Tokio runtime and the async
//! [`crate::Client`] it builds; callers hand requests across an unbounded
//! channel and park (via [`wait::timeout`]) on a oneshot reply rather than
//! running a runtime of their own. That keeps `blocking::Client` usable from
//! a plain thread that never touches Tokio, at the cost of one background
//! thread per client — the same trade the teacher makes.

mod response;
mod wait;

pub use response::Response;

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::{Error, IntoUrl, Method, Request, Result};

type ReplyTx = oneshot::Sender<Result<crate::Response>>;
type CallTx = mpsc::UnboundedSender<(Request, ReplyTx)>;

/// Blocking equivalent of [`crate::Client`]. Cheap to clone: every clone
/// shares the same background runtime thread and the same async client (and
/// therefore the same connection pool).
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
    timeout: Option<Duration>,
}

struct Inner {
    tx: Option<CallTx>,
    thread: Option<thread::JoinHandle<()>>,
    handle: tokio::runtime::Handle,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Dropping the sender half lets the background thread's `recv()`
        // loop end, so `join` below doesn't block forever.
        self.tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::Client").finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

impl Client {
    /// # Panics
    ///
    /// Panics if the default configuration fails to build (it never does —
    /// see [`crate::Client::new`]) or if called from within an async
    /// runtime, since the background thread this spawns would deadlock
    /// waiting for that runtime to yield. Use [`Client::builder`] to handle
    /// construction failure as a `Result` instead of panicking.
    pub fn new() -> Client {
        ClientBuilder::new().build().expect("default client configuration is always valid")
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn head<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        let request = url.into_url().map(|url| Request::new(method, url));
        RequestBuilder { client: self.clone(), request }
    }

    /// Dispatches `request` on the background runtime and blocks the
    /// calling thread until a response (or error) arrives, or `request`'s
    /// own timeout (falling back to the builder's default) elapses first.
    pub fn execute(&self, request: Request) -> Result<Response> {
        let uri = request.url().as_str().parse::<http::Uri>().ok();
        let timeout = request.timeout().or(self.timeout);

        let (tx, rx) = oneshot::channel();
        self.inner
            .tx
            .as_ref()
            .expect("background runtime thread exited")
            .send((request, tx))
            .expect("background runtime thread panicked");

        let result = match wait::timeout(rx, timeout) {
            wait::Outcome::Ready(Ok(result)) => result,
            wait::Outcome::Ready(Err(_canceled)) => Err(event_loop_panicked()),
            wait::Outcome::TimedOut => {
                let err = Error::timeout(std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out"));
                Err(match uri {
                    Some(uri) => err.with_uri(uri),
                    None => err,
                })
            }
        };
        result.map(|response| Response::new(response, self.inner.handle.clone()))
    }
}

/// Builds a [`Client`] (spec.md §6's `new_call`/`execute` surface, blocking
/// variant). Every method here forwards to the equivalent
/// [`crate::ClientBuilder`] method; this wrapper only exists to add the
/// background-thread spawn in [`ClientBuilder::build`] and the per-call
/// default `timeout` the async builder has no equivalent knob for (the
/// async API expects callers to set `Request::timeout` directly, or race
/// `tokio::time::timeout` themselves).
#[must_use]
pub struct ClientBuilder {
    inner: crate::ClientBuilder,
    timeout: Option<Duration>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder { inner: crate::ClientBuilder::new(), timeout: Some(Duration::from_secs(30)) }
    }
}

impl ClientBuilder {
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Sets the full-call timeout applied to every request made through the
    /// built client, unless that request sets its own via
    /// `RequestBuilder::timeout`. `None` disables the default entirely.
    pub fn timeout<T: Into<Option<Duration>>>(mut self, timeout: T) -> ClientBuilder {
        self.timeout = timeout.into();
        self
    }

    pub fn connect_timeout(self, timeout: Duration) -> ClientBuilder {
        self.with_inner(|inner| inner.connect_timeout(timeout))
    }

    pub fn user_agent<V>(self, value: V) -> ClientBuilder
    where
        http::HeaderValue: TryFrom<V>,
    {
        self.with_inner(move |inner| inner.user_agent(value))
    }

    pub fn pool_max_idle_per_host(self, max: usize) -> ClientBuilder {
        self.with_inner(move |inner| inner.pool_max_idle_per_host(max))
    }

    pub fn pool_idle_timeout(self, timeout: Duration) -> ClientBuilder {
        self.with_inner(move |inner| inner.pool_idle_timeout(timeout))
    }

    pub fn redirect(self, policy: crate::redirect::Policy) -> ClientBuilder {
        self.with_inner(move |inner| inner.redirect(policy))
    }

    pub fn no_redirect(self) -> ClientBuilder {
        self.with_inner(|inner| inner.no_redirect())
    }

    pub fn proxy(self, proxy: crate::proxy::Proxy) -> ClientBuilder {
        self.with_inner(move |inner| inner.proxy(proxy))
    }

    pub fn no_proxy(self) -> ClientBuilder {
        self.with_inner(|inner| inner.no_proxy())
    }

    #[cfg(feature = "cookies")]
    pub fn cookie_store(self, enable: bool) -> ClientBuilder {
        self.with_inner(|inner| inner.cookie_store(enable))
    }

    pub fn cache_in_memory(self, max_entries: usize) -> ClientBuilder {
        self.with_inner(move |inner| inner.cache_in_memory(max_entries))
    }

    pub fn danger_accept_invalid_certs(self, accept: bool) -> ClientBuilder {
        self.with_inner(move |inner| inner.danger_accept_invalid_certs(accept))
    }

    fn with_inner<F>(mut self, f: F) -> ClientBuilder
    where
        F: FnOnce(crate::ClientBuilder) -> crate::ClientBuilder,
    {
        self.inner = f(self.inner);
        self
    }

    /// Spawns the background runtime thread, builds the async
    /// [`crate::Client`] on it (so `ClientBuilder::build`'s internal
    /// `tokio::spawn` calls, e.g. the pool's idle-connection reaper, have a
    /// runtime to land in), and waits for that to finish before returning —
    /// the same handshake the teacher's `ClientHandle::new` performs via
    /// `spawn_tx`/`spawn_rx`.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime already: the spawned
    /// thread blocks the *caller* only until startup finishes, but nothing
    /// here requires an outer runtime, so calling this from inside one is
    /// simply redundant, not unsound — unlike `rt.block_on` nested calls.
    pub fn build(self) -> Result<Client> {
        let ClientBuilder { inner, timeout } = self;

        let (call_tx, mut call_rx) = mpsc::unbounded_channel::<(Request, ReplyTx)>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<tokio::runtime::Handle>>();

        let thread_handle = thread::Builder::new()
            .name("linkreq-blocking-runtime".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::builder(e)));
                        return;
                    }
                };

                rt.block_on(async move {
                    let client = match inner.build() {
                        Ok(client) => client,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if ready_tx.send(Ok(tokio::runtime::Handle::current())).is_err() {
                        return;
                    }

                    while let Some((request, reply)) = call_rx.recv().await {
                        let client = client.clone();
                        tokio::spawn(async move {
                            let result = client.execute(request).await;
                            let _ = reply.send(result);
                        });
                    }
                });
            })
            .map_err(Error::builder)?;

        let runtime_handle = match wait::timeout(ready_rx, None) {
            wait::Outcome::Ready(Ok(Ok(handle))) => handle,
            wait::Outcome::Ready(Ok(Err(e))) => return Err(e),
            wait::Outcome::Ready(Err(_canceled)) => return Err(event_loop_panicked()),
            wait::Outcome::TimedOut => unreachable!("wait::timeout(.., None) never times out"),
        };

        Ok(Client {
            inner: Arc::new(Inner { tx: Some(call_tx), thread: Some(thread_handle), handle: runtime_handle }),
            timeout,
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::ClientBuilder").finish()
    }
}

/// Blocking equivalent of [`crate::RequestBuilder`]: the same deferred-error
/// shape, wired to dispatch through a [`Client`] rather than an
/// [`crate::Client`].
#[must_use = "RequestBuilder does nothing until you call `.send()`"]
pub struct RequestBuilder {
    client: Client,
    request: Result<Request>,
}

impl RequestBuilder {
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        http::HeaderName: TryFrom<K>,
        <http::HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        http::HeaderValue: TryFrom<V>,
        <http::HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Ok(req) = &mut self.request {
            match (http::HeaderName::try_from(key), http::HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    req.headers_mut().append(name, value);
                }
                (Err(e), _) => self.request = Err(Error::builder(e.into())),
                (_, Err(e)) => self.request = Err(Error::builder(e.into())),
            }
        }
        self
    }

    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        if let Ok(req) = &mut self.request {
            crate::util::extend_headers(req.headers_mut(), headers);
        }
        self
    }

    pub fn basic_auth<U, P>(self, username: U, password: Option<P>) -> Self
    where
        U: fmt::Display,
        P: fmt::Display,
    {
        self.header(http::header::AUTHORIZATION, crate::header_ext::basic_auth(username, password))
    }

    pub fn bearer_auth<T: fmt::Display>(self, token: T) -> Self {
        self.header(http::header::AUTHORIZATION, format!("Bearer {token}"))
    }

    pub fn body<B: Into<crate::Body>>(mut self, body: B) -> Self {
        if let Ok(req) = &mut self.request {
            *req.body_mut() = Some(body.into());
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        if let Ok(req) = &mut self.request {
            *req.timeout_mut() = Some(timeout);
        }
        self
    }

    pub fn build(self) -> Result<Request> {
        self.request
    }

    /// Sends the request and blocks until the response headers (not
    /// necessarily the body — [`crate::Response`] bodies stream lazily
    /// either way) arrive or an error occurs.
    pub fn send(self) -> Result<Response> {
        let RequestBuilder { client, request } = self;
        client.execute(request?)
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = f.debug_struct("blocking::RequestBuilder");
        match &self.request {
            Ok(req) => {
                b.field("method", req.method()).field("url", req.url());
            }
            Err(err) => {
                b.field("error", err);
            }
        }
        b.finish()
    }
}

#[cold]
#[inline(never)]
fn event_loop_panicked() -> Error {
    // A dropped oneshot sender here only ever means the background task
    // itself panicked (the channel is otherwise always completed, even on
    // cancellation/timeout, since `Client::execute` always sends exactly
    // one reply) — propagating a generic "request" error is the best a
    // caller can do with it, matching the teacher's choice to treat this as
    // an unrecoverable client-wide failure rather than a per-call one.
    Error::request(std::io::Error::new(std::io::ErrorKind::Other, "background runtime thread panicked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_reports_build_error_not_a_panic() {
        let client = Client::builder().build();
        // Constructing the client itself must not require an outer runtime;
        // if it does this test will hang/panic rather than reach the
        // assertion below, which is exactly the regression this guards.
        assert!(client.is_ok());
    }
}
