//! The event-observer API (C11, spec.md §4.10): a fixed, totally ordered
//! sequence of callbacks per call, letting an embedder instrument DNS,
//! connect, TLS, and body timing without threading observation concerns
//! through every interceptor. Grounded on OkHttp's `EventListener`, adapted
//! from its per-call-factory shape to a single stateless trait object
//! shared by every call (this crate's callers don't need OkHttp's
//! one-listener-instance-per-call allowance; a `Fn`-style listener that
//! closes over call-scoped state via `url`/extensions is enough).

use std::{fmt, net::SocketAddr, time::Duration};

use url::Url;

use crate::error::Error;

/// Receives the ordered callback sequence spec.md §4.10 names for one call.
/// Every `*_start` has exactly one matching `*_end` or `*_failed`; DNS and
/// connect callbacks are skipped entirely when a pooled connection is
/// reused; a redirect or fresh-connection follow-up opens another
/// `request_headers_start` … `response_body_end` block.
///
/// All methods have a default empty body, so a listener only overrides the
/// events it cares about — the same ergonomics as OkHttp's
/// `EventListener` abstract class.
#[allow(unused_variables)]
pub trait EventListener: Send + Sync + fmt::Debug {
    fn call_start(&self, url: &Url) {}
    fn proxy_select_start(&self, url: &Url) {}
    fn proxy_select_end(&self, url: &Url) {}
    fn dns_start(&self, domain: &str) {}
    fn dns_end(&self, domain: &str, addrs: &[SocketAddr]) {}
    fn connect_start(&self, addr: SocketAddr) {}
    fn secure_connect_start(&self) {}
    fn secure_connect_end(&self) {}
    fn connect_end(&self, addr: SocketAddr) {}
    fn connect_failed(&self, addr: Option<SocketAddr>, error: &Error) {}
    fn connection_acquired(&self, url: &Url) {}
    fn request_headers_start(&self) {}
    fn request_headers_end(&self) {}
    fn request_body_start(&self) {}
    fn request_body_end(&self, bytes_written: u64) {}
    fn response_headers_start(&self) {}
    fn response_headers_end(&self, status: http::StatusCode) {}
    fn response_body_start(&self) {}
    fn response_body_end(&self, bytes_read: u64) {}
    fn connection_released(&self) {}
    fn call_end(&self) {}
    fn call_failed(&self, error: &Error) {}
    fn canceled(&self) {}
    /// Not part of spec.md §4.10's required sequence; a convenience hook
    /// some listeners use to log total wall-clock per call.
    fn call_timing(&self, elapsed: Duration) {
        let _ = elapsed;
    }
}

/// The default listener: observes nothing. `Client::builder()` installs
/// this unless `.event_listener(..)` overrides it, the same zero-cost
/// default OkHttp's `EventListener.NONE` provides.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventListener;

impl EventListener for NoopEventListener {}

/// A listener built from plain closures, for embedders who only want one or
/// two hooks and would rather not declare a whole type. Grounded on the
/// `tower::util::service_fn`-style ergonomic the teacher's `client/layer`
/// modules lean on for one-off `Service` wrappers.
pub struct FnEventListener<F> {
    on_call_end: F,
}

impl<F> FnEventListener<F>
where
    F: Fn() + Send + Sync,
{
    pub fn on_call_end(f: F) -> Self {
        FnEventListener { on_call_end: f }
    }
}

impl<F> fmt::Debug for FnEventListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEventListener").finish()
    }
}

impl<F> EventListener for FnEventListener<F>
where
    F: Fn() + Send + Sync,
{
    fn call_end(&self) {
        (self.on_call_end)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn noop_listener_accepts_every_callback() {
        let listener = NoopEventListener;
        let url = Url::parse("https://example.com").unwrap();
        listener.call_start(&url);
        listener.dns_start("example.com");
        listener.call_end();
    }

    #[test]
    fn fn_listener_invokes_closure() {
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        let listener = FnEventListener::on_call_end(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        listener.call_end();
        listener.call_end();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
