//! The configured entry point (spec.md §4/§2 "Client"): `Client` is the
//! immutable, cheaply cloned handle every call is made through, and
//! `ClientBuilder` assembles the shared state (pool, route database,
//! policies) it hands to the interceptor chain via `CallContext`.
//!
//! Grounded on OkHttp's `OkHttpClient`/`OkHttpClient.Builder` for the
//! overall shape — one builder assembling a pile of shared, `Arc`'d
//! collaborators once, handed to a fixed interceptor chain per call — and
//! on `penumbra-x-rquest/src/async_impl/client.rs` for the builder's method
//! surface and defaults.

use std::{sync::Arc, time::Duration};

use http::{header::HeaderValue, Method};

use crate::{
    address::Address,
    auth::Authenticator,
    cache::CacheEngine,
    dispatch::{Dispatcher, TokioScheduler},
    dns::{GaiResolver, Resolve, WithOverrides},
    event::{EventListener, NoopEventListener},
    interceptor::{
        BridgeInterceptor, CacheInterceptor, CallContext, ConnectInterceptor, FollowUpInterceptor, Interceptor,
    },
    into_url::IntoUrl,
    pool::ConnectionPool,
    proxy::{Fixed, NoProxy, Proxy, ProxySelector, SystemProxySelector},
    redirect, retry,
    request::{builder_from_url, Request, RequestBuilder},
    response::Response,
    route::RouteDatabase,
    tls::TlsOptions,
    Error, Result,
};

#[cfg(feature = "cookies")]
use crate::cookie::{CookieJar, Jar};

/// Default User-Agent sent unless the caller set one explicitly.
fn default_user_agent() -> HeaderValue {
    HeaderValue::from_static(concat!("linkreq/", env!("CARGO_PKG_VERSION")))
}

/// HTTP/1.1 framing knobs (spec.md §4.3), consulted by [`crate::proto::Http1Codec::handshake`].
///
/// Constructed via [`ClientBuilder`]'s `http1_*` methods; there is no
/// public builder of its own since every field already has a direct
/// setter on [`ClientBuilder`].
#[derive(Clone, Debug)]
pub struct Http1Config {
    http09_responses: bool,
    title_case_headers: bool,
    preserve_header_case: bool,
    max_buf_size: usize,
    allow_spaces_after_header_name_in_responses: bool,
    allow_obsolete_multiline_headers_in_responses: bool,
    ignore_invalid_headers_in_responses: bool,
    writev: Option<bool>,
    read_buf_exact_size: Option<usize>,
}

impl Default for Http1Config {
    fn default() -> Self {
        Http1Config {
            http09_responses: false,
            title_case_headers: false,
            preserve_header_case: false,
            // hyper's own default; named explicitly here since `CallContext`
            // owns this struct rather than deferring to hyper's builder default.
            max_buf_size: 400 * 1024,
            allow_spaces_after_header_name_in_responses: false,
            allow_obsolete_multiline_headers_in_responses: false,
            ignore_invalid_headers_in_responses: false,
            writev: None,
            read_buf_exact_size: None,
        }
    }
}

impl Http1Config {
    pub(crate) fn http09_responses(&self) -> bool {
        self.http09_responses
    }

    pub(crate) fn title_case_headers(&self) -> bool {
        self.title_case_headers
    }

    pub(crate) fn preserve_header_case(&self) -> bool {
        self.preserve_header_case
    }

    pub(crate) fn max_buf_size(&self) -> usize {
        self.max_buf_size
    }

    pub(crate) fn allow_spaces_after_header_name_in_responses(&self) -> bool {
        self.allow_spaces_after_header_name_in_responses
    }

    pub(crate) fn allow_obsolete_multiline_headers_in_responses(&self) -> bool {
        self.allow_obsolete_multiline_headers_in_responses
    }

    pub(crate) fn ignore_invalid_headers_in_responses(&self) -> bool {
        self.ignore_invalid_headers_in_responses
    }

    pub(crate) fn writev(&self) -> Option<bool> {
        self.writev
    }

    pub(crate) fn read_buf_exact_size(&self) -> Option<usize> {
        self.read_buf_exact_size
    }
}

/// HTTP/2 framing knobs (spec.md §4.4), consulted by [`crate::proto::Http2Codec::handshake`].
#[derive(Clone, Debug, Default)]
pub struct Http2Config {
    initial_stream_window_size: Option<u32>,
    initial_connection_window_size: Option<u32>,
    header_table_size: Option<u32>,
    enable_push: Option<bool>,
    max_concurrent_streams: Option<u32>,
    max_frame_size: Option<u32>,
    max_header_list_size: Option<u32>,
}

impl Http2Config {
    pub(crate) fn initial_stream_window_size(&self) -> Option<u32> {
        self.initial_stream_window_size
    }

    pub(crate) fn initial_connection_window_size(&self) -> Option<u32> {
        self.initial_connection_window_size
    }

    pub(crate) fn header_table_size(&self) -> Option<u32> {
        self.header_table_size
    }

    pub(crate) fn enable_push(&self) -> Option<bool> {
        self.enable_push
    }

    pub(crate) fn max_concurrent_streams(&self) -> Option<u32> {
        self.max_concurrent_streams
    }

    pub(crate) fn max_frame_size(&self) -> Option<u32> {
        self.max_frame_size
    }

    pub(crate) fn max_header_list_size(&self) -> Option<u32> {
        self.max_header_list_size
    }
}

struct ClientInner {
    interceptors: Vec<Box<dyn Interceptor>>,
    ctx: CallContext,
    dispatcher: Dispatcher,
}

/// The engine's configured entry point (spec.md §2, §4).
///
/// Cheap to clone: every clone shares the same connection pool, route
/// database, dispatcher and policies, the same sharing model
/// `reqwest`/`rquest`'s `Client` uses (an `Arc` around one inner struct).
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Client { inner: self.inner.clone() }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("dispatcher", &self.inner.dispatcher).finish()
    }
}

impl Client {
    /// Shorthand for `ClientBuilder::default().build()`. Panics only if the
    /// default configuration itself fails to build, which does not happen —
    /// use [`Client::builder`] for anything that can fail (custom TLS
    /// roots, a proxy URI that fails to parse, ...).
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
        builder_from_url(self.clone(), method, url)
    }

    /// Runs `request` through the interceptor chain and returns its
    /// response, dispatched through this client's [`Dispatcher`] (spec.md
    /// §4.9) so concurrency limits apply the same as to every other call.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let host = request.url().host_str().unwrap_or_default().to_string();
        let inner = self.inner.clone();

        self.inner.ctx.event_listener.call_start(request.url());
        let started = std::time::Instant::now();

        let for_future = inner.clone();
        let call = inner.dispatcher.enqueue_async(host, async move {
            let interceptors = &for_future.interceptors;
            let ctx = &for_future.ctx;
            let chain = crate::interceptor::Chain::new(interceptors, request, ctx);
            chain.forward().await
        });

        let result = call.wait().await;
        let elapsed = started.elapsed();
        match &result {
            Ok(_) => {
                self.inner.ctx.event_listener.call_end();
                self.inner.ctx.event_listener.call_timing(elapsed);
            }
            Err(e) => self.inner.ctx.event_listener.call_failed(e),
        }
        result
    }

    pub fn connection_pool(&self) -> &Arc<ConnectionPool> {
        &self.inner.ctx.pool
    }

    pub fn cache(&self) -> Option<&Arc<CacheEngine>> {
        self.inner.ctx.cache.as_ref()
    }

    /// Cancels every in-flight and queued call made through this client
    /// (spec.md §4.9/§5). Future calls on this same `Client` are
    /// unaffected — this is call cancellation, not client shutdown.
    pub fn cancel_all(&self) {
        self.inner.dispatcher.cancel_all();
    }
}

impl Default for Client {
    fn default() -> Self {
        Client::new()
    }
}

/// Builds a [`Client`], assembling every shared collaborator the
/// interceptor chain needs (spec.md §2, §4).
///
/// Grounded on `penumbra-x-rquest/src/async_impl/client.rs`'s `ClientBuilder`
/// for the method surface; our `Config` lives as plain fields directly on
/// the builder rather than a separate struct, since nothing else needs to
/// observe it mid-construction.
pub struct ClientBuilder {
    user_agent: Option<HeaderValue>,
    max_idle_per_host: usize,
    keep_alive: Duration,
    connect_timeout: Duration,
    event_listener: Arc<dyn EventListener>,
    redirect_policy: redirect::Policy,
    retry_policy: retry::Policy,
    authenticator: Option<Arc<dyn Authenticator>>,
    proxy_authenticator: Option<Arc<dyn Authenticator>>,
    proxy_selector: Option<Arc<dyn ProxySelector>>,
    dns: Option<Arc<dyn Resolve>>,
    dns_overrides: std::collections::HashMap<String, crate::dns::Addrs>,
    tls: crate::tls::TlsOptionsBuilder,
    http1: Http1Config,
    http2: Http2Config,
    cache: Option<Arc<CacheEngine>>,
    max_requests: usize,
    max_requests_per_host: usize,
    #[cfg(feature = "cookies")]
    cookie_jar: Option<Arc<dyn CookieJar>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder {
            user_agent: None,
            // OkHttp's `ConnectionPool` defaults: 5 idle connections per
            // address, 5-minute keep-alive.
            max_idle_per_host: 5,
            keep_alive: Duration::from_secs(300),
            // OkHttp's default connect timeout.
            connect_timeout: Duration::from_secs(10),
            event_listener: Arc::new(NoopEventListener),
            redirect_policy: redirect::Policy::default(),
            retry_policy: retry::Policy::default(),
            authenticator: None,
            proxy_authenticator: None,
            proxy_selector: None,
            dns: None,
            dns_overrides: std::collections::HashMap::new(),
            tls: TlsOptions::builder(),
            http1: Http1Config::default(),
            http2: Http2Config::default(),
            cache: None,
            max_requests: 64,
            max_requests_per_host: 5,
            #[cfg(feature = "cookies")]
            cookie_jar: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn user_agent<V>(mut self, value: V) -> ClientBuilder
    where
        HeaderValue: TryFrom<V>,
    {
        self.user_agent = HeaderValue::try_from(value).ok();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.connect_timeout = timeout;
        self
    }

    pub fn pool_max_idle_per_host(mut self, max: usize) -> ClientBuilder {
        self.max_idle_per_host = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> ClientBuilder {
        self.keep_alive = timeout;
        self
    }

    pub fn max_requests(mut self, max: usize) -> ClientBuilder {
        self.max_requests = max;
        self
    }

    pub fn max_requests_per_host(mut self, max: usize) -> ClientBuilder {
        self.max_requests_per_host = max;
        self
    }

    pub fn event_listener(mut self, listener: impl EventListener + 'static) -> ClientBuilder {
        self.event_listener = Arc::new(listener);
        self
    }

    pub fn redirect(mut self, policy: redirect::Policy) -> ClientBuilder {
        self.redirect_policy = policy;
        self
    }

    pub fn no_redirect(mut self) -> ClientBuilder {
        self.redirect_policy = redirect::Policy::none();
        self
    }

    pub fn retry(mut self, policy: retry::Policy) -> ClientBuilder {
        self.retry_policy = policy;
        self
    }

    pub fn authenticator(mut self, authenticator: impl Authenticator + 'static) -> ClientBuilder {
        self.authenticator = Some(Arc::new(authenticator));
        self
    }

    pub fn proxy_authenticator(mut self, authenticator: impl Authenticator + 'static) -> ClientBuilder {
        self.proxy_authenticator = Some(Arc::new(authenticator));
        self
    }

    /// Routes every request through `proxy`, overriding the default
    /// environment-variable-driven [`SystemProxySelector`].
    pub fn proxy(mut self, proxy: Proxy) -> ClientBuilder {
        self.proxy_selector = Some(Arc::new(Fixed::new(proxy)));
        self
    }

    /// Disables proxying entirely, ignoring `HTTP_PROXY`/`HTTPS_PROXY`.
    pub fn no_proxy(mut self) -> ClientBuilder {
        self.proxy_selector = Some(Arc::new(NoProxy));
        self
    }

    /// Supplies a custom [`ProxySelector`], for embedders needing
    /// per-request proxy logic beyond `Fixed`/`NoProxy`.
    pub fn proxy_selector(mut self, selector: impl ProxySelector + 'static) -> ClientBuilder {
        self.proxy_selector = Some(Arc::new(selector));
        self
    }

    /// Supplies a custom [`Resolve`], replacing the default
    /// [`GaiResolver`].
    pub fn dns_resolver(mut self, resolver: impl Resolve + 'static) -> ClientBuilder {
        self.dns = Some(Arc::new(resolver));
        self
    }

    /// Pins `domain` to resolve to exactly `addrs`, bypassing whatever
    /// resolver is otherwise configured — for tests, and for talking to a
    /// host by IP while still presenting its hostname over TLS/SNI.
    pub fn resolve(mut self, domain: impl Into<String>, addr: std::net::SocketAddr) -> ClientBuilder {
        self.dns_overrides.entry(domain.into()).or_default().push(addr);
        self
    }

    pub fn resolve_to_addrs(mut self, domain: impl Into<String>, addrs: &[std::net::SocketAddr]) -> ClientBuilder {
        self.dns_overrides.entry(domain.into()).or_insert_with(Vec::new).extend_from_slice(addrs);
        self
    }

    pub fn connection_specs(mut self, specs: Vec<crate::tls::ConnectionSpec>) -> ClientBuilder {
        self.tls = self.tls.connection_specs(specs);
        self
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> ClientBuilder {
        self.tls = self.tls.danger_accept_invalid_certs(accept);
        self
    }

    pub fn danger_accept_invalid_hostnames(mut self, accept: bool) -> ClientBuilder {
        self.tls = self.tls.danger_accept_invalid_hostnames(accept);
        self
    }

    pub fn min_tls_version(mut self, version: crate::tls::Version) -> ClientBuilder {
        self.tls = self.tls.min_tls_version(version);
        self
    }

    pub fn max_tls_version(mut self, version: crate::tls::Version) -> ClientBuilder {
        self.tls = self.tls.max_tls_version(version);
        self
    }

    pub fn certificate_pinner(mut self, pinner: impl crate::tls::CertificatePinner + 'static) -> ClientBuilder {
        self.tls = self.tls.certificate_pinner(Arc::new(pinner));
        self
    }

    pub fn http09_responses(mut self, enabled: bool) -> ClientBuilder {
        self.http1.http09_responses = enabled;
        self
    }

    pub fn http1_title_case_headers(mut self, enabled: bool) -> ClientBuilder {
        self.http1.title_case_headers = enabled;
        self
    }

    pub fn http1_preserve_header_case(mut self, enabled: bool) -> ClientBuilder {
        self.http1.preserve_header_case = enabled;
        self
    }

    pub fn http1_max_buf_size(mut self, size: usize) -> ClientBuilder {
        self.http1.max_buf_size = size;
        self
    }

    pub fn http1_allow_spaces_after_header_name_in_responses(mut self, enabled: bool) -> ClientBuilder {
        self.http1.allow_spaces_after_header_name_in_responses = enabled;
        self
    }

    pub fn http1_allow_obsolete_multiline_headers_in_responses(mut self, enabled: bool) -> ClientBuilder {
        self.http1.allow_obsolete_multiline_headers_in_responses = enabled;
        self
    }

    pub fn http1_ignore_invalid_headers_in_responses(mut self, enabled: bool) -> ClientBuilder {
        self.http1.ignore_invalid_headers_in_responses = enabled;
        self
    }

    pub fn http1_writev(mut self, enabled: bool) -> ClientBuilder {
        self.http1.writev = Some(enabled);
        self
    }

    pub fn http1_read_buf_exact_size(mut self, size: usize) -> ClientBuilder {
        self.http1.read_buf_exact_size = Some(size);
        self
    }

    pub fn http2_initial_stream_window_size(mut self, size: u32) -> ClientBuilder {
        self.http2.initial_stream_window_size = Some(size);
        self
    }

    pub fn http2_initial_connection_window_size(mut self, size: u32) -> ClientBuilder {
        self.http2.initial_connection_window_size = Some(size);
        self
    }

    pub fn http2_header_table_size(mut self, size: u32) -> ClientBuilder {
        self.http2.header_table_size = Some(size);
        self
    }

    pub fn http2_enable_push(mut self, enabled: bool) -> ClientBuilder {
        self.http2.enable_push = Some(enabled);
        self
    }

    pub fn http2_max_concurrent_streams(mut self, max: u32) -> ClientBuilder {
        self.http2.max_concurrent_streams = Some(max);
        self
    }

    pub fn http2_max_frame_size(mut self, size: u32) -> ClientBuilder {
        self.http2.max_frame_size = Some(size);
        self
    }

    pub fn http2_max_header_list_size(mut self, size: u32) -> ClientBuilder {
        self.http2.max_header_list_size = Some(size);
        self
    }

    /// Shares `engine` across every call made through the built client
    /// (spec.md §4.7/§6). Without this, the cache interceptor is a no-op
    /// pass-through (see [`crate::interceptor::cache::CacheInterceptor`]).
    pub fn cache(mut self, engine: CacheEngine) -> ClientBuilder {
        self.cache = Some(Arc::new(engine));
        self
    }

    pub fn cache_in_memory(mut self, max_entries: usize) -> ClientBuilder {
        self.cache = Some(Arc::new(CacheEngine::in_memory(max_entries)));
        self
    }

    #[cfg(feature = "cookies")]
    pub fn cookie_store(mut self, enable: bool) -> ClientBuilder {
        self.cookie_jar = if enable { Some(Arc::new(Jar::default())) } else { None };
        self
    }

    #[cfg(feature = "cookies")]
    pub fn cookie_provider(mut self, jar: impl CookieJar + 'static) -> ClientBuilder {
        self.cookie_jar = Some(Arc::new(jar));
        self
    }

    /// Assembles the [`Client`]: builds the shared DNS resolver, proxy
    /// selector and TLS options into one template [`Address`], wires up the
    /// connection pool, route database and dispatcher, and fixes the
    /// interceptor chain order.
    ///
    /// The only failure mode today is a malformed proxy URI supplied via
    /// `.proxy(..)`/the `*_PROXY` environment variables surfacing at a
    /// later, lazier point than OkHttp's builder — we parse proxies eagerly
    /// in [`crate::proxy`], so this always succeeds, but returns `Result`
    /// for parity with `reqwest`'s `ClientBuilder::build` and so a future,
    /// stricter validation pass has somewhere to report to.
    pub fn build(self) -> Result<Client> {
        let dns: Arc<dyn Resolve> = self.dns.unwrap_or_else(|| Arc::new(GaiResolver::new()));
        let dns: Arc<dyn Resolve> = if self.dns_overrides.is_empty() {
            dns
        } else {
            Arc::new(WithOverrides::new(dns, self.dns_overrides))
        };

        let proxy_selector = self.proxy_selector.unwrap_or_else(|| Arc::new(SystemProxySelector::from_env()));

        let tls_options = Arc::new(self.tls.build());

        // A placeholder host/port: every real request rebuilds its own
        // `Address` from the request URL (`interceptor::connect::address_for`),
        // reusing this template only for its shared `dns`/`proxy_selector`/
        // `tls` `Arc`s — the fields pool equality actually keys on.
        let default_address = Address::new(Arc::<str>::from(""), 0, dns, proxy_selector).with_tls(tls_options);

        let pool = Arc::new(ConnectionPool::new(self.max_idle_per_host, self.keep_alive));
        pool.spawn_cleanup(self.keep_alive.max(Duration::from_secs(1)));

        let ctx = CallContext {
            pool,
            route_database: Arc::new(RouteDatabase::new()),
            cache: self.cache,
            event_listener: self.event_listener,
            redirect_policy: self.redirect_policy,
            retry_policy: self.retry_policy,
            authenticator: self.authenticator,
            proxy_authenticator: self.proxy_authenticator,
            default_address,
            connect_timeout: self.connect_timeout,
            http1_config: self.http1,
            http2_config: self.http2,
            #[cfg(feature = "cookies")]
            cookie_jar: self.cookie_jar,
        };

        let user_agent = self.user_agent.unwrap_or_else(default_user_agent);
        let interceptors: Vec<Box<dyn Interceptor>> = vec![
            Box::new(FollowUpInterceptor),
            Box::new(BridgeInterceptor { user_agent }),
            Box::new(CacheInterceptor),
            Box::new(ConnectInterceptor),
            Box::new(crate::interceptor::CallServerInterceptor),
        ];

        let dispatcher = Dispatcher::new(Arc::new(TokioScheduler), self.max_requests, self.max_requests_per_host);

        Ok(Client { inner: Arc::new(ClientInner { interceptors, ctx, dispatcher }) })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("connect_timeout", &self.connect_timeout)
            .field("max_idle_per_host", &self.max_idle_per_host)
            .finish()
    }
}

