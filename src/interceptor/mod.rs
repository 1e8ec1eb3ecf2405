//! The interceptor chain (C7, spec.md §4.6): a fixed pipeline of stages
//! each request passes through on the way to the wire and each response
//! passes back through on the way to the caller. Grounded on OkHttp's
//! `Interceptor`/`RealInterceptorChain`, but expressed as an explicit
//! slice-plus-index rather than `tower::Layer`/`Service` composition —
//! the chain's length and order are fixed per `Client` at build time, so
//! dynamic `Service` dispatch would only add indirection without buying
//! pluggability we need.

mod bridge;
mod call_server;
pub mod cache;
mod connect;
pub mod followup;

pub(crate) use bridge::BridgeInterceptor;
pub(crate) use call_server::CallServerInterceptor;
pub(crate) use cache::CacheInterceptor;
pub(crate) use connect::ConnectInterceptor;
pub(crate) use followup::FollowUpInterceptor;

use crate::request::Request;
use crate::response::Response;
use crate::Result;

/// One stage of the pipeline. `intercept` receives the chain positioned
/// just after itself; calling [`Chain::proceed`] runs the remaining
/// stages and returns their result, letting an interceptor inspect or
/// rewrite both the outgoing request and the incoming response.
pub(crate) trait Interceptor: Send + Sync {
    fn intercept<'a>(&'a self, chain: Chain<'a>) -> BoxFuture<'a, Result<Response>>;
}

pub(crate) type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// The call-scoped state threaded through every stage: which request is
/// currently being sent, which interceptors remain, and the shared
/// `CallContext` (client handles, event listener, cancellation flag).
pub(crate) struct Chain<'a> {
    interceptors: &'a [Box<dyn Interceptor>],
    index: usize,
    request: Request,
    ctx: &'a CallContext,
    /// Set by [`ConnectInterceptor`] once a connection has been acquired,
    /// and consumed by [`CallServerInterceptor`] at the end of the chain.
    /// No other stage touches it; it exists so the connection, established
    /// mid-chain, can reach the stage that actually writes bytes without
    /// widening every `Interceptor::intercept` signature.
    exchange: Option<crate::exchange::Exchange>,
}

impl<'a> Chain<'a> {
    pub(crate) fn new(interceptors: &'a [Box<dyn Interceptor>], request: Request, ctx: &'a CallContext) -> Self {
        Chain { interceptors, index: 0, request, ctx, exchange: None }
    }

    pub(crate) fn request(&self) -> &Request {
        &self.request
    }

    pub(crate) fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub(crate) fn context(&self) -> &'a CallContext {
        self.ctx
    }

    /// Runs the remaining chain with whatever request is currently held —
    /// for stages that only rewrite headers/extensions in place via
    /// [`Chain::request_mut`] rather than swapping in an entirely new
    /// [`Request`].
    pub(crate) fn forward(self) -> BoxFuture<'a, Result<Response>> {
        let Chain { interceptors, index, request, ctx, exchange } = self;
        Chain::advance(interceptors, index, request, ctx, exchange)
    }

    /// Runs one attempt of the remaining chain without consuming `self` —
    /// used by [`FollowUpInterceptor`] to drive several attempts (retries,
    /// redirects, auth challenges) each starting fresh from the stages
    /// below it, rather than forcing it to give up its own position in the
    /// chain after the first attempt.
    pub(crate) fn sub_call(&self, request: Request) -> BoxFuture<'a, Result<Response>> {
        Chain::advance(self.interceptors, self.index, request, self.ctx, None)
    }

    pub(crate) fn set_exchange(&mut self, exchange: crate::exchange::Exchange) {
        self.exchange = Some(exchange);
    }

    pub(crate) fn take_exchange(&mut self) -> Option<crate::exchange::Exchange> {
        self.exchange.take()
    }

    /// Runs the next interceptor in the chain with a (possibly rewritten)
    /// request, or returns an error if none remain — reaching the end of
    /// the chain without the terminal `CallServerInterceptor` handling it
    /// is a construction bug, not a runtime condition.
    pub(crate) fn proceed(self, request: Request) -> BoxFuture<'a, Result<Response>> {
        Chain::advance(self.interceptors, self.index, request, self.ctx, self.exchange)
    }

    fn advance(
        interceptors: &'a [Box<dyn Interceptor>],
        index: usize,
        request: Request,
        ctx: &'a CallContext,
        exchange: Option<crate::exchange::Exchange>,
    ) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            match interceptors.get(index) {
                Some(next) => {
                    let chain = Chain { interceptors, index: index + 1, request, ctx, exchange };
                    next.intercept(chain).await
                }
                None => Err(crate::Error::protocol("interceptor chain exhausted without a terminal interceptor")),
            }
        })
    }
}

/// Handles shared across every interceptor for one logical call (a call
/// may run several exchanges over redirects/retries/auth challenges, but
/// shares one `CallContext`).
pub(crate) struct CallContext {
    pub(crate) pool: std::sync::Arc<crate::pool::ConnectionPool>,
    pub(crate) route_database: std::sync::Arc<crate::route::RouteDatabase>,
    pub(crate) cache: Option<std::sync::Arc<crate::cache::CacheEngine>>,
    pub(crate) event_listener: std::sync::Arc<dyn crate::event::EventListener>,
    pub(crate) redirect_policy: crate::redirect::Policy,
    pub(crate) retry_policy: crate::retry::Policy,
    pub(crate) authenticator: Option<std::sync::Arc<dyn crate::auth::Authenticator>>,
    pub(crate) proxy_authenticator: Option<std::sync::Arc<dyn crate::auth::Authenticator>>,
    pub(crate) default_address: crate::address::Address,
    pub(crate) connect_timeout: std::time::Duration,
    pub(crate) http1_config: crate::client::Http1Config,
    pub(crate) http2_config: crate::client::Http2Config,
    #[cfg(feature = "cookies")]
    pub(crate) cookie_jar: Option<std::sync::Arc<dyn crate::cookie::CookieJar>>,
}
