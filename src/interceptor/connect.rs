//! Acquires (or establishes) the connection an exchange will run over
//! (C3 + the route planner, spec.md §4.1/§4.2), including the TLS
//! connection-spec fallback loop (§4.12). Grounded on OkHttp's
//! `ConnectInterceptor`/`ExchangeFinder`.

use std::sync::Arc;

use tracing::debug;

use super::{BoxFuture, Chain, Interceptor};
use crate::address::Address;
use crate::connection::Connection;
use crate::exchange::Exchange;
use crate::net::{self, BoxedIo};
use crate::proto::{Http1Codec, Http2Codec};
use crate::route::{Route, RoutePlanner};
use crate::tls::{FallbackPolicy, FallbackState};
use crate::{Error, Result};

pub(crate) struct ConnectInterceptor;

impl Interceptor for ConnectInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<crate::Response>> {
        Box::pin(async move {
            let ctx = chain.context();
            let address = address_for(chain.request(), &ctx.default_address);

            let connection = acquire_or_connect(&address, ctx).await?;
            ctx.event_listener.connection_acquired(chain.request().url());

            let exchange = match Exchange::acquire(connection.clone()) {
                Ok(exchange) => exchange,
                Err(_) => {
                    // The connection we were handed raced with another
                    // caller and lost its HTTP/1.1 slot; dial fresh rather
                    // than fail the call outright.
                    let fresh = dial_fresh(&address, ctx).await?;
                    Exchange::acquire(fresh)?
                }
            };

            chain.set_exchange(exchange);
            chain.forward().await
        })
    }
}

/// Builds the `Address` this request actually targets: host/port come from
/// the request URL, but `dns`/`proxy_selector`/`tls` are the client's own
/// shared `Arc`s, so two requests to the same host pool together exactly
/// when they were issued from the same `Client` (`Address`'s `PartialEq`
/// compares those fields by `Arc::ptr_eq`).
fn address_for(request: &crate::Request, default: &Address) -> Address {
    let (host, port) = crate::into_url::host_port(request.url());
    let address = Address::new(host, port, default.dns().clone(), default.proxy_selector().clone());
    if request.url().scheme() == "https" {
        if let Some(tls) = default.tls() {
            return address.with_tls(tls.clone());
        }
    }
    address
}

/// Tries the pool first; on a miss, dials fresh (see [`dial_fresh`]).
async fn acquire_or_connect(address: &Address, ctx: &super::CallContext) -> Result<Arc<Connection>> {
    if let Some(conn) = ctx.pool.acquire(address) {
        return Ok(conn);
    }
    dial_fresh(address, ctx).await
}

/// Plans routes for `address` and dials the first one that connects,
/// running the TLS fallback loop (§4.12) for `https://` addresses.
/// Successes and failures are recorded into the shared
/// [`crate::route::RouteDatabase`]; a freshly dialed connection is also
/// handed to the pool so later requests can reuse it.
async fn dial_fresh(address: &Address, ctx: &super::CallContext) -> Result<Arc<Connection>> {
    let planner = RoutePlanner::new(address, &ctx.route_database);
    let proxies = address.proxy_selector().select(&url_for(address));

    let mut last_error = None;
    for proxy in proxies {
        let routes = match planner.plan_for_proxy(proxy.clone()).await {
            Ok(routes) => routes,
            Err(e) => {
                last_error = Some(Error::request(e));
                continue;
            }
        };

        for route in routes {
            match dial(address, &route, ctx).await {
                Ok(conn) => {
                    ctx.route_database.record_success(&route);
                    ctx.pool.put(address.clone(), conn.clone());
                    return Ok(conn);
                }
                Err(e) => {
                    ctx.route_database.record_failure(route);
                    last_error = Some(e);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::request("no routes available")))
}

/// Dials one route: opens the transport (direct or proxied), then, for a
/// `https://` route, runs the TLS connection-spec fallback state machine
/// around the handshake before negotiating the HTTP/1.1-vs-HTTP/2 codec
/// via ALPN.
async fn dial(address: &Address, route: &Route, ctx: &super::CallContext) -> Result<Arc<Connection>> {
    let io = net::connect_transport(route).await?;

    if !route.spec().is_tls() {
        let (codec, driver) = Http1Codec::handshake(io, &ctx.http1_config).await?;
        let connection = Arc::new(Connection::new_http1(route.clone(), None, codec));
        spawn_driver(driver, "http/1", connection.clone());
        return Ok(connection);
    }

    let alpn = address.tls().map(|t| t.alpn_protocols().to_vec()).unwrap_or_else(|| vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    let specs = address.tls().map(|t| t.specs().to_vec()).unwrap_or_default();
    let mut fallback = FallbackState::new(specs);

    let mut io = Some(io);
    let mut is_fallback = false;
    loop {
        let spec = match fallback.next() {
            Some(spec) => spec,
            None => return Err(Error::request("no tls connection specs configured")),
        };

        match net::tls_handshake(io.take().expect("io reused after move"), address.host(), &spec, &alpn, is_fallback).await {
            Ok((tls_io, handshake)) => return build_negotiated_connection(route.clone(), tls_io, handshake, ctx).await,
            Err(e) => match fallback.on_failure(e.is_tls_fallback_eligible()) {
                FallbackPolicy::Retry { is_fallback: fb, .. } => {
                    is_fallback = fb;
                    io = Some(net::connect_transport(route).await?);
                    continue;
                }
                FallbackPolicy::Exhausted => return Err(e),
            },
        }
    }
}

async fn build_negotiated_connection(route: Route, io: BoxedIo, handshake: crate::tls::Handshake, ctx: &super::CallContext) -> Result<Arc<Connection>> {
    if handshake.alpn_protocol() == Some("h2") {
        let (codec, driver) = Http2Codec::handshake(io, &ctx.http2_config).await?;
        let connection = Arc::new(Connection::new_http2(route, Some(handshake), codec));
        spawn_driver(driver, "http/2", connection.clone());
        Ok(connection)
    } else {
        let (codec, driver) = Http1Codec::handshake(io, &ctx.http1_config).await?;
        let connection = Arc::new(Connection::new_http1(route, Some(handshake), codec));
        spawn_driver(driver, "http/1", connection.clone());
        Ok(connection)
    }
}

/// Spawns the connection's dedicated reader/writer driver task (`hyper`'s
/// or `h2`'s `Connection` future). Whatever end the driver reaches — a
/// clean shutdown, a remote GOAWAY, or an I/O error — the connection must
/// stop accepting new exchanges (§4.2/§4.4): nothing else observes the
/// driver's exit, so this is the only place that can flag it.
fn spawn_driver(driver: impl std::future::Future<Output = Result<()>> + Send + 'static, protocol: &'static str, connection: Arc<Connection>) {
    tokio::spawn(async move {
        match driver.await {
            Ok(()) => debug!(protocol, "connection driver exited"),
            Err(e) => debug!(error = %e, protocol, "connection driver exited"),
        }
        connection.set_no_new_exchanges();
    });
}

fn url_for(address: &Address) -> url::Url {
    let scheme = if address.is_https() { "https" } else { "http" };
    url::Url::parse(&format!("{scheme}://{}:{}", address.host(), address.port())).unwrap_or_else(|_| url::Url::parse("http://localhost").unwrap())
}
