//! The terminal interceptor (spec.md §4.5/§4.6): drives the exchange the
//! connect interceptor attached to the chain, and translates its raw
//! codec-level response into a [`crate::Response`]. Grounded on OkHttp's
//! `CallServerInterceptor`, the last link in its chain.

use std::future::Future;
use std::time::SystemTime;

use bytes::Bytes;
use futures_core::Stream;
use http::Request as HttpRequest;

use super::{BoxFuture, Chain, Interceptor};
use crate::body::Trailers;
use crate::response::Response;
use crate::Result;

pub(crate) struct CallServerInterceptor;

impl Interceptor for CallServerInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<crate::Response>> {
        Box::pin(async move {
            let mut exchange = chain
                .take_exchange()
                .expect("ConnectInterceptor must run before CallServerInterceptor");

            let request = chain.request().clone();
            let url = request.url().clone();
            let method = request.method().clone();
            let version = request.version();
            let mut builder = HttpRequest::builder().method(method).uri(url_to_uri(&url)).version(version);
            if let Some(headers) = builder.headers_mut() {
                *headers = request.headers().clone();
            }
            let body = request.body().cloned().unwrap_or_else(crate::Body::empty);
            let wire_request = builder.body(body).map_err(crate::Error::from)?;

            let sent_at = SystemTime::now();
            let result = exchange.execute(wire_request).await;
            let received_at = SystemTime::now();

            match result {
                Ok(wire_response) => {
                    let (parts, body) = wire_response.into_parts();
                    // The exchange stays allocated on `connection` until the
                    // stream below reaches its natural end, errors, or is
                    // dropped early — releasing it the instant headers
                    // parse would let another caller acquire this HTTP/1.1
                    // connection while this body is still mid-flight
                    // (spec.md §4.3's single-exchange invariant).
                    let stream: std::pin::Pin<Box<dyn Stream<Item = std::result::Result<Bytes, crate::error::BoxError>> + Send>> =
                        Box::pin(ExchangeBodyStream { body: Some(body), exchange: Some(exchange) });

                    let mut response = Response::new(url, parts.status, parts.version, parts.headers, stream, sent_at, received_at);
                    response.set_trailers(Trailers::default());
                    Ok(response)
                }
                Err(e) => {
                    // `Exchange::execute` already released the allocation
                    // slot and flagged the connection `no_new_exchanges` on
                    // this path; dropping `exchange` here just returns its
                    // codec handle, which is now inert either way.
                    Err(e)
                }
            }
        })
    }
}

fn url_to_uri(url: &url::Url) -> http::Uri {
    url.as_str().parse().unwrap_or_else(|_| http::Uri::from_static("/"))
}

/// Wraps a wire-level response body together with the [`crate::exchange::Exchange`]
/// it came from, so the exchange's connection allocation is only released
/// once the body is fully drained, errors, or this stream is dropped early
/// — never the instant `execute()` returns headers (spec.md §4.3/§3).
struct ExchangeBodyStream {
    body: Option<crate::exchange::ExchangeBody>,
    exchange: Option<crate::exchange::Exchange>,
}

impl Stream for ExchangeBodyStream {
    type Item = std::result::Result<Bytes, crate::error::BoxError>;

    fn poll_next(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(body) = this.body.as_mut() else {
            return std::task::Poll::Ready(None);
        };
        let fut = body.next_chunk();
        tokio::pin!(fut);
        match fut.poll(cx) {
            std::task::Poll::Ready(Some(Ok(chunk))) => std::task::Poll::Ready(Some(Ok(chunk))),
            std::task::Poll::Ready(Some(Err(e))) => {
                this.body = None;
                if let Some(exchange) = this.exchange.take() {
                    exchange.fail();
                }
                std::task::Poll::Ready(Some(Err(e)))
            }
            std::task::Poll::Ready(None) => {
                this.body = None;
                if let Some(exchange) = this.exchange.take() {
                    exchange.finish();
                }
                std::task::Poll::Ready(None)
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}

impl Drop for ExchangeBodyStream {
    fn drop(&mut self) {
        // Reached only when the body was dropped (e.g. `Response::close`)
        // before returning its final `None`/`Err` — the connection may
        // still have unread bytes in flight, so it can never be reused.
        if let Some(exchange) = self.exchange.take() {
            exchange.fail();
        }
    }
}
