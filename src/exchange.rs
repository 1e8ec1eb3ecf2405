//! The exchange layer (C6, spec.md §4.5): carries exactly one
//! request/response pair over a connection acquired from the pool,
//! dispatching to whichever codec (C4/C5) the connection negotiated.
//! Grounded on OkHttp's `Exchange`/`ExchangeCodec` pair — the seam between
//! "which connection" (pool/route planner) and "how bytes move" (codec).

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Request as HttpRequest, Response as HttpResponse};

use crate::body::Body;
use crate::connection::{Connection, Protocol};
use crate::error::BoxError;
use crate::proto::{Http1Codec, Http2Codec};

/// Either wire codec, behind one type so the rest of the engine doesn't
/// branch on protocol outside this module.
pub(crate) enum Codec {
    Http1(Http1Codec),
    Http2(Http2Codec),
}

/// One request/response round trip over an already-established
/// connection. Does not itself decide *which* connection to use (that's
/// C3) or whether to retry (that's C8) — it only drives the bytes.
pub(crate) struct Exchange {
    connection: Arc<Connection>,
    codec: Option<Codec>,
}

impl Exchange {
    /// Checks a codec handle out of `connection` and marks it allocated.
    /// Fails with a retryable request error if the connection's single
    /// HTTP/1.1 slot was already checked out — the caller (the connect
    /// interceptor) treats this the same as a pool miss and dials fresh.
    pub(crate) fn acquire(connection: Arc<Connection>) -> crate::Result<Self> {
        let codec = connection.take_codec().ok_or_else(|| crate::Error::request("connection has no available codec slot"))?;
        connection.acquire();
        Ok(Exchange { connection, codec: Some(codec) })
    }

    pub(crate) fn protocol(&self) -> Protocol {
        self.connection.protocol()
    }

    /// Sends `request` and returns once the response headers have
    /// arrived; the response body is read afterward via
    /// [`ExchangeBody::next_chunk`]. Releases the connection's allocation
    /// slot on any error path so a failed exchange never leaks pool
    /// capacity.
    pub(crate) async fn execute(&mut self, request: HttpRequest<Body>) -> crate::Result<HttpResponse<ExchangeBody>> {
        let codec = self.codec.as_mut().expect("codec taken before exchange finished");
        let result = match codec {
            Codec::Http1(h1) => h1
                .send(request)
                .await
                .map(|r| r.map(ExchangeBody::Http1)),
            Codec::Http2(h2) => {
                h2.ready().await?;
                let has_body = request.body().content_length() != Some(0);
                let (response_fut, request_body) = h2.send(request, !has_body)?;
                if let Some(body) = request_body {
                    tokio::spawn(async move {
                        if let Err(e) = body.write_all().await {
                            tracing::debug!(error = %e, "http/2 request body write failed");
                        }
                    });
                }
                response_fut.await_response().await.map(|r| r.map(ExchangeBody::Http2))
            }
        };

        if result.is_err() {
            // A header-phase failure leaves the connection's framing state
            // unknown (a half-written request, a malformed status line);
            // it must never be handed back out by the pool (§3).
            self.connection.set_no_new_exchanges();
            self.connection.release();
        }

        result
    }

    /// Ends the exchange once its response body (and trailers) have been
    /// fully drained without error: returns the codec handle to the
    /// connection (HTTP/1.1: back into its single slot; HTTP/2: dropped,
    /// since the handle was only ever a clone) and releases the allocation
    /// slot, making the connection eligible for reuse again.
    pub(crate) fn finish(mut self) {
        if let Some(codec) = self.codec.take() {
            self.connection.return_codec(codec);
        }
        self.connection.release();
    }

    /// Ends the exchange because its response body errored, or because it
    /// was dropped before the body finished draining. The connection is
    /// flagged `no_new_exchanges` rather than returned to its slot — a
    /// partially read body leaves unread bytes on the wire, so the
    /// connection can never be safely reused (§3).
    pub(crate) fn fail(mut self) {
        self.codec.take();
        self.connection.set_no_new_exchanges();
        self.connection.release();
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if let Some(codec) = self.codec.take() {
            self.connection.return_codec(codec);
        }
    }
}

/// Either codec's response body, behind one type for the decoder/cache
/// layers above the exchange to consume uniformly.
pub(crate) enum ExchangeBody {
    Http1(crate::proto::h1::ResponseBody),
    Http2(crate::proto::h2::Http2ResponseBody),
}

impl ExchangeBody {
    pub(crate) async fn next_chunk(&mut self) -> Option<Result<Bytes, BoxError>> {
        match self {
            ExchangeBody::Http1(b) => b.next_chunk().await,
            ExchangeBody::Http2(b) => b.next_chunk().await,
        }
    }

    pub(crate) async fn trailers(&mut self) -> Result<Option<HeaderMap>, BoxError> {
        match self {
            ExchangeBody::Http1(b) => b.trailers().await,
            ExchangeBody::Http2(b) => b.trailers().await,
        }
    }

    /// Drains the remaining body into one contiguous buffer, used by
    /// `Response::bytes`/`Response::text` and by the cache writer.
    pub(crate) async fn collect(mut self) -> Result<Bytes, BoxError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}
