//! HTTP/1.1 framing (C4, spec.md §4.3): request-line/header serialization
//! and status-line/header/body parsing, including the transfer-encoding
//! priority rule (`Transfer-Encoding: chunked` wins over `Content-Length`,
//! which wins over close-delimited). We drive `hyper::client::conn`
//! directly rather than `hyper::Client`, since connection selection is
//! handled by our own pool (C3) rather than hyper's.

use std::io;

use bytes::Bytes;
use http::{HeaderMap, Request as HttpRequest, Response as HttpResponse};
use http_body::Body as _;
use hyper::client::conn::{self, SendRequest};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::body::{Body, HttpBodyAdapter};
use crate::error::{BoxError, Result};
use crate::Error;

/// One HTTP/1.1 connection's request-sending half. `hyper::client::conn`
/// splits a connection into this and a `Connection` future that must be
/// polled to completion for I/O to happen; the exchange layer spawns that
/// future onto the runtime and keeps this handle.
pub struct Http1Codec {
    send_request: SendRequest<HttpBodyAdapter>,
}

impl Http1Codec {
    /// Performs the HTTP/1.1 handshake over an already-connected (and, for
    /// `https://`, already TLS-wrapped) stream, returning the request
    /// sender and a future that drives the connection's I/O. The caller
    /// must `tokio::spawn` the driver future immediately; the codec only
    /// talks over the channel `hyper` sets up internally.
    pub async fn handshake<S>(io: S, config: &crate::client::Http1Config) -> Result<(Self, impl std::future::Future<Output = Result<()>> + Send)>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        // hyper 0.14's client conn builder has no knob for `max_headers`; the
        // field lives on `Http1Config` for parity with the rest of the
        // surface but only the settings below actually reach the wire.
        let mut builder = conn::Builder::new();
        builder
            .http09_responses(config.http09_responses())
            .http1_title_case_headers(config.title_case_headers())
            .http1_preserve_header_case(config.preserve_header_case())
            .http1_max_buf_size(config.max_buf_size())
            .http1_allow_spaces_after_header_name_in_responses(config.allow_spaces_after_header_name_in_responses())
            .http1_allow_obsolete_multiline_headers_in_responses(config.allow_obsolete_multiline_headers_in_responses())
            .http1_ignore_invalid_headers_in_responses(config.ignore_invalid_headers_in_responses());
        if let Some(writev) = config.writev() {
            builder.http1_writev(writev);
        }
        if let Some(read_buf_exact_size) = config.read_buf_exact_size() {
            builder.http1_read_buf_exact_size(Some(read_buf_exact_size));
        }

        let (send_request, connection) = builder.handshake(io).await.map_err(Error::builder)?;
        let driver = async move { connection.await.map_err(Error::request) };
        Ok((Http1Codec { send_request }, driver))
    }

    pub fn is_ready(&mut self) -> bool {
        self.send_request.is_ready()
    }

    pub async fn send(&mut self, request: HttpRequest<Body>) -> Result<HttpResponse<ResponseBody>> {
        let (parts, body) = request.into_parts();
        let (stream, _len) = body.into_stream();
        let wire_request = HttpRequest::from_parts(parts, HttpBodyAdapter::new(stream));

        let response = self
            .send_request
            .send_request(wire_request)
            .await
            .map_err(|e| classify_send_error(e))?;

        let (parts, body) = response.into_parts();
        Ok(HttpResponse::from_parts(parts, ResponseBody::new(body)))
    }
}

impl std::fmt::Debug for Http1Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http1Codec").finish()
    }
}

fn classify_send_error(e: hyper::Error) -> Error {
    if e.is_canceled() {
        Error::canceled()
    } else {
        Error::request(e)
    }
}

/// Adapts hyper's response body (which implements `http_body::Body`) back
/// into the stream shape the rest of the crate (response decoding,
/// gzip bridge, cache writer) expects.
pub struct ResponseBody {
    inner: hyper::Body,
}

impl ResponseBody {
    fn new(inner: hyper::Body) -> Self {
        ResponseBody { inner }
    }

    pub async fn next_chunk(&mut self) -> Option<std::result::Result<Bytes, BoxError>> {
        use futures_util::StreamExt;
        self.inner.next().await.map(|r| r.map_err(|e| Box::new(e) as BoxError))
    }

    pub fn trailers_now(&self) -> Option<HeaderMap> {
        None
    }

    pub async fn trailers(&mut self) -> std::result::Result<Option<HeaderMap>, BoxError> {
        std::future::poll_fn(|cx| std::pin::Pin::new(&mut self.inner).poll_trailers(cx))
            .await
            .map_err(|e| Box::new(e) as BoxError)
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody").finish()
    }
}

pub(crate) fn io_error_is_connect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset | io::ErrorKind::TimedOut
    )
}
