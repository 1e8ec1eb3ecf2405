//! HTTP/2 framing (C5, spec.md §4.4): wraps the `h2` crate's own
//! `client::handshake`/`SendRequest`/`Connection` directly, rather than
//! going through `hyper::Client`'s h2 dispatch, so the exchange layer can
//! multiplex several logical exchanges over one pooled connection itself.

use bytes::Bytes;
use h2::client::{self, SendRequest};
use h2::RecvStream;
use http::{HeaderMap, Request as HttpRequest, Response as HttpResponse};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::body::Body;
use crate::error::{BoxError, Result};
use crate::Error;

/// One HTTP/2 connection's request-sending handle. Clonable and safe to
/// share across concurrently running exchanges — `h2::SendRequest` itself
/// is designed for exactly this (§4.4's "multiple concurrent exchanges
/// over one connection" requirement).
#[derive(Clone)]
pub struct Http2Codec {
    send_request: SendRequest<Bytes>,
}

impl Http2Codec {
    /// Performs the HTTP/2 connection preface and `SETTINGS` exchange,
    /// returning the request sender and a connection-driver future the
    /// caller must spawn immediately (identical contract to
    /// [`super::Http1Codec::handshake`]).
    pub async fn handshake<S>(io: S, config: &crate::client::Http2Config) -> Result<(Self, impl std::future::Future<Output = Result<()>> + Send)>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut builder = client::Builder::new();
        if let Some(size) = config.initial_stream_window_size() {
            builder.initial_window_size(size);
        }
        if let Some(size) = config.initial_connection_window_size() {
            builder.initial_connection_window_size(size);
        }
        if let Some(size) = config.header_table_size() {
            builder.header_table_size(size);
        }
        if let Some(enabled) = config.enable_push() {
            builder.enable_push(enabled);
        }
        if let Some(max) = config.max_concurrent_streams() {
            builder.max_concurrent_streams(max);
        }
        if let Some(size) = config.max_frame_size() {
            builder.max_frame_size(size);
        }
        if let Some(size) = config.max_header_list_size() {
            builder.max_header_list_size(size);
        }

        let (send_request, connection) = builder.handshake(io).await.map_err(Error::builder)?;
        let driver = async move { connection.await.map_err(Error::request) };
        Ok((Http2Codec { send_request }, driver))
    }

    /// Blocks until the connection has enough capacity (stream-id space
    /// and peer `SETTINGS_MAX_CONCURRENT_STREAMS`) to open another
    /// exchange. The pool consults this before handing out a connection
    /// to a new exchange rather than queuing blindly.
    pub async fn ready(&mut self) -> Result<()> {
        futures_util::future::poll_fn(|cx| self.send_request.poll_ready(cx))
            .await
            .map_err(Error::request)
    }

    pub fn send(&mut self, request: HttpRequest<Body>, end_of_stream: bool) -> Result<(Http2ResponseFuture, Option<Http2RequestBody>)> {
        let (parts, body) = request.into_parts();
        let wire_request = HttpRequest::from_parts(parts, ());

        let (response_fut, send_stream) = self
            .send_request
            .send_request(wire_request, end_of_stream)
            .map_err(Error::request)?;

        let request_body = if end_of_stream { None } else { Some(Http2RequestBody { send_stream, body }) };

        Ok((Http2ResponseFuture(response_fut), request_body))
    }
}

impl std::fmt::Debug for Http2Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http2Codec").finish()
    }
}

/// Drives the request body's stream into h2's `SendStream`, honoring flow
/// control (`send_stream.reserve_capacity`/`capacity`) rather than writing
/// blindly. Used for both ordinary request bodies and the write half of a
/// duplex exchange.
pub struct Http2RequestBody {
    send_stream: h2::SendStream<Bytes>,
    body: Body,
}

impl Http2RequestBody {
    pub async fn write_all(mut self) -> Result<()> {
        let (mut stream, _len) = self.body.into_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::body)?;
            self.send_stream.reserve_capacity(chunk.len());
            self.send_stream.send_data(chunk, false).map_err(Error::request)?;
        }
        self.send_stream.send_data(Bytes::new(), true).map_err(Error::request)?;
        Ok(())
    }
}

impl std::fmt::Debug for Http2RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http2RequestBody").field("body", &self.body).finish()
    }
}

pub struct Http2ResponseFuture(client::ResponseFuture);

impl Http2ResponseFuture {
    pub async fn await_response(self) -> Result<HttpResponse<Http2ResponseBody>> {
        let response = self.0.await.map_err(Error::request)?;
        let (parts, body) = response.into_parts();
        Ok(HttpResponse::from_parts(parts, Http2ResponseBody(body)))
    }
}

impl std::fmt::Debug for Http2ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http2ResponseFuture").finish()
    }
}

/// Adapts an `h2::RecvStream`, applying flow-control credit back to the
/// connection as chunks are consumed (`flow_control().release_capacity`).
pub struct Http2ResponseBody(RecvStream);

impl Http2ResponseBody {
    pub async fn next_chunk(&mut self) -> Option<std::result::Result<Bytes, BoxError>> {
        match self.0.data().await {
            Some(Ok(chunk)) => {
                let _ = self.0.flow_control().release_capacity(chunk.len());
                Some(Ok(chunk))
            }
            Some(Err(e)) => Some(Err(Box::new(e) as BoxError)),
            None => None,
        }
    }

    pub async fn trailers(&mut self) -> std::result::Result<Option<HeaderMap>, BoxError> {
        self.0.trailers().await.map_err(|e| Box::new(e) as BoxError)
    }
}

impl std::fmt::Debug for Http2ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http2ResponseBody").finish()
    }
}
