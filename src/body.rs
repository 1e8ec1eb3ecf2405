//! Request/response body model (spec.md §3, design note "Body replay").
//!
//! A body is one of three variants: `empty`, `replayable` (bytes known
//! up-front, or a writer factory that can be invoked again), or `one_shot`
//! (a writer that can only be drained once). Follow-ups that require
//! resending the request body — retries, 401/407 authentication, 307/308
//! redirects — require a replayable body; a one-shot body fails those
//! follow-ups fast (see `interceptor::followup`).
//!
//! Grounded on `penumbra-x-rquest/src/client/body.rs`'s `Inner` split
//! between `Reusable`/`Streaming`, adapted to `http-body` 0.4's poll-based
//! `Body` trait (the version this crate's dependency table pins) and
//! extended with the `one_shot`/`is_duplex` flags spec.md names.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures_core::Stream;
use http::HeaderMap;

use crate::error::BoxError;

/// A request or response body.
///
/// Cloning a `Body` only succeeds if it is `empty` or `replayable`; a
/// `one_shot` body cannot be cloned (there is nothing sensible to hand back)
/// and callers needing retries must construct a replayable body instead.
pub struct Body {
    inner: Inner,
    one_shot: bool,
    is_duplex: bool,
}

enum Inner {
    Empty,
    Bytes(Bytes),
    /// A writer factory that can be invoked again to produce a fresh byte
    /// stream — the `replayable(writer_factory)` variant.
    Reusable(std::sync::Arc<dyn Fn() -> BodyStream + Send + Sync>),
    /// A stream that can only be polled once, with an optional known
    /// length (`-1` maps to `None`, i.e. unknown / chunked).
    Streaming {
        stream: BodyStream,
        len: Option<u64>,
    },
}

type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

impl Body {
    /// The empty body. Always replayable.
    pub fn empty() -> Body {
        Body {
            inner: Inner::Empty,
            one_shot: false,
            is_duplex: false,
        }
    }

    /// A body backed by in-memory bytes. Always replayable: `Body::clone`
    /// and any number of follow-up resends just re-read the same `Bytes`.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Body {
        Body {
            inner: Inner::Bytes(bytes.into()),
            one_shot: false,
            is_duplex: false,
        }
    }

    /// A body that can be rebuilt from scratch on every attempt by calling
    /// `factory` again. Used for streaming bodies (e.g. a file read) the
    /// caller can reopen — this is what makes a 307/308 redirect or an
    /// authentication challenge resendable without buffering everything in
    /// memory.
    pub fn reusable<F, S>(factory: F) -> Body
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Body {
            inner: Inner::Reusable(std::sync::Arc::new(move || Box::pin(factory()))),
            one_shot: false,
            is_duplex: false,
        }
    }

    /// A body that can only be streamed once: e.g. the body wraps a
    /// `TcpStream` read half, a pipe, or another resource that cannot be
    /// rewound. Retries and redirects that would need to resend this body
    /// fail fast with a protocol error instead of silently truncating it.
    pub fn one_shot<S>(stream: S, known_length: Option<u64>) -> Body
    where
        S: Stream<Item = Result<Bytes, BoxError>> + Send + 'static,
    {
        Body {
            inner: Inner::Streaming {
                stream: Box::pin(stream),
                len: known_length,
            },
            one_shot: true,
            is_duplex: false,
        }
    }

    /// Marks this body as duplex: written concurrently with the response
    /// body being read. Only meaningful (and only honored) on HTTP/2;
    /// `exchange::Exchange` rejects duplex writes on an HTTP/1 connection
    /// with a protocol error (design note "Duplex streaming").
    pub fn with_duplex(mut self, duplex: bool) -> Body {
        self.is_duplex = duplex;
        self
    }

    /// True if this body cannot be resent: a retry, redirect or
    /// authentication follow-up that would need to resend it must instead
    /// surface the original response/error to the caller.
    pub fn is_one_shot(&self) -> bool {
        self.one_shot
    }

    pub fn is_duplex_request(&self) -> bool {
        self.is_duplex
    }

    /// The declared length, if known. `None` means unknown/chunked.
    pub fn content_length(&self) -> Option<u64> {
        match &self.inner {
            Inner::Empty => Some(0),
            Inner::Bytes(b) => Some(b.len() as u64),
            Inner::Reusable(_) => None,
            Inner::Streaming { len, .. } => *len,
        }
    }

    /// Returns a resendable copy of this body for a follow-up request, or
    /// `None` if it is one-shot and has already been (or is being)
    /// consumed.
    pub(crate) fn try_clone(&self) -> Option<Body> {
        match &self.inner {
            Inner::Empty => Some(Body::empty()),
            Inner::Bytes(b) => Some(Body {
                inner: Inner::Bytes(b.clone()),
                one_shot: false,
                is_duplex: self.is_duplex,
            }),
            Inner::Reusable(factory) => {
                let factory = factory.clone();
                Some(Body {
                    inner: Inner::Reusable(factory),
                    one_shot: false,
                    is_duplex: self.is_duplex,
                })
            }
            Inner::Streaming { .. } if self.one_shot => None,
            Inner::Streaming { .. } => None,
        }
    }

    /// Materializes this body into a fresh poll-able byte stream for
    /// sending on the wire. For `Reusable` this invokes the factory again;
    /// for `Streaming` it consumes the body (this can only be called once).
    pub(crate) fn into_stream(self) -> (BodyStream, Option<u64>) {
        match self.inner {
            Inner::Empty => (Box::pin(futures_util::stream::empty()), Some(0)),
            Inner::Bytes(b) => {
                let len = b.len() as u64;
                (Box::pin(futures_util::stream::once(async move { Ok(b) })), Some(len))
            }
            Inner::Reusable(factory) => (factory(), None),
            Inner::Streaming { stream, len } => (stream, len),
        }
    }
}

impl Clone for Body {
    /// Panics-free clone: returns the empty body if this body cannot be
    /// cloned. Callers that need to know whether a clone is meaningful
    /// should use [`Body::try_clone`] via the request builder instead.
    fn clone(&self) -> Body {
        self.try_clone().unwrap_or_else(Body::empty)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Body {
        Body::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Body {
        Body::from_bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(s: String) -> Body {
        Body::from_bytes(s.into_bytes())
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Body {
        Body::from_bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = f.debug_struct("Body");
        match &self.inner {
            Inner::Empty => b.field("kind", &"empty"),
            Inner::Bytes(bytes) => b.field("kind", &"bytes").field("len", &bytes.len()),
            Inner::Reusable(_) => b.field("kind", &"reusable"),
            Inner::Streaming { len, .. } => b.field("kind", &"streaming").field("len", len),
        };
        b.field("one_shot", &self.one_shot)
            .field("is_duplex", &self.is_duplex)
            .finish()
    }
}

/// Trailers promise: populated once the body has been fully read, on
/// chunked HTTP/1.1 transfers and HTTP/2 streams alike (spec.md §3).
#[derive(Clone, Debug, Default)]
pub struct Trailers(pub(crate) Option<HeaderMap>);

impl Trailers {
    pub fn get(&self) -> Option<&HeaderMap> {
        self.0.as_ref()
    }
}

/// Adapts a [`Body`]'s stream into the `http_body::Body` trait hyper's
/// HTTP/1 codec drives directly.
pub(crate) struct HttpBodyAdapter {
    stream: BodyStream,
}

impl HttpBodyAdapter {
    pub(crate) fn new(stream: BodyStream) -> Self {
        HttpBodyAdapter { stream }
    }
}

impl http_body::Body for HttpBodyAdapter {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        let this = self.get_mut();
        this.stream.as_mut().poll_next(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        Poll::Ready(Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn bytes_body_is_replayable() {
        let body = Body::from_bytes(Bytes::from_static(b"abc"));
        assert_eq!(body.content_length(), Some(3));
        let clone = body.try_clone().expect("bytes body is replayable");
        let (stream, len) = clone.into_stream();
        let collected: Vec<u8> = stream.try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        }).await.unwrap();
        assert_eq!(collected, b"abc");
        assert_eq!(len, Some(3));
    }

    #[test]
    fn one_shot_body_cannot_be_cloned() {
        let body = Body::one_shot(futures_util::stream::empty(), None);
        assert!(body.is_one_shot());
        assert!(body.try_clone().is_none());
    }
}
