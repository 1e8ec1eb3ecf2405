//! The engine's error taxonomy.
//!
//! Errors are grouped into *kinds*, not types: callers match on predicates
//! (`is_timeout()`, `is_redirect()`, ...) rather than downcasting, the same
//! contract `reqwest`/`rquest`-family clients expose. Internally each `Kind`
//! carries a `thiserror`-derived message; the public `Error` stays an opaque
//! facade so we can add detail later without breaking callers.

use std::{error::Error as StdError, fmt, io};

use http::Uri;

use crate::StatusCode;

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type used for dynamic error propagation across crate
/// boundaries (connector errors, codec errors, pool errors).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error produced while building, dispatching or driving a call to
/// completion.
///
/// Errors may carry the request URI; if that URI contains sensitive
/// information (an API key in a query parameter, say) use
/// [`Error::without_uri`] before logging it.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    uri: Option<Uri>,
}

/// The taxonomy named by the engine's error-handling design: a finite list
/// of *kinds*, each with a fixed retry/propagation policy (see
/// `interceptor::followup` and `interceptor::retry_on_failure`).
#[derive(Debug, thiserror::Error)]
pub(crate) enum Kind {
    #[error("builder error")]
    Builder,
    #[error("error sending request")]
    Request,
    #[error("error following redirect")]
    Redirect,
    #[error("request or response body error")]
    Body,
    #[error("error decoding response body")]
    Decode,
    #[error("error upgrading connection")]
    Upgrade,
    #[error("http protocol error")]
    Protocol,
    #[error("server responded with status code {0}")]
    Status(StatusCode),
    #[error("operation timed out")]
    Timeout,
    #[error("call was canceled")]
    Canceled,
    #[error("tls handshake failed")]
    TlsFallbackEligible,
    #[error("tls handshake failed fatally")]
    TlsFatal,
    #[error("certificate pin mismatch")]
    Pinning,
    #[error("too many follow-up requests: {0}")]
    TooManyFollowUps(u32),
    #[error("unsupported service configuration")]
    UnsupportedService,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
                uri: None,
            }),
        }
    }

    pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Builder, Some(e))
    }

    pub(crate) fn request<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Request, Some(e))
    }

    pub(crate) fn redirect<E: Into<BoxError>>(e: E, uri: Uri) -> Error {
        Error::new(Kind::Redirect, Some(e)).with_uri(uri)
    }

    pub(crate) fn body<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Body, Some(e))
    }

    pub(crate) fn decode<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Decode, Some(e))
    }

    pub(crate) fn upgrade<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Upgrade, Some(e))
    }

    pub(crate) fn protocol<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Protocol, Some(e))
    }

    pub(crate) fn status_code(uri: Uri, status: StatusCode) -> Error {
        Error::new(Kind::Status(status), None::<Error>).with_uri(uri)
    }

    pub(crate) fn timeout<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Timeout, Some(e))
    }

    pub(crate) fn canceled() -> Error {
        Error::new::<Error>(Kind::Canceled, None)
    }

    pub(crate) fn tls_fallback_eligible<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::TlsFallbackEligible, Some(e))
    }

    pub(crate) fn tls_fatal<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::TlsFatal, Some(e))
    }

    pub(crate) fn pinning<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Pinning, Some(e))
    }

    pub(crate) fn too_many_followups(n: u32) -> Error {
        Error::new::<Error>(Kind::TooManyFollowUps(n), None)
    }

    pub(crate) fn unsupported_service<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::UnsupportedService, Some(e))
    }

    pub(crate) fn with_uri(mut self, uri: Uri) -> Self {
        self.inner.uri = Some(uri);
        self
    }

    /// Returns the request URI related to this error, if any.
    pub fn uri(&self) -> Option<&Uri> {
        self.inner.uri.as_ref()
    }

    /// Strips the related URI from this error, e.g. before logging it.
    pub fn without_uri(mut self) -> Self {
        self.inner.uri = None;
        self
    }

    /// True if construction of a request/client/header failed.
    pub fn is_builder(&self) -> bool {
        matches!(self.inner.kind, Kind::Builder)
    }

    /// True if a [`redirect::Policy`](crate::redirect::Policy) rejected a hop.
    pub fn is_redirect(&self) -> bool {
        matches!(self.inner.kind, Kind::Redirect)
    }

    /// True if raised from `Response::error_for_status`.
    pub fn is_status(&self) -> bool {
        matches!(self.inner.kind, Kind::Status(_))
    }

    /// True for any deadline (connect/read/write/full-call) expiring.
    pub fn is_timeout(&self) -> bool {
        if matches!(self.inner.kind, Kind::Timeout) {
            return true;
        }
        let mut source = StdError::source(self);
        while let Some(err) = source {
            if let Some(io) = err.downcast_ref::<io::Error>() {
                if io.kind() == io::ErrorKind::TimedOut {
                    return true;
                }
            }
            source = err.source();
        }
        false
    }

    /// True if the call was canceled (never retried).
    pub fn is_canceled(&self) -> bool {
        matches!(self.inner.kind, Kind::Canceled)
    }

    /// True if the failure happened while dispatching the request.
    pub fn is_request(&self) -> bool {
        matches!(self.inner.kind, Kind::Request)
    }

    /// True if the failure happened establishing a connection (socket-level,
    /// not a protocol or TLS-certificate problem).
    pub fn is_connect(&self) -> bool {
        if !matches!(self.inner.kind, Kind::Request) {
            return false;
        }
        let mut source = StdError::source(self);
        while let Some(err) = source {
            if let Some(io) = err.downcast_ref::<io::Error>() {
                return matches!(
                    io.kind(),
                    io::ErrorKind::ConnectionRefused
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::ConnectionAborted
                        | io::ErrorKind::NotConnected
                        | io::ErrorKind::AddrNotAvailable
                );
            }
            source = err.source();
        }
        false
    }

    /// True if the request/response body failed to read or write.
    pub fn is_body(&self) -> bool {
        matches!(self.inner.kind, Kind::Body)
    }

    /// True for any TLS handshake failure, fallback-eligible or fatal.
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::TlsFallbackEligible | Kind::TlsFatal)
    }

    /// True if the failure is a fatal certificate problem: expired,
    /// untrusted, hostname mismatch. These never trigger TLS-spec fallback.
    pub fn is_tls_fatal(&self) -> bool {
        matches!(self.inner.kind, Kind::TlsFatal)
    }

    /// True if this is an eligible-for-downgrade TLS handshake failure (see
    /// `tls::fallback`).
    pub fn is_tls_fallback_eligible(&self) -> bool {
        matches!(self.inner.kind, Kind::TlsFallbackEligible)
    }

    /// True if a certificate pinner rejected the peer chain.
    pub fn is_pinning(&self) -> bool {
        matches!(self.inner.kind, Kind::Pinning)
    }

    /// True if the response violated HTTP/1.1 or HTTP/2 grammar. Never retried.
    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, Kind::Protocol)
    }

    /// True if decoding the response body (e.g. gunzip) failed.
    pub fn is_decode(&self) -> bool {
        matches!(self.inner.kind, Kind::Decode)
    }

    /// True if an HTTP upgrade failed.
    pub fn is_upgrade(&self) -> bool {
        matches!(self.inner.kind, Kind::Upgrade)
    }

    /// True if the follow-up cap (20) was exceeded.
    pub fn is_too_many_followups(&self) -> bool {
        matches!(self.inner.kind, Kind::TooManyFollowUps(_))
    }

    /// Returns the status code, if this error was generated from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self.inner.kind {
            Kind::Status(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("linkreq::Error");
        builder.field("kind", &self.inner.kind);
        if let Some(ref uri) = self.inner.uri {
            builder.field("uri", uri);
        }
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner.kind, f)?;
        if let Some(ref uri) = self.inner.uri {
            write!(f, " for url ({uri})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        if e.kind() == io::ErrorKind::TimedOut {
            Error::timeout(e)
        } else {
            Error::new(Kind::Request, Some(e))
        }
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Error {
        Error::builder(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Error {
        Error::builder(e)
    }
}
