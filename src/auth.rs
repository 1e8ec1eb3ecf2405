//! Authentication challenge hooks (part of C8, spec.md §4.8): invoked by
//! [`crate::interceptor::FollowUpInterceptor`] on a `401` or `407`
//! response. Grounded on OkHttp's `Authenticator` interface, expressed as
//! a hand-rolled async trait (boxed future) in the same style as
//! [`crate::interceptor::Interceptor`] rather than pulling in `async-trait`
//! for a single call site.

use crate::{Request, Response};

pub(crate) type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Produces a retried request in response to a `401`/`407` challenge, or
/// `None` to give up and surface the challenge response to the caller.
///
/// Called at most once per challenge per call (spec.md §4.8) — the
/// follow-up engine does not loop an authenticator against its own output.
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(&'a self, response: &'a Response) -> BoxFuture<'a, Option<Request>>;
}

/// An authenticator that always declines, for clients that never configure
/// one — `401`/`407` responses are then surfaced to the caller directly.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

impl Authenticator for NoneAuthenticator {
    fn authenticate<'a>(&'a self, _response: &'a Response) -> BoxFuture<'a, Option<Request>> {
        Box::pin(async { None })
    }
}
