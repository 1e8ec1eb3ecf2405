//! The retry / follow-up engine (C8, spec.md §4.8): the outermost
//! interceptor, deciding after each attempt whether to recover on a new
//! route, resend unchanged, issue a follow-up request (redirect, auth
//! challenge, `408`/`503` retry), or surface the result to the caller.
//! Grounded on OkHttp's `RetryAndFollowUpInterceptor`.

use http::{header, HeaderValue, Method, StatusCode};

use super::{BoxFuture, Chain, Interceptor};
use crate::request::Request;
use crate::response::Response;
use crate::{Error, Result};

/// Hard cap on follow-ups per call (spec.md §4.8); the 21st attempt fails
/// with `Error::too_many_followups`.
const MAX_FOLLOW_UPS: u32 = 20;

pub(crate) struct FollowUpInterceptor;

impl Interceptor for FollowUpInterceptor {
    fn intercept<'a>(&'a self, chain: Chain<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let ctx = chain.context();
            let mut request = chain.request().clone();
            let mut follow_up_count = 0u32;
            let mut redirect_count = 0u32;
            let mut proxy_challenged = false;
            let mut server_challenged = false;

            loop {
                let attempt_request = request.clone();
                let body_one_shot = attempt_request.body().map(|b| b.is_one_shot()).unwrap_or(false);

                let outcome = chain.sub_call(attempt_request).await;

                let response = match outcome {
                    Ok(response) => response,
                    Err(error) => {
                        if ctx.retry_policy.is_recoverable(&error, body_one_shot) {
                            follow_up_count += 1;
                            if follow_up_count > MAX_FOLLOW_UPS {
                                return Err(Error::too_many_followups(follow_up_count));
                            }
                            continue;
                        }
                        return Err(error);
                    }
                };

                match decide(&response, &request, ctx, redirect_count, &mut proxy_challenged, &mut server_challenged).await? {
                    Decision::Done => return Ok(response),
                    Decision::Retry { request: next, is_redirect } => {
                        follow_up_count += 1;
                        if follow_up_count > MAX_FOLLOW_UPS {
                            return Err(Error::too_many_followups(follow_up_count));
                        }
                        if is_redirect {
                            redirect_count += 1;
                        }
                        request = next;
                    }
                }
            }
        })
    }
}

enum Decision {
    Done,
    Retry { request: Request, is_redirect: bool },
}

impl Decision {
    fn retry(request: Request) -> Decision {
        Decision::Retry { request, is_redirect: false }
    }

    fn redirect_to(request: Request) -> Decision {
        Decision::Retry { request, is_redirect: true }
    }
}

/// Inspects one response and decides whether another attempt is warranted,
/// applying the status-code table from spec.md §4.8.
async fn decide(
    response: &Response,
    request: &Request,
    ctx: &super::CallContext,
    redirect_count: u32,
    proxy_challenged: &mut bool,
    server_challenged: &mut bool,
) -> Result<Decision> {
    match response.status() {
        StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
            if *proxy_challenged {
                return Ok(Decision::Done);
            }
            *proxy_challenged = true;
            Ok(challenge(&ctx.proxy_authenticator, response, request).await)
        }
        StatusCode::UNAUTHORIZED => {
            if *server_challenged {
                return Ok(Decision::Done);
            }
            *server_challenged = true;
            Ok(challenge(&ctx.authenticator, response, request).await)
        }
        StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::MULTIPLE_CHOICES => Ok(redirect(response, request, ctx, redirect_count)),
        StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT => {
            if request.body().map(|b| b.is_one_shot()).unwrap_or(false) {
                return Ok(Decision::Done);
            }
            Ok(redirect(response, request, ctx, redirect_count))
        }
        StatusCode::REQUEST_TIMEOUT => Ok(retry_if_idempotent_and_replayable(response, request, ctx)),
        StatusCode::SERVICE_UNAVAILABLE => {
            if retry_after_is_zero(response) {
                Ok(retry_if_idempotent_and_replayable(response, request, ctx))
            } else {
                Ok(Decision::Done)
            }
        }
        _ => Ok(Decision::Done),
    }
}

/// `408`/`503`-with-`Retry-After: 0` resend: only when
/// `retry_on_connection_failure` is enabled and the body can be resent.
/// Unlike the connection-failure path this always targets a new connection
/// (the old one is presumed unhealthy), so the route database is left
/// untouched and the next dial just goes through the pool/planner again.
fn retry_if_idempotent_and_replayable(_response: &Response, request: &Request, ctx: &super::CallContext) -> Decision {
    if !ctx.retry_policy.retry_on_connection_failure() {
        return Decision::Done;
    }
    match request.try_clone_for_followup() {
        Some(next) => Decision::retry(next),
        None => Decision::Done,
    }
}

fn retry_after_is_zero(response: &Response) -> bool {
    match response.headers().get(header::RETRY_AFTER) {
        Some(value) => value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok()) == Some(0),
        None => false,
    }
}

fn redirect(response: &Response, request: &Request, ctx: &super::CallContext, redirect_count: u32) -> Decision {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|l| request.url().join(l).ok());

    let action = ctx.redirect_policy.action_for(redirect_count + 1, response.status(), request.url(), location);
    let crate::redirect::Action::Follow(next_url) = action else {
        return Decision::Done;
    };

    let drops_body = crate::redirect::Policy::drops_body(response.status(), request.method());
    let next_method = crate::redirect::Policy::method_for(response.status(), request.method());

    let mut next = match request.try_clone_for_followup() {
        Some(next) => next,
        None if drops_body => request_without_body(request, next_method.clone()),
        None => return Decision::Done,
    };

    *next.url_mut() = next_url.clone();
    *next.method_mut() = next_method;
    if drops_body {
        *next.body_mut() = None;
        next.headers_mut().remove(header::CONTENT_LENGTH);
        next.headers_mut().remove(header::CONTENT_TYPE);
    }

    if is_cross_origin(request.url(), &next_url) {
        next.headers_mut().remove(header::AUTHORIZATION);
        next.headers_mut().remove(header::COOKIE);
    }

    Decision::redirect_to(next)
}

/// A one-shot body that can't be cloned still allows a redirect that drops
/// the body entirely (301/302/303 downgrading a non-idempotent method).
fn request_without_body(request: &Request, method: Method) -> Request {
    let mut next = Request::new(method, request.url().clone());
    *next.headers_mut() = request.headers().clone();
    next
}

fn is_cross_origin(from: &url::Url, to: &url::Url) -> bool {
    from.scheme() != to.scheme() || from.host_str() != to.host_str() || from.port_or_known_default() != to.port_or_known_default()
}

async fn challenge(
    authenticator: &Option<std::sync::Arc<dyn crate::auth::Authenticator>>,
    response: &Response,
    request: &Request,
) -> Decision {
    let Some(authenticator) = authenticator else {
        return Decision::Done;
    };
    match authenticator.authenticate(response).await {
        Some(mut retried) => {
            if retried.body().is_none() {
                if let Some(body) = request.body() {
                    *retried.body_mut() = body.try_clone();
                }
            }
            Decision::retry(retried)
        }
        None => Decision::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_zero_parses() {
        let mut headers = http::HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("0"));
        let response = Response::new(
            url::Url::parse("https://example.com").unwrap(),
            StatusCode::SERVICE_UNAVAILABLE,
            http::Version::HTTP_11,
            headers,
            Box::pin(futures_util::stream::empty()),
            std::time::SystemTime::now(),
            std::time::SystemTime::now(),
        );
        assert!(retry_after_is_zero(&response));
    }

    #[test]
    fn cross_origin_detects_host_change() {
        let a = url::Url::parse("https://example.com/one").unwrap();
        let b = url::Url::parse("https://other.com/two").unwrap();
        assert!(is_cross_origin(&a, &b));
        let c = url::Url::parse("https://example.com/two").unwrap();
        assert!(!is_cross_origin(&a, &c));
    }
}
