//! The redirect policy (part of C8, spec.md §4.8): decides whether, and
//! how, to follow a `3xx` response. Grounded on `penumbra-x-rquest/src/redirect.rs`,
//! trimmed to the decision surface the follow-up engine actually needs
//! (this crate does not expose a scripting hook for per-hop inspection;
//! callers wanting that build it on top of [`crate::Client::execute`] and
//! drive redirects themselves).

use http::{Method, StatusCode};
use url::Url;

/// What to do about a redirect response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Follow the redirect to `location`.
    Follow(Url),
    /// Stop following and return the `3xx` response as-is.
    Stop,
}

/// How many, and which, redirects a [`crate::Client`] will follow
/// automatically.
#[derive(Debug, Clone)]
pub struct Policy {
    max_redirects: u32,
    follow_redirects: bool,
    follow_ssl_redirects: bool,
}

impl Default for Policy {
    /// Follows up to 10 redirects including HTTPS→HTTP downgrades, matching
    /// the teacher's default and OkHttp's.
    fn default() -> Self {
        Policy { max_redirects: 10, follow_redirects: true, follow_ssl_redirects: true }
    }
}

impl Policy {
    pub fn limited(max_redirects: u32) -> Self {
        Policy { max_redirects, ..Default::default() }
    }

    pub fn none() -> Self {
        Policy { max_redirects: 0, follow_redirects: false, ..Default::default() }
    }

    pub fn follow_ssl_redirects(mut self, follow: bool) -> Self {
        self.follow_ssl_redirects = follow;
        self
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Decides the action for hop number `attempt` (1-indexed) given the
    /// previous request's URL, the response status, and the `Location`
    /// header value (already resolved against the previous URL). A
    /// cross-scheme HTTPS→HTTP hop is refused unless `follow_ssl_redirects`
    /// is set; every other same-or-upgrading scheme change is permitted.
    pub(crate) fn action_for(&self, attempt: u32, status: StatusCode, from: &Url, location: Option<Url>) -> Action {
        if !self.follow_redirects || attempt > self.max_redirects {
            return Action::Stop;
        }
        if !status.is_redirection() {
            return Action::Stop;
        }
        match location {
            Some(url) if from.scheme() == "https" && url.scheme() == "http" && !self.follow_ssl_redirects => Action::Stop,
            Some(url) => Action::Follow(url),
            None => Action::Stop,
        }
    }

    /// Whether the method/body must change for this status code (RFC 7231
    /// §6.4): `300`/`301`/`302` downgrade any non-`GET`/`HEAD` method to
    /// `GET` for historical-browser compatibility, the same relaxation
    /// OkHttp and `curl` apply; `303` always downgrades to `GET` (including
    /// from `GET`/`HEAD`, which is a no-op); `307`/`308` always preserve the
    /// original method and body.
    pub(crate) fn method_for(status: StatusCode, original: &Method) -> Method {
        match status {
            StatusCode::SEE_OTHER => Method::GET,
            StatusCode::MULTIPLE_CHOICES | StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND
                if original != Method::GET && original != Method::HEAD =>
            {
                Method::GET
            }
            _ => original.clone(),
        }
    }

    /// Whether the request body should be dropped for this hop (implied
    /// whenever the method itself changes away from the original).
    pub(crate) fn drops_body(status: StatusCode, original: &Method) -> bool {
        Self::method_for(status, original) != *original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn see_other_always_downgrades_to_get() {
        assert_eq!(Policy::method_for(StatusCode::SEE_OTHER, &Method::POST), Method::GET);
        assert_eq!(Policy::method_for(StatusCode::SEE_OTHER, &Method::PUT), Method::GET);
    }

    #[test]
    fn permanent_redirect_preserves_method() {
        assert_eq!(Policy::method_for(StatusCode::PERMANENT_REDIRECT, &Method::POST), Method::POST);
        assert_eq!(Policy::method_for(StatusCode::TEMPORARY_REDIRECT, &Method::PUT), Method::PUT);
    }

    #[test]
    fn moved_permanently_downgrades_post_but_not_get() {
        assert_eq!(Policy::method_for(StatusCode::MOVED_PERMANENTLY, &Method::POST), Method::GET);
        assert_eq!(Policy::method_for(StatusCode::MOVED_PERMANENTLY, &Method::GET), Method::GET);
        assert_eq!(Policy::method_for(StatusCode::MOVED_PERMANENTLY, &Method::HEAD), Method::HEAD);
    }

    #[test]
    fn redirects_downgrade_any_non_get_head_method_not_just_post() {
        for status in [StatusCode::MULTIPLE_CHOICES, StatusCode::MOVED_PERMANENTLY, StatusCode::FOUND] {
            assert_eq!(Policy::method_for(status, &Method::PUT), Method::GET);
            assert_eq!(Policy::method_for(status, &Method::PATCH), Method::GET);
            assert_eq!(Policy::method_for(status, &Method::DELETE), Method::GET);
            assert_eq!(Policy::method_for(status, &Method::GET), Method::GET);
            assert_eq!(Policy::method_for(status, &Method::HEAD), Method::HEAD);
        }
        assert!(Policy::drops_body(StatusCode::MULTIPLE_CHOICES, &Method::PUT));
    }

    #[test]
    fn stops_once_max_redirects_exceeded() {
        let policy = Policy::limited(2);
        let from = Url::parse("https://example.com/start").unwrap();
        let url = Url::parse("https://example.com/next").unwrap();
        assert_eq!(policy.action_for(1, StatusCode::FOUND, &from, Some(url.clone())), Action::Follow(url.clone()));
        assert_eq!(policy.action_for(3, StatusCode::FOUND, &from, Some(url)), Action::Stop);
    }

    #[test]
    fn none_policy_never_follows() {
        let policy = Policy::none();
        let from = Url::parse("https://example.com/start").unwrap();
        let url = Url::parse("https://example.com/next").unwrap();
        assert_eq!(policy.action_for(1, StatusCode::FOUND, &from, Some(url)), Action::Stop);
    }

    #[test]
    fn https_to_http_redirect_requires_opt_in() {
        let strict = Policy::default().follow_ssl_redirects(false);
        let from = Url::parse("https://example.com/start").unwrap();
        let url = Url::parse("http://example.com/next").unwrap();
        assert_eq!(strict.action_for(1, StatusCode::FOUND, &from, Some(url.clone())), Action::Stop);

        let lenient = Policy::default();
        assert_eq!(lenient.action_for(1, StatusCode::FOUND, &from, Some(url.clone())), Action::Follow(url));
    }
}
