//! URL acceptance at the boundary (C1, spec.md §3/§6).
//!
//! Canonicalization itself (lowercasing the host, IDNA-mapping non-ASCII
//! hosts, percent-encoding reserved characters) is delegated to the `url`
//! crate, which is the external collaborator spec.md §1 names for URL
//! parsing. This module only enforces the scheme restriction linkreq adds on
//! top: `http`/`https` only, case-insensitively, with a host present.

use std::borrow::Cow;

use url::Url;

use crate::error::{Error, Kind};

/// A type that can be converted into a [`Url`] suitable for use as a request
/// target. Sealed: only types inside this crate implement it.
pub trait IntoUrl: IntoUrlSealed {}

impl IntoUrl for Url {}
impl IntoUrl for &Url {}
impl IntoUrl for &str {}
impl IntoUrl for &String {}
impl IntoUrl for String {}
impl IntoUrl for Cow<'_, str> {}

pub trait IntoUrlSealed {
    fn into_url(self) -> crate::Result<Url>;
    fn as_str(&self) -> &str;
}

fn validate_scheme(url: Url) -> crate::Result<Url> {
    if !url.has_host() {
        return Err(Error::new::<Error>(Kind::Builder, None).with_uri(
            url.as_str()
                .parse()
                .unwrap_or_else(|_| http::Uri::from_static("/")),
        ));
    }
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::builder(UnsupportedScheme {
            scheme: other.to_owned(),
        })),
    }
}

#[derive(Debug)]
struct UnsupportedScheme {
    scheme: String,
}

impl std::fmt::Display for UnsupportedScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "URL scheme {:?} is not allowed", self.scheme)
    }
}

impl std::error::Error for UnsupportedScheme {}

impl IntoUrlSealed for Url {
    fn into_url(self) -> crate::Result<Url> {
        validate_scheme(self)
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for &Url {
    fn into_url(self) -> crate::Result<Url> {
        validate_scheme(self.clone())
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for &str {
    fn into_url(self) -> crate::Result<Url> {
        Url::parse(self.trim()).map_err(Error::builder)?.into_url()
    }

    fn as_str(&self) -> &str {
        self
    }
}

impl IntoUrlSealed for &String {
    fn into_url(self) -> crate::Result<Url> {
        (&**self).into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for String {
    fn into_url(self) -> crate::Result<Url> {
        (&*self).into_url()
    }

    fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl IntoUrlSealed for Cow<'_, str> {
    fn into_url(self) -> crate::Result<Url> {
        (&*self).into_url()
    }

    fn as_str(&self) -> &str {
        self
    }
}

/// Returns the "identity" string used for pooling and proxy matching: host
/// lowercased (the `url` crate already guarantees this) plus the
/// scheme-defaulted port.
pub(crate) fn host_port(url: &Url) -> (String, u16) {
    let host = url.host_str().unwrap_or_default().to_owned();
    let port = url.port_or_known_default().unwrap_or(if url.scheme() == "https" {
        443
    } else {
        80
    });
    (host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        let err = "ftp://example.com/file".into_url().unwrap_err();
        assert!(err.is_builder());
    }

    #[test]
    fn accepts_https() {
        let url = "https://EXAMPLE.com/a".into_url().unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let url = "  https://example.com/  ".into_url().unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn idn_maps_non_ascii_host() {
        let url = "https://bücher.example/".into_url().unwrap();
        assert!(url.host_str().unwrap().starts_with("xn--"));
    }
}
