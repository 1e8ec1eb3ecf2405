//! Proxy configuration and selection (part of C2, spec.md §4.1).
//!
//! `Proxy` describes one configured proxy rule (scheme it intercepts →
//! proxy URI); [`ProxySelector`] is the policy the route planner consults
//! when no proxy was explicitly pinned onto an [`Address`](crate::Address).
//! The default selector reads the `HTTP_PROXY`/`HTTPS_PROXY`/`ALL_PROXY`/
//! `NO_PROXY` environment variables, matching the teacher's
//! `src/proxy.rs`/`src/proxy/matcher.rs` behavior (platform system-proxy
//! lookups — Windows registry, macOS SCDynamicStore — are dropped; see
//! DESIGN.md).

use std::{env, fmt, sync::Arc};

use http::Uri;
use url::Url;

/// One configured proxy endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Proxy {
    Http(Uri),
    Https(Uri),
    Socks4(Uri),
    Socks5(Uri),
    Socks5h(Uri),
}

impl Proxy {
    pub fn uri(&self) -> &Uri {
        match self {
            Proxy::Http(u) | Proxy::Https(u) | Proxy::Socks4(u) | Proxy::Socks5(u) | Proxy::Socks5h(u) => u,
        }
    }

    pub fn is_socks(&self) -> bool {
        matches!(self, Proxy::Socks4(_) | Proxy::Socks5(_) | Proxy::Socks5h(_))
    }

    fn parse(raw: &str) -> Option<Proxy> {
        let uri: Uri = raw.parse().ok()?;
        match uri.scheme_str()? {
            "http" => Some(Proxy::Http(uri)),
            "https" => Some(Proxy::Https(uri)),
            "socks4" | "socks4a" => Some(Proxy::Socks4(uri)),
            "socks5" => Some(Proxy::Socks5(uri)),
            "socks5h" => Some(Proxy::Socks5h(uri)),
            _ => None,
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// One entry the route planner gets back from a [`ProxySelector`]: either a
/// concrete proxy to use, or `Direct` (no proxy, talk to the origin).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProxyChoice {
    Direct,
    Via(Proxy),
}

/// The policy consulted by the route planner (§4.1 step 1) when an
/// [`Address`](crate::Address) does not pin an explicit proxy. Implementors
/// must be pure with respect to a given URL within the lifetime of a call
/// (§9 "Global state": env/system properties are read at most once per
/// call).
pub trait ProxySelector: Send + Sync + fmt::Debug {
    /// Returns an ordered list of choices to try, most preferred first.
    /// An empty list means "no proxy" (equivalent to `[Direct]`).
    fn select(&self, url: &Url) -> Vec<ProxyChoice>;
}

/// Value equality for two boxed selectors, used by [`Address`](crate::Address)'s
/// pool-equality invariant. Two selectors are equal if they are the same
/// trait object (`Arc::ptr_eq`) — see DESIGN.md's note on the open question
/// of value-equality for trait objects.
pub(crate) fn selector_eq(a: &Arc<dyn ProxySelector>, b: &Arc<dyn ProxySelector>) -> bool {
    Arc::ptr_eq(a, b)
}

/// No proxy, ever. Used when a `Client` is built with `.no_proxy()`.
#[derive(Debug, Default)]
pub struct NoProxy;

impl ProxySelector for NoProxy {
    fn select(&self, _url: &Url) -> Vec<ProxyChoice> {
        vec![ProxyChoice::Direct]
    }
}

/// A single fixed proxy used for every request, regardless of scheme.
#[derive(Debug)]
pub struct Fixed(Proxy);

impl Fixed {
    pub fn new(proxy: Proxy) -> Self {
        Fixed(proxy)
    }
}

impl ProxySelector for Fixed {
    fn select(&self, _url: &Url) -> Vec<ProxyChoice> {
        vec![ProxyChoice::Via(self.0.clone())]
    }
}

/// Reads `HTTP_PROXY`/`http_proxy`, `HTTPS_PROXY`/`https_proxy`,
/// `ALL_PROXY`/`all_proxy` and `NO_PROXY`/`no_proxy` once at construction
/// time (not per-call — matching `OnceLock`-cached environment reads the
/// teacher's `proxy.rs` does, simplified here to "read once at build
/// time" since `linkreq` clients are already immutable after `build()`).
#[derive(Debug)]
pub struct SystemProxySelector {
    http: Option<Proxy>,
    https: Option<Proxy>,
    no_proxy: NoProxyList,
}

#[derive(Debug, Default)]
struct NoProxyList(Vec<String>);

impl NoProxyList {
    fn parse(raw: &str) -> Self {
        NoProxyList(raw.split(',').map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()).collect())
    }

    fn matches(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.0.iter().any(|pat| {
            if pat == "*" {
                true
            } else if let Some(suffix) = pat.strip_prefix('.') {
                host.ends_with(suffix) || host == suffix
            } else {
                host == *pat || host.ends_with(&format!(".{pat}"))
            }
        })
    }
}

fn env_var(names: &[&str]) -> Option<String> {
    for name in names {
        if let Ok(v) = env::var(name) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    None
}

impl SystemProxySelector {
    pub fn from_env() -> Self {
        let all = env_var(&["ALL_PROXY", "all_proxy"]).as_deref().and_then(Proxy::parse);
        let http = env_var(&["HTTP_PROXY", "http_proxy"]).as_deref().and_then(Proxy::parse).or_else(|| all.clone());
        let https = env_var(&["HTTPS_PROXY", "https_proxy"]).as_deref().and_then(Proxy::parse).or(all);
        let no_proxy = env_var(&["NO_PROXY", "no_proxy"]).map(|v| NoProxyList::parse(&v)).unwrap_or_default();
        SystemProxySelector { http, https, no_proxy }
    }
}

impl ProxySelector for SystemProxySelector {
    fn select(&self, url: &Url) -> Vec<ProxyChoice> {
        if let Some(host) = url.host_str() {
            if self.no_proxy.matches(host) {
                return vec![ProxyChoice::Direct];
            }
        }
        let chosen = match url.scheme() {
            "https" => self.https.clone(),
            _ => self.http.clone(),
        };
        match chosen {
            Some(p) => vec![ProxyChoice::Via(p)],
            None => vec![ProxyChoice::Direct],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_proxy_list_matches_suffix() {
        let list = NoProxyList::parse("example.com,.internal");
        assert!(list.matches("example.com"));
        assert!(list.matches("api.example.com"));
        assert!(list.matches("foo.internal"));
        assert!(!list.matches("notexample.com"));
    }

    #[test]
    fn fixed_selector_always_via() {
        let selector = Fixed::new(Proxy::Http("http://proxy.local:8080".parse().unwrap()));
        let url = Url::parse("https://example.com").unwrap();
        assert_eq!(selector.select(&url), vec![ProxyChoice::Via(Proxy::Http("http://proxy.local:8080".parse().unwrap()))]);
    }
}
