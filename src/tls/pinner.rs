//! A reference [`CertificatePinner`] implementation matching hostnames
//! against SHA-256 SubjectPublicKeyInfo pins, wildcard patterns included.
//!
//! Certificate pinning itself is named an external-collaborator concern
//! (spec.md §1: consumed as a pure predicate), but the wildcard-matching
//! rule it relies on is concrete and independently testable, so this crate
//! ships one reference implementation of the trait the same way it ships
//! [`crate::cookie::Jar`] for [`crate::cookie::CookieJar`] — grounded on
//! OkHttp's `CertificatePinner`, whose `**.` wildcard syntax and matching
//! rule this mirrors exactly.

use crate::tls::CertificatePinner;
use crate::Error;

/// One pinned hostname pattern and the SPKI hashes it accepts.
///
/// `hostname` is either a plain hostname (`example.com`, matching only
/// that exact host) or a wildcard pattern (`**.example.com`, matching
/// `example.com` itself and any number of subdomain labels beneath it).
struct Pin {
    pattern: String,
    spki_sha256: [u8; 32],
}

/// Pins certificates by exact hostname or `**.`-prefixed wildcard,
/// mirroring OkHttp's `CertificatePinner`.
///
/// ```
/// # use linkreq::tls::WildcardCertificatePinner;
/// let pinner = WildcardCertificatePinner::builder()
///     .add(
///         "**.example.com",
///         [0u8; 32],
///     )
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct WildcardCertificatePinner {
    pins: Vec<Pin>,
}

impl WildcardCertificatePinner {
    pub fn builder() -> WildcardCertificatePinnerBuilder {
        WildcardCertificatePinnerBuilder::default()
    }

    /// Matches `hostname` (already IDNA/lowercase-normalized by the `url`
    /// crate at URL-parse time) against `pattern`.
    ///
    /// `example.com`, `.example.com`, `a.example.com` and `a.b.example.com`
    /// all match the pattern `**.example.com`; `xample.com` and
    /// `dexample.com` do not, since the wildcard only ever consumes whole
    /// dot-separated labels, never a partial one.
    fn pattern_matches(pattern: &str, hostname: &str) -> bool {
        let host = hostname.trim_start_matches('.');
        match pattern.strip_prefix("**.") {
            Some(base) => host == base || host.ends_with(&format!(".{base}")),
            None => host == pattern,
        }
    }

    fn pins_for(&self, hostname: &str) -> impl Iterator<Item = &Pin> {
        self.pins.iter().filter(move |pin| Self::pattern_matches(&pin.pattern, hostname))
    }
}

impl CertificatePinner for WildcardCertificatePinner {
    fn check(&self, hostname: &str, spki_sha256: &[[u8; 32]]) -> Result<(), Error> {
        let mut matched_any_pattern = false;
        for pin in self.pins_for(hostname) {
            matched_any_pattern = true;
            if spki_sha256.iter().any(|presented| presented == &pin.spki_sha256) {
                return Ok(());
            }
        }
        if !matched_any_pattern {
            // No pin configured for this host at all: nothing to enforce.
            return Ok(());
        }
        Err(Error::pinning(format!(
            "certificate pinning failure: none of the {} presented SPKI hash(es) matched a pin for {hostname}",
            spki_sha256.len()
        )))
    }
}

#[derive(Debug, Default)]
pub struct WildcardCertificatePinnerBuilder {
    pins: Vec<Pin>,
}

impl WildcardCertificatePinnerBuilder {
    pub fn add(mut self, pattern: impl Into<String>, spki_sha256: [u8; 32]) -> Self {
        self.pins.push(Pin { pattern: pattern.into(), spki_sha256 });
        self
    }

    pub fn build(self) -> WildcardCertificatePinner {
        WildcardCertificatePinner { pins: self.pins }
    }
}

impl std::fmt::Debug for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pin").field("pattern", &self.pattern).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn exact_pattern_matches_only_that_host() {
        assert!(WildcardCertificatePinner::pattern_matches("example.com", "example.com"));
        assert!(!WildcardCertificatePinner::pattern_matches("example.com", "a.example.com"));

        let pinner = WildcardCertificatePinner::builder().add("example.com", pin()).build();
        assert!(pinner.check("example.com", &[pin()]).is_ok());
        // a.example.com matches no configured pattern, so it isn't enforced.
        assert!(pinner.check("a.example.com", &[[0u8; 32]]).is_ok());
    }

    #[test]
    fn wildcard_matches_bare_domain_and_any_depth_of_subdomain() {
        assert!(WildcardCertificatePinner::pattern_matches("**.example.com", "example.com"));
        assert!(WildcardCertificatePinner::pattern_matches("**.example.com", ".example.com"));
        assert!(WildcardCertificatePinner::pattern_matches("**.example.com", "a.example.com"));
        assert!(WildcardCertificatePinner::pattern_matches("**.example.com", "a.b.example.com"));
    }

    #[test]
    fn wildcard_does_not_match_a_partial_label() {
        assert!(!WildcardCertificatePinner::pattern_matches("**.example.com", "xample.com"));
        assert!(!WildcardCertificatePinner::pattern_matches("**.example.com", "dexample.com"));
    }

    #[test]
    fn matching_pin_passes_check() {
        let pinner = WildcardCertificatePinner::builder().add("**.example.com", pin()).build();
        assert!(pinner.check("a.example.com", &[pin()]).is_ok());
    }

    #[test]
    fn non_matching_pin_fails_check() {
        let pinner = WildcardCertificatePinner::builder().add("**.example.com", pin()).build();
        let other = [9u8; 32];
        let err = pinner.check("a.example.com", &[other]).unwrap_err();
        assert!(err.is_pinning());
    }

    #[test]
    fn unrelated_host_is_not_enforced() {
        let pinner = WildcardCertificatePinner::builder().add("**.example.com", pin()).build();
        assert!(pinner.check("other.org", &[[0u8; 32]]).is_ok());
    }
}
