//! TLS connection specs and the fallback policy that appends
//! `TLS_FALLBACK_SCSV` on a retried handshake (C12, spec.md §4.12).
//!
//! Grounded on `penumbra-x-rquest/src/tls.rs` for the builder shape and on
//! OkHttp's `ConnectionSpec`/`ConnectionSpecSelector` for the fallback
//! state machine. BoringSSL (`boring`/`tokio-boring`) is the default
//! backend because it exposes per-handshake cipher suite lists directly,
//! which is what the fallback policy needs; `rustls` is available behind
//! the `rustls-tls` feature as an alternative that cannot express the
//! SCSV signal (downgrades are rejected outright instead, see
//! `fallback::Attempt`).

mod fallback;
mod handshake;
mod pinner;

pub use fallback::{FallbackPolicy, FallbackState};
pub use handshake::Handshake;
pub use pinner::{WildcardCertificatePinner, WildcardCertificatePinnerBuilder};

use std::sync::Arc;

/// A named TLS version/cipher-suite combination tried in order, mirroring
/// OkHttp's `ConnectionSpec.MODERN_TLS`/`COMPATIBLE_TLS`/`CLEARTEXT` triad.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionSpec {
    /// TLS 1.2 and 1.3 only, modern AEAD cipher suites. Tried first.
    Modern,
    /// TLS 1.0 through 1.2, a broader cipher suite list. Tried on
    /// downgrade from `Modern` when the handshake fails in a way that
    /// looks like a buggy TLS-terminating middlebox rather than a real
    /// protocol mismatch.
    Compatible,
    /// No TLS at all; only valid for `http://` addresses.
    Cleartext,
}

impl ConnectionSpec {
    pub fn is_tls(&self) -> bool {
        !matches!(self, ConnectionSpec::Cleartext)
    }
}

/// Certificate pinning predicate, checked after the chain validates against
/// the trust store (§4.12's "pinning" edge case). Implementations compare
/// a SHA-256 SPKI hash against a configured pin set.
pub trait CertificatePinner: Send + Sync + std::fmt::Debug {
    /// Returns `Ok(())` if `spki_sha256` (one DER-encoded SubjectPublicKeyInfo
    /// hash per certificate in the presented chain) satisfies the pins
    /// configured for `hostname`, or an error describing the mismatch.
    fn check(&self, hostname: &str, spki_sha256: &[[u8; 32]]) -> Result<(), crate::Error>;
}

/// Immutable TLS configuration shared by every `Address` that was built
/// from the same `ClientBuilder`. Compared by `Arc::ptr_eq` for pool
/// equality, same as `dns`/`proxy_selector`.
#[derive(Clone)]
pub struct TlsOptions {
    specs: Vec<ConnectionSpec>,
    alpn: Vec<Vec<u8>>,
    pinner: Option<Arc<dyn CertificatePinner>>,
    accept_invalid_certs: bool,
    accept_invalid_hostnames: bool,
    min_tls_version: Option<Version>,
    max_tls_version: Option<Version>,
}

/// A TLS protocol version, used to clamp the range `ConnectionSpec`s are
/// allowed to negotiate within.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    Tls1_0,
    Tls1_1,
    Tls1_2,
    Tls1_3,
}

impl TlsOptions {
    pub fn builder() -> TlsOptionsBuilder {
        TlsOptionsBuilder::default()
    }

    pub fn specs(&self) -> &[ConnectionSpec] {
        &self.specs
    }

    pub fn alpn_protocols(&self) -> &[Vec<u8>] {
        &self.alpn
    }

    pub fn pinner(&self) -> Option<&Arc<dyn CertificatePinner>> {
        self.pinner.as_ref()
    }

    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn accepts_invalid_hostnames(&self) -> bool {
        self.accept_invalid_hostnames
    }

    pub fn min_version(&self) -> Option<Version> {
        self.min_tls_version
    }

    pub fn max_version(&self) -> Option<Version> {
        self.max_tls_version
    }
}

pub struct TlsOptionsBuilder {
    specs: Vec<ConnectionSpec>,
    alpn: Vec<Vec<u8>>,
    pinner: Option<Arc<dyn CertificatePinner>>,
    accept_invalid_certs: bool,
    accept_invalid_hostnames: bool,
    min_tls_version: Option<Version>,
    max_tls_version: Option<Version>,
}

impl Default for TlsOptionsBuilder {
    fn default() -> Self {
        TlsOptionsBuilder {
            specs: vec![ConnectionSpec::Modern, ConnectionSpec::Compatible],
            alpn: vec![b"h2".to_vec(), b"http/1.1".to_vec()],
            pinner: None,
            accept_invalid_certs: false,
            accept_invalid_hostnames: false,
            min_tls_version: None,
            max_tls_version: None,
        }
    }
}

impl TlsOptionsBuilder {
    pub fn connection_specs(mut self, specs: Vec<ConnectionSpec>) -> Self {
        self.specs = specs;
        self
    }

    pub fn alpn_protocols(mut self, alpn: Vec<Vec<u8>>) -> Self {
        self.alpn = alpn;
        self
    }

    pub fn certificate_pinner(mut self, pinner: Arc<dyn CertificatePinner>) -> Self {
        self.pinner = Some(pinner);
        self
    }

    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn danger_accept_invalid_hostnames(mut self, accept: bool) -> Self {
        self.accept_invalid_hostnames = accept;
        self
    }

    pub fn min_tls_version(mut self, version: Version) -> Self {
        self.min_tls_version = Some(version);
        self
    }

    pub fn max_tls_version(mut self, version: Version) -> Self {
        self.max_tls_version = Some(version);
        self
    }

    pub fn build(self) -> TlsOptions {
        TlsOptions {
            specs: self.specs,
            alpn: self.alpn,
            pinner: self.pinner,
            accept_invalid_certs: self.accept_invalid_certs,
            accept_invalid_hostnames: self.accept_invalid_hostnames,
            min_tls_version: self.min_tls_version,
            max_tls_version: self.max_tls_version,
        }
    }
}

impl std::fmt::Debug for TlsOptionsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsOptionsBuilder")
            .field("specs", &self.specs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("accept_invalid_hostnames", &self.accept_invalid_hostnames)
            .finish()
    }
}

impl std::fmt::Debug for TlsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsOptions")
            .field("specs", &self.specs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("accept_invalid_hostnames", &self.accept_invalid_hostnames)
            .finish()
    }
}
