//! The negotiated TLS session, surfaced on [`crate::Response::handshake`]
//! so callers can inspect what a connection actually negotiated (matches
//! OkHttp's `Handshake`, exposed the same way on `okhttp3.Response`).

use super::Version;

#[derive(Clone, Debug)]
pub struct Handshake {
    tls_version: Version,
    cipher_suite: String,
    peer_certificates: Vec<Vec<u8>>,
    alpn_protocol: Option<String>,
}

impl Handshake {
    pub fn new(tls_version: Version, cipher_suite: impl Into<String>, peer_certificates: Vec<Vec<u8>>, alpn_protocol: Option<String>) -> Self {
        Handshake { tls_version, cipher_suite: cipher_suite.into(), peer_certificates, alpn_protocol }
    }

    pub fn tls_version(&self) -> Version {
        self.tls_version
    }

    pub fn cipher_suite(&self) -> &str {
        &self.cipher_suite
    }

    /// DER-encoded peer certificate chain, leaf first.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn alpn_protocol(&self) -> Option<&str> {
        self.alpn_protocol.as_deref()
    }
}
