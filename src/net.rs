//! The transport step below the wire codecs: opens a TCP stream to a
//! [`Route`]'s socket address (optionally through an HTTP CONNECT or SOCKS
//! proxy tunnel) and, for `https://` routes, performs the TLS handshake.
//! Grounded on `penumbra-x-rquest/src/connect/mod.rs`'s connector, split
//! out here so the TLS backend choice (`boring-tls` vs `rustls-tls`) stays
//! isolated to [`tls_handshake`].

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::proxy::{Proxy, ProxyChoice};
use crate::route::Route;
use crate::tls::{ConnectionSpec, Handshake};
use crate::{Error, Result};

/// Object-safe union of `AsyncRead + AsyncWrite`, letting the codec
/// handshake functions stay generic over "plaintext TCP" and "TLS over
/// TCP" without an enum per TLS backend.
pub(crate) trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

pub(crate) type BoxedIo = Box<dyn AsyncStream>;

/// Opens the transport for `route`: a direct TCP connection, or one
/// tunneled through `route.proxy()`. Bails out with a request error
/// (never a TLS error) since nothing TLS-related has happened yet.
pub(crate) async fn connect_transport(route: &Route) -> Result<BoxedIo> {
    match route.proxy() {
        ProxyChoice::Direct => {
            let stream = TcpStream::connect(route.socket_addr()).await.map_err(Error::request)?;
            stream.set_nodelay(true).ok();
            Ok(Box::new(stream))
        }
        ProxyChoice::Via(proxy) => connect_via_proxy(route, proxy).await,
    }
}

async fn connect_via_proxy(route: &Route, proxy: &Proxy) -> Result<BoxedIo> {
    match proxy {
        Proxy::Http(_) | Proxy::Https(_) => connect_http_tunnel(route, proxy).await,
        #[cfg(feature = "socks")]
        Proxy::Socks4(_) | Proxy::Socks5(_) | Proxy::Socks5h(_) => connect_socks_tunnel(route, proxy).await,
        #[cfg(not(feature = "socks"))]
        Proxy::Socks4(_) | Proxy::Socks5(_) | Proxy::Socks5h(_) => {
            Err(Error::unsupported_service("SOCKS proxies require the `socks` feature"))
        }
    }
}

/// Issues an HTTP `CONNECT` to `proxy` for `route`'s socket address and
/// returns the tunneled stream once the proxy answers `200`.
async fn connect_http_tunnel(route: &Route, proxy: &Proxy) -> Result<BoxedIo> {
    let proxy_host = proxy.uri().host().ok_or_else(|| Error::builder("proxy URI has no host"))?;
    let proxy_port = proxy.uri().port_u16().unwrap_or(if matches!(proxy, Proxy::Https(_)) { 443 } else { 80 });
    let mut stream = TcpStream::connect((proxy_host, proxy_port)).await.map_err(Error::request)?;

    let target = route.socket_addr();
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.map_err(Error::request)?;

    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];
    loop {
        let n = stream.read(&mut chunk).await.map_err(Error::request)?;
        if n == 0 {
            return Err(Error::request(io::Error::new(io::ErrorKind::UnexpectedEof, "proxy closed connection during CONNECT")));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() > 8192 {
            return Err(Error::request("proxy CONNECT response too large"));
        }
    }

    let status_line = buf.split(|&b| b == b'\n').next().unwrap_or_default();
    let ok = status_line.windows(3).any(|w| w == b"200");
    if !ok {
        return Err(Error::request(format!(
            "proxy refused CONNECT: {}",
            String::from_utf8_lossy(status_line).trim()
        )));
    }

    Ok(Box::new(stream))
}

#[cfg(feature = "socks")]
async fn connect_socks_tunnel(route: &Route, proxy: &Proxy) -> Result<BoxedIo> {
    let proxy_addr = (
        proxy.uri().host().ok_or_else(|| Error::builder("proxy URI has no host"))?.to_string(),
        proxy.uri().port_u16().unwrap_or(1080),
    );
    let stream = tokio_socks::tcp::Socks5Stream::connect(proxy_addr, route.socket_addr())
        .await
        .map_err(Error::request)?;
    Ok(Box::new(stream.into_inner()))
}

/// Performs the TLS handshake over `io` for `route`/`spec`, returning the
/// wrapped stream and the negotiated [`Handshake`] (version, cipher suite,
/// peer chain, ALPN result). Feature-gated: exactly one TLS backend is
/// compiled in for a given build (`boring-tls` is the default).
#[cfg(feature = "boring-tls")]
pub(crate) async fn tls_handshake(io: BoxedIo, hostname: &str, spec: &ConnectionSpec, alpn: &[Vec<u8>], is_fallback: bool) -> Result<(BoxedIo, Handshake)> {
    use boring::ssl::{SslConnector, SslMethod, SslVerifyMode};

    let mut builder = SslConnector::builder(SslMethod::tls()).map_err(Error::tls_fatal)?;
    configure_boring_versions(&mut builder, spec, is_fallback)?;
    if !alpn.is_empty() {
        let wire = encode_alpn_wire_format(alpn);
        builder.set_alpn_protos(&wire).map_err(Error::tls_fatal)?;
    }
    builder.set_verify(SslVerifyMode::PEER);
    let connector = builder.build().configure().map_err(Error::tls_fatal)?;

    let tls_stream = tokio_boring::connect(connector, hostname, io).await.map_err(classify_boring_error)?;

    let ssl = tls_stream.ssl();
    let version = boring_version(ssl.version_str());
    let cipher = ssl.current_cipher().map(|c| c.name().to_string()).unwrap_or_default();
    let alpn_protocol = ssl.selected_alpn_protocol().map(|p| String::from_utf8_lossy(p).into_owned());
    let peer_certificates = ssl
        .peer_cert_chain()
        .map(|chain| chain.iter().filter_map(|cert| cert.to_der().ok()).collect())
        .unwrap_or_default();

    let handshake = Handshake::new(version, cipher, peer_certificates, alpn_protocol);
    Ok((Box::new(tls_stream), handshake))
}

#[cfg(feature = "boring-tls")]
fn configure_boring_versions(builder: &mut boring::ssl::SslConnectorBuilder, spec: &ConnectionSpec, is_fallback: bool) -> Result<()> {
    use boring::ssl::SslVersion;
    match spec {
        ConnectionSpec::Modern => {
            builder.set_min_proto_version(Some(SslVersion::TLS1_2)).map_err(Error::tls_fatal)?;
        }
        ConnectionSpec::Compatible => {
            builder.set_min_proto_version(Some(SslVersion::TLS1)).map_err(Error::tls_fatal)?;
        }
        ConnectionSpec::Cleartext => unreachable!("tls_handshake only called for tls specs"),
    }
    if is_fallback {
        // TLS_FALLBACK_SCSV: signals to a compliant server that this
        // handshake is a downgrade retry, so it can reject a connection
        // an attacker forced down to this weaker spec. Only set on the
        // actual retry attempt, never the first handshake on a route.
        builder.set_mode(boring::ssl::SslMode::SEND_FALLBACK_SCSV);
    }
    Ok(())
}

#[cfg(feature = "boring-tls")]
fn boring_version(version_str: &str) -> crate::tls::Version {
    match version_str {
        "TLSv1.3" => crate::tls::Version::Tls1_3,
        "TLSv1.2" => crate::tls::Version::Tls1_2,
        "TLSv1.1" => crate::tls::Version::Tls1_1,
        _ => crate::tls::Version::Tls1_0,
    }
}

#[cfg(feature = "boring-tls")]
fn classify_boring_error<S>(e: tokio_boring::HandshakeError<S>) -> crate::Error {
    // A handshake failure this early (before any application data) is
    // consistent with a middlebox rejecting the offered cipher suites;
    // treat it as fallback-eligible and let `tls::fallback` decide whether
    // another connection spec remains to retry with.
    Error::tls_fallback_eligible(e.to_string())
}

#[cfg(feature = "boring-tls")]
fn encode_alpn_wire_format(protocols: &[Vec<u8>]) -> Vec<u8> {
    let mut wire = Vec::new();
    for p in protocols {
        wire.push(p.len() as u8);
        wire.extend_from_slice(p);
    }
    wire
}

#[cfg(all(feature = "rustls-tls", not(feature = "boring-tls")))]
pub(crate) async fn tls_handshake(io: BoxedIo, hostname: &str, spec: &ConnectionSpec, alpn: &[Vec<u8>], is_fallback: bool) -> Result<(BoxedIo, Handshake)> {
    use std::sync::Arc;

    use tokio_rustls::rustls::{self, OwnedTrustAnchor, RootCertStore};
    use tokio_rustls::TlsConnector;

    // rustls negotiates the minimum supported version itself and has no
    // `SslMode`-style knob to set `TLS_FALLBACK_SCSV`; a downgrade retry
    // here behaves identically to a first attempt.
    let _ = (spec, is_fallback);

    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));

    let mut config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = alpn.to_vec();

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = rustls::ServerName::try_from(hostname).map_err(Error::tls_fatal)?;
    let tls_stream = connector.connect(server_name, io).await.map_err(Error::tls_fatal)?;

    let (_, conn) = tls_stream.get_ref();
    let version = match conn.protocol_version() {
        Some(rustls::ProtocolVersion::TLSv1_3) => crate::tls::Version::Tls1_3,
        Some(rustls::ProtocolVersion::TLSv1_2) => crate::tls::Version::Tls1_2,
        _ => crate::tls::Version::Tls1_2,
    };
    let cipher = conn.negotiated_cipher_suite().map(|cs| format!("{:?}", cs.suite())).unwrap_or_default();
    let alpn_protocol = conn.alpn_protocol().map(|p| String::from_utf8_lossy(p).into_owned());
    let peer_certificates = conn.peer_certificates().map(|certs| certs.iter().map(|c| c.0.clone()).collect()).unwrap_or_default();

    let handshake = Handshake::new(version, cipher, peer_certificates, alpn_protocol);
    Ok((Box::new(tls_stream), handshake))
}
