//! BoringSSL connector.
//!
//! Translates a [`ClientHelloSpec`] onto the configuration surface BoringSSL
//! exposes: protocol window, cipher list, supported groups, signature
//! algorithms, ALPN, GREASE and extension permutation. Certificate
//! verification is disabled throughout; the library exists to look like a
//! browser, not to authenticate servers.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use boring::ssl::{SslConnector, SslMethod, SslSessionCacheMode, SslVerifyMode, SslVersion};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_boring::SslStream;

use crate::error::{Error, Result};
use crate::fingerprint::spec::{
    ClientHelloSpec, ExtensionSpec, GREASE_PLACEHOLDER, VERSION_TLS10, VERSION_TLS11,
    VERSION_TLS12, VERSION_TLS13,
};

// FFI for the knobs boring does not wrap.
use boring_sys::SSL_CTX;
use std::os::raw::c_int;

extern "C" {
    fn SSL_CTX_set_grease_enabled(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
    fn SSL_CTX_set_permute_extensions(ctx: *mut SSL_CTX, enabled: c_int) -> c_int;
}

/// Negotiated application protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alpn {
    H2,
    Http1,
    None,
    Other(String),
}

impl Alpn {
    pub fn is_h2(&self) -> bool {
        matches!(self, Self::H2)
    }
}

/// Either a plain TCP stream (`http://`) or a TLS stream (`https://`).
pub enum MaybeTlsStream {
    Plain(TcpStream),
    Tls(SslStream<TcpStream>),
}

impl MaybeTlsStream {
    /// ALPN protocol negotiated during the handshake; `None` for plain TCP.
    pub fn alpn(&self) -> Alpn {
        match self {
            Self::Plain(_) => Alpn::None,
            Self::Tls(stream) => match stream.ssl().selected_alpn_protocol() {
                Some(b"h2") => Alpn::H2,
                Some(b"http/1.1") => Alpn::Http1,
                Some(other) => Alpn::Other(String::from_utf8_lossy(other).into_owned()),
                None => Alpn::None,
            },
        }
    }
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Perform a TLS handshake over an established TCP stream.
///
/// With a spec, the handshake reproduces as much of the assembled
/// ClientHello as BoringSSL allows; without one, a default configuration is
/// used (the `Fingerprint::Empty` path). `alpn_override` replaces the
/// spec's ALPN on the wire (WebSocket forces `http/1.1`).
pub async fn handshake(
    tcp: TcpStream,
    host: &str,
    spec: Option<&ClientHelloSpec>,
    alpn_override: Option<&[&str]>,
) -> Result<SslStream<TcpStream>> {
    let connector = match spec {
        Some(spec) => configure_from_spec(spec, alpn_override)?,
        None => configure_default(alpn_override)?,
    };

    let mut config = connector
        .configure()
        .map_err(|e| Error::tls(format!("failed to configure SSL: {e}")))?;
    config.set_verify_hostname(false);

    tokio_boring::connect(config, host, tcp)
        .await
        .map_err(|e| Error::handshake(e.to_string()))
}

fn configure_default(alpn_override: Option<&[&str]>) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())
        .map_err(|e| Error::tls(format!("failed to create SSL connector: {e}")))?;

    builder.set_verify(SslVerifyMode::NONE);
    builder
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .map_err(|e| Error::tls(format!("failed to set min TLS version: {e}")))?;
    builder
        .set_max_proto_version(Some(SslVersion::TLS1_3))
        .map_err(|e| Error::tls(format!("failed to set max TLS version: {e}")))?;

    let alpn = alpn_wire_format(alpn_override.unwrap_or(&["h2", "http/1.1"]));
    builder
        .set_alpn_protos(&alpn)
        .map_err(|e| Error::tls(format!("failed to set ALPN: {e}")))?;

    Ok(builder.build())
}

fn configure_from_spec(
    spec: &ClientHelloSpec,
    alpn_override: Option<&[&str]>,
) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())
        .map_err(|e| Error::tls(format!("failed to create SSL connector: {e}")))?;

    builder.set_verify(SslVerifyMode::NONE);

    builder
        .set_min_proto_version(Some(ssl_version(spec.tls_version_min)?))
        .map_err(|e| Error::tls(format!("failed to set min TLS version: {e}")))?;
    builder
        .set_max_proto_version(Some(ssl_version(spec.tls_version_max)?))
        .map_err(|e| Error::tls(format!("failed to set max TLS version: {e}")))?;

    // TLS 1.3 suites are fixed in BoringSSL; the cipher list covers 1.2 and
    // below. GREASE and unmapped IDs are skipped.
    let cipher_names: Vec<&str> = spec
        .cipher_suites
        .iter()
        .filter_map(|&id| cipher_name(id))
        .collect();
    if !cipher_names.is_empty() {
        builder
            .set_cipher_list(&cipher_names.join(":"))
            .map_err(|e| Error::tls(format!("failed to set cipher list: {e}")))?;
    }

    if let Some(groups) = spec.supported_groups() {
        let group_names: Vec<&str> = groups.iter().filter_map(|&id| group_name(id)).collect();
        if !group_names.is_empty() {
            builder
                .set_curves_list(&group_names.join(":"))
                .map_err(|e| Error::tls(format!("failed to set curves: {e}")))?;
        }
    }

    for ext in &spec.extensions {
        if let ExtensionSpec::SignatureAlgorithms(sigalgs) = ext {
            let names: Vec<&str> = sigalgs.iter().filter_map(|&id| sigalg_name(id)).collect();
            if !names.is_empty() {
                builder
                    .set_sigalgs_list(&names.join(":"))
                    .map_err(|e| Error::tls(format!("failed to set signature algorithms: {e}")))?;
            }
        }
    }

    let alpn_owned: Vec<String> = match alpn_override {
        Some(protos) => protos.iter().map(|p| p.to_string()).collect(),
        None => spec
            .alpn_protocols()
            .map(|p| p.to_vec())
            .unwrap_or_else(|| vec!["h2".to_string(), "http/1.1".to_string()]),
    };
    let alpn_refs: Vec<&str> = alpn_owned.iter().map(|s| s.as_str()).collect();
    builder
        .set_alpn_protos(&alpn_wire_format(&alpn_refs))
        .map_err(|e| Error::tls(format!("failed to set ALPN: {e}")))?;

    // Session caching mirrors browser behavior and feeds session-ID reuse.
    builder.set_session_cache_mode(SslSessionCacheMode::CLIENT);

    // GREASE when the spec carries GREASE records; extension permutation
    // matches the randomized order modern browsers ship.
    let wants_grease = spec.extensions.iter().any(|e| e.is_grease())
        || spec.cipher_suites.first() == Some(&GREASE_PLACEHOLDER);
    unsafe {
        let ctx = builder.as_ptr() as *mut SSL_CTX;
        SSL_CTX_set_grease_enabled(ctx, if wants_grease { 1 } else { 0 });
        SSL_CTX_set_permute_extensions(ctx, 1);
    }

    Ok(builder.build())
}

fn ssl_version(version: u16) -> Result<SslVersion> {
    match version {
        VERSION_TLS10 => Ok(SslVersion::TLS1),
        VERSION_TLS11 => Ok(SslVersion::TLS1_1),
        VERSION_TLS12 => Ok(SslVersion::TLS1_2),
        VERSION_TLS13 => Ok(SslVersion::TLS1_3),
        other => Err(Error::UnsupportedVersion(other)),
    }
}

/// ALPN wire format: length-prefixed protocol names.
fn alpn_wire_format(protocols: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for proto in protocols {
        out.push(proto.len() as u8);
        out.extend_from_slice(proto.as_bytes());
    }
    out
}

/// OpenSSL-style cipher name for a TLS 1.2-and-below suite ID.
fn cipher_name(id: u16) -> Option<&'static str> {
    match id {
        0x000a => Some("DES-CBC3-SHA"),
        0x002f => Some("AES128-SHA"),
        0x0035 => Some("AES256-SHA"),
        0x003c => Some("AES128-SHA256"),
        0x003d => Some("AES256-SHA256"),
        0x009c => Some("AES128-GCM-SHA256"),
        0x009d => Some("AES256-GCM-SHA384"),
        0xc008 => Some("ECDHE-ECDSA-DES-CBC3-SHA"),
        0xc009 => Some("ECDHE-ECDSA-AES128-SHA"),
        0xc00a => Some("ECDHE-ECDSA-AES256-SHA"),
        0xc012 => Some("ECDHE-RSA-DES-CBC3-SHA"),
        0xc013 => Some("ECDHE-RSA-AES128-SHA"),
        0xc014 => Some("ECDHE-RSA-AES256-SHA"),
        0xc023 => Some("ECDHE-ECDSA-AES128-SHA256"),
        0xc024 => Some("ECDHE-ECDSA-AES256-SHA384"),
        0xc027 => Some("ECDHE-RSA-AES128-SHA256"),
        0xc028 => Some("ECDHE-RSA-AES256-SHA384"),
        0xc02b => Some("ECDHE-ECDSA-AES128-GCM-SHA256"),
        0xc02c => Some("ECDHE-ECDSA-AES256-GCM-SHA384"),
        0xc02f => Some("ECDHE-RSA-AES128-GCM-SHA256"),
        0xc030 => Some("ECDHE-RSA-AES256-GCM-SHA384"),
        0xcca8 => Some("ECDHE-RSA-CHACHA20-POLY1305"),
        0xcca9 => Some("ECDHE-ECDSA-CHACHA20-POLY1305"),
        _ => None,
    }
}

/// BoringSSL group name for a supported-group ID.
fn group_name(id: u16) -> Option<&'static str> {
    match id {
        23 => Some("P-256"),
        24 => Some("P-384"),
        25 => Some("P-521"),
        29 => Some("X25519"),
        4588 => Some("X25519MLKEM768"),
        _ => None,
    }
}

/// IANA signature-scheme name, accepted by `set_sigalgs_list`.
fn sigalg_name(id: u16) -> Option<&'static str> {
    match id {
        0x0201 => Some("rsa_pkcs1_sha1"),
        0x0203 => Some("ecdsa_sha1"),
        0x0401 => Some("rsa_pkcs1_sha256"),
        0x0403 => Some("ecdsa_secp256r1_sha256"),
        0x0501 => Some("rsa_pkcs1_sha384"),
        0x0503 => Some("ecdsa_secp384r1_sha384"),
        0x0601 => Some("rsa_pkcs1_sha512"),
        0x0603 => Some("ecdsa_secp521r1_sha512"),
        0x0804 => Some("rsa_pss_rsae_sha256"),
        0x0805 => Some("rsa_pss_rsae_sha384"),
        0x0806 => Some("rsa_pss_rsae_sha512"),
        0x0807 => Some("ed25519"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpn_wire_format_is_length_prefixed() {
        assert_eq!(alpn_wire_format(&["h2", "http/1.1"]), b"\x02h2\x08http/1.1");
    }

    #[test]
    fn grease_and_unknown_ciphers_are_skipped() {
        assert!(cipher_name(GREASE_PLACEHOLDER).is_none());
        assert!(cipher_name(0x1301).is_none()); // TLS 1.3, fixed in boring
        assert_eq!(cipher_name(0xc02b), Some("ECDHE-ECDSA-AES128-GCM-SHA256"));
    }

    #[test]
    fn version_mapping() {
        assert!(ssl_version(VERSION_TLS12).is_ok());
        assert!(matches!(
            ssl_version(0x9999),
            Err(Error::UnsupportedVersion(0x9999))
        ));
    }
}
