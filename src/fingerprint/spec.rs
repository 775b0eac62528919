//! Typed ClientHello specification.
//!
//! A [`ClientHelloSpec`] is the parser's output: the exact cipher-suite and
//! extension sequence a browser emits, expressed as data. The TLS connector
//! consumes it at dial time; the extension list order is the fingerprint.

use boring::hash::{hash, MessageDigest};

/// GREASE placeholder value (RFC 8701). Browsers rotate through the
/// reserved `0x?a?a` family; a single placeholder is enough for the model
/// since the TLS layer substitutes a fresh value per handshake.
pub const GREASE_PLACEHOLDER: u16 = 0x0a0a;

pub const VERSION_TLS10: u16 = 0x0301;
pub const VERSION_TLS11: u16 = 0x0302;
pub const VERSION_TLS12: u16 = 0x0303;
pub const VERSION_TLS13: u16 = 0x0304;

/// Browser family derived from a User-Agent string.
///
/// Determines GREASE placement, default signature algorithms, key shares
/// and certificate-compression lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserClass {
    Chrome,
    Firefox,
    Other,
}

impl BrowserClass {
    /// Classify a User-Agent string by substring match.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();
        if ua.contains("firefox") {
            return Self::Firefox;
        }
        for keyword in ["chrome/", "chromium/", "crios/", "edgi/", "edg/"] {
            if ua.contains(keyword) {
                return Self::Chrome;
            }
        }
        Self::Other
    }

    pub fn is_chrome(self) -> bool {
        matches!(self, Self::Chrome)
    }
}

/// Certificate compression algorithms (RFC 8879).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertCompression {
    Zlib,
    Brotli,
    Zstd,
}

impl CertCompression {
    pub fn id(self) -> u16 {
        match self {
            Self::Zlib => 1,
            Self::Brotli => 2,
            Self::Zstd => 3,
        }
    }
}

/// A key_share entry: named group plus (placeholder) key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShare {
    pub group: u16,
    pub data: Vec<u8>,
}

impl KeyShare {
    pub fn new(group: u16) -> Self {
        Self {
            group,
            data: Vec::new(),
        }
    }

    pub fn with_data(group: u16, data: Vec<u8>) -> Self {
        Self { group, data }
    }
}

/// Synthesized pre_shared_key payload. Regenerated per dial; the values only
/// need to survive structural inspection, not decrypt anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PskOffer {
    pub identity: Vec<u8>,
    pub obfuscated_ticket_age: u32,
    pub binder: [u8; 32],
}

/// One typed extension record. Variant order is irrelevant; the order of
/// records inside [`ClientHelloSpec::extensions`] is the wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionSpec {
    /// server_name (0); host is filled at dial time.
    ServerName,
    /// status_request (5).
    StatusRequest,
    /// supported_groups (10).
    SupportedGroups(Vec<u16>),
    /// ec_point_formats (11).
    EcPointFormats(Vec<u8>),
    /// signature_algorithms (13).
    SignatureAlgorithms(Vec<u16>),
    /// application_layer_protocol_negotiation (16).
    Alpn(Vec<String>),
    /// signed_certificate_timestamp (18).
    Sct,
    /// padding (21), Boring-style length computation in the TLS layer.
    Padding,
    /// extended_master_secret (23).
    ExtendedMasterSecret,
    /// token_binding (24).
    TokenBinding,
    /// compress_certificate (27).
    CertCompression(Vec<CertCompression>),
    /// record_size_limit (28).
    RecordSizeLimit(u16),
    /// delegated_credentials (34).
    DelegatedCredentials(Vec<u16>),
    /// session_ticket (35).
    SessionTicket,
    /// pre_shared_key (41); always last when present.
    PreSharedKey(PskOffer),
    /// supported_versions (43), descending, GREASE-prefixed for Chrome.
    SupportedVersions(Vec<u16>),
    /// cookie (44).
    Cookie,
    /// psk_key_exchange_modes (45).
    PskKeyExchangeModes(Vec<u8>),
    /// signature_algorithms_cert (50).
    SignatureAlgorithmsCert(Vec<u16>),
    /// key_share (51).
    KeyShare(Vec<KeyShare>),
    /// quic_transport_parameters (57).
    QuicTransportParameters,
    /// next_protocol_negotiation (13172).
    Npn,
    /// application_settings; `codepoint` is 17513 (old) or 17613 (new).
    ApplicationSettings {
        codepoint: u16,
        protocols: Vec<String>,
    },
    /// GREASE extension with empty body.
    Grease,
    /// GREASE encrypted_client_hello (65037).
    GreaseEch,
    /// renegotiation_info (65281), RenegotiateOnceAsClient.
    RenegotiationInfo,
    /// Extension carried with an opaque literal body.
    Opaque { id: u16, data: Vec<u8> },
    /// Extension known only by ID, emitted with an empty body.
    Generic(u16),
}

/// PSK key-exchange mode psk_dhe_ke.
pub const PSK_MODE_DHE: u8 = 1;

impl ExtensionSpec {
    /// IANA extension ID this record serializes as.
    pub fn id(&self) -> u16 {
        match self {
            Self::ServerName => 0,
            Self::StatusRequest => 5,
            Self::SupportedGroups(_) => 10,
            Self::EcPointFormats(_) => 11,
            Self::SignatureAlgorithms(_) => 13,
            Self::Alpn(_) => 16,
            Self::Sct => 18,
            Self::Padding => 21,
            Self::ExtendedMasterSecret => 23,
            Self::TokenBinding => 24,
            Self::CertCompression(_) => 27,
            Self::RecordSizeLimit(_) => 28,
            Self::DelegatedCredentials(_) => 34,
            Self::SessionTicket => 35,
            Self::PreSharedKey(_) => 41,
            Self::SupportedVersions(_) => 43,
            Self::Cookie => 44,
            Self::PskKeyExchangeModes(_) => 45,
            Self::SignatureAlgorithmsCert(_) => 50,
            Self::KeyShare(_) => 51,
            Self::QuicTransportParameters => 57,
            Self::Npn => 13172,
            Self::ApplicationSettings { codepoint, .. } => *codepoint,
            Self::Grease => GREASE_PLACEHOLDER,
            Self::GreaseEch => 65037,
            Self::RenegotiationInfo => 65281,
            Self::Opaque { id, .. } => *id,
            Self::Generic(id) => *id,
        }
    }

    pub fn is_grease(&self) -> bool {
        matches!(self, Self::Grease)
    }
}

/// Parser output: everything the TLS layer needs to reproduce a browser's
/// ClientHello.
#[derive(Debug, Clone)]
pub struct ClientHelloSpec {
    pub tls_version_min: u16,
    pub tls_version_max: u16,
    /// Ordered cipher-suite IDs, GREASE-prefixed for Chrome.
    pub cipher_suites: Vec<u16>,
    /// Always `[0]` (null compression).
    pub compression_methods: Vec<u8>,
    /// Ordered extension records; this order is the fingerprint.
    pub extensions: Vec<ExtensionSpec>,
}

impl ClientHelloSpec {
    /// Deterministic session-ID derivation: SHA-256 over a canonical
    /// projection of the hello bytes. Lets the TLS layer fill a plausible
    /// session ID without injecting randomness that would shift the JA3.
    pub fn session_id(hello_bytes: &[u8]) -> [u8; 32] {
        let digest =
            hash(MessageDigest::sha256(), hello_bytes).expect("SHA-256 is always available");
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }

    /// Whether the spec carries a pre_shared_key extension.
    pub fn has_psk(&self) -> bool {
        self.extensions
            .iter()
            .any(|e| matches!(e, ExtensionSpec::PreSharedKey(_)))
    }

    /// ALPN protocols the spec advertises, if any.
    pub fn alpn_protocols(&self) -> Option<&[String]> {
        self.extensions.iter().find_map(|e| match e {
            ExtensionSpec::Alpn(protos) => Some(protos.as_slice()),
            _ => None,
        })
    }

    /// Rewrite the ALPN extension in place. Used by the WebSocket adapter to
    /// force `http/1.1` after parsing, and by the QUIC path for `h3`.
    pub fn force_alpn(&mut self, protocols: &[&str]) {
        for ext in &mut self.extensions {
            if let ExtensionSpec::Alpn(protos) = ext {
                *protos = protocols.iter().map(|p| p.to_string()).collect();
                return;
            }
        }
    }

    /// Supported groups advertised by the spec (GREASE included), if any.
    pub fn supported_groups(&self) -> Option<&[u16]> {
        self.extensions.iter().find_map(|e| match e {
            ExtensionSpec::SupportedGroups(groups) => Some(groups.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_class_from_user_agent() {
        let chrome = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
        assert_eq!(BrowserClass::from_user_agent(chrome), BrowserClass::Chrome);

        let edge = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                    (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36 Edg/142.0.0.0";
        assert_eq!(BrowserClass::from_user_agent(edge), BrowserClass::Chrome);

        let firefox = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:144.0) \
                       Gecko/20100101 Firefox/144.0";
        assert_eq!(
            BrowserClass::from_user_agent(firefox),
            BrowserClass::Firefox
        );

        assert_eq!(
            BrowserClass::from_user_agent("curl/8.0.1"),
            BrowserClass::Other
        );
    }

    #[test]
    fn force_alpn_rewrites_existing_extension() {
        let mut spec = ClientHelloSpec {
            tls_version_min: VERSION_TLS12,
            tls_version_max: VERSION_TLS13,
            cipher_suites: vec![0x1301],
            compression_methods: vec![0],
            extensions: vec![
                ExtensionSpec::ServerName,
                ExtensionSpec::Alpn(vec!["h2".into(), "http/1.1".into()]),
            ],
        };
        spec.force_alpn(&["http/1.1"]);
        assert_eq!(
            spec.alpn_protocols(),
            Some(&["http/1.1".to_string()][..])
        );
    }

    #[test]
    fn session_id_is_deterministic() {
        let a = ClientHelloSpec::session_id(b"hello");
        let b = ClientHelloSpec::session_id(b"hello");
        assert_eq!(a, b);
        assert_ne!(a, ClientHelloSpec::session_id(b"other"));
    }
}
