//! Per-browser extension catalog.
//!
//! Fingerprint strings name extensions by ID only; the catalog supplies the
//! concrete contents a given browser family puts in each one. Parsers build
//! a catalog, patch the entries the fingerprint encodes explicitly (groups,
//! point formats, versions, signature algorithms), then resolve the ID
//! sequence through it.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::fingerprint::spec::{
    BrowserClass, CertCompression, ExtensionSpec, KeyShare, PskOffer, GREASE_PLACEHOLDER,
    PSK_MODE_DHE, VERSION_TLS12, VERSION_TLS13,
};

// Signature schemes (IANA TLS SignatureScheme registry).
pub const ECDSA_SECP256R1_SHA256: u16 = 0x0403;
pub const ECDSA_SECP384R1_SHA384: u16 = 0x0503;
pub const ECDSA_SECP521R1_SHA512: u16 = 0x0603;
pub const RSA_PSS_RSAE_SHA256: u16 = 0x0804;
pub const RSA_PSS_RSAE_SHA384: u16 = 0x0805;
pub const RSA_PSS_RSAE_SHA512: u16 = 0x0806;
pub const RSA_PKCS1_SHA256: u16 = 0x0401;
pub const RSA_PKCS1_SHA384: u16 = 0x0501;
pub const RSA_PKCS1_SHA512: u16 = 0x0601;
pub const RSA_PKCS1_SHA1: u16 = 0x0201;
pub const ECDSA_SHA1: u16 = 0x0203;

// Named groups (IANA TLS Supported Groups registry).
pub const GROUP_P256: u16 = 23;
pub const GROUP_P384: u16 = 24;
pub const GROUP_P521: u16 = 25;
pub const GROUP_X25519: u16 = 29;
pub const GROUP_FFDHE2048: u16 = 256;
pub const GROUP_FFDHE3072: u16 = 257;
pub const GROUP_X25519_MLKEM768: u16 = 4588;

/// Default signature-algorithm list for a browser family.
pub fn signature_algorithms(browser: BrowserClass) -> Vec<u16> {
    match browser {
        BrowserClass::Chrome => vec![
            ECDSA_SECP256R1_SHA256,
            RSA_PSS_RSAE_SHA256,
            RSA_PKCS1_SHA256,
            ECDSA_SECP384R1_SHA384,
            RSA_PSS_RSAE_SHA384,
            RSA_PKCS1_SHA384,
            RSA_PSS_RSAE_SHA512,
            RSA_PKCS1_SHA512,
        ],
        BrowserClass::Firefox => vec![
            ECDSA_SECP256R1_SHA256,
            ECDSA_SECP384R1_SHA384,
            ECDSA_SECP521R1_SHA512,
            RSA_PSS_RSAE_SHA256,
            RSA_PSS_RSAE_SHA384,
            RSA_PSS_RSAE_SHA512,
            RSA_PKCS1_SHA256,
            RSA_PKCS1_SHA384,
            RSA_PKCS1_SHA512,
            ECDSA_SHA1,
            RSA_PKCS1_SHA1,
        ],
        BrowserClass::Other => vec![
            ECDSA_SECP256R1_SHA256,
            RSA_PSS_RSAE_SHA256,
            RSA_PKCS1_SHA256,
            ECDSA_SECP384R1_SHA384,
            RSA_PSS_RSAE_SHA384,
            RSA_PKCS1_SHA384,
            ECDSA_SECP521R1_SHA512,
            RSA_PSS_RSAE_SHA512,
            RSA_PKCS1_SHA512,
            ECDSA_SHA1,
            RSA_PKCS1_SHA1,
        ],
    }
}

/// Certificate-compression algorithms a browser family advertises.
pub fn cert_compression(browser: BrowserClass) -> Vec<CertCompression> {
    match browser {
        BrowserClass::Firefox => vec![
            CertCompression::Zlib,
            CertCompression::Brotli,
            CertCompression::Zstd,
        ],
        _ => vec![CertCompression::Brotli],
    }
}

/// key_share entries a browser family offers.
pub fn key_shares(browser: BrowserClass) -> Vec<KeyShare> {
    match browser {
        BrowserClass::Chrome => vec![
            KeyShare::with_data(GREASE_PLACEHOLDER, vec![0]),
            KeyShare::with_data(GROUP_X25519_MLKEM768, vec![0]),
            KeyShare::with_data(GROUP_X25519, vec![0]),
        ],
        BrowserClass::Firefox => vec![
            KeyShare::with_data(GROUP_X25519_MLKEM768, vec![0]),
            KeyShare::with_data(GROUP_X25519, vec![0]),
            KeyShare::new(GROUP_P256),
        ],
        BrowserClass::Other => vec![
            KeyShare::with_data(GROUP_X25519, vec![0]),
            KeyShare::new(GROUP_P256),
            KeyShare::new(GROUP_P384),
        ],
    }
}

/// Catalog default for supported_versions: 1.3 then 1.2, GREASE-prefixed
/// for Chrome. Parsers replace this with the window the fingerprint implies.
pub fn supported_versions(browser: BrowserClass) -> Vec<u16> {
    let mut versions = Vec::with_capacity(3);
    if browser.is_chrome() {
        versions.push(GREASE_PLACEHOLDER);
    }
    versions.push(VERSION_TLS13);
    versions.push(VERSION_TLS12);
    versions
}

/// Fallback supported-groups list used when the fingerprint format does not
/// encode groups (JA4R).
pub fn default_groups(browser: BrowserClass) -> Vec<u16> {
    let mut groups = Vec::with_capacity(5);
    if browser.is_chrome() {
        groups.push(GREASE_PLACEHOLDER);
    }
    groups.extend([GROUP_X25519, GROUP_P256, GROUP_P384, GROUP_P521]);
    groups
}

/// Fabricate a pre_shared_key payload that survives structural inspection.
///
/// No real session state exists: the identity is random bytes with a length
/// drawn from the range observed in real browser tickets, the obfuscated age
/// is elapsed-milliseconds from a base within the last hour plus a random
/// 32-bit add, and the binder is 32 random bytes (HMAC-SHA256 width).
/// Called once per dial.
pub fn synthesize_psk() -> PskOffer {
    let mut rand16 = [0u8; 16];
    getrandom::getrandom(&mut rand16).expect("system CSPRNG unavailable");

    let identity_len = 80 + (u16::from_le_bytes([rand16[0], rand16[1]]) % 71) as usize;
    let mut identity = vec![0u8; identity_len];
    getrandom::getrandom(&mut identity).expect("system CSPRNG unavailable");

    // The base is chosen within the last hour, so the elapsed milliseconds
    // equal the base offset itself.
    let ticket_age_ms =
        u32::from_le_bytes([rand16[2], rand16[3], rand16[4], rand16[5]]) % 3_600_000;
    let age_add = u32::from_le_bytes([rand16[6], rand16[7], rand16[8], rand16[9]]);
    let obfuscated_ticket_age = ticket_age_ms.wrapping_add(age_add);

    let mut binder = [0u8; 32];
    getrandom::getrandom(&mut binder).expect("system CSPRNG unavailable");

    PskOffer {
        identity,
        obfuscated_ticket_age,
        binder,
    }
}

/// Caller-supplied overrides layered on top of the built catalog.
#[derive(Debug, Clone, Default)]
pub struct TlsExtensionOverrides {
    pub signature_algorithms: Option<Vec<u16>>,
    pub cert_compression: Option<Vec<CertCompression>>,
    pub record_size_limit: Option<u16>,
    pub delegated_credentials: Option<Vec<u16>>,
    pub supported_versions: Option<Vec<u16>>,
    pub psk_key_exchange_modes: Option<Vec<u8>>,
    pub signature_algorithms_cert: Option<Vec<u16>>,
    pub key_share_curves: Option<Vec<KeyShare>>,
}

/// Extension contents keyed by ID for one `(browser, include_psk)` pair.
pub struct ExtensionCatalog {
    entries: HashMap<u16, ExtensionSpec>,
}

impl ExtensionCatalog {
    /// Build the catalog for a browser family. `include_psk` controls
    /// whether a synthetic pre_shared_key entry is materialized.
    pub fn build(browser: BrowserClass, include_psk: bool) -> Self {
        let mut entries = HashMap::new();

        let mut put = |ext: ExtensionSpec| {
            entries.insert(ext.id(), ext);
        };

        put(ExtensionSpec::ServerName);
        put(ExtensionSpec::StatusRequest);
        // 10 and 11 are patched in by the parsers.
        put(ExtensionSpec::SignatureAlgorithms(signature_algorithms(
            browser,
        )));
        put(ExtensionSpec::Alpn(vec![
            "h2".to_string(),
            "http/1.1".to_string(),
        ]));
        put(ExtensionSpec::Generic(17)); // status_request_v2
        put(ExtensionSpec::Sct);
        put(ExtensionSpec::Padding);
        put(ExtensionSpec::Generic(22)); // encrypt_then_mac
        put(ExtensionSpec::ExtendedMasterSecret);
        put(ExtensionSpec::TokenBinding);
        put(ExtensionSpec::CertCompression(cert_compression(browser)));
        put(ExtensionSpec::RecordSizeLimit(0x4001));
        put(ExtensionSpec::DelegatedCredentials(vec![
            ECDSA_SECP256R1_SHA256,
            ECDSA_SECP384R1_SHA384,
            ECDSA_SECP521R1_SHA512,
            ECDSA_SHA1,
        ]));
        put(ExtensionSpec::SessionTicket);
        put(ExtensionSpec::SupportedVersions(supported_versions(browser)));
        put(ExtensionSpec::Cookie);
        put(ExtensionSpec::PskKeyExchangeModes(vec![PSK_MODE_DHE]));
        put(ExtensionSpec::Generic(49)); // post_handshake_auth
        put(ExtensionSpec::SignatureAlgorithmsCert(vec![
            ECDSA_SECP256R1_SHA256,
            ECDSA_SECP384R1_SHA384,
            ECDSA_SECP521R1_SHA512,
            RSA_PSS_RSAE_SHA256,
            RSA_PSS_RSAE_SHA384,
            RSA_PSS_RSAE_SHA512,
            RSA_PKCS1_SHA256,
            RSA_PKCS1_SHA384,
            RSA_PSS_RSAE_SHA512,
            RSA_PKCS1_SHA512,
        ]));
        put(ExtensionSpec::KeyShare(key_shares(browser)));
        put(ExtensionSpec::QuicTransportParameters);
        put(ExtensionSpec::Npn);
        put(ExtensionSpec::ApplicationSettings {
            codepoint: 17513,
            protocols: vec!["h2".to_string()],
        });
        put(ExtensionSpec::ApplicationSettings {
            codepoint: 17613,
            protocols: vec!["h2".to_string()],
        });
        put(ExtensionSpec::Opaque {
            id: 30032,
            data: vec![0],
        });
        put(ExtensionSpec::GreaseEch);
        put(ExtensionSpec::RenegotiationInfo);

        if include_psk {
            put(ExtensionSpec::PreSharedKey(synthesize_psk()));
        }

        Self { entries }
    }

    /// Insert or replace an entry.
    pub fn set(&mut self, ext: ExtensionSpec) {
        self.entries.insert(ext.id(), ext);
    }

    /// Whether the catalog has an entry for `id`.
    pub fn contains(&self, id: u16) -> bool {
        self.entries.contains_key(&id)
    }

    /// Look up an entry, cloning its contents. Missing IDs are a hard error
    /// on the JA3 path.
    pub fn resolve(&self, id: u16) -> Result<ExtensionSpec> {
        self.entries
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownExtension(id))
    }

    /// Look up an entry, falling back to a bodyless generic record so the
    /// ID is still carried on the wire (JA4R path).
    pub fn resolve_or_generic(&self, id: u16) -> ExtensionSpec {
        self.entries
            .get(&id)
            .cloned()
            .unwrap_or(ExtensionSpec::Generic(id))
    }

    /// Layer caller overrides on top of the built entries.
    pub fn apply_overrides(&mut self, overrides: &TlsExtensionOverrides) {
        if let Some(sigalgs) = &overrides.signature_algorithms {
            self.set(ExtensionSpec::SignatureAlgorithms(sigalgs.clone()));
        }
        if let Some(algos) = &overrides.cert_compression {
            self.set(ExtensionSpec::CertCompression(algos.clone()));
        }
        if let Some(limit) = overrides.record_size_limit {
            self.set(ExtensionSpec::RecordSizeLimit(limit));
        }
        if let Some(creds) = &overrides.delegated_credentials {
            self.set(ExtensionSpec::DelegatedCredentials(creds.clone()));
        }
        if let Some(versions) = &overrides.supported_versions {
            self.set(ExtensionSpec::SupportedVersions(versions.clone()));
        }
        if let Some(modes) = &overrides.psk_key_exchange_modes {
            self.set(ExtensionSpec::PskKeyExchangeModes(modes.clone()));
        }
        if let Some(sigalgs) = &overrides.signature_algorithms_cert {
            self.set(ExtensionSpec::SignatureAlgorithmsCert(sigalgs.clone()));
        }
        if let Some(shares) = &overrides.key_share_curves {
            self.set(ExtensionSpec::KeyShare(shares.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_catalog_has_brotli_only_cert_compression() {
        let catalog = ExtensionCatalog::build(BrowserClass::Chrome, false);
        match catalog.resolve(27).unwrap() {
            ExtensionSpec::CertCompression(algos) => {
                assert_eq!(algos, vec![CertCompression::Brotli]);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn firefox_catalog_compresses_with_three_algorithms() {
        let catalog = ExtensionCatalog::build(BrowserClass::Firefox, false);
        match catalog.resolve(27).unwrap() {
            ExtensionSpec::CertCompression(algos) => assert_eq!(algos.len(), 3),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn psk_entry_exists_only_when_requested() {
        let without = ExtensionCatalog::build(BrowserClass::Chrome, false);
        assert!(without.resolve(41).is_err());

        let with = ExtensionCatalog::build(BrowserClass::Chrome, true);
        assert!(matches!(
            with.resolve(41).unwrap(),
            ExtensionSpec::PreSharedKey(_)
        ));
    }

    #[test]
    fn unknown_id_is_a_hard_error_but_generic_fallback_keeps_it() {
        let catalog = ExtensionCatalog::build(BrowserClass::Other, false);
        assert!(matches!(
            catalog.resolve(47802),
            Err(Error::UnknownExtension(47802))
        ));
        assert_eq!(catalog.resolve_or_generic(47802).id(), 47802);
    }

    #[test]
    fn synthetic_psk_matches_browser_shape() {
        let psk = synthesize_psk();
        assert!((80..=150).contains(&psk.identity.len()));
        assert_eq!(psk.binder.len(), 32);

        // Fresh material every call.
        let other = synthesize_psk();
        assert_ne!(psk.identity, other.identity);
    }

    #[test]
    fn overrides_replace_catalog_entries() {
        let mut catalog = ExtensionCatalog::build(BrowserClass::Chrome, false);
        let overrides = TlsExtensionOverrides {
            record_size_limit: Some(0x4000),
            signature_algorithms: Some(vec![ECDSA_SECP256R1_SHA256]),
            ..Default::default()
        };
        catalog.apply_overrides(&overrides);

        assert_eq!(
            catalog.resolve(28).unwrap(),
            ExtensionSpec::RecordSizeLimit(0x4000)
        );
        assert_eq!(
            catalog.resolve(13).unwrap(),
            ExtensionSpec::SignatureAlgorithms(vec![ECDSA_SECP256R1_SHA256])
        );
    }
}
