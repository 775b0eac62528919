//! TLS and HTTP/2 fingerprint model, parsers and browser profiles.

pub mod catalog;
pub mod h2;
pub mod ja3;
pub mod ja4r;
pub mod profiles;
pub mod spec;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::catalog::TlsExtensionOverrides;
use crate::fingerprint::spec::ClientHelloSpec;

pub use h2::{H2Setting, H2Settings, HeaderPriority, PriorityFrameSpec, PseudoHeader};
pub use ja4r::Transport;
pub use spec::{BrowserClass, CertCompression, ExtensionSpec, KeyShare};

/// A TLS fingerprint: JA3, JA4R, or none at all.
///
/// `Empty` means "use the TLS library's default ClientHello" - the engine
/// skips custom assembly entirely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Fingerprint {
    Ja3(String),
    Ja4r(String),
    #[default]
    Empty,
}

/// Discriminant of a [`Fingerprint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    Ja3,
    Ja4r,
    Empty,
}

impl FingerprintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ja3 => "ja3",
            Self::Ja4r => "ja4r",
            Self::Empty => "",
        }
    }
}

impl Fingerprint {
    /// Classify a raw fingerprint string: JA4R starts with `t` or `q` and
    /// carries at least three underscores, JA3 is five comma-separated
    /// fields, anything empty is `Empty`.
    pub fn from_value(value: &str) -> Self {
        if value.is_empty() {
            return Self::Empty;
        }
        let is_ja4r = (value.starts_with('t') || value.starts_with('q'))
            && value.matches('_').count() >= 3;
        if is_ja4r {
            Self::Ja4r(value.to_string())
        } else {
            Self::Ja3(value.to_string())
        }
    }

    pub fn kind(&self) -> FingerprintKind {
        match self {
            Self::Ja3(_) => FingerprintKind::Ja3,
            Self::Ja4r(_) => FingerprintKind::Ja4r,
            Self::Empty => FingerprintKind::Empty,
        }
    }

    /// The raw fingerprint string; empty for `Empty`.
    pub fn value(&self) -> &str {
        match self {
            Self::Ja3(v) | Self::Ja4r(v) => v,
            Self::Empty => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// Whether this fingerprint selects the QUIC transport (JA4R `q…`).
    pub fn is_quic(&self) -> bool {
        matches!(self, Self::Ja4r(v) if v.starts_with('q'))
    }

    /// Produce the ClientHello spec for this fingerprint, or `None` when the
    /// default ClientHello should be used.
    pub fn to_spec(
        &self,
        user_agent: &str,
        overrides: Option<&TlsExtensionOverrides>,
    ) -> Result<Option<ClientHelloSpec>> {
        match self {
            Self::Empty => Ok(None),
            Self::Ja3(value) => {
                ja3::parse_with_overrides(value, user_agent, overrides).map(Some)
            }
            Self::Ja4r(value) => {
                ja4r::parse_with_overrides(value, user_agent, overrides).map(|p| Some(p.spec))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_by_shape() {
        let ja3 = Fingerprint::from_value("771,4865,0-10,29,0");
        assert_eq!(ja3.kind(), FingerprintKind::Ja3);
        assert!(!ja3.is_quic());

        let ja4r = Fingerprint::from_value("t13d1515h2_1301_0000,002b_0403");
        assert_eq!(ja4r.kind(), FingerprintKind::Ja4r);
        assert!(!ja4r.is_quic());

        let quic = Fingerprint::from_value("q13d1515h2_1301_0000,002b_0403");
        assert_eq!(quic.kind(), FingerprintKind::Ja4r);
        assert!(quic.is_quic());

        assert_eq!(Fingerprint::from_value("").kind(), FingerprintKind::Empty);
    }

    #[test]
    fn empty_fingerprint_produces_no_spec() {
        let fp = Fingerprint::Empty;
        assert!(fp.is_empty());
        assert!(fp.to_spec("ua", None).unwrap().is_none());
    }
}
