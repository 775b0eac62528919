//! Request-shaped client options.

use serde::{Deserialize, Serialize};

use crate::fingerprint::catalog::TlsExtensionOverrides;
use crate::fingerprint::h2::{H2Settings, PseudoHeader};
use crate::fingerprint::Fingerprint;
use crate::headers::OrderedHeaders;

/// A cookie applied to outgoing requests as part of the `Cookie` header.
/// Storage and expiry semantics live outside the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Serialize cookies into a single `Cookie` header value.
pub fn cookie_header(cookies: &[Cookie]) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Everything a request needs. Profiles populate the fingerprint-related
/// fields; callers fill the rest. The engine reads options and never
/// mutates them visibly.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub url: String,
    pub method: String,
    pub headers: OrderedHeaders,
    pub body: Vec<u8>,

    pub fingerprint: Fingerprint,
    /// Typed overrides layered on the extension catalog after parsing.
    pub tls_extensions: Option<TlsExtensionOverrides>,

    /// Typed HTTP/2 session prelude. Takes effect unless
    /// `h2_settings_string` is also set, which wins.
    pub h2_settings: Option<H2Settings>,
    /// Akamai-format settings string, parsed lazily by the engine.
    pub h2_settings_string: Option<String>,

    /// HTTP/2 pseudo-header emission order.
    pub pheader_order: Option<Vec<PseudoHeader>>,
    /// Regular-header emission order (lowercased names).
    pub header_order: Option<Vec<String>>,

    pub user_agent: String,
    pub proxy: Option<String>,
    pub cookies: Vec<Cookie>,
    /// Whole-round-trip deadline in seconds; zero means unbounded.
    pub timeout_seconds: u64,
    pub disable_redirect: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw fingerprint string, empty when no fingerprint is set.
    pub fn fingerprint_value(&self) -> &str {
        self.fingerprint.value()
    }

    /// Resolved HTTP/2 settings: the settings string when present (parsed,
    /// its derived pseudo-header order also applied), otherwise the typed
    /// settings.
    pub fn resolved_h2_settings(
        &self,
    ) -> crate::error::Result<(Option<H2Settings>, Option<Vec<PseudoHeader>>)> {
        if let Some(raw) = &self.h2_settings_string {
            let (settings, pheaders) = crate::fingerprint::h2::parse_settings_string(raw)?;
            return Ok((Some(settings), pheaders));
        }
        Ok((self.h2_settings.clone(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_joins_pairs() {
        let cookies = vec![Cookie::new("a", "1"), Cookie::new("b", "2")];
        assert_eq!(cookie_header(&cookies).unwrap(), "a=1; b=2");
        assert!(cookie_header(&[]).is_none());
    }

    #[test]
    fn settings_string_wins_over_typed_settings() {
        let mut options = Options::new();
        options.h2_settings = Some(H2Settings::default());
        options.h2_settings_string =
            Some("2:0;3:100;4:2097152;9:1|10420225|0:256:false|m,s,a,p".to_string());

        let (settings, pheaders) = options.resolved_h2_settings().unwrap();
        assert_eq!(settings.unwrap().connection_flow, 10420225);
        assert_eq!(pheaders.unwrap()[1], PseudoHeader::Scheme);
    }
}
