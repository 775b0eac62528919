//! JA4R fingerprint parsing.
//!
//! JA4R (raw JA4) strings look like
//! `t13d1515h2_002f,0035,…_0005,000a,…_0403,0804,…`: a prefix carrying the
//! transport (`t` TCP / `q` QUIC), TLS version digits, SNI marker and
//! counters, then underscore-separated hex lists for ciphers, extensions
//! and signature algorithms. Unlike JA3, the format encodes neither groups
//! nor point formats, so browser-class defaults fill those in.

use crate::error::{Error, Result};
use crate::fingerprint::catalog::{self, ExtensionCatalog, TlsExtensionOverrides};
use crate::fingerprint::ja3::supported_version_list;
use crate::fingerprint::spec::{
    BrowserClass, ClientHelloSpec, ExtensionSpec, GREASE_PLACEHOLDER, VERSION_TLS10, VERSION_TLS11,
    VERSION_TLS12, VERSION_TLS13,
};

/// Transport the fingerprint targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Quic,
}

/// Parse result: the assembled spec plus the transport selector.
#[derive(Debug, Clone)]
pub struct ParsedJa4r {
    pub spec: ClientHelloSpec,
    pub transport: Transport,
}

/// Parse a JA4R string into a ClientHello specification.
pub fn parse(ja4r: &str, user_agent: &str) -> Result<ParsedJa4r> {
    parse_with_overrides(ja4r, user_agent, None)
}

/// Parse a JA4R string, layering caller extension overrides onto the catalog.
pub fn parse_with_overrides(
    ja4r: &str,
    user_agent: &str,
    overrides: Option<&TlsExtensionOverrides>,
) -> Result<ParsedJa4r> {
    let parts: Vec<&str> = ja4r.split('_').collect();
    if parts.len() < 4 {
        return Err(Error::parse(
            "ja4r",
            format!(
                "expected at least 4 underscore-separated segments, got {}",
                parts.len()
            ),
        ));
    }

    let prefix = parts[0];
    if prefix.len() < 5 {
        return Err(Error::parse("ja4r prefix", prefix.to_string()));
    }

    let transport = match prefix.as_bytes()[0] {
        b't' => Transport::Tcp,
        b'q' => Transport::Quic,
        other => {
            return Err(Error::parse(
                "ja4r transport",
                format!("expected 't' or 'q', got '{}'", other as char),
            ))
        }
    };

    let version_digits = &prefix[1..3];
    let version_token: u16 = version_digits
        .parse()
        .map_err(|_| Error::parse("ja4r version", version_digits.to_string()))?;

    // SNI marker: `d` (domain present) or `i` (IP, absent). Informational
    // for reassembly, as are the trailing counter digits.
    match prefix.as_bytes()[3] {
        b'd' | b'i' => {}
        other => {
            return Err(Error::parse(
                "ja4r sni",
                format!("expected 'd' or 'i', got '{}'", other as char),
            ))
        }
    }

    let ciphers = parse_hex_list(parts[1], "ja4r ciphers")?;
    let extension_ids = parse_hex_list(parts[2], "ja4r extensions")?;
    let signature_algorithms = parse_hex_list(parts[3], "ja4r signature_algorithms")?;

    let browser = BrowserClass::from_user_agent(user_agent);
    let include_psk = extension_ids.contains(&0x0029);

    let mut cat = ExtensionCatalog::build(browser, include_psk);
    if let Some(overrides) = overrides {
        cat.apply_overrides(overrides);
    }

    // JA4R encodes neither groups nor point formats; fill with the browser
    // defaults the format cannot express.
    cat.set(ExtensionSpec::SupportedGroups(catalog::default_groups(
        browser,
    )));
    cat.set(ExtensionSpec::EcPointFormats(vec![0, 1, 2]));

    let (version_min, version_max) = version_window(version_token);
    cat.set(ExtensionSpec::SupportedVersions(supported_version_list(
        browser,
        version_min,
        version_max,
    )));

    // Signature algorithms come verbatim from the fourth segment.
    cat.set(ExtensionSpec::SignatureAlgorithms(signature_algorithms));

    let mut extensions = Vec::with_capacity(extension_ids.len() + 2);
    let mut psk = None;
    if browser.is_chrome() {
        extensions.push(ExtensionSpec::Grease);
    }
    for &id in &extension_ids {
        let resolved = cat.resolve_or_generic(id);
        if id == 0x0029 {
            psk = Some(resolved);
        } else {
            extensions.push(resolved);
        }
    }
    if browser.is_chrome() {
        extensions.push(ExtensionSpec::Grease);
    }
    if let Some(psk) = psk {
        extensions.push(psk);
    }

    let mut cipher_suites = Vec::with_capacity(ciphers.len() + 1);
    if browser.is_chrome() {
        cipher_suites.push(GREASE_PLACEHOLDER);
    }
    cipher_suites.extend(ciphers);

    Ok(ParsedJa4r {
        spec: ClientHelloSpec {
            tls_version_min: version_min,
            tls_version_max: version_max,
            cipher_suites,
            compression_methods: vec![0],
            extensions,
        },
        transport,
    })
}

/// Version window implied by the JA4R version digits. Unknown digits fall
/// back to the 1.2-1.3 window rather than failing, matching observed
/// tolerant handling of the format.
fn version_window(token: u16) -> (u16, u16) {
    match token {
        13 => (VERSION_TLS12, VERSION_TLS13),
        12 => (VERSION_TLS11, VERSION_TLS12),
        11 => (VERSION_TLS10, VERSION_TLS11),
        10 => (VERSION_TLS10, VERSION_TLS10),
        _ => (VERSION_TLS12, VERSION_TLS13),
    }
}

fn parse_hex_list(segment: &str, name: &'static str) -> Result<Vec<u16>> {
    segment
        .split(',')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            u16::from_str_radix(tok, 16).map_err(|_| Error::parse(name, tok.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";
    const FIREFOX_UA: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:144.0) Gecko/20100101 Firefox/144.0";

    const CHROME_JA4R: &str = "t13d1515h2_002f,0035,009c,009d,1301,1302,1303,c013,c014,c02b,\
                               c02c,c02f,c030,cca8,cca9_0005,000a,000b,000d,0012,0017,001b,\
                               0023,002b,002d,0033,4469,ff01_0403,0804,0401,0503,0805,0501,\
                               0806,0601";

    #[test]
    fn rejects_missing_segments() {
        assert!(matches!(
            parse("t13d1515h2_002f_0005", CHROME_UA),
            Err(Error::Parse { field: "ja4r", .. })
        ));
    }

    #[test]
    fn rejects_bad_transport() {
        assert!(parse("x13d1515h2_002f_0005_0403", CHROME_UA).is_err());
    }

    #[test]
    fn rejects_bad_sni_marker() {
        assert!(parse("t13x1515h2_002f_0005_0403", CHROME_UA).is_err());
    }

    #[test]
    fn tcp_and_quic_prefixes() {
        let t = parse(CHROME_JA4R, CHROME_UA).unwrap();
        assert_eq!(t.transport, Transport::Tcp);

        let quic = CHROME_JA4R.replacen('t', "q", 1);
        let q = parse(&quic, CHROME_UA).unwrap();
        assert_eq!(q.transport, Transport::Quic);
    }

    #[test]
    fn extension_order_follows_the_string() {
        let parsed = parse(CHROME_JA4R, FIREFOX_UA).unwrap();
        let ids: Vec<u16> = parsed.spec.extensions.iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec![
                0x0005, 0x000a, 0x000b, 0x000d, 0x0012, 0x0017, 0x001b, 0x0023, 0x002b, 0x002d,
                0x0033, 0x4469, 0xff01
            ]
        );
    }

    #[test]
    fn signature_algorithms_come_from_fourth_segment() {
        let parsed = parse(CHROME_JA4R, FIREFOX_UA).unwrap();
        let sigalgs = parsed
            .spec
            .extensions
            .iter()
            .find_map(|e| match e {
                ExtensionSpec::SignatureAlgorithms(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            sigalgs,
            vec![0x0403, 0x0804, 0x0401, 0x0503, 0x0805, 0x0501, 0x0806, 0x0601]
        );
    }

    #[test]
    fn chrome_gets_grease_and_default_groups() {
        let parsed = parse(CHROME_JA4R, CHROME_UA).unwrap();
        let exts = &parsed.spec.extensions;
        assert!(exts[0].is_grease());
        assert!(exts[exts.len() - 1].is_grease());
        assert_eq!(parsed.spec.cipher_suites[0], GREASE_PLACEHOLDER);

        let groups = parsed.spec.supported_groups().unwrap();
        assert_eq!(groups[0], GREASE_PLACEHOLDER);
        assert!(groups.contains(&29));
        assert!(groups.contains(&25));
    }

    #[test]
    fn psk_lands_last_when_0029_present() {
        let with_psk = "t13d1515h2_1301,1302_0000,0029,002b_0403";
        let parsed = parse(with_psk, CHROME_UA).unwrap();
        let exts = &parsed.spec.extensions;
        assert_eq!(exts.last().unwrap().id(), 41);
        assert!(exts[exts.len() - 2].is_grease());
        assert!(parsed.spec.has_psk());
    }

    #[test]
    fn unknown_extension_becomes_generic() {
        let with_unknown = "t13d1515h2_1301_0000,fafa,002b_0403";
        let parsed = parse(with_unknown, FIREFOX_UA).unwrap();
        assert!(parsed
            .spec
            .extensions
            .iter()
            .any(|e| matches!(e, ExtensionSpec::Generic(0xfafa))));
    }

    #[test]
    fn version_12_window() {
        let fp = "t12d1515h2_1301_0000,002b_0403";
        let parsed = parse(fp, FIREFOX_UA).unwrap();
        assert_eq!(parsed.spec.tls_version_min, VERSION_TLS11);
        assert_eq!(parsed.spec.tls_version_max, VERSION_TLS12);
    }
}
